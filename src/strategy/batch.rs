//! Batch processing with account-based partitioning
//!
//! This module provides the `BatchProcessor`, which runs a batch of requests
//! concurrently while keeping every account's operations in file order.
//!
//! # Partitioning
//!
//! A transfer touches two accounts, so partitioning by a single key is not
//! enough. Requests are grouped into connected components: two requests share
//! a group when they touch a common account, directly or through a chain of
//! other requests in the batch. Groups share no accounts, so they can run in
//! any order and the final balances match a sequential replay.
//!
//! ```text
//! batch:  A→B   C+   B→D   E-
//! groups: [A→B, B→D]  [C+]  [E-]
//! ```

use crate::core::{LedgerEngine, MemoryStore};
use crate::types::{AccountNumber, LedgerError, OperationRequest, Transaction};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Result of processing a single request
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The request that was processed
    pub request: OperationRequest,

    /// The committed transaction, or why the engine refused the request
    pub result: Result<Transaction, LedgerError>,
}

/// Batch processor with account-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    engine: LedgerEngine<MemoryStore>,
    max_concurrent: usize,
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

impl BatchProcessor {
    /// Create a processor running at most `max_concurrent` groups at once
    pub fn new(engine: LedgerEngine<MemoryStore>, max_concurrent: usize) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Partition a batch into groups that share no account
    ///
    /// # Guarantees
    ///
    /// - Each request appears in exactly one group
    /// - Requests within a group keep their original order
    /// - Groups are ordered by their first request
    pub fn partition_by_accounts(batch: Vec<OperationRequest>) -> Vec<Vec<OperationRequest>> {
        let mut parent: Vec<usize> = (0..batch.len()).collect();
        let mut last_seen: HashMap<AccountNumber, usize> = HashMap::new();

        for (index, request) in batch.iter().enumerate() {
            for account in request.lock_set() {
                if let Some(&previous) = last_seen.get(&account) {
                    let a = find(&mut parent, index);
                    let b = find(&mut parent, previous);
                    if a != b {
                        parent[a.max(b)] = a.min(b);
                    }
                }
                last_seen.insert(account, index);
            }
        }

        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<OperationRequest>> = Vec::new();
        for (index, request) in batch.into_iter().enumerate() {
            let root = find(&mut parent, index);
            let slot = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(request);
        }
        groups
    }

    /// Process one group sequentially, in order
    ///
    /// All requests are attempted even if some fail.
    pub fn process_group(
        engine: &LedgerEngine<MemoryStore>,
        requests: Vec<OperationRequest>,
        cancel: &CancellationToken,
    ) -> Vec<ProcessingResult> {
        requests
            .into_iter()
            .map(|request| {
                let result = engine.execute(request.clone(), cancel);
                ProcessingResult { request, result }
            })
            .collect()
    }

    /// Results for a group whose task ended in `joined`
    ///
    /// A group that panicked or was aborted yields one rejection per request,
    /// so every request in the batch is accounted for.
    fn settle_group(
        joined: Result<Vec<ProcessingResult>, JoinError>,
        requests: Vec<OperationRequest>,
    ) -> Vec<ProcessingResult> {
        match joined {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, requests = requests.len(), "batch group task failed");
                requests
                    .into_iter()
                    .map(|request| ProcessingResult {
                        request,
                        result: Err(LedgerError::persistence(format!(
                            "batch group task failed: {}",
                            e
                        ))),
                    })
                    .collect()
            }
        }
    }

    /// Process a batch with account-based partitioning
    ///
    /// Each group runs on the blocking pool, since the engine blocks on
    /// account locks. Results come back grouped, not in input order, with
    /// exactly one result per request.
    pub async fn process_batch(
        &self,
        batch: Vec<OperationRequest>,
        cancel: &CancellationToken,
    ) -> Vec<ProcessingResult> {
        let groups = Self::partition_by_accounts(batch);
        debug!(groups = groups.len(), "batch partitioned");

        let tasks = groups.into_iter().map(|group| {
            let engine = self.engine.clone();
            let cancel = cancel.clone();
            let requests = group.clone();
            async move {
                let joined = tokio::task::spawn_blocking(move || {
                    Self::process_group(&engine, group, &cancel)
                })
                .await;
                Self::settle_group(joined, requests)
            }
        });

        let mut results = Vec::new();
        let mut finished = stream::iter(tasks).buffer_unordered(self.max_concurrent);
        while let Some(group_results) = finished.next().await {
            results.extend(group_results);
        }
        results
    }
}
