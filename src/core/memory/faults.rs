//! Deterministic fault injection for the in-memory store
//!
//! An armed [`FaultPoint`] makes the next scope step of that kind fail with
//! [`LedgerError::PersistenceFailure`], then disarms itself. Tests use this to
//! check that every partial write is rolled back.

use crate::types::LedgerError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// A step inside an atomic scope that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Opening the scope and acquiring locks
    Begin,
    /// Reading an account inside the scope
    FindAccount,
    /// Staging a new transaction record
    InsertTransaction,
    /// Applying a negative balance delta
    DebitBalance,
    /// Applying a positive balance delta
    CreditBalance,
    /// Moving a staged record to its terminal status
    UpdateStatus,
    /// Publishing the staged writes
    Commit,
}

impl FaultPoint {
    pub const ALL: [FaultPoint; 7] = [
        FaultPoint::Begin,
        FaultPoint::FindAccount,
        FaultPoint::InsertTransaction,
        FaultPoint::DebitBalance,
        FaultPoint::CreditBalance,
        FaultPoint::UpdateStatus,
        FaultPoint::Commit,
    ];
}

/// One-shot fault switches
#[derive(Debug, Default)]
pub struct FaultInjector {
    armed: Mutex<HashSet<FaultPoint>>,
    any_armed: AtomicBool,
}

impl FaultInjector {
    /// Make the next step at `point` fail
    pub fn arm(&self, point: FaultPoint) {
        self.armed.lock().insert(point);
        self.any_armed.store(true, Ordering::Release);
    }

    /// Fire the fault at `point` if armed
    pub(crate) fn check(&self, point: FaultPoint) -> Result<(), LedgerError> {
        if !self.any_armed.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut armed = self.armed.lock();
        if !armed.remove(&point) {
            return Ok(());
        }
        if armed.is_empty() {
            self.any_armed.store(false, Ordering::Release);
        }
        warn!(?point, "injected persistence fault");
        Err(LedgerError::persistence(format!(
            "injected fault at {:?}",
            point
        )))
    }
}
