//! Turn serialization.
//!
//! Every inbound turn and every task completion runs under the same gate,
//! so each one observes and writes session state atomically with respect
//! to the others. Completions can still land between two turns and
//! overwrite what the previous turn wrote.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared lock held for the duration of one turn or one completion.
#[derive(Debug, Clone, Default)]
pub struct TurnGate {
    lock: Arc<Mutex<()>>,
}

impl TurnGate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the gate and hold it until the guard is dropped.
    pub async fn enter(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }
}
