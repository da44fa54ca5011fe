//! Process-wide single-flight guard for rebuilds.
//!
//! One async mutex per store identity. Whoever holds it may validate and
//! rebuild the store; everybody else opening the same store waits, then
//! validates again and finds the store fresh.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

static GUARDS: LazyLock<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>> = LazyLock::new(Default::default);

/// Held while a store is being validated or rebuilt.
#[derive(Debug)]
pub(crate) struct RebuildGuard {
    _permit: OwnedMutexGuard<()>,
}

/// Wait until no other task holds the guard for `identity`, then take it.
pub(crate) async fn acquire(identity: &str) -> RebuildGuard {
    let lock = {
        // Never held across an await.
        let mut guards = GUARDS.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(identity.to_string()).or_default())
    };
    if let Ok(permit) = Arc::clone(&lock).try_lock_owned() {
        return RebuildGuard { _permit: permit };
    }
    debug!(identity, "waiting for in-flight rebuild");
    RebuildGuard {
        _permit: lock.lock_owned().await,
    }
}
