// streamtools-core/src/tasks/credential_check.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::auth::CredentialManager;

/// Spawns a background task that runs a credential validation pass right
/// away and then `interval` after each pass finishes, until `cancel` fires.
/// The wait only starts once a pass has completed, successful or not.
pub fn spawn_credential_check_task(
    manager: Arc<CredentialManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mgr = manager.clone();
            match tokio::spawn(async move { mgr.check_credentials().await }).await {
                Ok(state) => debug!("(CredentialCheck) state => {state:?}"),
                Err(e) => error!("(CredentialCheck) pass failed => {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("(CredentialCheck) stopped");
    })
}
