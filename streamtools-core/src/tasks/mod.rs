pub mod credential_check;
pub mod session_reconcile;

pub use credential_check::spawn_credential_check_task;
pub use session_reconcile::spawn_session_reconcile_task;
