pub mod credential_manager;

pub use credential_manager::{CredentialManager, REFRESH_LOOKAHEAD_HOURS};
