pub mod store;

pub use store::{default_chat_log_path, default_config_path, ConfigStore};
