pub mod console;
pub mod hub;

pub use console::{parse_alert_line, parse_console_line, AlertCommand};
pub use hub::ChatHub;
