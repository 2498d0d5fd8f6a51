pub mod explain;
pub mod settings;

pub use explain::explain_command;
pub use settings::{set_server_command, show_command};
