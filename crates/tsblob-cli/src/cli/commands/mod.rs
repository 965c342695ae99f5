//! CLI command handlers. Each command is in its own file.

mod checksum;
mod get;
mod ls;
mod progress;
mod put;

pub use checksum::run_checksum;
pub use get::run_get;
pub use ls::run_ls;
pub use put::run_put;
