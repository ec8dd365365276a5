pub mod config;
pub mod fixture;
pub mod watch;

pub use config::resolve_config;
pub use fixture::Fixture;
pub use watch::{run_watch, WatchOptions};
