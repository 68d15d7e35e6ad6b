//! Command-line interface components
//!
//! CLI-specific code for the Himawari Fetcher application: argument
//! parsing, command handlers, progress display, and PNG emission.

pub mod args;
pub mod commands;
pub mod output;
pub mod progress;

pub use args::{
    AuthAction, AuthArgs, CacheAction, CacheArgs, Cli, Commands, FetchArgs, GlobalArgs,
    ProcessArgs, RunArgs, TimeRangeArgs,
};
pub use commands::{handle_auth, handle_cache, handle_fetch, handle_process, handle_run};
pub use output::PngSink;
pub use progress::{ProgressConfig, ProgressCounts, ProgressDisplay};
