pub mod config;
pub mod error;
pub mod handle;
pub mod io;
pub mod log_store;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod scheduler;
pub mod supervisor;

pub use error::{CronError, Result};
