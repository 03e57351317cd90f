#![forbid(unsafe_code)]

//! Asynchronous supervisor for long-lived engine processes speaking a
//! line-oriented protocol over stdin/stdout.

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod process;

pub use config::SupervisorConfig;
pub use errors::{AppError, Result};
pub use events::{EventBus, ProcessEvent};
pub use models::state::ProcessState;
pub use process::Supervisor;
