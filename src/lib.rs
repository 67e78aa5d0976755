#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod capabilities;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod protocol;
pub mod providers;
pub mod storage;

pub use error::{CopilotError, Result};
