pub mod config;
pub mod error;
pub mod types;

pub use config::{CerebroConfig, Config, LlmProvider};
pub use error::ChorusError;
pub use types::*;
