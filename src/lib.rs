pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use config::FlowConfig;
pub use error::{FlowError, Result};
