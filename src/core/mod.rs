pub mod config;
pub mod error;

pub use config::LetheConfig;
pub use error::{LetheError, Result};
