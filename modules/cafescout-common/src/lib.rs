pub mod config;
pub mod error;
pub mod filters;
pub mod types;

pub use config::Config;
pub use error::CafeScoutError;
pub use filters::*;
pub use types::*;
