pub mod constants;
pub mod context;
pub mod debuglog;
pub mod error;
pub mod fileio;

pub use context::{Context, ContextHandle};
pub use error::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
