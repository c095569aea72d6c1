pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::QuarryConfig;
pub use error::{QuarryError, Result};
pub use event::{EventBus, ResolveEvent};
pub use types::*;
