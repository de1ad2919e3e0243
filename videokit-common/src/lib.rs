//! # VideoKit Common Library
//!
//! Shared code for the VideoKit decode bridge and its host binary:
//! - Error type
//! - Configuration loading and resolution
//! - Bridge event types (BridgeEvent enum) and session state
//! - Human-readable clock formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use events::{BridgeEvent, EndReason, EventBus, SessionState};
