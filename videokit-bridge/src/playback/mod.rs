//! Decode session state machine and transport surface
//!
//! [`DecodeBridge`] is the object the host owns. It is split across files by
//! responsibility:
//! - `bridge`: construction, surface description, per-tick `step`, statistics
//! - `session`: `start` / `stop` and the background wait-loop
//! - `transport`: play, pause, time, length, seek, sound position

mod bridge;
mod session;
mod transport;

pub use bridge::{BridgeStats, DecodeBridge};
