//! Core abstractions for the Pssst message client.
//!
//! This crate provides the fundamental building blocks:
//! - `CallChannel` - Asynchronous request/response seam to the local proxy
//! - `RenderSink` - Capabilities the hosting UI lends to the client
//! - `PushRequest` - Validated `(recipient, body)` pairs parsed from input lines
//! - `ClientConfig` - Poll interval and friends
//! - `Transcript` - Recording render sink with history + broadcast

pub mod config;
pub mod push;
pub mod traits;
pub mod transcript;

pub use config::{ClientConfig, ConfigError};
pub use push::PushRequest;
pub use traits::{CallChannel, ChannelError, Message, Method, RenderSink};
pub use transcript::{RenderEvent, Transcript};
