//! Transport layer between the client and the local proxy.
//!
//! Provides:
//! - Wire protocol (newline-delimited JSON)
//! - `StreamChannel` - `CallChannel` over any async byte stream (TCP with feature: tcp)

pub mod protocol;
pub mod stream;

pub use protocol::{CallRequest, CallResponse};
pub use stream::StreamChannel;
