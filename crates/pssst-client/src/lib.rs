//! Message exchange loop for the Pssst proxy client.
//!
//! Provides:
//! - `Dispatcher` - Single entry point for proxy calls with report-and-continue errors
//! - `PollLoop` - Timer-driven `pull` task
//! - `MessageClient` - Session owning the dispatcher and the poll loop
//! - Channel implementations (memory)

pub mod channel;
pub mod dispatcher;
pub mod poll;
pub mod session;

pub use dispatcher::Dispatcher;
pub use poll::PollLoop;
pub use session::MessageClient;

#[cfg(feature = "memory")]
pub use channel::{Mailboxes, MemoryChannel};
