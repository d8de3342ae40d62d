//! Core traits for the call channel and the render sink.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A message as delivered by the proxy's `pull` method.
///
/// Opaque text; the client neither parses nor deduplicates it.
pub type Message = String;

/// Methods exposed by the local proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Shut down the proxy.
    Exit,
    /// Fetch the canonical user name.
    Name,
    /// Fetch all new messages from the box.
    Pull,
    /// Push a message into a recipient's box.
    Push,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Name => "name",
            Self::Pull => "pull",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by a call channel.
///
/// The client does not distinguish between variants: every one of them is
/// reported to the render sink once and then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Remote(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Channel closed")]
    Closed,
    #[error("Unexpected result: {0}")]
    Decode(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Asynchronous request/response channel to the proxy.
///
/// Authentication and transport security are the implementor's business.
#[async_trait]
pub trait CallChannel: Send + Sync {
    /// Invoke `method` with optional positional parameters.
    ///
    /// # Errors
    /// Returns the channel's error if the call could not be completed or
    /// the proxy rejected it.
    async fn invoke(&self, method: Method, params: Option<Value>) -> Result<Value, ChannelError>;
}

/// Capabilities provided by the hosting UI layer.
pub trait RenderSink: Send + Sync {
    /// Append a message to the render surface.
    fn append(&self, text: &str);

    /// Scroll the render surface to its bottom.
    fn scroll_to_bottom(&self);

    /// Show the user's display name.
    fn set_display_name(&self, name: &str);

    /// Clear the input field after a successful push.
    fn clear_input(&self);

    /// Notify the user about a failed call.
    fn report_error(&self, err: &ChannelError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_wire_names() {
        for method in [Method::Exit, Method::Name, Method::Pull, Method::Push] {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
        }
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Pull.to_string(), "pull");
    }

    #[test]
    fn test_remote_error_is_verbatim() {
        let err = ChannelError::Remote("Unknown user".into());
        assert_eq!(err.to_string(), "Unknown user");
    }
}
