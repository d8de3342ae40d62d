//! Input validation for push actions.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Namespace prefix a recipient may carry.
pub const NAMESPACE: &str = "pssst.";

/// Recipient token, whitespace, then at least one non-space character.
///
/// Word characters are ASCII only.
static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:pssst\.)?[A-Za-z0-9_]{2,63})\s+(\S.*)$").expect("valid push pattern")
});

/// A validated `(recipient, body)` pair ready to be pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Recipient user name, optionally namespaced.
    pub recipient: String,
    /// Message body.
    pub body: String,
}

impl PushRequest {
    /// Parse an input line.
    ///
    /// Returns `None` when the line does not denote a push. That is not an
    /// error: the user is simply still typing.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let caps = LINE.captures(line.trim())?;
        let recipient = caps.get(1)?.as_str().to_string();
        let body = caps.get(2)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");

        if body.is_empty() {
            return None;
        }

        Some(Self { recipient, body })
    }

    /// Positional parameters for the `push` call.
    #[must_use]
    pub fn to_params(&self) -> Value {
        json!([self.recipient, self.body])
    }
}
