//! In-memory loopback channel.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use pssst_core::{CallChannel, ChannelError, Message, Method, push::NAMESPACE};
use serde_json::{Value, json};

/// Message boxes shared by every loopback user.
#[derive(Default)]
pub struct Mailboxes {
    boxes: RwLock<HashMap<String, VecDeque<Message>>>,
}

impl Mailboxes {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty box for `user` if none exists.
    ///
    /// # Errors
    /// Returns error if the registry lock is poisoned.
    pub fn register(&self, user: &str) -> Result<(), ChannelError> {
        self.boxes
            .write()
            .map_err(|e| ChannelError::Transport(e.to_string()))?
            .entry(user.to_string())
            .or_default();
        Ok(())
    }

    /// Queue `"<sender>: <body>"` for `recipient`.
    ///
    /// # Errors
    /// Returns error if the recipient has no box.
    pub fn deliver(&self, sender: &str, recipient: &str, body: &str) -> Result<(), ChannelError> {
        let recipient = recipient.strip_prefix(NAMESPACE).unwrap_or(recipient);
        let mut boxes = self
            .boxes
            .write()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let queue = boxes
            .get_mut(recipient)
            .ok_or_else(|| ChannelError::Remote(format!("User not found: {recipient}")))?;

        queue.push_back(format!("{sender}: {body}"));
        Ok(())
    }

    /// Take every queued message for `user`, oldest first.
    ///
    /// # Errors
    /// Returns error if the user has no box.
    pub fn drain(&self, user: &str) -> Result<Vec<Message>, ChannelError> {
        let mut boxes = self
            .boxes
            .write()
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let queue = boxes
            .get_mut(user)
            .ok_or_else(|| ChannelError::Remote(format!("User not found: {user}")))?;

        Ok(queue.drain(..).collect())
    }
}

/// Loopback stand-in for the proxy, bound to one user.
///
/// Useful for demos and tests. Nothing is persisted.
pub struct MemoryChannel {
    user: String,
    mailboxes: Arc<Mailboxes>,
    closed: AtomicBool,
}

impl MemoryChannel {
    /// Create a channel for `user`, registering its box.
    ///
    /// # Errors
    /// Returns error if the registry lock is poisoned.
    pub fn new(user: impl Into<String>, mailboxes: Arc<Mailboxes>) -> Result<Self, ChannelError> {
        let user = user.into();
        mailboxes.register(&user)?;
        Ok(Self {
            user,
            mailboxes,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether `exit` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn push_params(params: Option<&Value>) -> Result<(&str, &str), ChannelError> {
    let invalid = || ChannelError::Remote("push expects [receiver, message]".to_string());
    match params.and_then(Value::as_array).map(Vec::as_slice) {
        Some([recipient, body]) => Ok((
            recipient.as_str().ok_or_else(invalid)?,
            body.as_str().ok_or_else(invalid)?,
        )),
        _ => Err(invalid()),
    }
}

#[async_trait]
impl CallChannel for MemoryChannel {
    async fn invoke(&self, method: Method, params: Option<Value>) -> Result<Value, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        match method {
            Method::Name => Ok(json!(self.user)),
            Method::Pull => {
                let messages = self.mailboxes.drain(&self.user)?;
                Ok(json!(messages))
            }
            Method::Push => {
                let (recipient, body) = push_params(params.as_ref())?;
                self.mailboxes.deliver(&self.user, recipient, body)?;
                Ok(Value::Null)
            }
            Method::Exit => {
                self.closed.store(true, Ordering::SeqCst);
                tracing::debug!(user = %self.user, "Loopback channel closed");
                Ok(Value::Null)
            }
        }
    }
}
