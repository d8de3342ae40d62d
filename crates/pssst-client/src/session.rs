//! Client session: display name, poll loop lifecycle, push and exit.

use std::sync::{Arc, PoisonError, RwLock};

use pssst_core::{CallChannel, ChannelError, ClientConfig, Method, PushRequest, RenderSink};
use serde_json::Value;

use crate::{Dispatcher, PollLoop};

/// A user's session with the local proxy.
///
/// Owns the poll timer: `start` creates it, a successful `exit` (or `stop`)
/// cancels it. Dropping the client cancels it as well.
pub struct MessageClient {
    dispatcher: Dispatcher,
    poll: PollLoop,
    display_name: Arc<RwLock<Option<String>>>,
}

impl MessageClient {
    /// Create a stopped session.
    #[must_use]
    pub fn new(
        channel: Arc<dyn CallChannel>,
        sink: Arc<dyn RenderSink>,
        config: &ClientConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(channel, sink);
        Self {
            poll: PollLoop::new(dispatcher.clone(), config.poll_interval()),
            dispatcher,
            display_name: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the session: begin polling and fetch the display name.
    ///
    /// Must be called within a Tokio runtime. Starting a running session is
    /// a no-op and returns `false`.
    pub fn start(&self) -> bool {
        if !self.poll.start() {
            return false;
        }

        let dispatcher = self.dispatcher.clone();
        let display_name = Arc::clone(&self.display_name);
        tokio::spawn(async move {
            fetch_name(&dispatcher, &display_name).await;
        });
        true
    }

    /// Cancel the poll timer without notifying the proxy.
    ///
    /// Stopping a stopped session is a no-op and returns `false`.
    pub fn stop(&self) -> bool {
        self.poll.stop()
    }

    /// Whether the poll timer is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poll.is_running()
    }

    /// Display name, once fetched.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.display_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch the display name once. No retry on failure.
    pub async fn fetch_name(&self) -> Option<String> {
        fetch_name(&self.dispatcher, &self.display_name).await
    }

    /// Handle a submitted input line.
    ///
    /// Lines that do not denote a push are ignored without an error.
    /// Returns whether the proxy accepted a push: `false` both for ignored
    /// lines and for failed pushes.
    pub async fn submit(&self, line: &str) -> bool {
        match PushRequest::parse(line) {
            Some(request) => self.push(&request).await,
            None => {
                tracing::trace!("Input is not a push, ignoring");
                false
            }
        }
    }

    /// Push a message. The input is cleared once the proxy accepts it.
    ///
    /// Pushing the same request twice issues two calls.
    pub async fn push(&self, request: &PushRequest) -> bool {
        let accepted = self
            .dispatcher
            .call(Method::Push, Some(request.to_params()))
            .await
            .is_some();

        if accepted {
            tracing::debug!(recipient = %request.recipient, "Message pushed");
            self.dispatcher.sink().clear_input();
        }
        accepted
    }

    /// Ask the proxy to shut down; on success the poll timer is cancelled.
    ///
    /// On failure the error is reported and the timer keeps running.
    pub async fn exit(&self) -> bool {
        if self.dispatcher.call(Method::Exit, None).await.is_none() {
            return false;
        }
        self.poll.stop();
        tracing::info!("Session ended");
        true
    }
}

async fn fetch_name(
    dispatcher: &Dispatcher,
    display_name: &RwLock<Option<String>>,
) -> Option<String> {
    let mut fetched = None;
    dispatcher
        .call_with(Method::Name, None, |value| match value {
            Value::String(name) => {
                dispatcher.sink().set_display_name(&name);
                fetched = Some(name);
                Ok(())
            }
            other => Err(ChannelError::Decode(format!("expected a name, got {other}"))),
        })
        .await;

    if let Some(ref name) = fetched {
        tracing::info!(user = %name, "Display name fetched");
        *display_name.write().unwrap_or_else(PoisonError::into_inner) = Some(name.clone());
    }
    fetched
}
