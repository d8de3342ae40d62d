//! Timer-driven `pull` loop.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use pssst_core::{ChannelError, Message, Method};
use serde_json::Value;
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::Dispatcher;

/// Repeating `pull` task.
///
/// Every tick spawns its own call, so a slow pull never delays the next
/// tick and in-flight pulls are not capped. A failed pull is reported and
/// the loop carries on.
pub struct PollLoop {
    dispatcher: Dispatcher,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollLoop {
    /// Create a stopped poll loop.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, interval: Duration) -> Self {
        Self {
            dispatcher,
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Start ticking. The first tick fires one interval from now.
    ///
    /// Must be called within a Tokio runtime. Returns `false` if the loop
    /// was already running.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        tracing::info!(interval_ms = self.interval.as_millis(), "Starting poll loop");
        *handle = Some(tokio::spawn(run(self.dispatcher.clone(), self.interval)));
        true
    }

    /// Cancel the timer. Pulls already in flight still complete.
    ///
    /// Returns `false` if the loop was not running.
    pub fn stop(&self) -> bool {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(h) => {
                h.abort();
                tracing::info!("Poll loop stopped");
                true
            }
            None => false,
        }
    }

    /// Whether the timer is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if let Some(h) = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            h.abort();
        }
    }
}

async fn run(dispatcher: Dispatcher, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        tracing::trace!("Poll tick");
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            pull(&dispatcher).await;
        });
    }
}

/// Pull once and render the batch.
///
/// Each message is appended in arrival order, then the surface is scrolled
/// once. Returns the number of messages rendered.
pub async fn pull(dispatcher: &Dispatcher) -> usize {
    let mut rendered = 0;
    dispatcher
        .call_with(Method::Pull, None, |value| {
            let messages = decode_messages(value)?;
            // An empty batch neither appends nor scrolls, as in the browser client.
            if messages.is_empty() {
                return Ok(());
            }

            let sink = dispatcher.sink();
            for message in &messages {
                sink.append(message);
            }
            sink.scroll_to_bottom();
            rendered = messages.len();
            Ok(())
        })
        .await;

    if rendered > 0 {
        tracing::debug!(count = rendered, "Rendered pulled messages");
    }
    rendered
}

/// Decode a `pull` result. `null` is an empty batch.
///
/// # Errors
/// Returns `ChannelError::Decode` unless the value is an array of strings.
pub fn decode_messages(value: Value) -> Result<Vec<Message>, ChannelError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(ChannelError::Decode(format!(
                    "expected a message string, got {other}"
                ))),
            })
            .collect(),
        other => Err(ChannelError::Decode(format!(
            "expected a list of messages, got {other}"
        ))),
    }
}
