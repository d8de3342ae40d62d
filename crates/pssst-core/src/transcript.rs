//! Recording render sink with history + broadcast.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{ChannelError, RenderSink};

/// Default history size limit (10 MB).
const HISTORY_BYTES: usize = 10_000 * 1024;

/// Live channel capacity.
const LIVE_CAPACITY: usize = 1024;

/// A single call made on the render sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RenderEvent {
    /// A message was appended.
    Append(String),
    /// The surface was scrolled to its bottom.
    ScrollToBottom,
    /// The display name was set.
    DisplayName(String),
    /// The input field was cleared.
    ClearInput,
    /// An error was reported.
    Error(String),
}

impl RenderEvent {
    fn approx_bytes(&self) -> usize {
        const OVERHEAD: usize = 8;
        match self {
            Self::Append(s) | Self::DisplayName(s) | Self::Error(s) => s.len() + OVERHEAD,
            Self::ScrollToBottom | Self::ClearInput => OVERHEAD,
        }
    }
}

struct StoredEvent {
    event: RenderEvent,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEvent>,
    total_bytes: usize,
}

impl Inner {
    /// Append an event, dropping the oldest ones until it fits the budget.
    fn record(&mut self, event: RenderEvent) {
        let bytes = event.approx_bytes();
        while self.total_bytes + bytes > HISTORY_BYTES {
            let Some(oldest) = self.history.pop_front() else {
                break;
            };
            self.total_bytes -= oldest.bytes;
        }
        self.total_bytes += bytes;
        self.history.push_back(StoredEvent { event, bytes });
    }

    fn events(&self) -> impl Iterator<Item = &RenderEvent> {
        self.history.iter().map(|stored| &stored.event)
    }
}

/// Render sink that records every call.
///
/// Hosts subscribe to it to draw the surface; late subscribers replay the
/// history first.
pub struct Transcript {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<RenderEvent>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
            }),
            sender,
        }
    }

    /// Record an event for live subscribers and history.
    pub fn push(&self, event: RenderEvent) {
        let _ = self.sender.send(event.clone());
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event);
    }

    /// Get a receiver for live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RenderEvent> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn history(&self) -> Vec<RenderEvent> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.events().cloned().collect()
    }

    /// Messages appended so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Append(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Errors reported so far, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.history()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Stream that yields history first, then live events.
    ///
    /// Lagged live events are skipped.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, RenderEvent> {
        let (history, rx) = (self.history(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

impl RenderSink for Transcript {
    fn append(&self, text: &str) {
        self.push(RenderEvent::Append(text.to_string()));
    }

    fn scroll_to_bottom(&self) {
        self.push(RenderEvent::ScrollToBottom);
    }

    fn set_display_name(&self, name: &str) {
        self.push(RenderEvent::DisplayName(name.to_string()));
    }

    fn clear_input(&self) {
        self.push(RenderEvent::ClearInput);
    }

    fn report_error(&self, err: &ChannelError) {
        self.push(RenderEvent::Error(err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_sink_calls() {
        let transcript = Transcript::new();
        transcript.set_display_name("alice");
        transcript.append("hi");
        transcript.scroll_to_bottom();
        transcript.report_error(&ChannelError::Closed);
        transcript.clear_input();

        assert_eq!(
            transcript.history(),
            vec![
                RenderEvent::DisplayName("alice".into()),
                RenderEvent::Append("hi".into()),
                RenderEvent::ScrollToBottom,
                RenderEvent::Error("Channel closed".into()),
                RenderEvent::ClearInput,
            ]
        );
        assert_eq!(transcript.messages(), vec!["hi".to_string()]);
        assert_eq!(transcript.errors(), vec!["Channel closed".to_string()]);
    }

    #[test]
    fn test_history_drops_oldest_first() {
        let transcript = Transcript::new();
        for i in 0..20 {
            transcript.append(&format!("{i}{}", "x".repeat(1024 * 1024)));
        }

        let kept: Vec<usize> = transcript
            .messages()
            .iter()
            .map(|m| m.trim_end_matches('x').parse().unwrap())
            .collect();
        assert!(!kept.is_empty());
        assert!(kept.len() < 20);
        assert_eq!(kept.last(), Some(&19));
        assert_eq!(kept, (20 - kept.len()..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_history_then_live() {
        let transcript = Transcript::new();
        transcript.append("old");

        let mut stream = transcript.history_plus_stream();
        transcript.append("new");

        assert_eq!(stream.next().await, Some(RenderEvent::Append("old".into())));
        assert_eq!(stream.next().await, Some(RenderEvent::Append("new".into())));
    }

    #[tokio::test]
    async fn test_live_receiver() {
        let transcript = Transcript::new();
        let mut rx = transcript.subscribe();
        transcript.clear_input();
        let event = tokio_test::assert_ok!(rx.recv().await);
        assert_eq!(event, RenderEvent::ClearInput);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&RenderEvent::Append("hi".into())).unwrap();
        assert_eq!(json, r#"{"type":"append","data":"hi"}"#);
    }
}
