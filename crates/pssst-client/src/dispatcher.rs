//! Call dispatch with a report-and-continue error policy.

use std::sync::Arc;

use pssst_core::{CallChannel, ChannelError, Method, RenderSink};
use serde_json::Value;

/// Single entry point for proxy calls.
///
/// Failures never propagate past the dispatcher: each one is reported to the
/// render sink exactly once and the call is dropped. There is no retry.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn CallChannel>,
    sink: Arc<dyn RenderSink>,
}

impl Dispatcher {
    /// Create a dispatcher over a channel and a render sink.
    #[must_use]
    pub fn new(channel: Arc<dyn CallChannel>, sink: Arc<dyn RenderSink>) -> Self {
        Self { channel, sink }
    }

    /// Render sink results are routed to.
    #[must_use]
    pub fn sink(&self) -> &dyn RenderSink {
        self.sink.as_ref()
    }

    /// Invoke `method` and return its result, or report the failure.
    pub async fn call(&self, method: Method, params: Option<Value>) -> Option<Value> {
        tracing::debug!(%method, "Calling proxy");
        match self.channel.invoke(method, params).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(method, &e);
                None
            }
        }
    }

    /// Invoke `method` and hand a successful result to `on_success`.
    ///
    /// `on_success` may reject the result; that rejection is reported like a
    /// channel failure. Returns whether `on_success` accepted the result.
    pub async fn call_with<F>(&self, method: Method, params: Option<Value>, on_success: F) -> bool
    where
        F: FnOnce(Value) -> Result<(), ChannelError> + Send,
    {
        let Some(value) = self.call(method, params).await else {
            return false;
        };
        match on_success(value) {
            Ok(()) => true,
            Err(e) => {
                self.report(method, &e);
                false
            }
        }
    }

    /// Report a failed call to the user.
    pub fn report(&self, method: Method, err: &ChannelError) {
        tracing::warn!(%method, error = %err, "Proxy call failed");
        self.sink.report_error(err);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pssst_core::{RenderEvent, Transcript};
    use serde_json::json;

    use super::*;

    struct Fixed {
        result: Result<Value, ChannelError>,
        calls: Mutex<Vec<(Method, Option<Value>)>>,
    }

    #[async_trait]
    impl CallChannel for Fixed {
        async fn invoke(&self, method: Method, params: Option<Value>) -> Result<Value, ChannelError> {
            self.calls.lock().unwrap().push((method, params));
            self.result.clone()
        }
    }

    fn setup(result: Result<Value, ChannelError>) -> (Dispatcher, Arc<Fixed>, Arc<Transcript>) {
        let channel = Arc::new(Fixed {
            result,
            calls: Mutex::new(Vec::new()),
        });
        let transcript = Arc::new(Transcript::new());
        let dispatcher = Dispatcher::new(channel.clone(), transcript.clone());
        (dispatcher, channel, transcript)
    }

    #[tokio::test]
    async fn test_success_passes_value() {
        let (dispatcher, channel, transcript) = setup(Ok(json!("alice")));

        let value = dispatcher.call(Method::Name, None).await;

        assert_eq!(value, Some(json!("alice")));
        assert_eq!(channel.calls.lock().unwrap().as_slice(), &[(Method::Name, None)]);
        assert!(transcript.history().is_empty());
    }

    #[tokio::test]
    async fn test_failure_reported_once() {
        let (dispatcher, _, transcript) = setup(Err(ChannelError::Remote("boom".into())));
        let mut called = false;

        let accepted = dispatcher
            .call_with(Method::Pull, None, |_| {
                called = true;
                Ok(())
            })
            .await;

        assert!(!accepted);
        assert!(!called);
        assert_eq!(transcript.history(), vec![RenderEvent::Error("boom".into())]);
    }

    #[tokio::test]
    async fn test_rejected_result_reported() {
        let (dispatcher, _, transcript) = setup(Ok(json!(42)));

        let accepted = dispatcher
            .call_with(Method::Name, None, |_| {
                Err(ChannelError::Decode("expected a string".into()))
            })
            .await;

        assert!(!accepted);
        assert_eq!(
            transcript.errors(),
            vec!["Unexpected result: expected a string".to_string()]
        );
    }

    #[tokio::test]
    async fn test_params_forwarded() {
        let (dispatcher, channel, _) = setup(Ok(Value::Null));

        dispatcher.call(Method::Push, Some(json!(["bob", "hi"]))).await;

        assert_eq!(
            channel.calls.lock().unwrap().as_slice(),
            &[(Method::Push, Some(json!(["bob", "hi"])))]
        );
    }
}
