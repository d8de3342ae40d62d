//! `CallChannel` over a newline-delimited JSON byte stream.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use pssst_core::{CallChannel, ChannelError, Method};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{Mutex as AsyncMutex, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::protocol::{CallRequest, CallResponse};

type Reply = oneshot::Sender<Result<Value, ChannelError>>;

#[derive(Default)]
struct Pending {
    calls: HashMap<Uuid, Reply>,
    closed: bool,
}

/// Channel speaking the wire protocol over a byte stream.
///
/// Responses are matched to calls by id, so overlapping calls resolve
/// independently and in whatever order the proxy answers them. When the
/// stream ends every outstanding call fails with `ChannelError::Closed`.
pub struct StreamChannel {
    writer: AsyncMutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Arc<Mutex<Pending>>,
    reader: JoinHandle<()>,
}

impl StreamChannel {
    /// Create a channel over a reader/writer pair.
    ///
    /// This starts a background task reading responses. Must be called
    /// within a Tokio runtime.
    #[must_use]
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = Arc::new(Mutex::new(Pending::default()));
        let reader = tokio::spawn(read_loop(BufReader::new(reader), Arc::clone(&pending)));

        Self {
            writer: AsyncMutex::new(Box::new(writer)),
            pending,
            reader,
        }
    }

    /// Connect to a proxy listening on `addr`.
    ///
    /// # Errors
    /// Returns `ChannelError::Transport` if the connection fails.
    #[cfg(feature = "tcp")]
    pub async fn connect<A>(addr: A) -> Result<Self, ChannelError>
    where
        A: tokio::net::ToSocketAddrs,
    {
        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(reader, writer))
    }

    async fn send(&self, request: &CallRequest) -> Result<(), ChannelError> {
        let mut line =
            serde_json::to_string(request).map_err(|e| ChannelError::Transport(e.to_string()))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Removes a call's pending entry when its `invoke` future completes or is
/// dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<Pending>,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .remove(&self.id);
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl CallChannel for StreamChannel {
    async fn invoke(&self, method: Method, params: Option<Value>) -> Result<Value, ChannelError> {
        let request = CallRequest::new(method, params);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.closed {
                return Err(ChannelError::Closed);
            }
            pending.calls.insert(request.id, tx);
        }
        let _guard = PendingGuard {
            pending: self.pending.as_ref(),
            id: request.id,
        };

        tracing::trace!(id = %request.id, %method, "Sending call");
        self.send(&request).await?;

        rx.await.unwrap_or(Err(ChannelError::Closed))
    }
}

async fn read_loop<R>(reader: BufReader<R>, pending: Arc<Mutex<Pending>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<CallResponse>(line) {
                    Ok(response) => resolve(&pending, response),
                    Err(e) => tracing::warn!("Invalid proxy response: {e}"),
                }
            }
            Ok(None) => {
                tracing::debug!("Proxy stream ended");
                break;
            }
            Err(e) => {
                tracing::error!("Error reading proxy stream: {e}");
                break;
            }
        }
    }

    let calls = {
        let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.closed = true;
        std::mem::take(&mut pending.calls)
    };
    for (_, reply) in calls {
        let _ = reply.send(Err(ChannelError::Closed));
    }
}

fn resolve(pending: &Mutex<Pending>, response: CallResponse) {
    let reply = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .calls
        .remove(&response.id);

    match reply {
        Some(reply) => {
            let _ = reply.send(response.into_result());
        }
        None => tracing::warn!(id = %response.id, "Response for unknown call, dropping"),
    }
}
