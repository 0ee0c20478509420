//! Client websocket session with a non-blocking receive side.
//!
//! Connecting spawns two tasks on the [`NetworkRuntime`]: a reader that
//! pushes every inbound text frame into an unbounded channel, and a writer
//! that drains an outbound channel into the socket. The cycle-driven core
//! only ever touches the channel ends, so receiving is a `try_recv`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use crate::{NetError, NetworkRuntime};

/// The socket halves after a successful handshake.
struct Pumps {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

async fn establish(url: &str) -> Result<Pumps, NetError> {
    let (stream, _response) = connect_async(url).await.map_err(|e| NetError::Connect {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let (mut sink, mut source) = stream.split();

    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let reader_url = url.to_string();
    let reader = tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text.to_string()).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %reader_url, error = %e, "websocket read failed");
                    break;
                }
            }
        }
        debug!(url = %reader_url, "websocket reader finished");
    });

    let writer_url = url.to_string();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                warn!(url = %writer_url, error = %e, "websocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    Ok(Pumps {
        inbound,
        outbound,
        reader,
        writer,
    })
}

/// An open client connection.
pub struct WebSocketSession {
    url: String,
    runtime: NetworkRuntime,
    pumps: Pumps,
}

impl WebSocketSession {
    /// Perform the opening handshake with `url`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`NetError::Connect`] when the server refuses or the URL is invalid,
    /// [`NetError::Timeout`] when the handshake does not finish in time.
    pub fn connect(
        runtime: &NetworkRuntime,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, NetError> {
        let pumps = runtime.block_on_bounded("websocket handshake", timeout, establish(url))??;
        debug!(url, "websocket connected");
        Ok(Self {
            url: url.to_string(),
            runtime: runtime.clone(),
            pumps,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Take one complete text frame if the reader has queued one. Never
    /// waits.
    pub fn try_recv_text(&mut self) -> Option<String> {
        self.pumps.inbound.try_recv().ok()
    }

    /// Send a normal-closure frame and wait up to `timeout` for it to be
    /// flushed. The reader is stopped either way.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] when the writer did not finish in time.
    pub fn close(mut self, timeout: Duration) -> Result<(), NetError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "closing".into(),
        };
        // The writer may already be gone if the peer hung up first.
        let _ = self.pumps.outbound.send(Message::Close(Some(frame)));

        let flushed =
            self.runtime
                .block_on_bounded("websocket close", timeout, &mut self.pumps.writer);
        debug!(url = %self.url, "websocket closed");
        flushed.map(|_| ())
    }
}

impl std::fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.pumps.reader.abort();
        self.pumps.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_async;

    /// Server that sends `greeting` after accepting, then reports the close
    /// code it receives.
    async fn serve_once(
        listener: TcpListener,
        greeting: Option<&'static str>,
        closed: oneshot::Sender<Option<CloseCode>>,
    ) {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        if let Some(text) = greeting {
            ws.send(Message::Text(text.into())).await.unwrap();
        }
        while let Some(frame) = ws.next().await {
            if let Ok(Message::Close(frame)) = frame {
                let _ = closed.send(frame.map(|f| f.code));
                return;
            }
        }
        let _ = closed.send(None);
    }

    #[tokio::test]
    async fn reader_queues_text_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, _closed_rx) = oneshot::channel();
        tokio::spawn(serve_once(listener, Some("hello"), closed_tx));

        let mut pumps = establish(&format!("ws://{addr}")).await.unwrap();
        assert_eq!(pumps.inbound.recv().await.as_deref(), Some("hello"));
        pumps.reader.abort();
        pumps.writer.abort();
    }

    #[tokio::test]
    async fn establish_reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = establish(&format!("ws://{addr}")).await.err().unwrap();
        assert!(matches!(err, NetError::Connect { .. }));
    }

    #[test]
    fn try_recv_never_waits_and_close_is_normal() {
        let net = NetworkRuntime::new(1).unwrap();
        let (listener, addr) = net
            .block_on_bounded("bind", Duration::from_secs(1), async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                (listener, addr)
            })
            .unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();
        net.handle().spawn(serve_once(listener, None, closed_tx));

        let mut session =
            WebSocketSession::connect(&net, &format!("ws://{addr}"), Duration::from_secs(2)).unwrap();

        let started = std::time::Instant::now();
        assert_eq!(session.try_recv_text(), None);
        assert!(started.elapsed() < Duration::from_millis(50));

        session.close(Duration::from_secs(2)).unwrap();
        let code = net
            .block_on_bounded("close ack", Duration::from_secs(2), closed_rx)
            .unwrap()
            .unwrap();
        assert_eq!(code, Some(CloseCode::Normal));
    }

    #[test]
    fn invalid_url_fails_to_connect() {
        let net = NetworkRuntime::new(1).unwrap();
        let err = WebSocketSession::connect(&net, "not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, NetError::Connect { .. }));
    }
}
