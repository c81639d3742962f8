//! Status stream bridge
//!
//! Turns the engine's push-style status callback into a stream the tracking
//! task pulls from one event at a time. Events are buffered in an unbounded
//! FIFO, so a slow consumer never makes the engine block or drop events.
//!
//! Closing is idempotent and can be done from any [`StreamCloser`]. After
//! close, `receive` returns [`StreamMessage::Closed`] and everything the
//! engine emits (or had already buffered) is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::audio::{AudioEngine, StatusCallback, StatusEvent};
use crate::error::Result;

/// Result of [`StatusStream::receive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Status(StatusEvent),
    Closed,
}

/// State shared between the stream, its closers and the engine callback
struct Shared {
    /// Dropped on close, which wakes a pending `recv`
    tx: Mutex<Option<mpsc::UnboundedSender<StatusEvent>>>,
    closed: AtomicBool,
}

impl Shared {
    fn push(&self, status: StatusEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(status);
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        debug!("Status stream closed");
    }
}

/// Cloneable handle that closes a [`StatusStream`]
#[derive(Clone)]
pub struct StreamCloser {
    shared: Arc<Shared>,
}

impl StreamCloser {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

/// Pull side of the bridge
pub struct StatusStream {
    rx: mpsc::UnboundedReceiver<StatusEvent>,
    shared: Arc<Shared>,
}

impl StatusStream {
    /// Create a stream together with the callback that feeds it
    ///
    /// The callback can be handed to any producer; [`open`](Self::open)
    /// wires it to an engine.
    pub fn new() -> (Self, StatusCallback) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            tx: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
        });

        let feed = Arc::clone(&shared);
        let callback: StatusCallback = Arc::new(move |status| feed.push(status));

        (Self { rx, shared }, callback)
    }

    /// Subscribe to `engine` and return the stream of its status events
    pub fn open(engine: &dyn AudioEngine) -> Result<Self> {
        let (stream, callback) = Self::new();
        engine.subscribe(callback)?;
        Ok(stream)
    }

    /// Wait for the next event, in emission order
    ///
    /// Returns [`StreamMessage::Closed`] once the stream is closed, including
    /// when the close happens while waiting.
    pub async fn receive(&mut self) -> StreamMessage {
        if self.is_closed() {
            return StreamMessage::Closed;
        }

        match self.rx.recv().await {
            Some(status) if !self.is_closed() => StreamMessage::Status(status),
            _ => StreamMessage::Closed,
        }
    }

    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn position(ms: u64) -> StatusEvent {
        StatusEvent::loaded(true, ms, 10_000)
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (mut stream, callback) = StatusStream::new();

        for ms in [100, 200, 300] {
            callback(position(ms));
        }

        for ms in [100, 200, 300] {
            assert_eq!(stream.receive().await, StreamMessage::Status(position(ms)));
        }
    }

    #[tokio::test]
    async fn test_buffer_grows_without_consumer() {
        let (mut stream, callback) = StatusStream::new();

        for ms in 0..1000 {
            callback(position(ms));
        }

        for ms in 0..1000 {
            assert_eq!(stream.receive().await, StreamMessage::Status(position(ms)));
        }
    }

    #[tokio::test]
    async fn test_close_wakes_pending_receive() {
        let (mut stream, _callback) = StatusStream::new();
        let closer = stream.closer();

        let waiter = tokio::spawn(async move { stream.receive().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();

        let message = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receive should not block after close")
            .unwrap();
        assert_eq!(message, StreamMessage::Closed);
    }

    #[tokio::test]
    async fn test_close_discards_buffered_and_later_events() {
        let (mut stream, callback) = StatusStream::new();
        callback(position(1));
        stream.close();
        callback(position(2));

        assert_eq!(stream.receive().await, StreamMessage::Closed);
        assert_eq!(stream.receive().await, StreamMessage::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (stream, _callback) = StatusStream::new();
        let closer = stream.closer();

        closer.close();
        closer.close();
        stream.close();

        assert!(stream.is_closed());
        assert!(closer.is_closed());
    }
}
