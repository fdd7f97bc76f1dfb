//! Publish/subscribe plumbing between the sensor fleet and the backend.
//!
//! [`MessageBus`] is the handle publishers hold. It dispatches to one of
//! two transports:
//!
//! - [`NatsBus`] -- a NATS connection, used by the binaries
//! - [`ChannelBus`] -- an in-process channel, used by tests and local runs
//!
//! Consumers never see a transport-specific message type: everything
//! arriving from a subscription is forwarded as a [`BusMessage`] onto an
//! mpsc channel, and the ingestion loop reads from that channel. Tests
//! push synthetic messages straight onto the same channel.
//!
//! Enum dispatch is used instead of a trait object because async methods
//! are not dyn-compatible.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::StreamExt as _;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors raised by bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The broker could not be reached.
    #[error("bus connect error: {0}")]
    Connect(String),

    /// A message could not be published.
    #[error("failed to publish to {subject}: {message}")]
    Publish {
        /// Destination subject.
        subject: String,
        /// Transport error description.
        message: String,
    },

    /// A subscription could not be created.
    #[error("failed to subscribe to {subject}: {message}")]
    Subscribe {
        /// Requested subject pattern.
        subject: String,
        /// Transport error description.
        message: String,
    },

    /// A payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The bus was disconnected before the operation.
    #[error("bus is disconnected")]
    Closed,
}

/// A message received from (or destined for) the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Subject the message was published on.
    pub topic: String,
    /// Raw payload bytes, JSON by convention.
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Build a message from a subject and raw bytes.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Build a message by serializing `value` to JSON.
    pub fn json<T: Serialize>(topic: impl Into<String>, value: &T) -> Result<Self, BusError> {
        Ok(Self {
            topic: topic.into(),
            payload: serde_json::to_vec(value)?,
        })
    }
}

/// Receiving end of a subscription.
pub type BusReceiver = mpsc::UnboundedReceiver<BusMessage>;

// ---------------------------------------------------------------------------
// Unified bus handle
// ---------------------------------------------------------------------------

/// A publish handle over one of the supported transports.
#[derive(Debug, Clone)]
pub enum MessageBus {
    /// NATS connection.
    Nats(NatsBus),
    /// In-process channel.
    Channel(ChannelBus),
}

impl MessageBus {
    /// Publish raw bytes on `subject`.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        match self {
            Self::Nats(bus) => bus.publish(subject, payload).await,
            Self::Channel(bus) => bus.publish(subject, payload),
        }
    }

    /// Serialize `value` to JSON and publish it on `subject`.
    pub async fn publish_json<T: Serialize + Sync>(
        &self,
        subject: &str,
        value: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(value)?;
        self.publish(subject, payload).await
    }

    /// Flush pending messages and stop accepting new ones.
    pub async fn disconnect(&self) -> Result<(), BusError> {
        match self {
            Self::Nats(bus) => bus.disconnect().await,
            Self::Channel(bus) => {
                bus.disconnect();
                Ok(())
            }
        }
    }

    /// Stop accepting messages without waiting for a flush.
    ///
    /// For NATS the flush runs on a spawned task when a runtime is
    /// available.
    pub fn disconnect_detached(&self) {
        match self {
            Self::Nats(bus) => bus.disconnect_detached(),
            Self::Channel(bus) => bus.disconnect(),
        }
    }

    /// Whether the transport is currently usable.
    pub fn is_connected(&self) -> bool {
        match self {
            Self::Nats(bus) => bus.is_connected(),
            Self::Channel(bus) => bus.is_connected(),
        }
    }

    /// Human-readable transport name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Nats(_) => "nats",
            Self::Channel(_) => "channel",
        }
    }
}

// ---------------------------------------------------------------------------
// Scoped ownership
// ---------------------------------------------------------------------------

/// A [`MessageBus`] that is disconnected when it goes out of scope.
///
/// The owner calls [`disconnect`](Self::disconnect) on its normal exit
/// path to flush and see the result. If the owner is dropped first (a
/// cancelled future or an aborted task), `Drop` disconnects through
/// [`MessageBus::disconnect_detached`]. Either way the bus is
/// disconnected exactly once.
#[derive(Debug)]
pub struct ScopedBus {
    bus: MessageBus,
    released: bool,
}

impl ScopedBus {
    /// Take ownership of `bus`.
    pub const fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            released: false,
        }
    }

    /// The wrapped bus.
    pub const fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Disconnect now. Later calls, and the drop, do nothing.
    pub async fn disconnect(&mut self) -> Result<(), BusError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.bus.disconnect().await
    }
}

impl Drop for ScopedBus {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            debug!(transport = self.bus.name(), "disconnecting bus on drop");
            self.bus.disconnect_detached();
        }
    }
}

// ---------------------------------------------------------------------------
// NATS transport
// ---------------------------------------------------------------------------

/// NATS client wrapper.
///
/// Clones share the underlying connection.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
    closed: Arc<AtomicBool>,
}

impl NatsBus {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Connect`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connect(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Publish raw bytes on `subject`.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        self.client
            .publish(subject.to_owned(), payload.into())
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_owned(),
                message: e.to_string(),
            })
    }

    /// Subscribe to `subject` and forward every message onto a channel.
    ///
    /// A background task pumps the subscription into the returned
    /// receiver, so message delivery on the client side is decoupled from
    /// however long the consumer takes per message. The task ends when the
    /// subscription closes or the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<BusReceiver, BusError> {
        let mut subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_owned(),
                message: e.to_string(),
            })?;
        info!(subject = subject, "subscribed");

        let (tx, rx) = mpsc::unbounded_channel();
        let subject = subject.to_owned();
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let forwarded = BusMessage {
                    topic: msg.subject.to_string(),
                    payload: msg.payload.to_vec(),
                };
                if tx.send(forwarded).is_err() {
                    debug!(subject = subject, "consumer dropped, stopping forwarder");
                    break;
                }
            }
            debug!(subject = subject, "subscription forwarder finished");
        });

        Ok(rx)
    }

    /// Flush pending messages and mark the bus closed.
    ///
    /// The connection itself is released when the last clone is dropped.
    pub async fn disconnect(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let flushed = self.client.flush().await;
        info!("NATS connection closed");
        flushed.map_err(|e| BusError::Publish {
            subject: String::from("<flush>"),
            message: e.to_string(),
        })
    }

    /// Mark the bus closed and flush on a background task.
    pub fn disconnect_detached(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    if let Err(e) = client.flush().await {
                        warn!(error = %e, "NATS flush after drop failed");
                    }
                });
            }
            Err(_) => warn!("no runtime to flush NATS connection on drop"),
        }
        info!("NATS connection closed");
    }

    /// Whether the client currently holds a live server connection.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && matches!(
                self.client.connection_state(),
                async_nats::connection::State::Connected
            )
    }
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

/// In-process bus backed by an unbounded mpsc channel.
///
/// Every published message lands on the single receiver returned by
/// [`ChannelBus::new`], regardless of subject. Publishing never blocks.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<BusMessage>,
    closed: Arc<AtomicBool>,
    disconnects: Arc<AtomicUsize>,
}

impl ChannelBus {
    /// Create a bus and the receiver that observes everything published on it.
    pub fn new() -> (Self, BusReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
            disconnects: Arc::new(AtomicUsize::new(0)),
        };
        (bus, rx)
    }

    /// Publish raw bytes on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Closed`] after [`disconnect`](Self::disconnect),
    /// or [`BusError::Publish`] if the receiver has been dropped.
    pub fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        self.tx
            .send(BusMessage::new(subject, payload))
            .map_err(|e| BusError::Publish {
                subject: subject.to_owned(),
                message: e.to_string(),
            })
    }

    /// Stop accepting messages.
    pub fn disconnect(&self) {
        self.closed.store(true, Ordering::Release);
        let count = self.disconnects.fetch_add(1, Ordering::AcqRel);
        if count > 0 {
            warn!(count = count.saturating_add(1), "channel bus disconnected more than once");
        }
    }

    /// How many times [`disconnect`](Self::disconnect) has been called.
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::Acquire)
    }

    /// Whether the bus still accepts messages.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_bus_delivers_in_order() {
        let (bus, mut rx) = ChannelBus::new();
        let bus = MessageBus::Channel(bus);

        bus.publish("parking.Zone_A.place_1", b"one".to_vec()).await.unwrap();
        bus.publish("parking.summary", b"two".to_vec()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.topic, "parking.Zone_A.place_1");
        assert_eq!(first.payload, b"one");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.topic, "parking.summary");
    }

    #[tokio::test]
    async fn publish_json_serializes_payload() {
        let (bus, mut rx) = ChannelBus::new();
        let bus = MessageBus::Channel(bus);

        bus.publish_json("parking.summary", &serde_json::json!({"occupied": 3}))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(value["occupied"], 3);
    }

    #[tokio::test]
    async fn disconnected_channel_rejects_publish() {
        let (channel, _rx) = ChannelBus::new();
        let bus = MessageBus::Channel(channel.clone());
        assert!(bus.is_connected());

        bus.disconnect().await.unwrap();
        assert!(!bus.is_connected());
        assert_eq!(channel.disconnect_count(), 1);

        let result = bus.publish("parking.summary", Vec::new()).await;
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn dropped_receiver_is_a_publish_error() {
        let (channel, rx) = ChannelBus::new();
        drop(rx);
        let result = channel.publish("parking.summary", Vec::new());
        assert!(matches!(result, Err(BusError::Publish { .. })));
    }

    #[test]
    fn bus_message_json_helper() {
        let msg = BusMessage::json("parking.summary", &serde_json::json!({"free": 1})).unwrap();
        assert_eq!(msg.topic, "parking.summary");
        assert!(!msg.payload.is_empty());
    }

    #[tokio::test]
    async fn scoped_bus_disconnects_once_on_explicit_close() {
        let (channel, _rx) = ChannelBus::new();
        let mut scoped = ScopedBus::new(MessageBus::Channel(channel.clone()));
        assert!(scoped.bus().is_connected());

        scoped.disconnect().await.unwrap();
        scoped.disconnect().await.unwrap();
        drop(scoped);

        assert_eq!(channel.disconnect_count(), 1);
    }

    #[test]
    fn scoped_bus_disconnects_on_drop() {
        let (channel, _rx) = ChannelBus::new();
        let scoped = ScopedBus::new(MessageBus::Channel(channel.clone()));
        drop(scoped);

        assert_eq!(channel.disconnect_count(), 1);
        assert!(!channel.is_connected());
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore = "requires live NATS server (docker compose up -d)"]
    async fn nats_round_trip() {
        let bus = NatsBus::connect("nats://localhost:4222").await.unwrap();
        let mut rx = bus.subscribe(parking_types::WILDCARD_TOPIC).await.unwrap();
        bus.publish("parking.Zone_A.place_1", b"{}".to_vec()).await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, "parking.Zone_A.place_1");
        bus.disconnect().await.unwrap();
        assert!(!bus.is_connected());
    }
}
