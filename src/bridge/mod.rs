//! MQTT broker bridge.
//!
//! Owns the broker connection. [`BrokerBridge::start`] spawns a single receiver
//! task that drives the rumqttc event loop: it subscribes to
//! [`STATUS_FILTER`](crate::topics::STATUS_FILTER) on every connection
//! acknowledgement and folds each inbound status message into the
//! [`StatusCache`]. It is the only writer of the cache.
//!
//! The bridge is ready once it is connected and the broker has granted the
//! status subscription; [`BrokerBridge::wait_ready`] gates on both.
//!
//! Commands go out through [`BrokerBridge::publish_command`], which only
//! enqueues onto the client's request channel and never waits for the network.
//!
//! ## Connection state
//!
//! ```text
//! Disconnected --start()--> Connecting --ConnAck--> Connected
//!                           Connecting --error----> Failed   (incl. refused ConnAck)
//!                           Connected  --error----> Disconnected
//! Disconnected | Failed --backoff elapsed--> Connecting
//! ```
//!
//! The event loop reconnects on the next poll after an error; the receiver
//! task sleeps with exponential backoff and jitter in between.

pub mod backoff;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS, SubscribeReasonCode,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::StatusCache;
use crate::config::MqttConfig;
use crate::topics;
use backoff::Backoff;
use stats::{BridgeStats, StatsSnapshot};

/// Payload returned by [`DeviceLink::read_status`] when no status has arrived.
pub const UNKNOWN_STATUS: &str = "unknown";

/// How long [`BrokerBridge::stop`] waits for the DISCONNECT to go out.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of the broker connection. Only the receiver task changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command payloads understood by devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("broker bridge already started")]
    AlreadyStarted,
    #[error("broker not connected after {}s (state: {state})", waited.as_secs())]
    NotReady {
        state: ConnectionState,
        waited: Duration,
    },
}

/// What the RPC dispatcher needs from the device side. Implemented by
/// [`BrokerBridge`]; tests substitute a recording fake.
pub trait DeviceLink: Send + Sync {
    /// Fire-and-forget command publish. Failures are logged, not returned.
    fn publish_command(&self, device_id: &str, command: Command);

    /// Last reported status for `device_id`, or [`UNKNOWN_STATUS`].
    fn read_status(&self, device_id: &str) -> String;
}

/// State shared between the bridge handle and its receiver task.
struct Shared {
    cache: StatusCache,
    state: watch::Sender<ConnectionState>,
    /// `true` while the broker has acknowledged the status subscription on
    /// the current connection.
    subscribed: watch::Sender<bool>,
    stats: BridgeStats,
    stopping: AtomicBool,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("MQTT: state {prev} -> {next}");
        }
    }

    fn set_subscribed(&self, active: bool) {
        self.subscribed.send_replace(active);
    }
}

/// Handle to the broker connection. Construct once, [`start`](Self::start)
/// once, share behind an `Arc`.
pub struct BrokerBridge {
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    task: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
    backoff: Backoff,
    broker: String,
}

impl BrokerBridge {
    /// Build the client and event loop. Nothing touches the network until
    /// [`start`](Self::start).
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
        options.set_clean_session(true);
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (subscribed, _) = watch::channel(false);

        Self {
            client,
            event_loop: Mutex::new(Some(event_loop)),
            task: Mutex::new(None),
            shared: Arc::new(Shared {
                cache: StatusCache::new(),
                state,
                subscribed,
                stats: BridgeStats::default(),
                stopping: AtomicBool::new(false),
            }),
            backoff: Backoff::new(
                Duration::from_millis(config.reconnect_delay_ms),
                Duration::from_millis(config.reconnect_max_delay_ms),
            ),
            broker: format!("{}:{}", config.host, config.port),
        }
    }

    /// Spawn the receiver task. Callable once; later calls return
    /// [`BridgeError::AlreadyStarted`] without touching the connection.
    pub fn start(&self) -> Result<(), BridgeError> {
        let event_loop = self
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(BridgeError::AlreadyStarted)?;

        info!("MQTT: connecting to broker at {}", self.broker);
        self.shared.set_state(ConnectionState::Connecting);

        let handle = tokio::spawn(run_receiver(
            event_loop,
            self.client.clone(),
            self.shared.clone(),
            self.backoff.clone(),
            self.broker.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Resolve once the connection is up and the status subscription has been
    /// granted, or fail after `timeout` with the state the bridge was stuck in.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), BridgeError> {
        let mut rx = self.shared.subscribed.subscribe();
        let ready = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|active| *active)).await,
            Ok(Ok(_))
        );
        if ready && self.state() == ConnectionState::Connected {
            return Ok(());
        }
        Err(BridgeError::NotReady {
            state: self.state(),
            waited: timeout,
        })
    }

    /// Send DISCONNECT and stop the receiver task. Idempotent.
    pub async fn stop(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut handle) = handle else {
            return;
        };

        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT: disconnect not enqueued: {e}");
        }
        if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
            warn!("MQTT: receiver did not stop within {STOP_GRACE:?}, aborting");
            handle.abort();
        }
        self.shared.set_subscribed(false);
        self.shared.set_state(ConnectionState::Disconnected);
        info!("MQTT: bridge stopped");
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Whether the status subscription is active on the current connection.
    pub fn is_subscribed(&self) -> bool {
        *self.shared.subscribed.borrow()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of devices with a cached status.
    pub fn cached_devices(&self) -> usize {
        self.shared.cache.len()
    }
}

impl DeviceLink for BrokerBridge {
    fn publish_command(&self, device_id: &str, command: Command) {
        let topic = topics::command_topic(device_id);
        info!("MQTT: publishing {topic} => {}", command.as_str());
        match self
            .client
            .try_publish(&topic, QoS::AtMostOnce, false, command.as_str())
        {
            Ok(()) => BridgeStats::bump(&self.shared.stats.commands_published),
            Err(e) => {
                BridgeStats::bump(&self.shared.stats.publish_failures);
                warn!("MQTT: failed to enqueue {topic}: {e}");
            }
        }
    }

    fn read_status(&self, device_id: &str) -> String {
        self.shared
            .cache
            .get(&topics::status_topic(device_id))
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string())
    }
}

/// Receiver task: poll the event loop until [`BrokerBridge::stop`].
///
/// A refused ConnAck never shows up as an `Ok` event: rumqttc returns it from
/// `poll()` as `ConnectionError::ConnectionRefused`, handled by the error arm.
async fn run_receiver(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    mut backoff: Backoff,
    broker: String,
) {
    let mut subscribe_pending = false;
    loop {
        // Clean session: the subscription must be renewed per connection. A
        // full request channel leaves it pending until the next iteration.
        if subscribe_pending {
            match client.try_subscribe(topics::STATUS_FILTER, QoS::AtMostOnce) {
                Ok(()) => {
                    subscribe_pending = false;
                    debug!("MQTT: subscribe to {} enqueued", topics::STATUS_FILTER);
                }
                Err(e) => warn!(
                    "MQTT: subscribe to {} not enqueued, will retry: {e}",
                    topics::STATUS_FILTER
                ),
            }
        }

        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                shared.set_subscribed(false);
                shared.set_state(ConnectionState::Connected);
                backoff.reset();
                info!("MQTT: connected to broker {broker}");
                subscribe_pending = true;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                record_status(&shared, &publish);
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let granted = !ack.return_codes.is_empty()
                    && ack
                        .return_codes
                        .iter()
                        .all(|c| matches!(c, SubscribeReasonCode::Success(_)));
                if granted {
                    info!("MQTT: subscribed to {}", topics::STATUS_FILTER);
                    shared.set_subscribed(true);
                } else {
                    error!(
                        "MQTT: broker rejected subscription to {}: {:?}",
                        topics::STATUS_FILTER,
                        ack.return_codes
                    );
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("MQTT: broker sent DISCONNECT");
                shared.set_subscribed(false);
                shared.set_state(ConnectionState::Disconnected);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                if shared.stopping.load(Ordering::SeqCst) {
                    debug!("MQTT: disconnect sent, receiver exiting");
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if shared.stopping.load(Ordering::SeqCst) {
                    break;
                }
                subscribe_pending = false;
                shared.set_subscribed(false);
                let next = if *shared.state.borrow() == ConnectionState::Connected {
                    ConnectionState::Disconnected
                } else {
                    ConnectionState::Failed
                };
                shared.set_state(next);
                let delay = backoff.next_delay();
                warn!(
                    "MQTT: connection error ({next}): {e}, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                BridgeStats::bump(&shared.stats.reconnects);
                shared.set_state(ConnectionState::Connecting);
            }
        }
    }
}

/// Fold one inbound message into the status cache. Invalid UTF-8 is replaced,
/// never rejected.
fn record_status(shared: &Shared, publish: &Publish) {
    if topics::device_from_status_topic(&publish.topic).is_none() {
        debug!("MQTT: ignoring message on {}", publish.topic);
        return;
    }
    let payload = String::from_utf8_lossy(&publish.payload);
    info!("MQTT: message {} => {}", publish.topic, payload);
    BridgeStats::bump(&shared.stats.messages_received);
    shared.cache.insert(publish.topic.clone(), payload.into_owned());
}
