//! MQTT bus client: a reader thread feeding a bounded event queue.
//!
//! The reader thread owns the network connection and is the only place
//! that touches the socket. Inbound publishes are decoded to JSON there
//! and forwarded over a bounded channel; the owning service drains the
//! queue from its main loop. `publish` is safe from any thread.

use crossbeam_channel::{Receiver, Sender};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Inbound queue depth. The fusion loop drains every iteration, so a full
/// queue means the consumer stalled; newest events are dropped with a warning.
const QUEUE_DEPTH: usize = 256;

/// Connection parameters for a bus session.
#[derive(Debug, Clone)]
pub struct BusOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub keepalive: Duration,
}

impl BusOptions {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            client_id: client_id.into(),
            host: host.into(),
            port,
            keepalive: Duration::from_secs(30),
        }
    }
}

/// One inbound bus message.
///
/// `json` is `None` when the payload failed UTF-8/JSON decoding; the topic
/// still arrives so exact-topic triggers fire regardless of payload shape.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub topic: String,
    pub json: Option<serde_json::Value>,
}

/// Handle to an active bus session.
pub struct BusClient {
    client: Client,
    receiver: Receiver<BusEvent>,
    connected: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl BusClient {
    /// Connect and spawn the reader thread.
    pub fn connect(options: &BusOptions) -> crate::Result<BusClient> {
        let mut mqtt =
            MqttOptions::new(options.client_id.clone(), options.host.clone(), options.port);
        mqtt.set_keep_alive(options.keepalive);
        mqtt.set_clean_session(true);

        let (client, connection) = Client::new(mqtt, 64);
        let (sender, receiver) = crossbeam_channel::bounded(QUEUE_DEPTH);
        let connected = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        let thread = std::thread::Builder::new()
            .name("homesight-bus".into())
            .spawn({
                let client = client.clone();
                let connected = connected.clone();
                let stop_flag = stop_flag.clone();
                let subscriptions = subscriptions.clone();
                move || reader_loop(connection, client, sender, connected, stop_flag, subscriptions)
            })
            .map_err(|e| {
                crate::HomesightError::Config(format!("failed to spawn bus thread: {}", e))
            })?;

        Ok(BusClient {
            client,
            receiver,
            connected,
            stop_flag,
            subscriptions,
            thread: Some(thread),
        })
    }

    /// Subscribe at QoS 1. The topic is recorded so every reconnect
    /// re-subscribes before new messages can be missed.
    pub fn subscribe(&self, topic: &str) -> crate::Result<()> {
        if let Ok(mut topics) = self.subscriptions.lock() {
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }
        self.client.subscribe(topic, QoS::AtLeastOnce)?;
        Ok(())
    }

    /// Publish a payload as compact JSON, QoS 1, retain false.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> crate::Result<()> {
        let bytes = crate::protocol::encode(payload)?;
        self.client.publish(topic, QoS::AtLeastOnce, false, bytes)?;
        Ok(())
    }

    /// Receive the next inbound event, waiting at most `timeout`.
    /// A zero timeout never blocks.
    pub fn poll_event(&self, timeout: Duration) -> Option<BusEvent> {
        if timeout.is_zero() {
            self.receiver.try_recv().ok()
        } else {
            self.receiver.recv_timeout(timeout).ok()
        }
    }

    /// Whether the last observed connection state was "up". Transient
    /// disconnects flip this false until the next CONNACK.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Disconnect and wait for the reader thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = self.client.disconnect();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The reader loop runs in a dedicated thread and drives the rumqttc
/// connection. rumqttc re-establishes the session after errors; we pace the
/// retries and surface connection state for health checks.
fn reader_loop(
    mut connection: Connection,
    client: Client,
    sender: Sender<BusEvent>,
    connected: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<String>>>,
) {
    for notification in connection.iter() {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                log::info!("MQTT connected with code {:?}", ack.code);
                connected.store(true, Ordering::Relaxed);
                // Clean-session reconnects drop broker-side state; re-issue
                // every recorded subscription.
                let topics = match subscriptions.lock() {
                    Ok(guard) => guard.clone(),
                    Err(_) => Vec::new(),
                };
                for topic in topics {
                    if let Err(e) = client.subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        log::warn!("re-subscribe to {} failed: {}", topic, e);
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let json = decode_json(&publish.topic, &publish.payload);
                let event = BusEvent {
                    topic: publish.topic,
                    json,
                };
                match sender.try_send(event) {
                    Ok(()) => {}
                    Err(crossbeam_channel::TrySendError::Full(ev)) => {
                        log::warn!("bus queue full, dropping event on {}", ev.topic);
                    }
                    Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                        log::info!("bus queue disconnected, stopping reader");
                        break;
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                log::warn!("MQTT broker requested disconnect");
                connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Relaxed);
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                log::warn!("MQTT connection error: {}", e);
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    log::info!("bus reader stopped");
}

/// Decode a payload as UTF-8 JSON. Malformed payloads are logged here, on
/// the reader thread, and reach consumers as `json: None`.
fn decode_json(topic: &str, payload: &[u8]) -> Option<serde_json::Value> {
    match serde_json::from_slice(payload) {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring malformed payload on {}", topic);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json() {
        let value = decode_json("t", br#"{"state":"ON"}"#).unwrap();
        assert_eq!(value["state"], "ON");

        assert!(decode_json("t", b"not json").is_none());
        assert!(decode_json("t", &[0xff, 0xfe]).is_none());
    }

    #[test]
    fn test_bus_options_defaults() {
        let options = BusOptions::new("vision_fusion", "127.0.0.1", 1883);
        assert_eq!(options.keepalive, Duration::from_secs(30));
        assert_eq!(options.port, 1883);
    }
}
