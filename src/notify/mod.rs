//! Best-effort publish/subscribe fanout.
//!
//! Events are delivered at most once to whoever is subscribed at publish
//! time. Nothing is persisted or replayed; a subscriber that falls more than
//! the channel capacity behind loses the oldest events.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Order(Uuid),
    User(Uuid),
    Couriers,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Order(id) => write!(f, "order:{id}"),
            Channel::User(id) => write!(f, "user:{id}"),
            Channel::Couriers => f.write_str("couriers"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OrderCreated,
    OrderAccepted,
    StatusUpdate,
    OrderExpired,
    DriverLocation,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::OrderCreated => "order_created",
            EventType::OrderAccepted => "order_accepted",
            EventType::StatusUpdate => "status_update",
            EventType::OrderExpired => "order_expired",
            EventType::DriverLocation => "driver_location",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event_type: EventType, payload: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            payload,
            timestamp,
        }
    }
}

pub trait Fanout: Send + Sync {
    /// Returns how many subscribers the event was handed to.
    fn publish(&self, channel: &Channel, envelope: Envelope) -> usize;

    fn subscribe(&self, channel: &Channel) -> broadcast::Receiver<Envelope>;
}

/// One tokio broadcast channel per logical channel, created on first subscribe.
pub struct BroadcastFanout {
    channels: DashMap<Channel, broadcast::Sender<Envelope>>,
    capacity: usize,
    metrics: Option<Metrics>,
}

impl BroadcastFanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            metrics: None,
        }
    }

    pub fn with_metrics(capacity: usize, metrics: Metrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(capacity)
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Fanout for BroadcastFanout {
    fn publish(&self, channel: &Channel, envelope: Envelope) -> usize {
        if let Some(metrics) = &self.metrics {
            metrics
                .fanout_events_total
                .with_label_values(&[envelope.event_type.as_str()])
                .inc();
        }

        let delivered = match self.channels.get(channel) {
            Some(sender) => sender.send(envelope).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            // Everyone left; drop the channel so idle names don't accumulate.
            self.channels
                .remove_if(channel, |_, sender| sender.receiver_count() == 0);
        }

        delivered
    }

    fn subscribe(&self, channel: &Channel) -> broadcast::Receiver<Envelope> {
        self.channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;
    use uuid::Uuid;

    use super::{BroadcastFanout, Channel, Envelope, EventType, Fanout};

    fn event(n: u64) -> Envelope {
        Envelope::new(EventType::StatusUpdate, json!({ "n": n }), Utc::now())
    }

    #[test]
    fn channel_names() {
        let id = Uuid::from_u128(1);
        assert_eq!(Channel::Order(id).to_string(), format!("order:{id}"));
        assert_eq!(Channel::User(id).to_string(), format!("user:{id}"));
        assert_eq!(Channel::Couriers.to_string(), "couriers");
    }

    #[test]
    fn subscribers_receive_in_publish_order() {
        let fanout = BroadcastFanout::new(16);
        let channel = Channel::Order(Uuid::new_v4());
        let mut rx = fanout.subscribe(&channel);

        assert_eq!(fanout.publish(&channel, event(1)), 1);
        fanout.publish(&channel, event(2));

        assert_eq!(rx.try_recv().unwrap().payload["n"], 1);
        assert_eq!(rx.try_recv().unwrap().payload["n"], 2);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let fanout = BroadcastFanout::new(16);
        let channel = Channel::Couriers;

        assert_eq!(fanout.publish(&channel, event(1)), 0);
        let mut rx = fanout.subscribe(&channel);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn channels_are_isolated() {
        let fanout = BroadcastFanout::new(16);
        let a = Channel::User(Uuid::from_u128(1));
        let b = Channel::User(Uuid::from_u128(2));
        let mut rx_a = fanout.subscribe(&a);

        fanout.publish(&b, event(1));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn abandoned_channels_are_dropped() {
        let fanout = BroadcastFanout::new(16);
        let channel = Channel::Order(Uuid::new_v4());
        drop(fanout.subscribe(&channel));
        assert_eq!(fanout.channel_count(), 1);

        fanout.publish(&channel, event(1));
        assert_eq!(fanout.channel_count(), 0);
    }

    #[test]
    fn envelope_serializes_type_field() {
        let json = serde_json::to_value(event(3)).unwrap();
        assert_eq!(json["type"], "status_update");
        assert_eq!(json["payload"]["n"], 3);
        assert!(json["timestamp"].is_string());
    }
}
