// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Group Events
//
// In-memory fan-out using tokio broadcast channels. Subscribers that fall
// behind lose the oldest events and are told how many they missed.

use crate::domain::events::GroupEvent;
use crate::domain::group::GroupId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to group events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<GroupEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: GroupEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = GroupEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Subscribe to all group events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single group
    pub fn subscribe_group(&self, group_id: GroupId) -> GroupEventReceiver {
        GroupEventReceiver {
            receiver: self.sender.subscribe(),
            group_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all group events
pub struct EventReceiver {
    receiver: broadcast::Receiver<GroupEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<GroupEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<GroupEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one group
pub struct GroupEventReceiver {
    receiver: broadcast::Receiver<GroupEvent>,
    group_id: GroupId,
}

impl GroupEventReceiver {
    pub async fn recv(&mut self) -> Result<GroupEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.group_id() == self.group_id {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::MemberId;
    use chrono::Utc;

    fn left(group: i64) -> GroupEvent {
        GroupEvent::MembershipLeft {
            group_id: GroupId(group),
            member_id: MemberId(5),
            left_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        bus.publish(left(1));
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.group_id(), GroupId(1));
    }

    #[tokio::test]
    async fn test_group_filter() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe_group(GroupId(2));
        bus.publish_all(vec![left(1), left(2)]);
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.group_id(), GroupId(2));
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(left(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_lagged_receiver() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();
        bus.publish_all((0..5).map(left));
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(_))));
    }
}
