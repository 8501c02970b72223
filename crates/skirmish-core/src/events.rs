//! Event and chat logs with fixed capacity.
//!
//! The engine records notable occurrences (detections, kamikaze engagements,
//! removals) as tagged [`SimEvent`] records and operator/agent chatter as
//! [`ChatMessage`]s. Both live in a [`BoundedLog`] that drops the oldest
//! entry once full, so a long-running simulation never grows its logs without
//! bound.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Maximum number of simulation events retained.
pub const EVENT_LOG_CAPACITY: usize = 1000;

/// Maximum number of chat messages retained.
pub const CHAT_LOG_CAPACITY: usize = 500;

// =============================================================================
// Events
// =============================================================================

/// A tagged record of something that happened in the simulation.
///
/// Each variant carries the simulation-time timestamp at which it occurred.
/// Events serialize with a `type` tag (`detection`, `kamikaze`,
/// `entity_destroyed`) so external collaborators can route them without
/// knowing the full enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// A drone gained line-of-sight contact with a tank.
    Detection {
        /// Simulation time at which the detection occurred.
        timestamp: f32,
        /// The detecting drone.
        detector_id: EntityId,
        /// The detected tank.
        target_id: EntityId,
        /// Distance between the two at detection time.
        distance: f32,
    },
    /// A drone flew into a tank, destroying both.
    Kamikaze {
        /// Simulation time at which the engagement occurred.
        timestamp: f32,
        /// The attacking drone.
        drone_id: EntityId,
        /// The destroyed tank.
        tank_id: EntityId,
        /// World position of the impact.
        position: Vec2,
    },
    /// An entity left the world.
    EntityDestroyed {
        /// Simulation time at which the entity was destroyed.
        timestamp: f32,
        /// The entity that was destroyed or removed.
        destroyed_id: EntityId,
        /// Why the entity was destroyed (e.g. `removed`).
        cause: String,
    },
}

impl SimEvent {
    /// Returns the simulation-time timestamp carried by this event.
    #[must_use]
    pub fn timestamp(&self) -> f32 {
        match self {
            Self::Detection { timestamp, .. }
            | Self::Kamikaze { timestamp, .. }
            | Self::EntityDestroyed { timestamp, .. } => *timestamp,
        }
    }
}

// =============================================================================
// Chat
// =============================================================================

/// Origin classification for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Typed by a human operator.
    Human,
    /// Produced by the external command generator.
    Llm,
    /// Emitted by the system itself.
    System,
}

/// A single chat log entry.
///
/// Inbound messages carry a caller-supplied timestamp which the engine
/// replaces with the current simulation time on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender.
    pub sender: String,
    /// Message body.
    pub content: String,
    /// Simulation time at which the message was logged.
    pub timestamp: f32,
    /// Origin of the message.
    #[serde(default = "MessageKind::human")]
    pub message_type: MessageKind,
}

impl MessageKind {
    fn human() -> Self {
        Self::Human
    }
}

// =============================================================================
// Bounded log
// =============================================================================

/// Fixed-capacity FIFO log that drops the oldest entry when full.
///
/// Used for the event log (capacity 1000) and the chat log (capacity 500).
/// Truncation happens eagerly on push rather than by periodic slicing, so the
/// log never exceeds its capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// Creates an empty log holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest if the log is at capacity.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Iterates entries oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Returns up to the `n` newest entries, oldest of those first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes all entries, keeping the capacity.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
