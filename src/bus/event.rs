//! # Domain events carried by the bus.
//!
//! An [`Event`] pairs an opaque, dot-separated type string (e.g.
//! `"sale.created"`) with an opaque JSON payload. The type string is used for
//! exact-match subscriber lookup only; the hierarchical appearance carries no
//! wildcard semantics. Producers and consumers agree on payload shape out of
//! band, by convention (typically a small record per domain event).
//!
//! ## Ordering
//! Each event gets a globally unique sequence number (`seq`) that increases
//! monotonically with publish order, alongside a wall-clock timestamp for
//! logs. Because a single dispatcher drains a single queue, delivery follows
//! `seq` order.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use storecore::Event;
//!
//! let ev = Event::new("sale.created", json!({ "id": 1, "total": 42.5 }));
//!
//! assert_eq!(&*ev.event_type, "sale.created");
//! assert_eq!(ev.payload["id"], 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A published domain event.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - `event_type`: opaque exact-match routing key
/// - `payload`: opaque JSON record, delivered to subscribers as-is
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp taken at publish time.
    pub at: SystemTime,
    /// Routing key, matched literally against subscription types.
    pub event_type: Arc<str>,
    /// Event payload; the bus never inspects it.
    pub payload: Value,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(event_type: impl Into<Arc<str>>, payload: Value) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            event_type: event_type.into(),
            payload,
        }
    }
}
