//! Event bus: data model, subscriber contract, and dispatch runtime.
//!
//! This module groups the event **data model**, the **subscriber** extension
//! point, the per-type **registry**, and the **bus** that ties them to a
//! single background dispatcher.
//!
//! ## Contents
//! - [`Event`] the published envelope (type, payload, timestamp, sequence)
//! - [`Subscriber`], [`SubscriberFn`], [`SubscriberRef`] handler contract and
//!   closure adapter
//! - [`SubscriptionId`] removal token
//! - [`EventBus`] publish/subscribe surface and worker lifecycle
//!
//! ## Quick reference
//! - **Publishers**: application managers, after mutating persisted state.
//! - **Consumers**: UI refresh hooks, loggers, secondary managers; anything
//!   registered through [`EventBus::subscribe`].
//!
//! See `bus.rs` for the dispatch wiring diagram.

#[allow(clippy::module_inception)]
mod bus;
mod event;
mod registry;
mod subscriber;

pub use bus::EventBus;
pub use event::Event;
pub use registry::SubscriptionId;
pub use subscriber::{Subscriber, SubscriberFn, SubscriberRef};
