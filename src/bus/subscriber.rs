//! # Core subscriber trait
//!
//! [`Subscriber`] is the extension point for plugging event handlers into the
//! bus: UI refresh hooks, loggers, secondary managers. Handlers are invoked
//! by the dispatcher worker, one at a time, in registration order for the
//! event's type.
//!
//! ## Contract
//! - A handler receives only the event **payload**, not the full envelope.
//! - A handler that returns `Err` or panics is logged and skipped; remaining
//!   handlers in the same pass still run.
//! - Handlers run on the dispatcher worker; a slow handler delays delivery of
//!   subsequent events but never blocks publishers.
//!
//! ## Example (skeleton)
//! ```rust
//! use serde_json::Value;
//! use storecore::{HandlerError, Subscriber};
//!
//! struct Audit;
//!
//! #[async_trait::async_trait]
//! impl Subscriber for Audit {
//!     async fn handle(&self, payload: &Value) -> Result<(), HandlerError> {
//!         // write audit record...
//!         let _ = payload;
//!         Ok(())
//!     }
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;

/// Shared handle to a subscriber.
pub type SubscriberRef = Arc<dyn Subscriber>;

/// Contract for event subscribers.
///
/// Called from the dispatcher worker. Implementations should avoid blocking
/// the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscriber: Send + Sync + 'static {
    /// Handles a single event payload for this subscriber.
    async fn handle(&self, payload: &Value) -> Result<(), HandlerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed subscriber implementation.
///
/// Wraps a closure that *creates* a new future per event, so no shared
/// mutable state is required across invocations; if shared state is needed,
/// capture an `Arc<...>` explicitly inside the closure.
pub struct SubscriberFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SubscriberFn<F> {
    /// Creates a new function-backed subscriber.
    ///
    /// Prefer [`SubscriberFn::arc`] when you immediately need a [`SubscriberRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the subscriber and returns it as a shared handle.
    ///
    /// ## Example
    /// ```rust
    /// use serde_json::Value;
    /// use storecore::{HandlerError, SubscriberFn, SubscriberRef};
    ///
    /// let s: SubscriberRef = SubscriberFn::arc("refresh", |payload: Value| async move {
    ///     let _ = payload;
    ///     Ok::<_, HandlerError>(())
    /// });
    /// assert_eq!(s.name(), "refresh");
    /// ```
    pub fn arc<Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Subscriber for SubscriberFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: &Value) -> Result<(), HandlerError> {
        (self.f)(payload.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
