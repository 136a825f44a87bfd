//! # Publish/subscribe bus with a single asynchronous dispatcher.
//!
//! [`EventBus`] decouples state mutation from reaction: managers publish
//! domain events after writing to the store, and subscribers (UI refresh,
//! logging, secondary managers) react later on a dedicated worker.
//!
//! ## Architecture
//! ```text
//! publish(type, payload)            (any thread, never blocks)
//!     │
//!     ▼
//! [ unbounded queue ] ──► dispatcher worker ──► snapshot(subscribers[type])
//!                          (single task)              │
//!                                              handler 1 → handler 2 → ... N
//!                                              (registration order, sequential)
//!                                                     └─ Err/panic → logged,
//!                                                        pass continues
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` enqueues and returns; handler
//!   execution never delays the caller.
//! - **Global order**: one worker drains one queue, so delivery follows
//!   publish order across all types; per type this is FIFO per subscriber.
//! - **Snapshot dispatch**: subscriber lists are copied under the registry
//!   lock before invocation; concurrent (un)subscribe never corrupts,
//!   duplicates, or drops a delivery within a pass.
//! - **Queue-before-start**: events published before `start()` (or while
//!   stopped) accumulate and are delivered once the dispatcher runs.
//! - **Drop-on-stop**: events still queued when `stop()` completes are
//!   discarded; delivery is best-effort and ephemeral.
//!
//! ## Panic handling
//! Handler futures run under `catch_unwind`, so a panicking subscriber is
//! reported and skipped while the worker keeps draining. The dispatch pass
//! itself is guarded the same way: a failure in the bus's own plumbing is
//! logged and the loop continues.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::bus::event::Event;
use crate::bus::registry::{Registry, SubscriptionId};
use crate::bus::subscriber::SubscriberRef;
use crate::config::BusConfig;
use crate::error::{HandlerError, RuntimeError};

/// Dispatcher lifecycle: the receiver half of the queue is parked while the
/// bus is stopped and owned by the worker while it runs.
enum DispatcherState {
    Idle(mpsc::UnboundedReceiver<Event>),
    Running {
        token: CancellationToken,
        handle: JoinHandle<mpsc::UnboundedReceiver<Event>>,
    },
}

/// Process-wide publish/subscribe service.
///
/// Constructed once during application bootstrap and passed by reference to
/// every component that publishes or subscribes; there is no global lookup.
///
/// ### Lifecycle
/// `Created → Started → Stopped`, with restart permitted: the queue survives
/// `stop()`, so a stopped bus keeps accumulating publishes and delivers them
/// after the next `start()`. Double-starting is guarded by the worker slot.
pub struct EventBus {
    tx: mpsc::UnboundedSender<Event>,
    registry: Arc<Registry>,
    state: Mutex<Option<DispatcherState>>,
    cfg: BusConfig,
}

impl EventBus {
    /// Creates a new bus. The dispatcher does not run until [`EventBus::start`].
    pub fn new(cfg: BusConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            registry: Arc::new(Registry::new()),
            state: Mutex::new(Some(DispatcherState::Idle(rx))),
            cfg,
        }
    }

    /// Launches the dispatcher worker if it is not already running.
    ///
    /// Idempotent. Must be called from within a Tokio runtime. Events that
    /// accumulated in the queue before this call are delivered first, in
    /// publish order.
    pub fn start(&self) {
        let mut state = self.state();
        match state.take() {
            Some(DispatcherState::Idle(rx)) => {
                let token = CancellationToken::new();
                let handle = tokio::spawn(dispatcher_loop(
                    rx,
                    token.clone(),
                    Arc::clone(&self.registry),
                ));
                *state = Some(DispatcherState::Running { token, handle });
                debug!("dispatcher started");
            }
            // Already running, or a concurrent stop is in flight.
            other => *state = other,
        }
    }

    /// Signals the dispatcher to exit and waits for it, bounded by
    /// [`BusConfig::grace`].
    ///
    /// Idempotent; stopping a bus that never started is a no-op. Events still
    /// queued once the worker has exited are discarded (logged with a count).
    /// The in-flight handler, if any, is allowed to finish within the grace
    /// period.
    ///
    /// # Errors
    /// - [`RuntimeError::GraceExceeded`] if the worker overran the grace
    ///   period and had to be aborted; the bus is defunct afterwards.
    /// - [`RuntimeError::DispatcherFailed`] if the worker terminated
    ///   abnormally.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        let taken = self.state().take();
        let (token, mut handle) = match taken {
            Some(DispatcherState::Running { token, handle }) => (token, handle),
            idle => {
                *self.state() = idle;
                return Ok(());
            }
        };

        token.cancel();
        match tokio::time::timeout(self.cfg.grace, &mut handle).await {
            Ok(Ok(mut rx)) => {
                let mut dropped = 0usize;
                while rx.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    warn!(dropped, "discarded events still queued at stop");
                }
                *self.state() = Some(DispatcherState::Idle(rx));
                debug!("dispatcher stopped");
                Ok(())
            }
            Ok(Err(join_err)) => {
                let reason = join_err.to_string();
                error!(%reason, "dispatcher worker did not shut down cleanly");
                Err(RuntimeError::DispatcherFailed { reason })
            }
            Err(_) => {
                handle.abort();
                error!(grace = ?self.cfg.grace, "dispatcher overran stop grace; aborted");
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.grace,
                })
            }
        }
    }

    /// Registers a handler for an event type and returns its removal token.
    ///
    /// Handlers for a type fire in registration order; registering the same
    /// handler twice makes it fire twice.
    pub fn subscribe(
        &self,
        event_type: impl Into<Arc<str>>,
        handler: SubscriberRef,
    ) -> SubscriptionId {
        self.registry.add(event_type.into(), handler)
    }

    /// Removes a subscription.
    ///
    /// Safe to call from inside a handler during dispatch: the current pass
    /// iterates a snapshot, so removal takes effect from the next pass.
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    /// Enqueues an event and returns immediately.
    ///
    /// May be called before `start()`; such events queue and are delivered
    /// once the dispatcher runs. Never blocks on handler execution.
    pub fn publish(&self, event_type: impl Into<Arc<str>>, payload: serde_json::Value) {
        let ev = Event::new(event_type, payload);
        if self.tx.send(ev).is_err() {
            // Only reachable after an aborted worker took the receiver down.
            warn!("event dropped: dispatch queue is gone");
        }
    }

    fn state(&self) -> MutexGuard<'_, Option<DispatcherState>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// Worker loop: drains the queue until cancelled, then hands the receiver
/// back so the bus can restart with the same queue.
async fn dispatcher_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    token: CancellationToken,
    registry: Arc<Registry>,
) -> mpsc::UnboundedReceiver<Event> {
    loop {
        tokio::select! {
            // Checked first, so stop() wins over further dequeues and
            // shutdown latency is bounded by the in-flight handler only.
            biased;
            _ = token.cancelled() => break,
            maybe_ev = rx.recv() => match maybe_ev {
                Some(ev) => {
                    let event_type = Arc::clone(&ev.event_type);
                    let pass = dispatch_event(&registry, ev);
                    if let Err(panic) = std::panic::AssertUnwindSafe(pass).catch_unwind().await {
                        error!(
                            event_type = %event_type,
                            detail = %panic_message(panic.as_ref()),
                            "dispatch pass failed; dispatcher continues"
                        );
                    }
                }
                // All senders gone: the bus itself was dropped.
                None => break,
            },
        }
    }
    rx
}

/// Delivers one event to every subscriber registered for its type.
///
/// The subscriber list is snapshotted once, then handlers run sequentially in
/// registration order. Each handler is isolated: an `Err` or a panic is
/// logged and does not affect the rest of the pass.
async fn dispatch_event(registry: &Registry, ev: Event) {
    let subs = registry.snapshot(&ev.event_type);
    if subs.is_empty() {
        trace!(event_type = %ev.event_type, seq = ev.seq, "no subscribers; event dropped");
        return;
    }

    for sub in subs {
        let fut = sub.handler.handle(&ev.payload);
        match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(
                    event_type = %ev.event_type,
                    handler = sub.handler.name(),
                    label = err.as_label(),
                    detail = %err.as_message(),
                    "handler failed"
                );
            }
            Err(panic) => {
                let err = HandlerError::Panicked {
                    detail: panic_message(panic.as_ref()),
                };
                error!(
                    event_type = %ev.event_type,
                    handler = sub.handler.name(),
                    label = err.as_label(),
                    detail = %err.as_message(),
                    "handler panicked"
                );
            }
        }
    }
}

/// Extracts a printable message from a caught panic payload.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::time::timeout;

    use crate::bus::subscriber::SubscriberFn;

    /// Subscriber that forwards every payload it sees into a channel.
    fn recorder() -> (SubscriberRef, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = SubscriberFn::arc("recorder", move |payload: Value| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(payload);
                Ok::<_, HandlerError>(())
            }
        });
        (sub, rx)
    }

    async fn recv_one(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("recorder channel closed")
    }

    async fn assert_no_more(rx: &mut mpsc::UnboundedReceiver<Value>) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err(), "unexpected extra delivery");
    }

    #[tokio::test]
    async fn test_publish_before_start_delivers_once() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", sub);

        bus.publish("sale.created", json!({ "id": 1 }));
        bus.start();

        assert_eq!(recv_one(&mut rx).await, json!({ "id": 1 }));
        assert_no_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_fifo_per_type() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("inventory.updated", sub);
        bus.start();

        bus.publish("inventory.updated", json!("first"));
        bus.publish("inventory.updated", json!("second"));

        assert_eq!(recv_one(&mut rx).await, json!("first"));
        assert_eq!(recv_one(&mut rx).await, json!("second"));
    }

    #[tokio::test]
    async fn test_global_order_across_types() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", sub.clone());
        bus.subscribe("customer.created", sub);
        bus.start();

        bus.publish("sale.created", json!(1));
        bus.publish("customer.created", json!(2));
        bus.publish("sale.created", json!(3));

        assert_eq!(recv_one(&mut rx).await, json!(1));
        assert_eq!(recv_one(&mut rx).await, json!(2));
        assert_eq!(recv_one(&mut rx).await, json!(3));
    }

    #[tokio::test]
    async fn test_duplicate_subscription_fires_twice() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("report.ready", sub.clone());
        bus.subscribe("report.ready", sub);
        bus.start();

        bus.publish("report.ready", json!("r1"));

        assert_eq!(recv_one(&mut rx).await, json!("r1"));
        assert_eq!(recv_one(&mut rx).await, json!("r1"));
        assert_no_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_excludes_future_passes() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        let id = bus.subscribe("sale.created", sub);
        bus.start();

        bus.publish("sale.created", json!(1));
        assert_eq!(recv_one(&mut rx).await, json!(1));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        bus.publish("sale.created", json!(2));
        assert_no_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_self_unsubscribe_mid_pass() {
        let bus = Arc::new(EventBus::default());

        // First handler removes itself on its first invocation; the second,
        // registered after it, must still see the same pass.
        let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let first = {
            let bus = Arc::clone(&bus);
            let own_id = Arc::clone(&own_id);
            SubscriberFn::arc("one-shot", move |payload: Value| {
                let bus = Arc::clone(&bus);
                let own_id = Arc::clone(&own_id);
                let first_tx = first_tx.clone();
                async move {
                    let id = own_id.lock().unwrap().take();
                    if let Some(id) = id {
                        bus.unsubscribe(id);
                    }
                    let _ = first_tx.send(payload);
                    Ok::<_, HandlerError>(())
                }
            })
        };
        let (second, mut second_rx) = recorder();

        let id = bus.subscribe("sale.created", first);
        *own_id.lock().unwrap() = Some(id);
        bus.subscribe("sale.created", second);
        bus.start();

        bus.publish("sale.created", json!(1));
        bus.publish("sale.created", json!(2));

        // Second handler sees both passes.
        assert_eq!(recv_one(&mut second_rx).await, json!(1));
        assert_eq!(recv_one(&mut second_rx).await, json!(2));
        // First handler saw only the pass it unsubscribed during.
        assert_eq!(recv_one(&mut first_rx).await, json!(1));
        assert_no_more(&mut first_rx).await;
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let bus = EventBus::default();
        let panicker = SubscriberFn::arc("panicker", |_payload: Value| async {
            panic!("boom");
            #[allow(unreachable_code)]
            Ok::<_, HandlerError>(())
        });
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", panicker);
        bus.subscribe("sale.created", sub);
        bus.start();

        bus.publish("sale.created", json!(1));
        bus.publish("sale.created", json!(2));

        // Both passes reach the healthy handler; the worker survived.
        assert_eq!(recv_one(&mut rx).await, json!(1));
        assert_eq!(recv_one(&mut rx).await, json!(2));
    }

    #[tokio::test]
    async fn test_failing_handler_is_contained() {
        let bus = EventBus::default();
        let failing = SubscriberFn::arc("failing", |_payload: Value| async {
            Err(HandlerError::Fail {
                error: "db write rejected".into(),
            })
        });
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", failing);
        bus.subscribe("sale.created", sub);
        bus.start();

        bus.publish("sale.created", json!({ "id": 7 }));
        assert_eq!(recv_one(&mut rx).await, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", sub);
        bus.start();
        bus.start();

        bus.publish("sale.created", json!(1));
        assert_eq!(recv_one(&mut rx).await, json!(1));
        assert_no_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_stop_publish_restart_delivers_once() {
        let bus = EventBus::default();
        let (sub, mut rx) = recorder();
        bus.subscribe("sale.created", sub);

        bus.start();
        bus.stop().await.unwrap();
        bus.stop().await.unwrap(); // idempotent

        bus.publish("sale.created", json!({ "id": 1 }));
        bus.start();

        assert_eq!(recv_one(&mut rx).await, json!({ "id": 1 }));
        assert_no_more(&mut rx).await;
    }

    #[tokio::test]
    async fn test_stop_discards_queued_events() {
        let bus = EventBus::default();
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let slow = SubscriberFn::arc("slow", move |payload: Value| {
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(payload);
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok::<_, HandlerError>(())
            }
        });
        bus.subscribe("sale.created", slow);
        bus.start();

        bus.publish("sale.created", json!(1));
        bus.publish("sale.created", json!(2));
        bus.publish("sale.created", json!(3));

        // Wait until the first event is in flight, then stop: the worker
        // finishes the in-flight handler and exits before dequeuing more.
        assert_eq!(recv_one(&mut seen_rx).await, json!(1));
        bus.stop().await.unwrap();

        bus.start();
        bus.publish("sale.created", json!(4));
        assert_eq!(recv_one(&mut seen_rx).await, json!(4));
        assert_no_more(&mut seen_rx).await;
    }

    #[tokio::test]
    async fn test_stop_grace_exceeded() {
        let bus = EventBus::new(BusConfig {
            grace: Duration::from_millis(50),
        });
        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let stuck = SubscriberFn::arc("stuck", move |payload: Value| {
            let entered_tx = entered_tx.clone();
            async move {
                let _ = entered_tx.send(payload);
                futures::future::pending::<()>().await;
                Ok::<_, HandlerError>(())
            }
        });
        bus.subscribe("sale.created", stuck);
        bus.start();

        bus.publish("sale.created", json!(1));
        assert_eq!(recv_one(&mut entered_rx).await, json!(1));

        let err = bus.stop().await.unwrap_err();
        assert!(matches!(err, RuntimeError::GraceExceeded { .. }));
    }
}
