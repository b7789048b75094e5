//! Stream bridge - turns bus events into a client-facing push stream
//!
//! One bridge loop per subscriber. The loop polls the subscription with a
//! short tick so it can notice a vanished client between events; the fixed
//! tick is an intentional throughput/latency trade-off, not a busy spin. The
//! loop ends on the terminal event, on disconnect, or on an internal fault -
//! and the subscription is released on every one of those paths (dropping it
//! unsubscribes, so cleanup is tied to scope, not to remembering).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::{EventBusError, EventSubscription, TaskBus};
use crate::domain::StreamFrame;

/// Default wait per poll iteration
pub const DEFAULT_POLL_TICK: Duration = Duration::from_millis(25);

/// Why a bridge loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// A terminal event was forwarded - the sole normal exit
    Completed,
    /// The client went away before a terminal event
    Disconnected,
    /// An internal fault was converted into a final error frame
    Faulted,
}

/// Forwards one task's lifecycle events to long-lived client channels
#[derive(Clone)]
pub struct StreamBridge {
    bus: TaskBus,
    tick: Duration,
}

impl StreamBridge {
    pub fn new(bus: TaskBus) -> Self {
        Self {
            bus,
            tick: DEFAULT_POLL_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Subscribe to a task's events
    ///
    /// Call this before handing the subscription to [`run`](Self::run): the
    /// subscription exists from the moment this returns, so events published
    /// while the bridge task is still being scheduled are not lost.
    pub fn open(&self, task_id: &str) -> EventSubscription {
        self.bus.subscribe(task_id)
    }

    /// Pump events from `sub` into `client` until a terminal event,
    /// disconnect, or fault
    pub async fn run(
        &self,
        task_id: &str,
        mut sub: EventSubscription,
        client: mpsc::Sender<StreamFrame>,
    ) -> StreamEnd {
        debug!(%task_id, "StreamBridge::run: streaming");
        let end = loop {
            // Disconnect check once per iteration: a dropped receiver stops
            // delivery within one tick.
            if client.is_closed() {
                debug!(%task_id, "StreamBridge::run: client disconnected");
                break StreamEnd::Disconnected;
            }

            let event = match tokio::time::timeout(self.tick, sub.recv()).await {
                Err(_) => continue, // tick elapsed, re-check the client
                Ok(Ok(event)) => event,
                Ok(Err(e)) => break self.fault(task_id, &client, e).await,
            };

            let terminal = event.event.is_terminal();
            if client.send(event.into_frame()).await.is_err() {
                debug!(%task_id, "StreamBridge::run: client vanished mid-send");
                break StreamEnd::Disconnected;
            }

            if terminal {
                debug!(%task_id, "StreamBridge::run: terminal event forwarded");
                break StreamEnd::Completed;
            }
        };

        // `sub` drops here on every path, releasing the topic subscription.
        end
    }

    /// Forward a single synthesized error frame for an internal fault
    async fn fault(
        &self,
        task_id: &str,
        client: &mpsc::Sender<StreamFrame>,
        error: EventBusError,
    ) -> StreamEnd {
        warn!(%task_id, %error, "StreamBridge: internal fault, ending stream");
        let _ = client.send(StreamFrame::fault(task_id, &error, "Stream")).await;
        StreamEnd::Faulted
    }
}
