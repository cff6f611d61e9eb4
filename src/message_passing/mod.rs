//! # Message-Passing Simulator
//!
//! An unbounded hand-off channel decouples producer cadence from consumer
//! cadence: deliberately no backpressure, as a contrast to the bounded
//! buffer simulator.
//!
//! Each message walks a forward-only lifecycle:
//! `Created → Sent` (on hand-off) `→ Received` (at consumer pickup)
//! `→ Processed` (after simulated work). Producer and consumer are
//! independently startable and stoppable; a consumer failure surfaces as the
//! consumer's `Error` status while already-sent messages stay queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::framework::{
    now_ms, ActivityLog, CancelSignal, LogKind, Pacing, SimError, SimStatus, Simulation,
    TaskGroup,
};
use serde::Serialize;

const PRODUCE_EVERY_MS: u64 = 1000;
const PROCESS_EVERY_MS: u64 = 1500;

/// Forward-only lifecycle status of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageStatus {
    Created,
    Sent,
    Received,
    Processed,
}

/// One message as last published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u64,
    pub content: String,
    /// Unix milliseconds at creation; set once, never mutated.
    pub timestamp_ms: u64,
    pub status: MessageStatus,
}

/// Full observable state of the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePassingSnapshot {
    pub producer_status: SimStatus,
    pub consumer_status: SimStatus,
    pub messages: Vec<Message>,
    pub log: ActivityLog,
}

impl MessagePassingSnapshot {
    fn initial() -> Self {
        Self {
            producer_status: SimStatus::Idle,
            consumer_status: SimStatus::Idle,
            messages: Vec::new(),
            log: ActivityLog::new(),
        }
    }
}

/// Pacing configuration.
#[derive(Debug, Clone)]
pub struct MessagePassingConfig {
    pub pacing: Pacing,
}

impl Default for MessagePassingConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::Random,
        }
    }
}

struct Shared {
    state: watch::Sender<MessagePassingSnapshot>,
    /// Hand-off endpoints. Both live across independent producer/consumer
    /// restarts and are only rebuilt by a full `stop()`.
    tx: std::sync::Mutex<mpsc::UnboundedSender<Message>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    /// One-shot fault flag for demonstrating the consumer error path.
    fail_next: AtomicBool,
}

impl Shared {
    fn new(state: watch::Sender<MessagePassingSnapshot>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state,
            tx: std::sync::Mutex::new(tx),
            rx: Arc::new(Mutex::new(rx)),
            fail_next: AtomicBool::new(false),
        }
    }

    fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the channel, dropping anything still queued. Only called
    /// after both sides have shut down, so the receiver lock is free.
    async fn reset_channel(&self) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock().unwrap_or_else(|e| e.into_inner()) = tx;
        *self.rx.lock().await = rx;
    }

    fn record_sent(&self, message: Message) {
        self.state.send_modify(|s| {
            s.log
                .push(LogKind::Info, format!("Message {} sent", message.id));
            s.messages.push(message);
        });
    }

    fn set_status(&self, id: u64, status: MessageStatus) {
        self.state.send_modify(|s| {
            if let Some(message) = s.messages.iter_mut().find(|m| m.id == id) {
                message.status = status;
            }
            if status == MessageStatus::Processed {
                s.log
                    .push(LogKind::Success, format!("Message {id} processed"));
            }
        });
    }

    fn set_producer_status(&self, status: SimStatus) {
        self.state.send_modify(|s| s.producer_status = status);
    }

    fn set_consumer_status(&self, status: SimStatus) {
        self.state.send_modify(|s| s.consumer_status = status);
    }
}

/// The message-passing simulator.
pub struct MessagePassingSim {
    config: MessagePassingConfig,
    shared: Arc<Shared>,
    producer: Option<TaskGroup>,
    consumer: Option<TaskGroup>,
}

impl MessagePassingSim {
    pub fn new(config: MessagePassingConfig) -> Self {
        let (state, _) = watch::channel(MessagePassingSnapshot::initial());
        Self {
            config,
            shared: Arc::new(Shared::new(state)),
            producer: None,
            consumer: None,
        }
    }

    pub fn snapshot(&self) -> MessagePassingSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MessagePassingSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn actor_count(&self) -> usize {
        self.producer.as_ref().map_or(0, TaskGroup::len)
            + self.consumer.as_ref().map_or(0, TaskGroup::len)
    }

    /// Starts the producer side only. No-op if it is already running.
    pub fn start_producer(&mut self) {
        if self.producer.is_some() {
            debug!(sim = "message-passing", "Producer already running");
            return;
        }
        let mut group = TaskGroup::new();
        let shared = self.shared.clone();
        let tx = self.shared.sender();
        let pacing = self.config.pacing;
        let signal = group.signal();
        shared.set_producer_status(SimStatus::Running);
        group.spawn(async move {
            if let Err(e) = producer_loop(&shared, tx, pacing, signal).await {
                warn!(%e, "Message producer failed");
                shared.set_producer_status(SimStatus::Error(e.to_string()));
            }
        });
        self.producer = Some(group);
    }

    /// Stops the producer side; already-sent messages stay queued.
    pub async fn stop_producer(&mut self) {
        if let Some(group) = self.producer.take() {
            group.shutdown().await;
            self.shared.set_producer_status(SimStatus::Idle);
        }
    }

    /// Starts the consumer side only. No-op if it is already running.
    pub fn start_consumer(&mut self) {
        if self.consumer.is_some() {
            debug!(sim = "message-passing", "Consumer already running");
            return;
        }
        let mut group = TaskGroup::new();
        let shared = self.shared.clone();
        let rx = self.shared.rx.clone();
        let pacing = self.config.pacing;
        let signal = group.signal();
        shared.set_consumer_status(SimStatus::Running);
        group.spawn(async move {
            if let Err(e) = consumer_loop(&shared, rx, pacing, signal).await {
                warn!(%e, "Message consumer failed");
                shared.set_consumer_status(SimStatus::Error(e.to_string()));
            }
        });
        self.consumer = Some(group);
    }

    /// Stops the consumer side; anything still queued survives.
    pub async fn stop_consumer(&mut self) {
        if let Some(group) = self.consumer.take() {
            group.shutdown().await;
            self.shared.set_consumer_status(SimStatus::Idle);
        }
    }

    /// Makes the consumer fail on its next pickup: the demonstration hook
    /// for the consumer error path.
    pub fn inject_consumer_fault(&self) {
        self.shared.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Default for MessagePassingSim {
    fn default() -> Self {
        Self::new(MessagePassingConfig::default())
    }
}

#[async_trait::async_trait]
impl Simulation for MessagePassingSim {
    fn name(&self) -> &'static str {
        "message-passing"
    }

    fn start(&mut self) {
        self.start_producer();
        self.start_consumer();
    }

    async fn stop(&mut self) {
        let was_running = self.producer.is_some() || self.consumer.is_some();
        self.stop_producer().await;
        self.stop_consumer().await;
        // Full stop resets everything, including the queue. Shutdown never
        // blocks on queue contents: the old channel is simply dropped.
        self.shared.reset_channel().await;
        self.shared
            .state
            .send_modify(|s| *s = MessagePassingSnapshot::initial());
        self.shared.fail_next.store(false, Ordering::SeqCst);
        if was_running {
            info!(sim = self.name(), "Stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.producer.is_some() || self.consumer.is_some()
    }
}

async fn producer_loop(
    shared: &Shared,
    tx: mpsc::UnboundedSender<Message>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) -> Result<(), SimError> {
    let mut next_id: u64 = 0;
    loop {
        let id = next_id;
        next_id += 1;
        let mut message = Message {
            id,
            content: format!("Message #{}", id + 1),
            timestamp_ms: now_ms(),
            status: MessageStatus::Created,
        };

        // Hand-off: Created → Sent.
        message.status = MessageStatus::Sent;
        tx.send(message.clone())
            .map_err(|_| SimError::ChannelClosed("message hand-off"))?;
        shared.record_sent(message);

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = pacing.rest_fixed(PRODUCE_EVERY_MS) => {}
        }
    }
}

async fn consumer_loop(
    shared: &Shared,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Message>>>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) -> Result<(), SimError> {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = async {
                let mut rx = rx.lock().await;
                rx.recv().await
            } => match received {
                Some(message) => message,
                None => return Err(SimError::ChannelClosed("message hand-off")),
            },
        };

        if shared.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SimError::Fault(format!(
                "consumer crashed while processing message {}",
                message.id
            )));
        }

        // Pickup: Sent → Received.
        shared.set_status(message.id, MessageStatus::Received);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = pacing.rest_fixed(PROCESS_EVERY_MS) => {}
        }
        shared.set_status(message.id, MessageStatus::Processed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_sim() -> MessagePassingSim {
        MessagePassingSim::new(MessagePassingConfig {
            pacing: Pacing::Fixed(Duration::from_millis(1)),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn messages_walk_the_full_lifecycle() {
        let mut sim = fast_sim();
        sim.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let snapshot = sim.snapshot();
        sim.stop().await;

        assert!(!snapshot.messages.is_empty());
        assert!(
            snapshot
                .messages
                .iter()
                .any(|m| m.status == MessageStatus::Processed),
            "no message reached Processed"
        );
        // Content numbering matches ids, starting at #1.
        let first = &snapshot.messages[0];
        assert_eq!(first.id, 0);
        assert_eq!(first.content, "Message #1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn producer_outruns_a_stopped_consumer_without_backpressure() {
        let mut sim = fast_sim();
        sim.start_producer();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let snapshot = sim.snapshot();
        assert!(snapshot.producer_status.is_running());
        assert_eq!(snapshot.consumer_status, SimStatus::Idle);
        // No consumer, no backpressure: everything is Sent, nothing beyond.
        assert!(!snapshot.messages.is_empty());
        assert!(snapshot
            .messages
            .iter()
            .all(|m| m.status == MessageStatus::Sent));

        // A late consumer drains the backlog.
        sim.start_consumer();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let drained = sim.snapshot();
        assert!(drained
            .messages
            .iter()
            .any(|m| m.status == MessageStatus::Processed));

        sim.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn consumer_fault_is_terminal_for_the_consumer_only() {
        let mut sim = fast_sim();
        sim.inject_consumer_fault();
        sim.start();

        // Wait for the fault to surface.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = sim.snapshot();
            if let SimStatus::Error(message) = &snapshot.consumer_status {
                assert!(message.contains("injected fault"));
                // The producer keeps going and its messages stay queued.
                assert!(snapshot.producer_status.is_running());
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "fault never surfaced"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Recovery requires an explicit stop/start cycle.
        sim.stop().await;
        assert_eq!(sim.snapshot().consumer_status, SimStatus::Idle);
        sim.start();
        assert!(sim.snapshot().consumer_status.is_running());
        sim.stop().await;
    }

    #[tokio::test]
    async fn stop_resets_and_is_idempotent() {
        let mut sim = fast_sim();
        sim.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sim.stop().await;

        let once = sim.snapshot();
        assert_eq!(once, MessagePassingSnapshot::initial());

        sim.stop().await;
        assert_eq!(sim.snapshot(), once);
    }

    #[tokio::test]
    async fn start_is_idempotent_per_side() {
        let mut sim = fast_sim();
        sim.start();
        assert_eq!(sim.actor_count(), 2);
        sim.start();
        sim.start_producer();
        sim.start_consumer();
        assert_eq!(sim.actor_count(), 2);
        sim.stop().await;
    }
}
