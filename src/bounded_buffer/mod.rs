//! # Bounded Producer/Consumer Simulator
//!
//! A single bounded queue shared by a set of producer and consumer actors.
//! Backpressure comes from a [`BoundedResourcePool`] of slot permits:
//! producers block while the buffer is full, consumers block while it is
//! empty (on the FIFO hand-off channel). Items flow buffer → consumer →
//! consumed output and are never lost.
//!
//! Producer and consumer sides are independently startable and stoppable;
//! stopping the producers freezes production while the consumers drain what
//! is already buffered. A full `stop()` resets everything.
//!
//! The running "average wait time" uses the recency-weighted recurrence
//! `avg' = (avg + this_wait) / 2` rather than a true mean. That is a
//! deliberate behavioral-parity choice, kept as-is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::framework::{
    now_ms, ActivityLog, CancelSignal, LogKind, Pacing, SimError, SimStatus, Simulation,
    TaskGroup,
};
use crate::primitives::BoundedResourcePool;
use serde::Serialize;

/// Producer/consumer cadence is tunable inside this range.
pub const MIN_DELAY_MS: u64 = 100;
pub const MAX_DELAY_MS: u64 = 5000;

/// One produced item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Monotonically increasing per run, reset to 0 on stop/start.
    pub id: u64,
    /// Unix milliseconds at production time; set once, never mutated.
    pub created_at_ms: u64,
    pub payload: String,
}

/// Running statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferStats {
    pub total_produced: u64,
    pub total_consumed: u64,
    /// Recency-weighted, not a true mean (see module docs).
    pub average_wait_ms: u64,
}

/// Full observable state of the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundedBufferSnapshot {
    pub producer_status: SimStatus,
    pub consumer_status: SimStatus,
    /// Items currently in the buffer, oldest first. Never exceeds capacity.
    pub buffer: Vec<Item>,
    pub capacity: usize,
    /// Consumed output, in consumption order.
    pub consumed: Vec<Item>,
    pub stats: BufferStats,
    pub producer_delay_ms: u64,
    pub consumer_delay_ms: u64,
    pub log: ActivityLog,
}

impl BoundedBufferSnapshot {
    fn initial(config: &BoundedBufferConfig) -> Self {
        Self {
            producer_status: SimStatus::Idle,
            consumer_status: SimStatus::Idle,
            buffer: Vec::new(),
            capacity: config.capacity,
            consumed: Vec::new(),
            stats: BufferStats::default(),
            producer_delay_ms: config.producer_delay_ms,
            consumer_delay_ms: config.consumer_delay_ms,
            log: ActivityLog::new(),
        }
    }
}

/// Capacity, population, cadence and pacing configuration.
#[derive(Debug, Clone)]
pub struct BoundedBufferConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub producer_delay_ms: u64,
    pub consumer_delay_ms: u64,
    pub pacing: Pacing,
}

impl Default for BoundedBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            producers: 1,
            consumers: 1,
            producer_delay_ms: 1000,
            consumer_delay_ms: 2000,
            pacing: Pacing::Random,
        }
    }
}

struct Shared {
    state: watch::Sender<BoundedBufferSnapshot>,
    /// Backpressure gate. Lives across independent side restarts; only a
    /// full `stop()` refills it (the buffer is cleared in the same reset).
    slots: BoundedResourcePool,
    /// Hand-off endpoints, likewise rebuilt only by a full `stop()`.
    tx: std::sync::Mutex<mpsc::UnboundedSender<Item>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Item>>>,
    next_id: AtomicU64,
    /// Tunables, read at the top of each cycle so changes take effect on the
    /// next one.
    producer_delay_ms: AtomicU64,
    consumer_delay_ms: AtomicU64,
}

impl Shared {
    fn new(state: watch::Sender<BoundedBufferSnapshot>, config: &BoundedBufferConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state,
            slots: BoundedResourcePool::new(config.capacity),
            tx: std::sync::Mutex::new(tx),
            rx: Arc::new(Mutex::new(rx)),
            next_id: AtomicU64::new(0),
            producer_delay_ms: AtomicU64::new(config.producer_delay_ms),
            consumer_delay_ms: AtomicU64::new(config.consumer_delay_ms),
        }
    }

    fn sender(&self) -> mpsc::UnboundedSender<Item> {
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

    /// Item enters the buffer. Recorded *before* the channel send so a fast
    /// consumer can never observe (and remove) an item that was never added.
    fn record_produced(&self, item: &Item) {
        self.state.send_modify(|s| {
            s.buffer.push(item.clone());
            s.stats.total_produced += 1;
            s.log
                .push(LogKind::Info, format!("Produced item {}", item.id));
        });
    }

    /// Item moves buffer → consumed output in one exclusion region, so it is
    /// in exactly one place at every sampled instant.
    fn record_consumed(&self, item: Item, wait_ms: u64) {
        self.state.send_modify(|s| {
            s.buffer.retain(|queued| queued.id != item.id);
            s.stats.total_consumed += 1;
            s.stats.average_wait_ms = (s.stats.average_wait_ms + wait_ms) / 2;
            s.log.push(
                LogKind::Success,
                format!("Consumed item {} after {wait_ms}ms", item.id),
            );
            s.consumed.push(item);
        });
    }

    fn set_producer_status(&self, status: SimStatus) {
        self.state.send_modify(|s| s.producer_status = status);
    }

    fn set_consumer_status(&self, status: SimStatus) {
        self.state.send_modify(|s| s.consumer_status = status);
    }

    fn fail_producer(&self, error: &SimError) {
        warn!(role = "Producer", %error, "Actor loop failed");
        self.state.send_modify(|s| {
            s.producer_status = SimStatus::Error(error.to_string());
            s.log
                .push(LogKind::Error, format!("Producer failed: {error}"));
        });
    }

    fn fail_consumer(&self, error: &SimError) {
        warn!(role = "Consumer", %error, "Actor loop failed");
        self.state.send_modify(|s| {
            s.consumer_status = SimStatus::Error(error.to_string());
            s.log
                .push(LogKind::Error, format!("Consumer failed: {error}"));
        });
    }
}

/// The bounded producer/consumer simulator.
pub struct BoundedBufferSim {
    config: BoundedBufferConfig,
    shared: Arc<Shared>,
    producers: Option<TaskGroup>,
    consumers: Option<TaskGroup>,
}

impl BoundedBufferSim {
    pub fn new(config: BoundedBufferConfig) -> Self {
        let (state, _) = watch::channel(BoundedBufferSnapshot::initial(&config));
        Self {
            shared: Arc::new(Shared::new(state, &config)),
            config,
            producers: None,
            consumers: None,
        }
    }

    pub fn snapshot(&self) -> BoundedBufferSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoundedBufferSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn actor_count(&self) -> usize {
        self.producers.as_ref().map_or(0, TaskGroup::len)
            + self.consumers.as_ref().map_or(0, TaskGroup::len)
    }

    /// Starts the producer set only. No-op if it is already running.
    pub fn start_producers(&mut self) {
        if self.producers.is_some() {
            debug!(sim = "bounded-buffer", "Producers already running");
            return;
        }
        let mut group = TaskGroup::new();
        self.shared.set_producer_status(SimStatus::Running);
        for _ in 0..self.config.producers {
            let shared = self.shared.clone();
            let tx = self.shared.sender();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(async move {
                if let Err(e) = producer_loop(&shared, tx, pacing, signal).await {
                    shared.fail_producer(&e);
                }
            });
        }
        self.producers = Some(group);
    }

    /// Stops the producer set; anything already buffered stays for the
    /// consumers to drain.
    pub async fn stop_producers(&mut self) {
        if let Some(group) = self.producers.take() {
            group.shutdown().await;
            self.shared.set_producer_status(SimStatus::Idle);
        }
    }

    /// Starts the consumer set only. No-op if it is already running.
    pub fn start_consumers(&mut self) {
        if self.consumers.is_some() {
            debug!(sim = "bounded-buffer", "Consumers already running");
            return;
        }
        let mut group = TaskGroup::new();
        self.shared.set_consumer_status(SimStatus::Running);
        for _ in 0..self.config.consumers {
            let shared = self.shared.clone();
            let rx = self.shared.rx.clone();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(async move {
                if let Err(e) = consumer_loop(&shared, rx, pacing, signal).await {
                    shared.fail_consumer(&e);
                }
            });
        }
        self.consumers = Some(group);
    }

    /// Stops the consumer set; buffered items keep their slots until a full
    /// `stop()` resets the run.
    pub async fn stop_consumers(&mut self) {
        if let Some(group) = self.consumers.take() {
            group.shutdown().await;
            self.shared.set_consumer_status(SimStatus::Idle);
        }
    }

    /// Sets the producer cadence, clamped to the tunable range. Takes effect
    /// on the producer's next cycle.
    pub fn set_producer_delay_ms(&self, ms: u64) {
        let ms = ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS);
        self.shared.producer_delay_ms.store(ms, Ordering::Relaxed);
        self.shared
            .state
            .send_modify(|s| s.producer_delay_ms = ms);
    }

    /// Sets the consumer cadence, clamped to the tunable range. Takes effect
    /// on the consumer's next cycle.
    pub fn set_consumer_delay_ms(&self, ms: u64) {
        let ms = ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS);
        self.shared.consumer_delay_ms.store(ms, Ordering::Relaxed);
        self.shared
            .state
            .send_modify(|s| s.consumer_delay_ms = ms);
    }
}

impl Default for BoundedBufferSim {
    fn default() -> Self {
        Self::new(BoundedBufferConfig::default())
    }
}

#[async_trait::async_trait]
impl Simulation for BoundedBufferSim {
    fn name(&self) -> &'static str {
        "bounded-buffer"
    }

    fn start(&mut self) {
        self.start_producers();
        self.start_consumers();
    }

    async fn stop(&mut self) {
        let was_running = self.producers.is_some() || self.consumers.is_some();
        self.stop_producers().await;
        self.stop_consumers().await;
        // Full stop resets the whole run: channel, slot pool, id counter and
        // tunables all return to their initial values.
        self.shared.reset_channel().await;
        while self.shared.slots.release().is_ok() {}
        self.shared.next_id.store(0, Ordering::SeqCst);
        self.shared
            .producer_delay_ms
            .store(self.config.producer_delay_ms, Ordering::Relaxed);
        self.shared
            .consumer_delay_ms
            .store(self.config.consumer_delay_ms, Ordering::Relaxed);
        let config = self.config.clone();
        self.shared
            .state
            .send_modify(|s| *s = BoundedBufferSnapshot::initial(&config));
        if was_running {
            info!(sim = self.name(), "Stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.producers.is_some() || self.consumers.is_some()
    }
}

async fn producer_loop(
    shared: &Shared,
    tx: mpsc::UnboundedSender<Item>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) -> Result<(), SimError> {
    loop {
        // Backpressure: blocks here while all buffer slots are taken.
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            acquired = shared.slots.acquire() => acquired?,
        }

        let item = Item {
            id: shared.next_id.fetch_add(1, Ordering::SeqCst),
            created_at_ms: now_ms(),
            payload: "Product".to_string(),
        };
        shared.record_produced(&item);
        tx.send(item)
            .map_err(|_| SimError::ChannelClosed("bounded buffer hand-off"))?;

        let delay = shared.producer_delay_ms.load(Ordering::Relaxed);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = pacing.rest_fixed(delay) => {}
        }
    }
}

async fn consumer_loop(
    shared: &Shared,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Item>>>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) -> Result<(), SimError> {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            received = async {
                let mut rx = rx.lock().await;
                rx.recv().await
            } => match received {
                Some(item) => item,
                None => return Err(SimError::ChannelClosed("bounded buffer hand-off")),
            },
        };

        let wait_ms = now_ms().saturating_sub(item.created_at_ms);
        shared.record_consumed(item, wait_ms);
        shared.slots.release()?;

        let delay = shared.consumer_delay_ms.load(Ordering::Relaxed);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = pacing.rest_fixed(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config() -> BoundedBufferConfig {
        BoundedBufferConfig {
            capacity: 5,
            producers: 1,
            consumers: 1,
            producer_delay_ms: 1000,
            consumer_delay_ms: 2000,
            pacing: Pacing::Fixed(Duration::from_millis(1)),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn buffer_never_exceeds_capacity() {
        // Fast producer, slow consumer: the buffer saturates quickly.
        let mut sim = BoundedBufferSim::new(BoundedBufferConfig {
            consumers: 1,
            producers: 2,
            ..fast_config()
        });
        sim.start();

        for _ in 0..200 {
            let snapshot = sim.snapshot();
            assert!(
                snapshot.buffer.len() <= snapshot.capacity,
                "buffer overflow: {} items",
                snapshot.buffer.len()
            );
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        sim.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_item_is_consumed_exactly_once_in_order() {
        let mut sim = BoundedBufferSim::new(fast_config());
        sim.start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = sim.snapshot();
        sim.stop().await;

        assert!(snapshot.stats.total_consumed > 0, "nothing consumed");
        // FIFO: consumed ids are exactly 0..n in order.
        for (index, item) in snapshot.consumed.iter().enumerate() {
            assert_eq!(item.id, index as u64, "out-of-order or duplicated item");
        }
        // Nothing lost: whatever was produced is buffered or consumed (a
        // single consumer holds at most the item it is mid-recording, which
        // the atomic buffer→consumed move makes unobservable).
        assert_eq!(
            snapshot.stats.total_produced as usize,
            snapshot.buffer.len() + snapshot.consumed.len()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn producers_stop_independently_and_consumers_drain_the_buffer() {
        let mut sim = BoundedBufferSim::new(fast_config());
        sim.start();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while sim.snapshot().stats.total_produced == 0 {
            assert!(tokio::time::Instant::now() < deadline, "nothing produced");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        sim.stop_producers().await;
        let frozen = sim.snapshot();
        assert_eq!(frozen.producer_status, SimStatus::Idle);
        assert!(frozen.consumer_status.is_running());
        let produced = frozen.stats.total_produced;

        // The consumers drain everything already buffered; nothing new
        // appears while the producers are idle.
        loop {
            let snapshot = sim.snapshot();
            assert_eq!(snapshot.stats.total_produced, produced);
            if snapshot.buffer.is_empty() && snapshot.stats.total_consumed == produced {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "consumers never drained the buffer"
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        // Producers restart against the same buffer and id sequence.
        sim.start_producers();
        assert!(sim.snapshot().producer_status.is_running());
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while sim.snapshot().stats.total_produced == produced {
            assert!(tokio::time::Instant::now() < deadline, "producers stalled");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        sim.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wait_average_uses_the_recency_weighted_recurrence() {
        // Drive the recurrence directly through the shared handle.
        let sim = BoundedBufferSim::new(fast_config());
        let item = |id| Item {
            id,
            created_at_ms: now_ms(),
            payload: "Product".to_string(),
        };
        sim.shared.record_produced(&item(0));
        sim.shared.record_produced(&item(1));
        sim.shared.record_consumed(item(0), 100);
        sim.shared.record_consumed(item(1), 300);

        // (0 + 100) / 2 = 50; (50 + 300) / 2 = 175. A true mean would be 200.
        assert_eq!(sim.snapshot().stats.average_wait_ms, 175);
    }

    #[tokio::test]
    async fn tunables_are_clamped_and_published() {
        let sim = BoundedBufferSim::new(fast_config());
        sim.set_producer_delay_ms(10); // below the floor
        sim.set_consumer_delay_ms(60_000); // above the ceiling

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.producer_delay_ms, MIN_DELAY_MS);
        assert_eq!(snapshot.consumer_delay_ms, MAX_DELAY_MS);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let mut sim = BoundedBufferSim::new(BoundedBufferConfig {
            producers: 2,
            consumers: 2,
            ..fast_config()
        });
        sim.start();
        assert_eq!(sim.actor_count(), 4);
        sim.start();
        sim.start_producers();
        sim.start_consumers();
        assert_eq!(sim.actor_count(), 4);

        sim.stop().await;
        let once = sim.snapshot();
        assert_eq!(once.producer_status, SimStatus::Idle);
        assert_eq!(once.consumer_status, SimStatus::Idle);
        assert!(once.buffer.is_empty());
        assert!(once.consumed.is_empty());
        assert_eq!(once.stats, BufferStats::default());

        sim.stop().await;
        assert_eq!(sim.snapshot(), once);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ids_restart_from_zero_after_stop() {
        let mut sim = BoundedBufferSim::new(fast_config());
        sim.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        sim.stop().await;

        sim.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = sim.snapshot();
        sim.stop().await;

        let first = snapshot
            .consumed
            .first()
            .or_else(|| snapshot.buffer.first())
            .expect("no items after restart");
        assert_eq!(first.id, 0);
    }
}
