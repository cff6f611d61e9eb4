//! # Sleeping Barber Simulator
//!
//! One barber, a bounded waiting room and a stream of arriving customers.
//! Waiting-room chairs are guarded by a [`BoundedResourcePool`]; a customer
//! who finds the room full is rejected at arrival: logged and counted, never
//! entering any state machine. Admitted customers queue FIFO for the barber,
//! who sleeps while the queue is empty and cuts otherwise.
//!
//! Shutdown never touches the hand-off queue: the old channel is dropped and
//! a fresh one is built on the next start, so `stop()` cannot block no matter
//! what is queued.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::framework::{
    ActivityLog, CancelSignal, LogKind, Pacing, SimError, SimStatus, Simulation, TaskGroup,
};
use crate::primitives::BoundedResourcePool;
use serde::Serialize;

const ARRIVAL_MS: (u64, u64) = (1000, 3000);
const HAIRCUT_MS: (u64, u64) = (2000, 4000);

/// What the barber is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarberPhase {
    Sleeping,
    Cutting,
}

/// Lifecycle phase of an admitted customer. Rejected customers never get one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CustomerPhase {
    Waiting,
    Done,
}

/// One admitted customer as last published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSnapshot {
    pub id: u64,
    pub phase: CustomerPhase,
}

/// The barber as last published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarberSnapshot {
    pub phase: BarberPhase,
    pub current_customer: Option<u64>,
    pub total_haircuts: u64,
}

impl BarberSnapshot {
    fn initial() -> Self {
        Self {
            phase: BarberPhase::Sleeping,
            current_customer: None,
            total_haircuts: 0,
        }
    }
}

/// Full observable state of the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarberShopSnapshot {
    pub status: SimStatus,
    pub barber: BarberSnapshot,
    /// Every admitted customer of this run, in arrival order.
    pub customers: Vec<CustomerSnapshot>,
    /// Ids of customers currently occupying chairs.
    pub waiting_room: Vec<u64>,
    pub waiting_room_capacity: usize,
    pub rejected_total: u64,
    pub log: ActivityLog,
}

impl BarberShopSnapshot {
    fn initial(capacity: usize) -> Self {
        Self {
            status: SimStatus::Idle,
            barber: BarberSnapshot::initial(),
            customers: Vec::new(),
            waiting_room: Vec::new(),
            waiting_room_capacity: capacity,
            rejected_total: 0,
            log: ActivityLog::new(),
        }
    }
}

/// Capacity and pacing configuration.
#[derive(Debug, Clone)]
pub struct BarberShopConfig {
    pub waiting_room_capacity: usize,
    pub pacing: Pacing,
}

impl Default for BarberShopConfig {
    fn default() -> Self {
        Self {
            waiting_room_capacity: 5,
            pacing: Pacing::Random,
        }
    }
}

struct Shared {
    state: watch::Sender<BarberShopSnapshot>,
    /// Chairs. Rebuilt per run together with the hand-off queue.
    chairs: BoundedResourcePool,
}

impl Shared {
    /// Arrival decision. Takes a chair and records the customer, or rejects.
    ///
    /// The chair pool is the admission gate, so the waiting room can never
    /// exceed its capacity; the snapshot mutation that follows is the single
    /// exclusion region for the observable side.
    fn try_admit(&self, id: u64, queue: &mpsc::UnboundedSender<u64>) -> bool {
        if !self.chairs.try_acquire() {
            self.state.send_modify(|s| {
                s.rejected_total += 1;
                s.log.push(
                    LogKind::Error,
                    format!("Customer {id} left - waiting room full"),
                );
            });
            return false;
        }

        self.state.send_modify(|s| {
            s.customers.push(CustomerSnapshot {
                id,
                phase: CustomerPhase::Waiting,
            });
            s.waiting_room.push(id);
            s.log.push(
                LogKind::Info,
                format!("Customer {id} entered waiting room"),
            );
        });
        // An admitted customer is guaranteed a queue slot (unbounded), so
        // they are eventually served or the whole run is torn down.
        queue.send(id).is_ok()
    }

    fn barber_sleeps(&self) {
        self.state.send_modify(|s| {
            s.barber.phase = BarberPhase::Sleeping;
            s.barber.current_customer = None;
            s.log.push(LogKind::Info, "Barber is sleeping");
        });
    }

    /// Haircut starts; the counter increments on entering `Cutting`.
    fn haircut_starts(&self, id: u64) {
        self.state.send_modify(|s| {
            s.barber.phase = BarberPhase::Cutting;
            s.barber.current_customer = Some(id);
            s.barber.total_haircuts += 1;
            s.log.push(
                LogKind::Success,
                format!("Barber is cutting hair for Customer {id}"),
            );
        });
    }

    /// Haircut ends: chair freed, customer `Waiting → Done`, barber back to
    /// sleep, all in one update.
    fn haircut_done(&self, id: u64) -> Result<(), SimError> {
        self.state.send_modify(|s| {
            s.waiting_room.retain(|waiting| *waiting != id);
            if let Some(customer) = s.customers.iter_mut().find(|c| c.id == id) {
                customer.phase = CustomerPhase::Done;
            }
            s.barber.phase = BarberPhase::Sleeping;
            s.barber.current_customer = None;
            s.log.push(
                LogKind::Success,
                format!("Completed haircut for Customer {id}"),
            );
        });
        self.chairs.release()?;
        Ok(())
    }

    fn fail(&self, role: &str, error: &SimError) {
        warn!(role, %error, "Actor loop failed");
        self.state.send_modify(|s| {
            s.status = SimStatus::Error(error.to_string());
            s.log
                .push(LogKind::Error, format!("{role} failed: {error}"));
        });
    }
}

/// The sleeping barber simulator.
pub struct BarberShopSim {
    config: BarberShopConfig,
    shared: Arc<Shared>,
    group: Option<TaskGroup>,
}

impl BarberShopSim {
    pub fn new(config: BarberShopConfig) -> Self {
        let (state, _) = watch::channel(BarberShopSnapshot::initial(config.waiting_room_capacity));
        let chairs = BoundedResourcePool::new(config.waiting_room_capacity);
        Self {
            config,
            shared: Arc::new(Shared { state, chairs }),
            group: None,
        }
    }

    pub fn snapshot(&self) -> BarberShopSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BarberShopSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn actor_count(&self) -> usize {
        self.group.as_ref().map_or(0, TaskGroup::len)
    }
}

impl Default for BarberShopSim {
    fn default() -> Self {
        Self::new(BarberShopConfig::default())
    }
}

#[async_trait::async_trait]
impl Simulation for BarberShopSim {
    fn name(&self) -> &'static str {
        "sleeping-barber"
    }

    fn start(&mut self) {
        if self.group.is_some() {
            debug!(sim = self.name(), "Already running");
            return;
        }
        info!(
            sim = self.name(),
            capacity = self.config.waiting_room_capacity,
            "Starting"
        );

        let mut group = TaskGroup::new();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<u64>();
        let capacity = self.config.waiting_room_capacity;
        self.shared.state.send_modify(|s| {
            *s = BarberShopSnapshot::initial(capacity);
            s.status = SimStatus::Running;
        });
        // Free any chairs left taken by a previous run.
        while self.shared.chairs.release().is_ok() {}

        {
            let shared = self.shared.clone();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(generator_loop(shared, queue_tx, pacing, signal));
        }
        {
            let shared = self.shared.clone();
            let pacing = self.config.pacing;
            let signal = group.signal();
            group.spawn(async move {
                if let Err(e) = barber_loop(&shared, queue_rx, pacing, signal).await {
                    shared.fail("Barber", &e);
                }
            });
        }

        self.group = Some(group);
    }

    async fn stop(&mut self) {
        let Some(group) = self.group.take() else {
            debug!(sim = self.name(), "Already stopped");
            return;
        };
        // The queue receiver lives inside the barber loop and is dropped with
        // it; no draining, so shutdown cannot block on queue state.
        group.shutdown().await;
        let capacity = self.config.waiting_room_capacity;
        while self.shared.chairs.release().is_ok() {}
        self.shared
            .state
            .send_modify(|s| *s = BarberShopSnapshot::initial(capacity));
        info!(sim = self.name(), "Stopped");
    }

    fn is_running(&self) -> bool {
        self.group.is_some()
    }
}

async fn generator_loop(
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<u64>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) {
    let mut next_id: u64 = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pacing.rest(ARRIVAL_MS.0, ARRIVAL_MS.1) => {}
        }
        next_id += 1;
        shared.try_admit(next_id, &queue);
    }
}

async fn barber_loop(
    shared: &Shared,
    mut queue: mpsc::UnboundedReceiver<u64>,
    pacing: Pacing,
    mut cancel: CancelSignal,
) -> Result<(), SimError> {
    loop {
        // Sleep only when nobody is waiting, then block on the queue.
        let customer = match queue.try_recv() {
            Ok(id) => id,
            Err(mpsc::error::TryRecvError::Empty) => {
                shared.barber_sleeps();
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    received = queue.recv() => match received {
                        Some(id) => id,
                        None => return Err(SimError::ChannelClosed("barber hand-off")),
                    },
                }
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(SimError::ChannelClosed("barber hand-off"));
            }
        };

        shared.haircut_starts(customer);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = pacing.rest(HAIRCUT_MS.0, HAIRCUT_MS.1) => {}
        }
        shared.haircut_done(customer)?;
    }
}
