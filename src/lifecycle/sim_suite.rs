use tracing::info;

use crate::barber::BarberShopSim;
use crate::bounded_buffer::BoundedBufferSim;
use crate::dining::DiningSim;
use crate::framework::{Pacing, Simulation};
use crate::message_passing::MessagePassingSim;
use crate::readers_writers::ReadersWritersSim;

/// The suite of all five simulators.
///
/// `SimSuite` is the wiring point for an embedding application: it builds one
/// instance of every simulator with a common pacing policy and offers
/// collective teardown. The simulators stay fully independent: none reads
/// another's state, and each can be started and stopped on its own through
/// its public field.
///
/// # Example
///
/// ```ignore
/// let mut suite = SimSuite::new(Pacing::Random);
///
/// suite.dining.start();
/// suite.barber.start();
/// // ... observe snapshots ...
/// suite.shutdown().await;
/// ```
pub struct SimSuite {
    pub bounded_buffer: BoundedBufferSim,
    pub message_passing: MessagePassingSim,
    pub readers_writers: ReadersWritersSim,
    pub dining: DiningSim,
    pub barber: BarberShopSim,
}

impl SimSuite {
    /// Builds every simulator with its default configuration and the given
    /// pacing policy.
    pub fn new(pacing: Pacing) -> Self {
        Self {
            bounded_buffer: BoundedBufferSim::new(crate::bounded_buffer::BoundedBufferConfig {
                pacing,
                ..Default::default()
            }),
            message_passing: MessagePassingSim::new(
                crate::message_passing::MessagePassingConfig { pacing },
            ),
            readers_writers: ReadersWritersSim::new(
                crate::readers_writers::ReadersWritersConfig {
                    pacing,
                    ..Default::default()
                },
            ),
            dining: DiningSim::new(crate::dining::DiningConfig {
                pacing,
                ..Default::default()
            }),
            barber: BarberShopSim::new(crate::barber::BarberShopConfig {
                pacing,
                ..Default::default()
            }),
        }
    }

    /// Starts every simulator. Already-running ones are left alone.
    pub fn start_all(&mut self) {
        for sim in self.simulations() {
            sim.start();
        }
    }

    /// Stops every simulator, awaiting full teardown of each.
    ///
    /// Unlike a drop-based shutdown, this guarantees that no actor loop is
    /// still running when it returns and that every snapshot is back at its
    /// initial value.
    pub async fn shutdown(&mut self) {
        info!("Shutting down simulator suite...");
        for sim in self.simulations() {
            sim.stop().await;
        }
        info!("Suite shutdown complete.");
    }

    /// All simulators behind the uniform [`Simulation`] surface.
    pub fn simulations(&mut self) -> [&mut dyn Simulation; 5] {
        [
            &mut self.bounded_buffer,
            &mut self.message_passing,
            &mut self.readers_writers,
            &mut self.dining,
            &mut self.barber,
        ]
    }
}

impl Default for SimSuite {
    fn default() -> Self {
        Self::new(Pacing::Random)
    }
}
