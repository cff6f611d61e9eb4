use std::time::Duration;

use sync_sim::barber::CustomerPhase;
use sync_sim::framework::{Pacing, SimStatus, Simulation};
use sync_sim::lifecycle::SimSuite;

fn fast_pacing() -> Pacing {
    Pacing::Fixed(Duration::from_millis(1))
}

/// Full suite running concurrently: every simulator makes progress on its
/// own, none interferes with another, and collective shutdown resets all of
/// them.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_full_suite_runs_and_shuts_down() {
    let mut suite = SimSuite::new(fast_pacing());
    suite.start_all();

    for sim in suite.simulations() {
        assert!(sim.is_running(), "{} did not start", sim.name());
    }

    // Let every simulator turn over a few cycles.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let buffer = suite.bounded_buffer.snapshot();
        let messages = suite.message_passing.snapshot();
        let rw = suite.readers_writers.snapshot();
        let dining = suite.dining.snapshot();
        let barber = suite.barber.snapshot();

        let all_progressed = buffer.stats.total_consumed > 0
            && messages.messages.iter().any(|m| {
                m.status == sync_sim::message_passing::MessageStatus::Processed
            })
            && rw.writers.iter().map(|w| w.write_count).sum::<u64>() > 0
            && dining.philosophers.iter().any(|p| p.meals_eaten > 0)
            && barber.barber.total_haircuts > 0;
        if all_progressed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "a simulator stalled: buffer={:?} rw_writes={:?} meals={:?} haircuts={}",
            buffer.stats,
            rw.writers,
            dining.philosophers,
            barber.barber.total_haircuts
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    suite.shutdown().await;
    for sim in suite.simulations() {
        assert!(!sim.is_running(), "{} still running", sim.name());
    }

    // Everything is back at its initial state.
    assert!(suite.bounded_buffer.snapshot().buffer.is_empty());
    assert_eq!(suite.bounded_buffer.snapshot().stats.total_produced, 0);
    assert!(suite.message_passing.snapshot().messages.is_empty());
    assert_eq!(suite.readers_writers.snapshot().shared_value, "");
    assert!(suite
        .dining
        .snapshot()
        .philosophers
        .iter()
        .all(|p| p.meals_eaten == 0));
    assert_eq!(suite.barber.snapshot().barber.total_haircuts, 0);
}

/// Simulators are independent: stopping one leaves the others running.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulators_start_and_stop_independently() {
    let mut suite = SimSuite::new(fast_pacing());
    suite.dining.start();
    suite.barber.start();
    assert!(suite.dining.is_running());
    assert!(suite.barber.is_running());
    assert!(!suite.readers_writers.is_running());

    suite.dining.stop().await;
    assert!(!suite.dining.is_running());
    assert!(suite.barber.is_running(), "stopping dining affected barber");

    suite.shutdown().await;
}

/// The suite restarts cleanly: a stop/start cycle begins from a clean slate
/// with the same actor populations.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_begins_from_a_clean_slate() {
    let mut suite = SimSuite::new(fast_pacing());
    suite.start_all();
    tokio::time::sleep(Duration::from_millis(50)).await;
    suite.shutdown().await;

    suite.start_all();
    let dining = suite.dining.snapshot();
    assert_eq!(dining.status, SimStatus::Running);
    assert_eq!(dining.forks, vec![true; 5]);

    // Second start while running changes nothing.
    let population = suite.dining.actor_count();
    suite.start_all();
    assert_eq!(suite.dining.actor_count(), population);

    suite.shutdown().await;
}

/// End-to-end sleeping-barber flow through the public surface: admitted
/// customers finish, and the log records the shop's activity.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_barber_serves_customers_end_to_end() {
    let mut suite = SimSuite::new(fast_pacing());
    suite.barber.start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = suite.barber.snapshot();
        if snapshot
            .customers
            .iter()
            .any(|c| c.phase == CustomerPhase::Done)
        {
            assert!(snapshot.barber.total_haircuts > 0);
            assert!(snapshot
                .log
                .entries()
                .any(|e| e.message.starts_with("Completed haircut")));
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no customer was ever served"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    suite.shutdown().await;
}

/// Snapshot subscribers observe transitions without reaching into the
/// engine: a watch receiver sees the running state appear.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subscribers_observe_published_snapshots() {
    let mut suite = SimSuite::new(fast_pacing());
    let mut updates = suite.readers_writers.subscribe();

    suite.readers_writers.start();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        updates.changed().await.expect("publisher dropped");
        let seen = updates.borrow_and_update().clone();
        if seen.status == SimStatus::Running {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
    }

    suite.shutdown().await;
}
