// ABOUTME: Property tests for bounded polling.
// ABOUTME: No probe starts or runs past the timeout, and an unanswered poll uses exactly its budget.

use ephemeron::wait::{Clock, ManualClock, PollOutcome, PollPolicy, TokioClock, poll_until};
use futures::executor::block_on;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn unanswered_poll_spends_exactly_its_timeout(interval_ms in 1u64..10_000, timeout_ms in 1u64..120_000) {
        let clock = ManualClock::new();
        let policy = PollPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        );

        let outcome: PollOutcome<()> = block_on(poll_until(&clock, policy, |_| async { None }));

        prop_assert_eq!(clock.now(), policy.timeout);
        prop_assert_eq!(u64::from(outcome.attempts()), timeout_ms.div_ceil(interval_ms));
        prop_assert!(clock.sleeps().iter().all(|s| *s <= policy.interval));
    }

    #[test]
    fn probes_never_run_past_the_deadline(
        interval_ms in 1u64..5_000,
        timeout_ms in 1u64..60_000,
        probe_ms in 0u64..10_000,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let policy = PollPolicy::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        );

        let (starts, outcome, finished) = runtime.block_on(async {
            let clock = TokioClock::new();
            let starts = Mutex::new(Vec::new());
            let outcome: PollOutcome<()> = poll_until(&clock, policy, |_| {
                starts.lock().push(clock.now());
                async move {
                    tokio::time::sleep(Duration::from_millis(probe_ms)).await;
                    None
                }
            })
            .await;
            (starts.into_inner(), outcome, clock.now())
        });

        prop_assert_eq!(starts.len() as u32, outcome.attempts());
        prop_assert!(starts.iter().all(|t| *t < policy.timeout));
        prop_assert!(finished <= policy.timeout, "finished at {:?}", finished);
    }

    #[test]
    fn ready_probe_stops_polling(ready_on in 1u32..20) {
        let clock = ManualClock::new();
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(60));

        let outcome = block_on(poll_until(&clock, policy, |attempt| async move {
            (attempt == ready_on).then_some(attempt)
        }));

        prop_assert_eq!(outcome, PollOutcome::Ready { value: ready_on, attempts: ready_on });
        prop_assert_eq!(clock.sleeps().len() as u32, ready_on - 1);
    }
}
