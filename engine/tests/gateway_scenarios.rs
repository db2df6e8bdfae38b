use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use engine::{DocumentSchema, FinishedOperation, IndexGateway, InjectedFault, Observer, Settings};

fn counting_observer() -> (Arc<Observer>, Arc<AtomicU64>, Arc<AtomicU64>) {
    let succeeded = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicU64::new(0));
    let s = succeeded.clone();
    let f = failed.clone();
    let observer: Arc<Observer> = Arc::new(move |finished: FinishedOperation| {
        if finished.succeeded {
            s.fetch_add(1, Ordering::SeqCst);
        } else {
            f.fetch_add(1, Ordering::SeqCst);
        }
    });
    (observer, succeeded, failed)
}

/// Polls `counter` until it reaches at least `target`, failing the test if
/// it doesn't get there before the deadline. The worker processes on its own
/// thread with a pacing sleep between waves, so tests have to wait for
/// completion events rather than assuming synchronous execution.
fn wait_for(counter: &AtomicU64, target: u64, what: &str) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
    loop {
        if counter.load(Ordering::SeqCst) >= target {
            return;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        thread::sleep(std::time::Duration::from_millis(50));
    }
}

/// Scenario 2 (§8): a shutdown dropping most of a large backlog is expected
/// behavior, not a bug. Enqueueing far more than the shutdown drain bound and
/// calling `stop()` immediately must execute at most `SHUTDOWN_DRAIN_BOUND`.
#[test]
fn shutdown_drops_backlog_beyond_the_drain_bound() {
    let (observer, succeeded, failed) = counting_observer();
    let settings = Settings::in_memory("en-US");
    let mut gateway = IndexGateway::start(
        "scenario-2",
        &settings,
        DocumentSchema::default_schema(),
        observer,
    )
    .unwrap();

    for i in 0..500 {
        let doc = DocumentSchema::default_schema().make_document(&format!("item-{}", i), "body");
        gateway.add(doc, None);
    }

    // Stop immediately: the worker may already be mid-wave in the
    // background, or may not have woken at all, so the exact count depends
    // on that race. Either way shutdown must not drain the entire backlog —
    // that's the bounded, documented loss the shutdown drain bound exists
    // for.
    gateway.stop();

    let executed = succeeded.load(Ordering::SeqCst) + failed.load(Ordering::SeqCst);
    assert!(
        executed < 500,
        "expected shutdown to drop part of the backlog, but all {} ran",
        executed
    );
}

/// Scenario 3 (§8): an injected not-found error on a write-side call must
/// drive a reset rather than propagate out of the worker or wedge it.
#[test]
fn corruption_recovery_resets_and_then_accepts_writes_again() {
    let (observer, succeeded, failed) = counting_observer();
    let settings = Settings::in_memory("en-US");
    let gateway = IndexGateway::start(
        "scenario-3",
        &settings,
        DocumentSchema::default_schema(),
        observer,
    )
    .unwrap();

    gateway.inject_fault(Some(InjectedFault::NotFound));

    let doc = DocumentSchema::default_schema().make_document("item-1", "body");
    gateway.add(doc.clone(), None);

    wait_for(&failed, 1, "the injected fault to be observed as a failure");

    // The failed add drove a reset; a fresh add afterward must succeed and
    // become visible.
    gateway.add(doc, None);
    wait_for(&succeeded, 1, "the follow-up add to succeed after reset");

    gateway.flush(false);
    assert_eq!(gateway.num_documents().unwrap(), 1);
}

/// Scenario 6 (§8): 8 producer threads hammering the same gateway must not
/// lose operations or let a panic escape past the merge-thread boundary.
#[test]
fn eight_thread_contention_smoke_test() {
    let (observer, succeeded, failed) = counting_observer();
    let settings = Settings::in_memory("en-US");
    let gateway = Arc::new(
        IndexGateway::start(
            "scenario-6",
            &settings,
            DocumentSchema::default_schema(),
            observer,
        )
        .unwrap(),
    );

    let schema = DocumentSchema::default_schema();
    let mut handles = Vec::new();
    for t in 0..8 {
        let gateway = gateway.clone();
        let schema = schema.clone();
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                let doc = schema.make_document(&format!("t{}-item-{}", t, i), "body");
                gateway.add(doc, None);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("producer thread panicked");
    }

    // The worker drains in the background on its own pacing cycle (a sleep
    // between every wave), so catching up to an 8000-deep backlog takes
    // several waves; wait generously rather than racing a bounded shutdown
    // drain against it.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(180);
    loop {
        let executed = succeeded.load(Ordering::SeqCst) + failed.load(Ordering::SeqCst);
        if executed >= 8000 {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "worker did not drain the full backlog in time (executed {})",
            executed
        );
        thread::sleep(std::time::Duration::from_millis(50));
    }

    gateway.flush(false);

    let executed = succeeded.load(Ordering::SeqCst) + failed.load(Ordering::SeqCst);
    assert_eq!(executed, 8000, "every enqueued operation must be accounted for");
    assert_eq!(failed.load(Ordering::SeqCst), 0, "no operation should fail in this scenario");
    assert_eq!(gateway.num_documents().unwrap(), 8000);
}
