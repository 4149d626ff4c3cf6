// tests/retry_backoff.rs

use std::time::Duration;

use flowdag::recovery::RetryBackoff;

#[test]
fn exact_wait_times_without_jitter() {
    let backoff = RetryBackoff::new(1.0, 2.0, 10.0).with_jitter(false);

    assert_eq!(backoff.wait_time(0), 1.0);
    assert_eq!(backoff.wait_time(1), 2.0);
    assert_eq!(backoff.wait_time(2), 4.0);
    assert_eq!(backoff.wait_time(3), 8.0);
    assert_eq!(backoff.wait_time(10), 10.0);
}

#[test]
fn huge_retry_counts_are_capped() {
    let backoff = RetryBackoff::new(1.0, 2.0, 10.0).with_jitter(false);
    assert_eq!(backoff.wait_time(u32::MAX), 10.0);
    assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(10));
}

#[test]
fn jitter_stays_within_twenty_percent() {
    let backoff = RetryBackoff::new(1.0, 2.0, 10.0);
    for retry in 0..6 {
        let exact = RetryBackoff::new(1.0, 2.0, 10.0)
            .with_jitter(false)
            .wait_time(retry);
        for _ in 0..200 {
            let wait = backoff.wait_time(retry);
            assert!(wait >= 0.0);
            assert!(wait >= exact * 0.8 - 1e-9, "{wait} too small for {exact}");
            assert!(wait <= exact * 1.2 + 1e-9, "{wait} too large for {exact}");
        }
    }
}

#[test]
fn zero_initial_delay_never_waits() {
    let backoff = RetryBackoff::new(0.0, 2.0, 30.0);
    for retry in [0, 1, 5, 100, u32::MAX] {
        assert_eq!(backoff.wait_time(retry), 0.0);
    }
}

#[test]
fn defaults() {
    let backoff = RetryBackoff::default();
    assert_eq!(backoff.initial_delay_secs, 0.1);
    assert_eq!(backoff.base, 2.0);
    assert_eq!(backoff.max_delay_secs, 30.0);
    assert!(backoff.jitter);

    let exact = backoff.with_jitter(false);
    assert_eq!(exact.delay(0), Duration::from_millis(100));
}
