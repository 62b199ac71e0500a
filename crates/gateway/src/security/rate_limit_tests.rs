use std::time::Duration;

use super::*;

fn config(algorithm: RateLimitAlgorithm, limit: u64, window_ms: u64) -> RateLimiterConfig {
    RateLimiterConfig { algorithm, limit, window: Duration::from_millis(window_ms), soft_block_timeout: Duration::from_millis(500) }
}

#[test]
fn fixed_window_allows_exactly_limit_per_window() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::FixedWindow, 3, 100));
    for _ in 0..3 {
        assert!(limiter.check("a").allowed);
    }
    assert!(!limiter.check("a").allowed);
}

#[test]
fn token_bucket_denies_once_exhausted_then_refills() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::TokenBucket, 2, 100));
    assert!(limiter.check("a").allowed);
    assert!(limiter.check("a").allowed);
    assert!(!limiter.check("a").allowed);
    std::thread::sleep(Duration::from_millis(120));
    assert!(limiter.check("a").allowed);
}

#[test]
fn independent_keys_have_independent_counters() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::FixedWindow, 1, 1000));
    assert!(limiter.check("a").allowed);
    assert!(limiter.check("b").allowed);
    assert!(!limiter.check("a").allowed);
}

#[test]
fn soft_block_triggers_past_one_point_five_times_limit() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::FixedWindow, 2, 100_000));
    for _ in 0..4 {
        limiter.check("a");
    }
    let check = limiter.check("a");
    assert!(!check.allowed);
    assert!(check.retry_after_s >= 1);
}

#[test]
fn token_bucket_soft_blocks_once_overrun_exceeds_one_point_five_times_limit() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::TokenBucket, 2, 100_000));
    for _ in 0..5 {
        limiter.check("a");
    }
    let check = limiter.check("a");
    assert!(!check.allowed);
    assert!(check.retry_after_s >= 1);
}

#[test]
fn reset_clears_soft_block() {
    let limiter = RateLimiter::new(config(RateLimitAlgorithm::FixedWindow, 1, 100_000));
    for _ in 0..4 {
        limiter.check("a");
    }
    limiter.reset("a");
    assert!(limiter.check("a").allowed);
}
