use crate::Backoff;
use crate::tests::no_jitter_backoff;

use std::time::Duration;

use googletest::assert_that;
use googletest::prelude::{eq, ge, le};
use wd_config::RecoveryConfig;

#[test]
fn given_consecutive_failures_when_delay_then_grows_exponentially() {
    let backoff = no_jitter_backoff();

    assert_that!(backoff.delay(1), eq(Duration::from_secs(1)));
    assert_that!(backoff.delay(2), eq(Duration::from_secs(2)));
    assert_that!(backoff.delay(3), eq(Duration::from_secs(4)));
}

#[test]
fn given_many_failures_when_delay_then_capped_at_max() {
    let backoff = no_jitter_backoff();

    assert_that!(backoff.delay(6), eq(Duration::from_secs(30)));
    assert_that!(backoff.delay(u32::MAX), eq(Duration::from_secs(30)));
}

#[test]
fn given_jitter_when_delay_then_within_half_to_one_and_a_half() {
    let backoff = Backoff {
        jitter: true,
        ..no_jitter_backoff()
    };

    for _ in 0..100 {
        let delay = backoff.delay(2);
        assert_that!(delay, ge(Duration::from_secs(1)));
        assert_that!(delay, le(Duration::from_secs(3)));
    }
}

#[test]
fn given_recovery_config_when_from_config_then_fields_mapped() {
    let recovery = RecoveryConfig {
        initial_backoff_ms: 250,
        max_backoff_ms: 4_000,
        backoff_multiplier: 3.0,
        jitter: false,
        ..RecoveryConfig::default()
    };

    let backoff = Backoff::from_config(&recovery);

    assert_that!(backoff.initial, eq(Duration::from_millis(250)));
    assert_that!(backoff.max, eq(Duration::from_millis(4_000)));
    assert_that!(backoff.delay(2), eq(Duration::from_millis(750)));
}
