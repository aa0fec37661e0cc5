//! Unit Test: Interval Floor
//!
//! デーモン間隔の下限（900秒）をテスト

use isl_client_common::config::{effective_interval_secs, MINIMUM_INTERVAL_SECS};

#[test]
fn test_interval_below_floor_is_raised() {
    for configured in [0, 1, 60, 600, 899] {
        assert_eq!(
            effective_interval_secs(configured),
            MINIMUM_INTERVAL_SECS,
            "configured {}",
            configured
        );
    }
}

#[test]
fn test_interval_at_or_above_floor_is_kept() {
    for configured in [900, 901, 3600, 86_400] {
        assert_eq!(effective_interval_secs(configured), configured);
    }
}
