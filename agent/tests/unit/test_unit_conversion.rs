//! Unit Test: Bandwidth Unit Conversion
//!
//! バイト/秒 → Mbit/秒 の変換をテスト

use isl_client_common::protocol::{bytes_to_mbit, BYTES_TO_MBIT};

#[test]
fn test_known_bandwidths() {
    assert_eq!(bytes_to_mbit(125_000_000.0), 1000.0);
    assert_eq!(bytes_to_mbit(62_500_000.0), 500.0);
    assert_eq!(bytes_to_mbit(12_500_000.0), 100.0);
    assert_eq!(bytes_to_mbit(0.0), 0.0);
}

#[test]
fn test_conversion_factor_is_applied_directly() {
    for bandwidth in [1.0, 3_333_333.0, 97_654_321.0] {
        assert_eq!(bytes_to_mbit(bandwidth), bandwidth * BYTES_TO_MBIT);
    }
}
