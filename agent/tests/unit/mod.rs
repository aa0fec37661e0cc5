//! Unit Tests

mod test_interval_floor;
mod test_unit_conversion;
