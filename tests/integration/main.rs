//! Integration tests

mod e2e_test;
mod execution_test;
mod market_data_test;
mod scavenger_test;
mod support;
