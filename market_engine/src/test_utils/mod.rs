//! Helpers for tests that need a real database or a scripted payment gateway. Enabled with the `test_utils` feature.
pub mod prepare_env;
mod stub_gateway;

pub use stub_gateway::StubGateway;
