//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fakes;
pub mod harness;

#[allow(unused_imports)]
pub use fakes::{Behavior, FakeMuxer, FakeRetriever, FakeSink, SinkEvent};
#[allow(unused_imports)]
pub use harness::Harness;
