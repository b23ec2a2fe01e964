//! Integration and property tests for harel
//!
//! This crate contains the heavier test suites: async scenarios driven on
//! tokio, end-to-end machines ported from real applications, and property
//! tests over generated event sequences.

#![cfg(test)]

pub mod async_tests;
pub mod integration;

/// Common test utilities and fixtures
pub mod common {
    use std::sync::Arc;

    use harel_core::prelude::*;

    /// Setup tracing for tests
    pub fn setup_tracing() {
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct TestContext {
        pub count: i64,
        pub log: Vec<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestEvent(pub &'static str);

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            self.0
        }
    }

    pub struct TestTypes;

    impl MachineTypes for TestTypes {
        type Context = TestContext;
        type Event = TestEvent;
        type Output = String;
    }

    /// A three-state traffic light used by several suites.
    pub fn traffic_light() -> Arc<MachineDef> {
        let mut builder = MachineBuilder::new("trafficLight");
        let root = builder.root();
        let red = builder.state(root, "red");
        let green = builder.state(root, "green");
        let yellow = builder.state(root, "yellow");
        builder.initial(root, red);
        builder.on(red, "NEXT").target(green);
        builder.on(green, "NEXT").target(yellow);
        builder.on(yellow, "NEXT").target(red);
        Arc::new(builder.build().expect("definition is valid"))
    }
}
