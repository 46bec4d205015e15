//! Integration tests for capability-set attachment.

#![allow(clippy::unwrap_used)]

mod common;

use common::fixtures::ConfigBuilder;
use common::TestPlatform;
use flotilla_control::clients::{ConsumerGroupState, ScriptedBroker};
use flotilla_control::ControlError;
use std::time::Duration;
use tokio::time::Instant;

const BUSY: ConsumerGroupState = ConsumerGroupState {
    member_count: 2,
    rebalancing: false,
};

const IDLE: ConsumerGroupState = ConsumerGroupState {
    member_count: 0,
    rebalancing: false,
};

fn config() -> ConfigBuilder {
    ConfigBuilder::new().tenant("diku").role("admin")
}

#[tokio::test(start_paused = true)]
async fn attaches_only_after_quiescence() {
    let test = TestPlatform::builder(config().build(), Vec::new())
        .with_broker(ScriptedBroker::new([BUSY, BUSY, BUSY, IDLE]))
        .build();
    test.platform.create_tenants().await.unwrap();

    let started = Instant::now();
    test.platform.attach_capability_sets().await.unwrap();

    assert_eq!(test.broker.polls().unwrap(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(test.identity_actions(), vec!["attach:diku:admin"]);
}

#[tokio::test(start_paused = true)]
async fn never_attaches_to_a_busy_platform() {
    let mut config = config().build();
    config.saga.timeout_secs = 60;
    let test = TestPlatform::builder(config, Vec::new())
        .with_broker(ScriptedBroker::new([BUSY]))
        .build();
    test.platform.create_tenants().await.unwrap();

    let err = test.platform.attach_capability_sets().await.unwrap_err();

    assert!(matches!(err, ControlError::SagaTimeout { .. }));
    assert!(test.identity_actions().is_empty());
}

#[tokio::test]
async fn detach_still_needs_a_tenant_token() {
    let test = TestPlatform::new(config().build(), Vec::new());
    test.platform.create_tenants().await.unwrap();
    test.identity.fail_tenant("diku").unwrap();

    // Detach failures are swallowed, a failed token request is not.
    assert!(test.platform.detach_capability_sets().await.is_err());
}

#[tokio::test]
async fn detach_reaches_every_tenant() {
    let config = ConfigBuilder::new()
        .tenant("a")
        .tenant("b")
        .role("admin")
        .build();
    let test = TestPlatform::new(config, Vec::new());
    test.platform.create_tenants().await.unwrap();

    test.platform.detach_capability_sets().await.unwrap();

    assert_eq!(
        test.identity_actions(),
        vec!["detach:a:admin", "detach:b:admin"]
    );
}
