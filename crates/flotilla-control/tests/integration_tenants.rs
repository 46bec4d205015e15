//! Integration tests for tenant provisioning across consortiums.

#![allow(clippy::unwrap_used)]

mod common;

use common::fixtures::ConfigBuilder;
use common::TestPlatform;
use flotilla_control::clients::ManagementService;
use flotilla_control::Token;

#[tokio::test]
async fn central_tenant_is_processed_before_member() {
    let config = ConfigBuilder::new()
        .consortium_tenant("university", "alpha", false)
        .consortium_tenant("alpha-hub", "alpha", true)
        .role("admin")
        .build();
    let test = TestPlatform::new(config, Vec::new());

    // The member already exists, so the service lists it first.
    test.management
        .create_tenant(&Token::new("t"), "university", "alpha-member")
        .await
        .unwrap();

    let created = test.platform.create_tenants().await.unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "alpha-hub");
    assert_eq!(created[0].description, "alpha-central");

    test.platform.create_roles().await.unwrap();
    assert_eq!(
        test.identity_actions(),
        vec!["create-roles:alpha-hub:admin", "create-roles:university:admin"]
    );
}

#[tokio::test]
async fn every_consortium_runs_central_first() {
    let config = ConfigBuilder::new()
        .consortium_tenant("a-member", "alpha", false)
        .consortium_tenant("a-central", "alpha", true)
        .consortium_tenant("b-member", "beta", false)
        .consortium_tenant("b-central", "beta", true)
        .tenant("standalone")
        .build();
    let test = TestPlatform::new(config, Vec::new());

    test.platform.create_tenants().await.unwrap();
    test.platform.create_tenant_entitlements().await.unwrap();

    let entitled: Vec<String> = test
        .management
        .calls()
        .unwrap()
        .into_iter()
        .filter_map(|call| call.strip_prefix("entitle:").map(str::to_owned))
        .map(|call| call.split(':').next().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(
        entitled,
        vec!["a-central", "a-member", "b-central", "b-member", "standalone"]
    );
}

#[tokio::test]
async fn unconfigured_live_tenants_are_left_alone() {
    let config = ConfigBuilder::new().tenant("diku").build();
    let test = TestPlatform::new(config, Vec::new());
    test.management
        .create_tenant(&Token::new("t"), "someone-else", "none-default")
        .await
        .unwrap();

    test.platform.create_tenants().await.unwrap();
    test.platform.remove_tenants().await.unwrap();

    let remaining: Vec<String> = test
        .management
        .tenants()
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(remaining, vec!["someone-else"]);
}

#[tokio::test]
async fn removal_runs_members_before_central() {
    let config = ConfigBuilder::new()
        .consortium_tenant("central", "alpha", true)
        .consortium_tenant("member", "alpha", false)
        .build();
    let test = TestPlatform::new(config, Vec::new());

    test.platform.create_tenants().await.unwrap();
    test.platform.remove_tenants().await.unwrap();

    let removed: Vec<String> = test
        .management
        .calls()
        .unwrap()
        .into_iter()
        .filter(|call| call.starts_with("remove-tenant:"))
        .collect();
    assert_eq!(removed, vec!["remove-tenant:member", "remove-tenant:central"]);
}

#[tokio::test]
async fn realm_lifespan_is_updated_after_creation() {
    let mut config = ConfigBuilder::new().tenant("diku").build();
    config.identity.access_token_lifespan_secs = Some(3600);
    let test = TestPlatform::new(config, Vec::new());

    test.platform.create_tenants().await.unwrap();

    assert_eq!(test.identity_actions(), vec!["lifespan:diku:3600"]);
}

#[tokio::test]
async fn failing_tenant_aborts_remaining_tenants() {
    let config = ConfigBuilder::new()
        .tenant("a")
        .tenant("b")
        .role("admin")
        .build();
    let test = TestPlatform::new(config, Vec::new());
    test.platform.create_tenants().await.unwrap();
    test.identity.fail_tenant("a").unwrap();

    assert!(test.platform.create_roles().await.is_err());
    assert!(test.identity_actions().is_empty());
}
