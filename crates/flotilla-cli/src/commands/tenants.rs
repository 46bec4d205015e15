//! Tenant provisioning commands.

use anyhow::Context;
use flotilla_control::Platform;

pub async fn create(platform: &Platform) -> anyhow::Result<()> {
    let created = platform
        .create_tenants()
        .await
        .context("failed to create tenants")?;

    for tenant in &created {
        println!("Created tenant {} ({})", tenant.name, tenant.description);
    }
    if created.is_empty() {
        println!("All tenants already exist");
    }
    Ok(())
}

pub async fn remove(platform: &Platform) -> anyhow::Result<()> {
    platform
        .remove_tenants()
        .await
        .context("failed to remove tenants")
}

pub async fn entitle(platform: &Platform) -> anyhow::Result<()> {
    platform
        .create_tenant_entitlements()
        .await
        .context("failed to create entitlements")
}

pub async fn revoke(platform: &Platform) -> anyhow::Result<()> {
    platform
        .remove_tenant_entitlements()
        .await
        .context("failed to remove entitlements")
}

pub async fn create_roles(platform: &Platform) -> anyhow::Result<()> {
    platform
        .create_roles()
        .await
        .context("failed to create roles")
}

pub async fn remove_roles(platform: &Platform) -> anyhow::Result<()> {
    platform
        .remove_roles()
        .await
        .context("failed to remove roles")
}

pub async fn create_users(platform: &Platform) -> anyhow::Result<()> {
    platform
        .create_users()
        .await
        .context("failed to create users")
}

pub async fn attach_capability_sets(platform: &Platform) -> anyhow::Result<()> {
    platform
        .attach_capability_sets()
        .await
        .context("failed to attach capability sets")
}

pub async fn detach_capability_sets(platform: &Platform) -> anyhow::Result<()> {
    platform
        .detach_capability_sets()
        .await
        .context("failed to detach capability sets")
}
