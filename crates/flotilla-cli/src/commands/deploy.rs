//! Deployment commands.

use std::collections::BTreeMap;

use anyhow::Context;
use flotilla_control::{ModulePorts, Platform};

fn print_ports(title: &str, ports: &BTreeMap<String, ModulePorts>) {
    if ports.is_empty() {
        return;
    }
    println!("{title}:");
    for (module, ports) in ports {
        match ports.sidecar {
            Some(sidecar) => println!("  {module:<40} {} (sidecar {sidecar})", ports.module),
            None => println!("  {module:<40} {}", ports.module),
        }
    }
}

pub async fn application(platform: &Platform) -> anyhow::Result<()> {
    let report = platform
        .deploy_application()
        .await
        .context("application deployment failed")?;

    print_ports("Management modules", &report.management);
    print_ports("Business modules", &report.business);
    Ok(())
}

pub async fn undeploy_application(platform: &Platform) -> anyhow::Result<()> {
    platform
        .remove_tenant_entitlements()
        .await
        .context("failed to remove entitlements")?;
    platform
        .remove_tenants()
        .await
        .context("failed to remove tenants")?;
    undeploy_modules(platform).await?;
    undeploy_management(platform).await
}

pub async fn management(platform: &Platform) -> anyhow::Result<()> {
    let ports = platform
        .deploy_management()
        .await
        .context("management deployment failed")?;
    print_ports("Management modules", &ports);
    Ok(())
}

pub async fn modules(platform: &Platform) -> anyhow::Result<()> {
    let ports = platform
        .deploy_modules()
        .await
        .context("module deployment failed")?;
    print_ports("Business modules", &ports);
    Ok(())
}

pub async fn undeploy_management(platform: &Platform) -> anyhow::Result<()> {
    let removed = platform.undeploy_management().await?;
    println!("Removed {} management containers", removed.len());
    Ok(())
}

pub async fn undeploy_modules(platform: &Platform) -> anyhow::Result<()> {
    let removed = platform.undeploy_modules().await?;
    println!("Removed {} module containers", removed.len());
    Ok(())
}
