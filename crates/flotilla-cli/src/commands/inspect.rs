//! Read-only commands.

use flotilla_control::deployment::{LABEL_KIND, LABEL_MODULE};
use flotilla_control::{ModuleKind, Platform};

pub async fn list_modules(platform: &Platform, kind: Option<ModuleKind>) -> anyhow::Result<()> {
    let containers = platform.list_modules(kind).await?;
    if containers.is_empty() {
        println!("No containers deployed");
        return Ok(());
    }

    println!("{:<48} {:<12} {:<32} {}", "NAME", "KIND", "MODULE", "STATE");
    for container in containers {
        println!(
            "{:<48} {:<12} {:<32} {}",
            container.name,
            container.label(LABEL_KIND).unwrap_or("-"),
            container.label(LABEL_MODULE).unwrap_or("-"),
            container.state,
        );
    }
    Ok(())
}

pub async fn vault_root_token(platform: &Platform) -> anyhow::Result<()> {
    let token = platform.vault_root_token().await?;
    println!("{}", token.expose());
    Ok(())
}
