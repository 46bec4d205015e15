//! Flotilla CLI - bring up and tear down multi-tenant platform deployments.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use flotilla_control::ModuleKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Bring up and tear down multi-tenant platform deployments")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "FLOTILLA_CONFIG", default_value = "flotilla.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy every module and provision tenants, roles and users
    DeployApplication,

    /// Remove entitlements, tenants and every container
    UndeployApplication,

    /// Deploy the management modules
    DeployManagement,

    /// Remove the management containers
    UndeployManagement,

    /// Deploy the business modules and their sidecars
    DeployModules,

    /// Remove the business module and sidecar containers
    UndeployModules,

    /// Create configured tenants
    CreateTenants,

    /// Remove configured tenants
    RemoveTenants,

    /// Entitle tenants to the application
    CreateTenantEntitlements,

    /// Revoke tenant entitlements
    RemoveTenantEntitlements,

    /// Create configured roles in every tenant
    CreateRoles,

    /// Remove configured roles from every tenant
    RemoveRoles,

    /// Create configured users in every tenant
    CreateUsers,

    /// Attach capability sets to roles once the platform is quiet
    AttachCapabilitySets,

    /// Detach capability sets from roles
    DetachCapabilitySets,

    /// List deployed containers
    ListModules {
        /// Only list containers of one pass
        #[arg(short, long)]
        kind: Option<KindArg>,
    },

    /// Print the secret store root token
    VaultRootToken,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Management,
    Business,
}

impl From<KindArg> for ModuleKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Management => Self::Management,
            KindArg::Business => Self::Business,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let platform = commands::load(&cli.config)?;

    match cli.command {
        Commands::DeployApplication => commands::deploy::application(&platform).await,
        Commands::UndeployApplication => commands::deploy::undeploy_application(&platform).await,
        Commands::DeployManagement => commands::deploy::management(&platform).await,
        Commands::UndeployManagement => commands::deploy::undeploy_management(&platform).await,
        Commands::DeployModules => commands::deploy::modules(&platform).await,
        Commands::UndeployModules => commands::deploy::undeploy_modules(&platform).await,
        Commands::CreateTenants => commands::tenants::create(&platform).await,
        Commands::RemoveTenants => commands::tenants::remove(&platform).await,
        Commands::CreateTenantEntitlements => commands::tenants::entitle(&platform).await,
        Commands::RemoveTenantEntitlements => commands::tenants::revoke(&platform).await,
        Commands::CreateRoles => commands::tenants::create_roles(&platform).await,
        Commands::RemoveRoles => commands::tenants::remove_roles(&platform).await,
        Commands::CreateUsers => commands::tenants::create_users(&platform).await,
        Commands::AttachCapabilitySets => {
            commands::tenants::attach_capability_sets(&platform).await
        }
        Commands::DetachCapabilitySets => {
            commands::tenants::detach_capability_sets(&platform).await
        }
        Commands::ListModules { kind } => {
            commands::inspect::list_modules(&platform, kind.map(Into::into)).await
        }
        Commands::VaultRootToken => commands::inspect::vault_root_token(&platform).await,
    }
}
