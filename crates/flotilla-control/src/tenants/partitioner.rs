//! Partition planning and tenant traversal.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use super::{ConsortiumKey, ConsortiumTenant, Partition, TenantType};
use crate::clients::{GrantType, IdentityProvider, ManagementService, TenantRecord};
use crate::config::{ConsortiumConfig, PlatformConfig, TenantConfig};
use crate::error::ControlResult;
use crate::types::Token;

/// Which token a tenant callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantAuth {
    /// The master realm token, for management service calls.
    Master,
    /// A token issued by the tenant's own realm.
    Tenant,
}

/// Direction in which the partition plan is walked.
///
/// Removal runs in reverse so that member tenants go before their central
/// tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Plan order.
    Forward,
    /// Reverse plan order.
    Reverse,
}

/// A live tenant handed to a traversal callback.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// Tenant as reported by the management service.
    pub tenant: TenantRecord,
    /// Partition being traversed.
    pub partition: Partition,
    /// Token chosen by the traversal's [`TenantAuth`].
    pub token: Token,
}

/// Plans and executes tenant traversal.
pub struct TenantPartitioner {
    consortiums: BTreeMap<String, ConsortiumConfig>,
    tenants: BTreeMap<String, TenantConfig>,
    master_realm: String,
    identity: Arc<dyn IdentityProvider>,
    management: Arc<dyn ManagementService>,
}

impl TenantPartitioner {
    /// Create a partitioner for the tenants and consortiums of `config`.
    pub fn new(
        config: &PlatformConfig,
        identity: Arc<dyn IdentityProvider>,
        management: Arc<dyn ManagementService>,
    ) -> Self {
        Self {
            consortiums: config.consortiums.clone(),
            tenants: config.tenants.clone(),
            master_realm: config.identity.master_realm.clone(),
            identity,
            management,
        }
    }

    /// Ordered traversal plan.
    ///
    /// Without consortiums this is the single unaffiliated partition.
    /// Otherwise every consortium contributes its central and member
    /// partitions, followed by the unaffiliated partition when some
    /// configured tenant belongs to no consortium.
    #[must_use]
    pub fn partitions(&self) -> Vec<Partition> {
        if self.consortiums.is_empty() {
            return vec![Partition::unaffiliated()];
        }

        let mut plan: Vec<Partition> = self
            .consortiums
            .keys()
            .flat_map(|name| {
                TenantType::CONSORTIUM.into_iter().map(|tenant_type| Partition {
                    consortium: ConsortiumKey::Named(name.clone()),
                    tenant_type,
                })
            })
            .collect();

        if self.tenants.values().any(|t| t.consortium.is_none()) {
            plan.push(Partition::unaffiliated());
        }
        plan
    }

    /// Configured tenant names belonging to `partition`, in name order.
    #[must_use]
    pub fn configured(&self, partition: &Partition) -> Vec<&str> {
        self.tenants
            .iter()
            .filter(|(_, config)| Partition::of(config) == *partition)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Configured tenants of consortium `name`, central first.
    #[must_use]
    pub fn consortium_tenants(&self, name: &str) -> Vec<ConsortiumTenant> {
        let mut tenants: Vec<ConsortiumTenant> = self
            .tenants
            .iter()
            .filter(|(_, config)| config.consortium.as_deref() == Some(name))
            .map(|(tenant, config)| ConsortiumTenant::new(tenant.clone(), config.central))
            .collect();
        tenants.sort_by_key(|t| t.sort_weight);
        tenants
    }

    /// Access token of the master realm.
    pub async fn master_token(&self) -> ControlResult<Token> {
        self.identity
            .access_token(&self.master_realm, GrantType::ClientCredentials)
            .await
    }

    /// Invoke `f` once per partition in `traversal` order, stopping at the
    /// first error.
    pub async fn for_each_partition<F, Fut>(
        &self,
        traversal: Traversal,
        mut f: F,
    ) -> ControlResult<()>
    where
        F: FnMut(Partition) -> Fut,
        Fut: Future<Output = ControlResult<()>>,
    {
        let mut plan = self.partitions();
        if traversal == Traversal::Reverse {
            plan.reverse();
        }

        for partition in plan {
            debug!(partition = %partition, "entering partition");
            f(partition).await?;
        }
        Ok(())
    }

    /// Invoke `f` once per live tenant of `partition`.
    ///
    /// Tenants are listed with a fresh master token and visited in the order
    /// the management service returns them. Only tenants present in the
    /// configuration whose description matches the partition are visited.
    /// The first error aborts the traversal.
    pub async fn for_each_tenant<F, Fut>(
        &self,
        partition: &Partition,
        auth: TenantAuth,
        mut f: F,
    ) -> ControlResult<()>
    where
        F: FnMut(TenantContext) -> Fut,
        Fut: Future<Output = ControlResult<()>>,
    {
        let master = self.master_token().await?;
        let description = partition.description();
        let configured = self.configured(partition);

        let live: Vec<TenantRecord> = self
            .management
            .list_tenants(&master)
            .await?
            .into_iter()
            .filter(|t| t.description == description && configured.contains(&t.name.as_str()))
            .collect();

        info!(partition = %partition, tenants = live.len(), "processing tenants");

        for tenant in live {
            let token = match auth {
                TenantAuth::Master => master.clone(),
                TenantAuth::Tenant => {
                    self.identity
                        .access_token(&tenant.name, GrantType::Password)
                        .await?
                }
            };

            debug!(tenant = %tenant.name, partition = %partition, "visiting tenant");
            f(TenantContext {
                tenant,
                partition: partition.clone(),
                token,
            })
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clients::{MemoryIdentityProvider, MemoryManagementService};
    use crate::error::ControlError;
    use std::sync::Mutex;

    fn config(tenants: &[(&str, Option<&str>, bool)]) -> PlatformConfig {
        let mut config = PlatformConfig::default();
        for (name, consortium, central) in tenants {
            if let Some(consortium) = consortium {
                config
                    .consortiums
                    .insert((*consortium).to_owned(), ConsortiumConfig::default());
            }
            config.tenants.insert(
                (*name).to_owned(),
                TenantConfig {
                    consortium: consortium.map(str::to_owned),
                    central: *central,
                },
            );
        }
        config
    }

    fn partitioner(
        config: &PlatformConfig,
    ) -> (
        TenantPartitioner,
        Arc<MemoryIdentityProvider>,
        Arc<MemoryManagementService>,
    ) {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let management = Arc::new(MemoryManagementService::new());
        let partitioner = TenantPartitioner::new(config, identity.clone(), management.clone());
        (partitioner, identity, management)
    }

    #[test]
    fn no_consortium_plan() {
        let config = config(&[("diku", None, false)]);
        let (p, _, _) = partitioner(&config);
        assert_eq!(p.partitions(), vec![Partition::unaffiliated()]);
        assert_eq!(p.configured(&Partition::unaffiliated()), vec!["diku"]);
    }

    #[test]
    fn consortium_plan_is_central_then_member() {
        let config = config(&[
            ("a-member", Some("alpha"), false),
            ("a-central", Some("alpha"), true),
            ("b-central", Some("beta"), true),
            ("loner", None, false),
        ]);
        let (p, _, _) = partitioner(&config);

        let plan: Vec<String> = p.partitions().iter().map(Partition::description).collect();
        assert_eq!(
            plan,
            vec![
                "alpha-central",
                "alpha-member",
                "beta-central",
                "beta-member",
                "none-default"
            ]
        );

        let alpha: Vec<String> = p
            .consortium_tenants("alpha")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(alpha, vec!["a-central", "a-member"]);
    }

    #[test]
    fn no_trailing_partition_without_unaffiliated_tenants() {
        let config = config(&[("c", Some("alpha"), true)]);
        let (p, _, _) = partitioner(&config);
        assert_eq!(p.partitions().len(), 2);
    }

    #[tokio::test]
    async fn visits_matching_tenants_in_service_order() {
        let config = config(&[("b", None, false), ("a", None, false)]);
        let (p, identity, management) = partitioner(&config);
        let token = Token::new("t");
        management.create_tenant(&token, "b", "none-default").await.unwrap();
        management.create_tenant(&token, "stranger", "none-default").await.unwrap();
        management.create_tenant(&token, "a", "none-default").await.unwrap();

        let seen = Mutex::new(Vec::new());
        let seen_ref = &seen;
        p.for_each_tenant(&Partition::unaffiliated(), TenantAuth::Tenant, move |ctx| async move {
            assert_eq!(ctx.token.expose(), format!("{}-password-token", ctx.tenant.name));
            seen_ref.lock().unwrap().push(ctx.tenant.name);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
        assert_eq!(
            identity.calls().unwrap(),
            vec!["token:master:client", "token:b:password", "token:a:password"]
        );
    }

    #[tokio::test]
    async fn central_visited_before_member() {
        let config = config(&[("member", Some("alpha"), false), ("central", Some("alpha"), true)]);
        let (p, _, management) = partitioner(&config);
        let token = Token::new("t");
        management.create_tenant(&token, "member", "alpha-member").await.unwrap();
        management.create_tenant(&token, "central", "alpha-central").await.unwrap();

        let seen = Mutex::new(Vec::new());
        let seen_ref = &seen;
        let p_ref = &p;
        p.for_each_partition(Traversal::Forward, move |partition| async move {
            p_ref
                .for_each_tenant(&partition, TenantAuth::Master, move |ctx| async move {
                    seen_ref.lock().unwrap().push(ctx.tenant.name);
                    Ok(())
                })
                .await
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["central", "member"]);
    }

    #[tokio::test]
    async fn reverse_traversal_ends_with_central() {
        let config = config(&[("c", Some("alpha"), true), ("loner", None, false)]);
        let (p, _, _) = partitioner(&config);

        let seen = Mutex::new(Vec::new());
        let seen_ref = &seen;
        p.for_each_partition(Traversal::Reverse, move |partition| async move {
            seen_ref.lock().unwrap().push(partition.description());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["none-default", "alpha-member", "alpha-central"]
        );
    }

    #[tokio::test]
    async fn callback_error_aborts_traversal() {
        let config = config(&[("a", None, false), ("b", None, false)]);
        let (p, _, management) = partitioner(&config);
        let token = Token::new("t");
        management.create_tenant(&token, "a", "none-default").await.unwrap();
        management.create_tenant(&token, "b", "none-default").await.unwrap();

        let visits = Mutex::new(0);
        let visits_ref = &visits;
        let err = p
            .for_each_tenant(&Partition::unaffiliated(), TenantAuth::Master, move |_| async move {
                *visits_ref.lock().unwrap() += 1;
                Err(ControlError::internal("boom"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::Internal(_)));
        assert_eq!(*visits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn tenant_token_failure_aborts_traversal() {
        let config = config(&[("a", None, false)]);
        let (p, identity, management) = partitioner(&config);
        management
            .create_tenant(&Token::new("t"), "a", "none-default")
            .await
            .unwrap();
        identity.fail_tenant("a").unwrap();

        let result = p
            .for_each_tenant(&Partition::unaffiliated(), TenantAuth::Tenant, |_| async {
                Ok(())
            })
            .await;
        assert!(result.is_err());
    }
}
