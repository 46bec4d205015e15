//! Capability-set attachment.
//!
//! Capability sets are only attached once the consumer group processing
//! capability definitions has drained: no active members and no rebalance in
//! progress. Attaching earlier would act on a stale role set, so running out
//! of time is an error rather than a skip.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::clients::{BrokerAdmin, IdentityProvider};
use crate::config::{RoleConfig, SagaConfig};
use crate::error::{ControlError, ControlResult};
use crate::types::Token;

/// Wait-then-attach saga for capability sets.
pub struct CapabilitySaga {
    broker: Arc<dyn BrokerAdmin>,
    identity: Arc<dyn IdentityProvider>,
    consumer_group: String,
    initial_delay: Duration,
    poll_interval: Duration,
    timeout: Duration,
}

impl CapabilitySaga {
    /// Create a saga from configuration.
    pub fn new(
        broker: Arc<dyn BrokerAdmin>,
        identity: Arc<dyn IdentityProvider>,
        config: &SagaConfig,
    ) -> Self {
        Self {
            broker,
            identity,
            consumer_group: config.consumer_group.clone(),
            initial_delay: config.initial_delay(),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }

    /// Poll the consumer group until it is quiescent.
    ///
    /// Describe failures count as "not yet". Returns the number of polls made.
    pub async fn wait_for_quiescence(&self) -> ControlResult<u32> {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut polls = 0;

        loop {
            polls += 1;
            match self.broker.describe_consumer_group(&self.consumer_group).await {
                Ok(state) if state.is_quiescent() => {
                    debug!(group = %self.consumer_group, polls, "consumer group quiescent");
                    return Ok(polls);
                }
                Ok(state) => debug!(
                    group = %self.consumer_group,
                    members = state.member_count,
                    rebalancing = state.rebalancing,
                    "consumer group busy"
                ),
                Err(e) => warn!(
                    group = %self.consumer_group,
                    error = %e,
                    "failed to describe consumer group"
                ),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ControlError::SagaTimeout {
                    group: self.consumer_group.clone(),
                    waited: now - started,
                });
            }
            sleep_until((now + self.poll_interval).min(deadline)).await;
        }
    }

    /// Wait for quiescence, then attach capability sets to `roles` in `tenant`.
    pub async fn attach(
        &self,
        token: &Token,
        tenant: &str,
        roles: &BTreeMap<String, RoleConfig>,
    ) -> ControlResult<()> {
        if !self.initial_delay.is_zero() {
            debug!(tenant = %tenant, delay = ?self.initial_delay, "waiting before polling");
            sleep(self.initial_delay).await;
        }

        let polls = self.wait_for_quiescence().await?;
        self.identity
            .attach_capability_sets(token, tenant, roles)
            .await?;

        info!(tenant = %tenant, polls, "attached capability sets");
        Ok(())
    }

    /// Detach capability sets from `roles` in `tenant`.
    ///
    /// Failures are logged and ignored.
    pub async fn detach(&self, token: &Token, tenant: &str, roles: &BTreeMap<String, RoleConfig>) {
        match self
            .identity
            .detach_capability_sets(token, tenant, roles)
            .await
        {
            Ok(()) => info!(tenant = %tenant, "detached capability sets"),
            Err(e) => warn!(tenant = %tenant, error = %e, "failed to detach capability sets"),
        }
    }
}
