//! Consumer group inspection.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{BrokerAdmin, ConsumerGroupState};
use crate::config::BrokerConfig;
use crate::error::{ControlError, ControlResult};
use crate::runtime::ContainerRuntime;

/// Broker admin running `kafka-consumer-groups.sh` inside the broker container.
pub struct KafkaCliAdmin {
    runtime: Arc<dyn ContainerRuntime>,
    container: String,
    bootstrap_server: String,
    script: String,
}

impl KafkaCliAdmin {
    /// Create an admin client from configuration.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &BrokerConfig) -> Self {
        Self {
            runtime,
            container: config.container.clone(),
            bootstrap_server: config.bootstrap_server.clone(),
            script: config.script.clone(),
        }
    }
}

#[async_trait]
impl BrokerAdmin for KafkaCliAdmin {
    async fn describe_consumer_group(&self, group: &str) -> ControlResult<ConsumerGroupState> {
        let args = [
            self.script.as_str(),
            "--bootstrap-server",
            self.bootstrap_server.as_str(),
            "--describe",
            "--group",
            group,
            "--state",
        ]
        .map(str::to_owned);

        let output = self.runtime.exec(&self.container, &args).await?;
        let state = parse_consumer_group_state(group, &output)?;
        debug!(
            group = %group,
            members = state.member_count,
            rebalancing = state.rebalancing,
            "described consumer group"
        );
        Ok(state)
    }
}

/// Parse the output of `kafka-consumer-groups.sh --describe --state`.
///
/// The row of `group` ends with the `STATE` and `#MEMBERS` columns. The
/// coordinator column may contain spaces, so columns are read from the end.
pub fn parse_consumer_group_state(group: &str, output: &str) -> ControlResult<ConsumerGroupState> {
    if output.contains("does not exist") {
        return Err(ControlError::broker(format!(
            "consumer group {group} does not exist"
        )));
    }

    let row = output
        .lines()
        .map(str::trim)
        .find(|line| line.split_whitespace().next() == Some(group))
        .ok_or_else(|| ControlError::broker(format!("no state row for consumer group {group}")))?;

    let mut columns = row.split_whitespace().rev();
    let members = columns
        .next()
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| ControlError::broker(format!("unreadable member count in: {row}")))?;
    let state = columns
        .next()
        .ok_or_else(|| ControlError::broker(format!("missing state in: {row}")))?;

    Ok(ConsumerGroupState {
        member_count: members,
        rebalancing: state.contains("Rebalance"),
    })
}

/// Broker that replays a scripted sequence of states.
///
/// Once the script is exhausted the last state is repeated.
#[derive(Debug, Default)]
pub struct ScriptedBroker {
    script: RwLock<VecDeque<ControlResult<ConsumerGroupState>>>,
    last: RwLock<Option<ConsumerGroupState>>,
    polls: RwLock<u32>,
}

impl ScriptedBroker {
    /// Broker that replays `states` in order.
    #[must_use]
    pub fn new(states: impl IntoIterator<Item = ConsumerGroupState>) -> Self {
        Self {
            script: RwLock::new(states.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Broker that always reports an idle group.
    #[must_use]
    pub fn quiescent() -> Self {
        Self::new([ConsumerGroupState {
            member_count: 0,
            rebalancing: false,
        }])
    }

    /// Queue a failed describe call.
    pub fn push_error(&self, error: ControlError) -> ControlResult<()> {
        self.script
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .push_back(Err(error));
        Ok(())
    }

    /// Describe calls made so far.
    pub fn polls(&self) -> ControlResult<u32> {
        self.polls
            .read()
            .map(|polls| *polls)
            .map_err(|_| ControlError::internal("lock poisoned"))
    }
}

#[async_trait]
impl BrokerAdmin for ScriptedBroker {
    async fn describe_consumer_group(&self, group: &str) -> ControlResult<ConsumerGroupState> {
        *self
            .polls
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))? += 1;

        let next = self
            .script
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?
            .pop_front();

        let mut last = self
            .last
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        match next {
            Some(Ok(state)) => {
                *last = Some(state);
                Ok(state)
            }
            Some(Err(e)) => Err(e),
            None => last.ok_or_else(|| {
                ControlError::broker(format!("no scripted state for consumer group {group}"))
            }),
        }
    }
}
