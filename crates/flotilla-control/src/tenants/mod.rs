//! Tenant and consortium partitioning.
//!
//! Tenants are processed partition by partition. A partition is a consortium
//! paired with a tenant type; within a consortium the central partition is
//! always visited before the member partition. Tenants outside any
//! consortium fall into the `none-default` partition.
//!
//! The partition a tenant belongs to is written into its description when it
//! is created, which is how live tenants are matched back to partitions.

mod partitioner;

pub use partitioner::{TenantAuth, TenantContext, TenantPartitioner, Traversal};

use std::fmt;

use crate::config::TenantConfig;

/// Role a tenant plays in its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TenantType {
    /// Tenant outside any consortium.
    Default,
    /// The consortium's central tenant.
    Central,
    /// Any other consortium tenant.
    Member,
}

impl TenantType {
    /// Order of traversal inside a consortium; lower runs first.
    #[must_use]
    pub const fn sort_weight(self) -> u8 {
        match self {
            Self::Central => 0,
            Self::Member => 1,
            Self::Default => 2,
        }
    }

    /// Lower-case name used in tenant descriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Central => "central",
            Self::Member => "member",
        }
    }

    /// Consortium tenant types in traversal order.
    pub const CONSORTIUM: [Self; 2] = [Self::Central, Self::Member];
}

impl fmt::Display for TenantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consortium a partition belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsortiumKey {
    /// A configured consortium.
    Named(String),
    /// Tenants that belong to no consortium.
    None,
}

impl ConsortiumKey {
    /// Key for an optional consortium name.
    #[must_use]
    pub fn from_option(name: Option<&str>) -> Self {
        name.map_or(Self::None, |name| Self::Named(name.to_owned()))
    }
}

impl fmt::Display for ConsortiumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::None => f.write_str("none"),
        }
    }
}

/// One unit of tenant traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    /// Consortium of the partition.
    pub consortium: ConsortiumKey,
    /// Tenant type of the partition.
    pub tenant_type: TenantType,
}

impl Partition {
    /// The partition of tenants outside any consortium.
    #[must_use]
    pub const fn unaffiliated() -> Self {
        Self {
            consortium: ConsortiumKey::None,
            tenant_type: TenantType::Default,
        }
    }

    /// Partition a configured tenant belongs to.
    #[must_use]
    pub fn of(tenant: &TenantConfig) -> Self {
        match &tenant.consortium {
            Some(name) => Self {
                consortium: ConsortiumKey::Named(name.clone()),
                tenant_type: if tenant.central {
                    TenantType::Central
                } else {
                    TenantType::Member
                },
            },
            None => Self::unaffiliated(),
        }
    }

    /// Tenant description encoding this partition, e.g. `alpha-central`.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{}-{}", self.consortium, self.tenant_type)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.consortium, self.tenant_type)
    }
}

/// A tenant of a consortium with its traversal weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsortiumTenant {
    /// Tenant name.
    pub name: String,
    /// Whether this is the consortium's central tenant.
    pub central: bool,
    /// Traversal weight; the central tenant sorts first.
    pub sort_weight: u8,
}

impl ConsortiumTenant {
    /// Build the record for a configured tenant.
    #[must_use]
    pub fn new(name: impl Into<String>, central: bool) -> Self {
        let tenant_type = if central {
            TenantType::Central
        } else {
            TenantType::Member
        };
        Self {
            name: name.into(),
            central,
            sort_weight: tenant_type.sort_weight(),
        }
    }
}
