//! Tenancy hierarchy: Customer → Portfolio → Site.
//!
//! A site belongs to exactly one portfolio and a portfolio to exactly one
//! customer. The only way to discover a site's parents is through a
//! [`SiteLookup`]; role assignments merely *claim* them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Top-level tenant identifier.
    CustomerId
);
uuid_id!(
    /// Portfolio identifier.
    PortfolioId
);
uuid_id!(
    /// Site identifier.
    SiteId
);
uuid_id!(
    /// A user or client application holding role assignments.
    PrincipalId
);

// ═══════════════════════════════════════════════════════════════════════════════
// Resource types
// ═══════════════════════════════════════════════════════════════════════════════

/// The level of the hierarchy a resource lives at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Customer,
    Portfolio,
    Site,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Portfolio => "portfolio",
            Self::Site => "site",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════════

/// A site together with its real ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub id: SiteId,
    pub portfolio_id: PortfolioId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub name: String,
}

impl SiteRecord {
    pub fn new(id: SiteId, portfolio_id: PortfolioId, customer_id: CustomerId) -> Self {
        Self {
            id,
            portfolio_id,
            customer_id,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A portfolio and the sites it groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    pub id: PortfolioId,
    pub customer_id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Site lookup
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves a site's parent portfolio and customer.
///
/// Implementations are synchronous snapshots: any I/O happens before the
/// resolver or gate is invoked.
pub trait SiteLookup: Send + Sync {
    fn get_site(&self, site_id: &SiteId) -> Option<SiteRecord>;
}

/// An in-memory snapshot of site records keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SiteDirectory {
    sites: HashMap<SiteId, SiteRecord>,
}

impl SiteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, site: SiteRecord) {
        self.sites.insert(site.id, site);
    }

    pub fn with_site(mut self, site: SiteRecord) -> Self {
        self.insert(site);
        self
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl FromIterator<SiteRecord> for SiteDirectory {
    fn from_iter<I: IntoIterator<Item = SiteRecord>>(iter: I) -> Self {
        Self {
            sites: iter.into_iter().map(|s| (s.id, s)).collect(),
        }
    }
}

impl SiteLookup for SiteDirectory {
    fn get_site(&self, site_id: &SiteId) -> Option<SiteRecord> {
        self.sites.get(site_id).cloned()
    }
}
