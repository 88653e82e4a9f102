//! The desired permission tree a client submits for a managed user.
//!
//! Role names travel as strings (`"Admin"`, `"Viewer"` or `""` for removal)
//! and are only interpreted by the resolver, so that an invalid value can be
//! reported against the scope it was sent for.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{PortfolioId, SiteId};

/// Desired role on one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSite {
    pub site_id: SiteId,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub role: String,
}

impl ManagedSite {
    pub fn new(site_id: SiteId, role: impl Into<String>) -> Self {
        Self {
            site_id,
            site_name: String::new(),
            role: role.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.site_name = name.into();
        self
    }

    /// A non-empty role was requested for this site.
    pub fn has_role(&self) -> bool {
        !self.role.is_empty()
    }
}

/// Desired role on one portfolio and on any of its sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedPortfolio {
    pub portfolio_id: PortfolioId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_name: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub sites: Vec<ManagedSite>,
}

impl ManagedPortfolio {
    pub fn new(portfolio_id: PortfolioId, role: impl Into<String>) -> Self {
        Self {
            portfolio_id,
            portfolio_name: None,
            role: role.into(),
            sites: Vec::new(),
        }
    }

    pub fn with_site(mut self, site: ManagedSite) -> Self {
        self.sites.push(site);
        self
    }
}

/// The client-submitted tree: an optional customer-admin flag and an
/// optional, ordered list of portfolios.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredAssignmentTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_customer_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolios: Option<Vec<ManagedPortfolio>>,
}

impl DesiredAssignmentTree {
    /// A request granting CustomerAdmin.
    pub fn customer_admin() -> Self {
        Self {
            is_customer_admin: Some(true),
            portfolios: None,
        }
    }

    /// A non-admin request over the given portfolios.
    pub fn with_portfolios(portfolios: Vec<ManagedPortfolio>) -> Self {
        Self {
            is_customer_admin: Some(false),
            portfolios: Some(portfolios),
        }
    }

    /// Neither the customer-admin flag nor the portfolio list was sent.
    pub fn is_missing(&self) -> bool {
        self.is_customer_admin.is_none() && self.portfolios.is_none()
    }

    pub fn wants_customer_admin(&self) -> bool {
        self.is_customer_admin.unwrap_or(false)
    }

    pub fn portfolios(&self) -> &[ManagedPortfolio] {
        self.portfolios.as_deref().unwrap_or(&[])
    }

    /// Names of requested sites with a non-empty role, in request order.
    pub fn assigned_site_names(&self) -> Vec<String> {
        self.portfolios()
            .iter()
            .flat_map(|p| p.sites.iter())
            .filter(|s| s.has_role())
            .map(|s| s.site_name.clone())
            .collect()
    }
}
