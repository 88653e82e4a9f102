//! Data models: users, role assignments and read helpers over assignment sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::roles::WellKnownRoleId;
use crate::hierarchy::{CustomerId, PortfolioId, PrincipalId, ResourceType, SiteId};

// ═══════════════════════════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════════════════════════

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    /// Invited but never signed in.
    Pending,
    Inactive,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Pending => write!(f, "pending"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Kind of principal behind a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserType {
    #[default]
    CustomerUser,
    ClientApplication,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerUser => write!(f, "customerUser"),
            Self::ClientApplication => write!(f, "clientApplication"),
        }
    }
}

/// A user belonging to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: PrincipalId,
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub status: UserStatus,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A new active customer user.
    pub fn new(
        customer_id: CustomerId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: PrincipalId::random(),
            customer_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            contact_number: None,
            company: None,
            status: UserStatus::Active,
            user_type: UserType::CustomerUser,
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource reference
// ═══════════════════════════════════════════════════════════════════════════════

/// The typed node an assignment is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Customer(CustomerId),
    Portfolio(PortfolioId),
    Site(SiteId),
}

impl ResourceRef {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Customer(_) => ResourceType::Customer,
            Self::Portfolio(_) => ResourceType::Portfolio,
            Self::Site(_) => ResourceType::Site,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role assignment
// ═══════════════════════════════════════════════════════════════════════════════

/// A role granted to a principal on one node of the hierarchy.
///
/// `resource_id` is the id of a node of type `resource_type`. The ancestor ids
/// are claims; for sites only the site lookup knows the real parent portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    /// Absent until the assignment is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,
    pub role_id: WellKnownRoleId,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub customer_id: CustomerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<PortfolioId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<SiteId>,
}

impl RoleAssignment {
    /// CustomerAdmin on `customer_id`.
    pub fn customer_admin(customer_id: CustomerId) -> Self {
        Self {
            principal_id: None,
            role_id: WellKnownRoleId::CustomerAdmin,
            resource_type: ResourceType::Customer,
            resource_id: customer_id.0,
            customer_id,
            portfolio_id: None,
            site_id: None,
        }
    }

    /// A portfolio-scoped role.
    pub fn portfolio(
        role_id: WellKnownRoleId,
        portfolio_id: PortfolioId,
        customer_id: CustomerId,
    ) -> Self {
        Self {
            principal_id: None,
            role_id,
            resource_type: ResourceType::Portfolio,
            resource_id: portfolio_id.0,
            customer_id,
            portfolio_id: Some(portfolio_id),
            site_id: None,
        }
    }

    /// A site-scoped role.
    pub fn site(
        role_id: WellKnownRoleId,
        site_id: SiteId,
        portfolio_id: Option<PortfolioId>,
        customer_id: CustomerId,
    ) -> Self {
        Self {
            principal_id: None,
            role_id,
            resource_type: ResourceType::Site,
            resource_id: site_id.0,
            customer_id,
            portfolio_id,
            site_id: Some(site_id),
        }
    }

    pub fn with_principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    /// The node this assignment is scoped to.
    pub fn resource(&self) -> ResourceRef {
        match self.resource_type {
            ResourceType::Customer => ResourceRef::Customer(CustomerId(self.resource_id)),
            ResourceType::Portfolio => ResourceRef::Portfolio(PortfolioId(self.resource_id)),
            ResourceType::Site => ResourceRef::Site(SiteId(self.resource_id)),
        }
    }

    /// True for CustomerAdmin whose resource is `customer_id`.
    pub fn is_customer_admin_of(&self, customer_id: CustomerId) -> bool {
        self.role_id == WellKnownRoleId::CustomerAdmin && self.resource_id == customer_id.0
    }

    pub fn is_portfolio_admin_of(&self, portfolio_id: PortfolioId) -> bool {
        self.role_id == WellKnownRoleId::PortfolioAdmin && self.resource_id == portfolio_id.0
    }

    pub fn is_site_admin_of(&self, site_id: SiteId) -> bool {
        self.role_id == WellKnownRoleId::SiteAdmin && self.resource_id == site_id.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Assignment set helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only queries over a principal's assignments.
pub trait AssignmentSet {
    fn is_customer_admin(&self, customer_id: CustomerId) -> bool;

    /// The role held directly on a portfolio, if any.
    fn portfolio_role(&self, portfolio_id: PortfolioId) -> Option<WellKnownRoleId>;

    /// The role held directly on a site, if any.
    fn site_role(&self, site_id: SiteId) -> Option<WellKnownRoleId>;

    /// CustomerAdmin on the customer or PortfolioAdmin on the portfolio.
    fn can_administer_portfolio(&self, customer_id: CustomerId, portfolio_id: PortfolioId) -> bool;
}

impl AssignmentSet for [RoleAssignment] {
    fn is_customer_admin(&self, customer_id: CustomerId) -> bool {
        self.iter().any(|a| a.is_customer_admin_of(customer_id))
    }

    fn portfolio_role(&self, portfolio_id: PortfolioId) -> Option<WellKnownRoleId> {
        self.iter()
            .find(|a| a.resource() == ResourceRef::Portfolio(portfolio_id))
            .map(|a| a.role_id)
    }

    fn site_role(&self, site_id: SiteId) -> Option<WellKnownRoleId> {
        self.iter()
            .find(|a| a.resource() == ResourceRef::Site(site_id))
            .map(|a| a.role_id)
    }

    fn can_administer_portfolio(&self, customer_id: CustomerId, portfolio_id: PortfolioId) -> bool {
        self.iter()
            .any(|a| a.is_customer_admin_of(customer_id) || a.is_portfolio_admin_of(portfolio_id))
    }
}

impl AssignmentSet for Vec<RoleAssignment> {
    fn is_customer_admin(&self, customer_id: CustomerId) -> bool {
        self.as_slice().is_customer_admin(customer_id)
    }

    fn portfolio_role(&self, portfolio_id: PortfolioId) -> Option<WellKnownRoleId> {
        self.as_slice().portfolio_role(portfolio_id)
    }

    fn site_role(&self, site_id: SiteId) -> Option<WellKnownRoleId> {
        self.as_slice().site_role(site_id)
    }

    fn can_administer_portfolio(&self, customer_id: CustomerId, portfolio_id: PortfolioId) -> bool {
        self.as_slice().can_administer_portfolio(customer_id, portfolio_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
