//! The well-known role catalog.
//!
//! Five roles exist, each bound to one level of the hierarchy:
//!
//! | Role            | Resource  | Level  |
//! |-----------------|-----------|--------|
//! | CustomerAdmin   | Customer  | Admin  |
//! | PortfolioAdmin  | Portfolio | Admin  |
//! | PortfolioViewer | Portfolio | Viewer |
//! | SiteAdmin       | Site      | Admin  |
//! | SiteViewer      | Site      | Viewer |
//!
//! There is no customer-level viewer and no "none" role: the absence of a
//! role at a scope is the absence of an assignment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AccessError, ErrorCode, Result};
use crate::hierarchy::ResourceType;

// ═══════════════════════════════════════════════════════════════════════════════
// Role names
// ═══════════════════════════════════════════════════════════════════════════════

/// A requested role at one scope of a desired tree.
///
/// Ordered along the escalation lattice: `None < Viewer < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RoleName {
    /// Remove any assignment at this scope.
    #[default]
    None,
    Viewer,
    Admin,
}

impl RoleName {
    /// Wire form: `""`, `"Viewer"` or `"Admin"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Viewer => "Viewer",
            Self::Admin => "Admin",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn level(&self) -> Option<RoleLevel> {
        match self {
            Self::None => None,
            Self::Viewer => Some(RoleLevel::Viewer),
            Self::Admin => Some(RoleLevel::Admin),
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RoleLevel> for RoleName {
    fn from(level: RoleLevel) -> Self {
        match level {
            RoleLevel::Viewer => Self::Viewer,
            RoleLevel::Admin => Self::Admin,
        }
    }
}

/// Level of a granted role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleLevel {
    Viewer,
    Admin,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Well-known roles
// ═══════════════════════════════════════════════════════════════════════════════

/// One of the five grantable roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WellKnownRoleId {
    CustomerAdmin,
    PortfolioAdmin,
    PortfolioViewer,
    SiteAdmin,
    SiteViewer,
}

impl WellKnownRoleId {
    /// The resource type this role is scoped to.
    pub const fn resource_type(&self) -> ResourceType {
        match self {
            Self::CustomerAdmin => ResourceType::Customer,
            Self::PortfolioAdmin | Self::PortfolioViewer => ResourceType::Portfolio,
            Self::SiteAdmin | Self::SiteViewer => ResourceType::Site,
        }
    }

    pub const fn level(&self) -> RoleLevel {
        match self {
            Self::CustomerAdmin | Self::PortfolioAdmin | Self::SiteAdmin => RoleLevel::Admin,
            Self::PortfolioViewer | Self::SiteViewer => RoleLevel::Viewer,
        }
    }

    /// Reverse mapping to the wire role name.
    pub fn name(&self) -> &'static str {
        RoleName::from(self.level()).as_str()
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.level(), RoleLevel::Admin)
    }

    pub fn all() -> [WellKnownRoleId; 5] {
        [
            Self::CustomerAdmin,
            Self::PortfolioAdmin,
            Self::PortfolioViewer,
            Self::SiteAdmin,
            Self::SiteViewer,
        ]
    }
}

impl fmt::Display for WellKnownRoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// Maps role names on a desired tree to well-known roles.
pub struct RoleCatalog;

impl RoleCatalog {
    /// Parse a wire role name. `scope` names the node being configured
    /// (for example `portfolio 7c1e…`) and ends up in the error message.
    pub fn parse_role_name(role_name: &str, scope: &str) -> Result<RoleName> {
        match role_name {
            "" => Ok(RoleName::None),
            "Viewer" => Ok(RoleName::Viewer),
            "Admin" => Ok(RoleName::Admin),
            other => Err(invalid_role(other, scope)),
        }
    }

    /// The role granting `level` on a resource of `resource_type`, if any.
    pub fn role_for(resource_type: ResourceType, level: RoleLevel) -> Option<WellKnownRoleId> {
        match (resource_type, level) {
            (ResourceType::Customer, RoleLevel::Admin) => Some(WellKnownRoleId::CustomerAdmin),
            (ResourceType::Customer, RoleLevel::Viewer) => None,
            (ResourceType::Portfolio, RoleLevel::Admin) => Some(WellKnownRoleId::PortfolioAdmin),
            (ResourceType::Portfolio, RoleLevel::Viewer) => Some(WellKnownRoleId::PortfolioViewer),
            (ResourceType::Site, RoleLevel::Admin) => Some(WellKnownRoleId::SiteAdmin),
            (ResourceType::Site, RoleLevel::Viewer) => Some(WellKnownRoleId::SiteViewer),
        }
    }

    /// Resolve a wire role name at a scope.
    ///
    /// `""` resolves to `Ok(None)`: a removal, not an error.
    pub fn resolve(
        resource_type: ResourceType,
        role_name: &str,
        scope: &str,
    ) -> Result<Option<WellKnownRoleId>> {
        let name = Self::parse_role_name(role_name, scope)?;
        match name.level() {
            None => Ok(None),
            Some(level) => Self::role_for(resource_type, level)
                .map(Some)
                .ok_or_else(|| invalid_role(role_name, scope)),
        }
    }
}

fn invalid_role(role_name: &str, scope: &str) -> AccessError {
    AccessError::new(
        ErrorCode::InvalidRoleName,
        format!("Invalid role '{}' for {}", role_name, scope),
    )
    .with_context("role", role_name)
    .with_context("scope", scope)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
