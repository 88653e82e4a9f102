//! Authorization gate for user management.
//!
//! The gate answers the question:
//! "May the current user see or change the managed user's access at all?"
//!
//! Standing is containment-based: an actor stands over a managed user when one
//! of the actor's admin assignments covers a resource the managed user holds
//! a role on. All inputs are snapshots; the gate performs no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::models::{ResourceRef, RoleAssignment, User, UserStatus};
use super::roles::WellKnownRoleId;
use crate::error::{AccessError, ErrorCode, Result};
use crate::hierarchy::{CustomerId, PortfolioId, PrincipalId, SiteId, SiteLookup};
use crate::telemetry::metrics::DecisionMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshots
// ═══════════════════════════════════════════════════════════════════════════════

/// The acting user as loaded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub id: PrincipalId,
    /// `None` when the actor has no user record (e.g. a client application).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub assignments: Vec<RoleAssignment>,
}

impl ActorSnapshot {
    pub fn new(id: PrincipalId, assignments: Vec<RoleAssignment>) -> Self {
        Self {
            id,
            status: None,
            assignments,
        }
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn is_inactive(&self) -> bool {
        matches!(self.status, Some(status) if status != UserStatus::Active)
    }

    /// Admin assignments the actor holds inside `customer_id`.
    fn admin_assignments(&self, customer_id: CustomerId) -> impl Iterator<Item = &RoleAssignment> {
        self.assignments
            .iter()
            .filter(move |a| a.customer_id == customer_id && a.role_id.is_admin())
    }
}

/// The managed user and their current assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedUserSnapshot {
    pub user: User,
    #[serde(default)]
    pub assignments: Vec<RoleAssignment>,
}

/// What `ensure_access_user` hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedUserAccess {
    pub user: User,
    pub assignments: Vec<RoleAssignment>,
    pub grant: AccessGrant,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// The actor assignment that justified an allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "via", content = "resourceId", rename_all = "camelCase")]
pub enum AccessGrant {
    CustomerAdmin,
    PortfolioAdmin(PortfolioId),
    SiteAdmin(SiteId),
}

impl fmt::Display for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerAdmin => write!(f, "customer admin"),
            Self::PortfolioAdmin(id) => write!(f, "portfolio admin of {}", id),
            Self::SiteAdmin(id) => write!(f, "site admin of {}", id),
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DenyReason {
    OtherCustomer,
    ManagedUserNotActive,
    ActorNotActive,
    NoStanding,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OtherCustomer => write!(f, "managed user belongs to another customer"),
            Self::ManagedUserNotActive => write!(f, "managed user is not active"),
            Self::ActorNotActive => write!(f, "current user is not active"),
            Self::NoStanding => write!(f, "current user has no authority over the managed user"),
        }
    }
}

/// Result of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "camelCase")]
pub enum PolicyDecision {
    Allow(AccessGrant),
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Gate
// ═══════════════════════════════════════════════════════════════════════════════

/// Which managed-user statuses an operation tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagedStatusRule {
    ActiveOnly,
    /// Invited users that never activated may still be removed.
    ActiveOrPending,
}

/// Containment-based authorization over managed users.
pub struct AuthorizationGate<'a> {
    sites: &'a dyn SiteLookup,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(sites: &'a dyn SiteLookup) -> Self {
        Self { sites }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluate whether `actor` may view or change `managed`.
    pub fn evaluate_access(
        &self,
        customer_id: CustomerId,
        actor: &ActorSnapshot,
        managed: &ManagedUserSnapshot,
    ) -> PolicyDecision {
        self.evaluate(customer_id, actor, managed, ManagedStatusRule::ActiveOnly)
    }

    /// Evaluate whether `actor` may create users for `customer_id`.
    pub fn evaluate_create(&self, customer_id: CustomerId, actor: &ActorSnapshot) -> PolicyDecision {
        if actor.is_inactive() {
            return PolicyDecision::Deny(DenyReason::ActorNotActive);
        }

        let grant = actor.assignments.iter().find_map(|a| {
            if a.is_customer_admin_of(customer_id) {
                return Some(AccessGrant::CustomerAdmin);
            }
            if a.customer_id != customer_id {
                return None;
            }
            match (a.role_id, a.resource()) {
                (WellKnownRoleId::PortfolioAdmin, ResourceRef::Portfolio(id)) => {
                    Some(AccessGrant::PortfolioAdmin(id))
                }
                (WellKnownRoleId::SiteAdmin, ResourceRef::Site(id)) => Some(AccessGrant::SiteAdmin(id)),
                _ => None,
            }
        });

        match grant {
            Some(grant) => PolicyDecision::Allow(grant),
            None => PolicyDecision::Deny(DenyReason::NoStanding),
        }
    }

    fn evaluate(
        &self,
        customer_id: CustomerId,
        actor: &ActorSnapshot,
        managed: &ManagedUserSnapshot,
        rule: ManagedStatusRule,
    ) -> PolicyDecision {
        if managed.user.customer_id != customer_id {
            return PolicyDecision::Deny(DenyReason::OtherCustomer);
        }

        let status_ok = match rule {
            ManagedStatusRule::ActiveOnly => managed.user.is_active(),
            ManagedStatusRule::ActiveOrPending => {
                matches!(managed.user.status, UserStatus::Active | UserStatus::Pending)
            }
        };
        if !status_ok {
            return PolicyDecision::Deny(DenyReason::ManagedUserNotActive);
        }

        if actor.is_inactive() {
            return PolicyDecision::Deny(DenyReason::ActorNotActive);
        }

        if actor.assignments.iter().any(|a| a.is_customer_admin_of(customer_id)) {
            return PolicyDecision::Allow(AccessGrant::CustomerAdmin);
        }

        for held in actor.admin_assignments(customer_id) {
            match (held.role_id, held.resource()) {
                (WellKnownRoleId::PortfolioAdmin, ResourceRef::Portfolio(portfolio_id)) => {
                    if managed
                        .assignments
                        .iter()
                        .any(|a| self.lies_under_portfolio(a, portfolio_id))
                    {
                        return PolicyDecision::Allow(AccessGrant::PortfolioAdmin(portfolio_id));
                    }
                }
                (WellKnownRoleId::SiteAdmin, ResourceRef::Site(site_id)) => {
                    if managed
                        .assignments
                        .iter()
                        .any(|a| a.resource() == ResourceRef::Site(site_id))
                    {
                        return PolicyDecision::Allow(AccessGrant::SiteAdmin(site_id));
                    }
                }
                _ => {}
            }
        }

        PolicyDecision::Deny(DenyReason::NoStanding)
    }

    /// Whether a managed assignment's resource is contained in `portfolio_id`.
    /// A customer-level assignment counts as under every portfolio.
    fn lies_under_portfolio(&self, assignment: &RoleAssignment, portfolio_id: PortfolioId) -> bool {
        match assignment.resource() {
            ResourceRef::Customer(_) => true,
            ResourceRef::Portfolio(id) => id == portfolio_id,
            ResourceRef::Site(site_id) => {
                let parent = assignment
                    .portfolio_id
                    .or_else(|| self.sites.get_site(&site_id).map(|s| s.portfolio_id));
                parent == Some(portfolio_id)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enforcement
    // ─────────────────────────────────────────────────────────────────────────

    /// Fail with `Unauthorized` unless `actor` may view or change `managed`.
    pub fn ensure_access_user(
        &self,
        customer_id: CustomerId,
        actor: &ActorSnapshot,
        managed: ManagedUserSnapshot,
    ) -> Result<ManagedUserAccess> {
        let decision = self.evaluate(customer_id, actor, &managed, ManagedStatusRule::ActiveOnly);
        self.enforce("access_user", customer_id, actor, Some(&managed.user), decision)
            .map(|grant| ManagedUserAccess {
                user: managed.user,
                assignments: managed.assignments,
                grant,
            })
    }

    /// As [`ensure_access_user`](Self::ensure_access_user), but pending users
    /// may be deleted too.
    pub fn ensure_can_delete_user(
        &self,
        customer_id: CustomerId,
        actor: &ActorSnapshot,
        managed: ManagedUserSnapshot,
    ) -> Result<ManagedUserAccess> {
        let decision =
            self.evaluate(customer_id, actor, &managed, ManagedStatusRule::ActiveOrPending);
        self.enforce("delete_user", customer_id, actor, Some(&managed.user), decision)
            .map(|grant| ManagedUserAccess {
                user: managed.user,
                assignments: managed.assignments,
                grant,
            })
    }

    /// Fail with `Unauthorized` unless `actor` may create users for the customer.
    pub fn ensure_can_create_user(&self, customer_id: CustomerId, actor: &ActorSnapshot) -> Result<()> {
        let decision = self.evaluate_create(customer_id, actor);
        self.enforce("create_user", customer_id, actor, None, decision)
            .map(|_| ())
    }

    fn enforce(
        &self,
        operation: &'static str,
        customer_id: CustomerId,
        actor: &ActorSnapshot,
        managed: Option<&User>,
        decision: PolicyDecision,
    ) -> Result<AccessGrant> {
        DecisionMetrics::record(operation, decision.is_allowed());

        debug!(
            operation,
            customer_id = %customer_id,
            current_user_id = %actor.id,
            managed_user_id = ?managed.map(|u| u.id),
            decision = ?decision,
            "Authorization decision"
        );

        match decision {
            PolicyDecision::Allow(grant) => Ok(grant),
            PolicyDecision::Deny(reason) => {
                let mut err = AccessError::with_internal(
                    ErrorCode::Unauthorized,
                    "Current user is not authorized for this operation",
                    reason.to_string(),
                )
                .with_context("customerId", customer_id)
                .with_context("currentUserId", actor.id);
                if let Some(user) = managed {
                    err = err.with_context("managedUserId", user.id);
                }
                Err(err)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
