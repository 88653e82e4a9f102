//! Reconciles a desired permission tree into the assignment set a managed user
//! should end up with.
//!
//! The resolver is a pure function of its inputs: the request, the managed
//! user's existing assignments, the grantor's assignments and a snapshot of the
//! site hierarchy. It never touches storage; persisting the returned list is
//! the caller's job.
//!
//! Resolution runs in a fixed order and the first failure wins:
//!
//! 1. the request must state the customer-admin flag or a portfolio list
//! 2. the grantor must hold at least one assignment
//! 3. a customer-admin request needs a customer-admin grantor and supersedes
//!    everything else
//! 4. otherwise at least one distinct portfolio must be named; a portfolio
//!    listed twice is rejected
//! 5. each portfolio and site entry is validated and checked against the
//!    grantor's authority
//! 6. existing assignments the request does not touch are carried forward
//!
//! Sites under a portfolio that resolves to Admin are elided: the portfolio
//! role already covers them.

use std::collections::HashSet;
use tracing::debug;

use super::models::{AssignmentSet, ResourceRef, RoleAssignment};
use super::request::{DesiredAssignmentTree, ManagedPortfolio, ManagedSite};
use super::roles::{RoleCatalog, WellKnownRoleId};
use crate::error::{AccessError, ErrorCode, Result};
use crate::hierarchy::{CustomerId, PortfolioId, ResourceType, SiteId, SiteLookup, SiteRecord};
use crate::telemetry::metrics::ResolutionMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Touched scopes
// ═══════════════════════════════════════════════════════════════════════════════

/// The nodes a request speaks about. Existing assignments on these nodes are
/// replaced by whatever the request resolves to.
#[derive(Debug, Clone, Default)]
pub struct TouchedScopes {
    customer: Option<CustomerId>,
    portfolios: HashSet<PortfolioId>,
    sites: HashSet<SiteId>,
    admin_portfolios: HashSet<PortfolioId>,
}

impl TouchedScopes {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn touch_portfolio(&mut self, portfolio_id: PortfolioId, is_admin: bool) {
        self.portfolios.insert(portfolio_id);
        if is_admin {
            self.admin_portfolios.insert(portfolio_id);
        }
    }

    pub fn touch_site(&mut self, site_id: SiteId) {
        self.sites.insert(site_id);
    }

    fn touches(&self, assignment: &RoleAssignment, sites: &dyn SiteLookup) -> bool {
        match assignment.resource() {
            ResourceRef::Customer(customer_id) => self.customer == Some(customer_id),
            ResourceRef::Portfolio(portfolio_id) => self.portfolios.contains(&portfolio_id),
            ResourceRef::Site(site_id) => {
                if self.sites.contains(&site_id) {
                    return true;
                }
                if self.admin_portfolios.is_empty() {
                    return false;
                }
                let parent = sites
                    .get_site(&site_id)
                    .map(|s| s.portfolio_id)
                    .or(assignment.portfolio_id);
                parent.is_some_and(|p| self.admin_portfolios.contains(&p))
            }
        }
    }
}

/// Existing assignments split by whether the request replaces them.
#[derive(Debug, Default)]
pub struct Partition<'e> {
    pub touched: Vec<&'e RoleAssignment>,
    pub untouched: Vec<&'e RoleAssignment>,
}

/// Split `existing` into assignments the request replaces and assignments it
/// carries forward. Both halves keep their original order.
pub fn partition_touched_vs_untouched<'e>(
    existing: &'e [RoleAssignment],
    scopes: &TouchedScopes,
    sites: &dyn SiteLookup,
) -> Partition<'e> {
    let (touched, untouched): (Vec<_>, Vec<_>) = existing
        .iter()
        .partition(|assignment| scopes.touches(assignment, sites));
    Partition { touched, untouched }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes the target assignment list for a managed user.
pub struct AssignmentDiffResolver<'a> {
    sites: &'a dyn SiteLookup,
}

impl<'a> AssignmentDiffResolver<'a> {
    pub fn new(sites: &'a dyn SiteLookup) -> Self {
        Self { sites }
    }

    /// Resolve `request` for a user of `customer_id`.
    ///
    /// `is_update` is false when the user is being created; a new user must
    /// end up with at least one assignment.
    pub fn resolve(
        &self,
        request: &DesiredAssignmentTree,
        customer_id: CustomerId,
        grantor: &[RoleAssignment],
        existing: &[RoleAssignment],
        is_update: bool,
    ) -> Result<Vec<RoleAssignment>> {
        let result = self.resolve_inner(request, customer_id, grantor, existing, is_update);

        let outcome = match &result {
            Ok(_) => "resolved".to_string(),
            Err(e) => e.code().to_string(),
        };
        ResolutionMetrics::record(&outcome);

        match &result {
            Ok(assignments) => debug!(
                customer_id = %customer_id,
                existing = existing.len(),
                resolved = assignments.len(),
                is_update,
                "Resolved assignment tree"
            ),
            Err(e) => debug!(
                customer_id = %customer_id,
                error_code = %e.code(),
                "Rejected assignment tree"
            ),
        }

        result
    }

    fn resolve_inner(
        &self,
        request: &DesiredAssignmentTree,
        customer_id: CustomerId,
        grantor: &[RoleAssignment],
        existing: &[RoleAssignment],
        is_update: bool,
    ) -> Result<Vec<RoleAssignment>> {
        if request.is_missing() {
            return Err(AccessError::new(
                ErrorCode::MissingRoles,
                "Either isCustomerAdmin or portfolios must be provided",
            ));
        }

        if grantor.is_empty() {
            return Err(AccessError::new(
                ErrorCode::GrantorHasNoAuthority,
                "Current user holds no role assignments",
            )
            .with_context("customerId", customer_id));
        }

        if request.wants_customer_admin() {
            if !grantor.is_customer_admin(customer_id) {
                return Err(AccessError::new(
                    ErrorCode::InsufficientAuthority,
                    format!("Only a customer admin can grant admin on customer {}", customer_id),
                )
                .with_entity(ResourceType::Customer.as_str(), customer_id)
                .with_context("customerId", customer_id));
            }
            return Ok(vec![RoleAssignment::customer_admin(customer_id)]);
        }

        if request.portfolios().is_empty() {
            return Err(AccessError::new(
                ErrorCode::NoScopeSpecified,
                "At least one portfolio must be specified",
            ));
        }

        let mut seen = HashSet::new();
        if let Some(repeated) = request
            .portfolios()
            .iter()
            .find(|p| !seen.insert(p.portfolio_id))
        {
            return Err(AccessError::validation(format!(
                "Portfolio {} is listed more than once",
                repeated.portfolio_id
            ))
            .with_entity(ResourceType::Portfolio.as_str(), repeated.portfolio_id)
            .with_context("customerId", customer_id)
            .with_context("portfolioId", repeated.portfolio_id));
        }

        let mut scopes = TouchedScopes::new(customer_id);
        let mut emitted: Vec<RoleAssignment> = Vec::new();

        for portfolio in request.portfolios() {
            self.resolve_portfolio(
                portfolio,
                customer_id,
                grantor,
                existing,
                &mut scopes,
                &mut emitted,
            )?;
        }

        let partition = partition_touched_vs_untouched(existing, &scopes, self.sites);
        debug!(
            touched = partition.touched.len(),
            untouched = partition.untouched.len(),
            "Partitioned existing assignments"
        );

        let mut result: Vec<RoleAssignment> =
            partition.untouched.into_iter().cloned().collect();
        result.extend(emitted);

        if !is_update && result.is_empty() {
            return Err(AccessError::new(
                ErrorCode::NoScopeSpecified,
                "A new user must be granted at least one role",
            ));
        }

        Ok(result)
    }

    fn resolve_portfolio(
        &self,
        portfolio: &ManagedPortfolio,
        customer_id: CustomerId,
        grantor: &[RoleAssignment],
        existing: &[RoleAssignment],
        scopes: &mut TouchedScopes,
        emitted: &mut Vec<RoleAssignment>,
    ) -> Result<()> {
        let portfolio_id = portfolio.portfolio_id;
        let scope = format!("portfolio {}", portfolio_id);
        let role = RoleCatalog::resolve(ResourceType::Portfolio, &portfolio.role, &scope)?;

        let clears_existing = role.is_none() && existing.portfolio_role(portfolio_id).is_some();
        if (role.is_some() || clears_existing)
            && !grantor.can_administer_portfolio(customer_id, portfolio_id)
        {
            return Err(AccessError::new(
                ErrorCode::InsufficientAuthority,
                format!("Current user cannot assign roles on {}", scope),
            )
            .with_entity(ResourceType::Portfolio.as_str(), portfolio_id)
            .with_context("customerId", customer_id)
            .with_context("portfolioId", portfolio_id));
        }

        let is_admin = role == Some(WellKnownRoleId::PortfolioAdmin);
        scopes.touch_portfolio(portfolio_id, is_admin);

        if let Some(role_id) = role {
            push_replacing(emitted, RoleAssignment::portfolio(role_id, portfolio_id, customer_id));
        }

        for site in &portfolio.sites {
            let scope = format!("site {}", site.site_id);
            let site_role = RoleCatalog::resolve(ResourceType::Site, &site.role, &scope)?;
            let record = self.lookup_site(site, portfolio_id, customer_id)?;

            let clears_existing = site_role.is_none() && existing.site_role(site.site_id).is_some();
            if (site_role.is_some() || clears_existing)
                && !can_administer_site(grantor, customer_id, &record)
            {
                return Err(AccessError::new(
                    ErrorCode::InsufficientAuthority,
                    format!("Current user cannot assign roles on {}", scope),
                )
                .with_entity(ResourceType::Site.as_str(), site.site_id)
                .with_context("customerId", customer_id)
                .with_context("portfolioId", record.portfolio_id)
                .with_context("siteId", site.site_id));
            }

            scopes.touch_site(site.site_id);

            if is_admin {
                continue;
            }
            if let Some(role_id) = site_role {
                push_replacing(
                    emitted,
                    RoleAssignment::site(role_id, site.site_id, Some(record.portfolio_id), customer_id),
                );
            }
        }

        Ok(())
    }

    /// The site must exist, belong to `customer_id`, and sit under the
    /// portfolio entry it was sent in.
    fn lookup_site(
        &self,
        site: &ManagedSite,
        portfolio_id: PortfolioId,
        customer_id: CustomerId,
    ) -> Result<SiteRecord> {
        let mismatch = |reason: &str| {
            AccessError::new(
                ErrorCode::ResourceMismatch,
                format!("Site {} {}", site.site_id, reason),
            )
            .with_entity(ResourceType::Site.as_str(), site.site_id)
            .with_context("customerId", customer_id)
            .with_context("portfolioId", portfolio_id)
            .with_context("siteId", site.site_id)
        };

        let record = self
            .sites
            .get_site(&site.site_id)
            .ok_or_else(|| mismatch("does not exist"))?;

        if record.customer_id != customer_id {
            return Err(mismatch("belongs to another customer"));
        }
        if record.portfolio_id != portfolio_id {
            return Err(mismatch("is not part of the requested portfolio"));
        }
        Ok(record)
    }
}

fn can_administer_site(grantor: &[RoleAssignment], customer_id: CustomerId, site: &SiteRecord) -> bool {
    grantor.can_administer_portfolio(customer_id, site.portfolio_id)
        || grantor.iter().any(|a| a.is_site_admin_of(site.id))
}

/// Append `assignment`, replacing an earlier one on the same node in place.
fn push_replacing(emitted: &mut Vec<RoleAssignment>, assignment: RoleAssignment) {
    let resource = assignment.resource();
    match emitted.iter_mut().find(|a| a.resource() == resource) {
        Some(slot) => *slot = assignment,
        None => emitted.push(assignment),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
