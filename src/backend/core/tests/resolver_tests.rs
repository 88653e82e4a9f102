//! Integration tests for assignment resolution.
//!
//! Fixture hierarchy: one customer with portfolio P1 (sites S, S2) and
//! portfolio P2 (sites S3, S4), plus a second customer owning site X.

use portal_access::error::{ErrorCode, ErrorKind};
use portal_access::hierarchy::{CustomerId, PortfolioId, PrincipalId, SiteDirectory, SiteId, SiteRecord};
use portal_access::rbac::{
    AssignmentDiffResolver, DesiredAssignmentTree, ManagedPortfolio, ManagedSite, RoleAssignment,
    WellKnownRoleId,
};

// ============================================================================
// Test Utilities
// ============================================================================

struct World {
    customer: CustomerId,
    p1: PortfolioId,
    p2: PortfolioId,
    s: SiteId,
    s2: SiteId,
    s3: SiteId,
    s4: SiteId,
    foreign_site: SiteId,
    managed: PrincipalId,
    sites: SiteDirectory,
}

fn world() -> World {
    let customer = CustomerId::random();
    let other_customer = CustomerId::random();
    let p1 = PortfolioId::random();
    let p2 = PortfolioId::random();
    let foreign_portfolio = PortfolioId::random();
    let (s, s2, s3, s4, foreign_site) = (
        SiteId::random(),
        SiteId::random(),
        SiteId::random(),
        SiteId::random(),
        SiteId::random(),
    );

    let sites = SiteDirectory::new()
        .with_site(SiteRecord::new(s, p1, customer).with_name("Bedrock"))
        .with_site(SiteRecord::new(s2, p1, customer).with_name("Quarry"))
        .with_site(SiteRecord::new(s3, p2, customer).with_name("Harbour"))
        .with_site(SiteRecord::new(s4, p2, customer).with_name("Dock"))
        .with_site(SiteRecord::new(foreign_site, foreign_portfolio, other_customer));

    World {
        customer,
        p1,
        p2,
        s,
        s2,
        s3,
        s4,
        foreign_site,
        managed: PrincipalId::random(),
        sites,
    }
}

impl World {
    fn customer_admin(&self) -> Vec<RoleAssignment> {
        vec![RoleAssignment::customer_admin(self.customer)]
    }

    fn portfolio(&self, role: WellKnownRoleId, portfolio: PortfolioId) -> RoleAssignment {
        RoleAssignment::portfolio(role, portfolio, self.customer)
    }

    fn site(&self, role: WellKnownRoleId, site: SiteId) -> RoleAssignment {
        let parent = if site == self.s || site == self.s2 { self.p1 } else { self.p2 };
        RoleAssignment::site(role, site, Some(parent), self.customer)
    }

    /// An assignment as the store returns it, stamped with the managed user.
    fn stored(&self, assignment: RoleAssignment) -> RoleAssignment {
        assignment.with_principal(self.managed)
    }
}

fn request(portfolios: Vec<ManagedPortfolio>) -> DesiredAssignmentTree {
    DesiredAssignmentTree::with_portfolios(portfolios)
}

// ============================================================================
// Request Validation
// ============================================================================

#[test]
fn test_missing_roles() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let err = resolver
        .resolve(&DesiredAssignmentTree::default(), w.customer, &w.customer_admin(), &[], false)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::MissingRoles);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_missing_roles_precedes_grantor_check() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let err = resolver
        .resolve(&DesiredAssignmentTree::default(), w.customer, &[], &[], false)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingRoles);
}

#[test]
fn test_grantor_without_assignments() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let err = resolver
        .resolve(&request(vec![ManagedPortfolio::new(w.p1, "Viewer")]), w.customer, &[], &[], false)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::GrantorHasNoAuthority);
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_not_admin_without_portfolios() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let no_list = DesiredAssignmentTree {
        is_customer_admin: Some(false),
        portfolios: None,
    };
    let err = resolver
        .resolve(&no_list, w.customer, &w.customer_admin(), &[], false)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoScopeSpecified);

    let err = resolver
        .resolve(&request(vec![]), w.customer, &w.customer_admin(), &[], true)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoScopeSpecified);
}

#[test]
fn test_invalid_portfolio_role() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let err = resolver
        .resolve(
            &request(vec![ManagedPortfolio::new(w.p1, "bob")]),
            w.customer,
            &w.customer_admin(),
            &[],
            false,
        )
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidRoleName);
    assert!(err.user_message().contains(&w.p1.to_string()));
}

#[test]
fn test_invalid_site_role() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);

    let err = resolver
        .resolve(
            &request(vec![
                ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, "frank"))
            ]),
            w.customer,
            &w.customer_admin(),
            &[],
            false,
        )
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidRoleName);
    assert!(err.user_message().contains("frank"));
    assert!(err.user_message().contains(&w.s.to_string()));
}

// ============================================================================
// Customer Admin
// ============================================================================

#[test]
fn test_grant_customer_admin() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let existing = vec![w.stored(w.site(WellKnownRoleId::SiteViewer, w.s))];

    let result = resolver
        .resolve(&DesiredAssignmentTree::customer_admin(), w.customer, &w.customer_admin(), &existing, true)
        .unwrap();

    assert_eq!(result, vec![RoleAssignment::customer_admin(w.customer)]);
}

#[test]
fn test_grant_customer_admin_needs_same_customer() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let grantor = vec![RoleAssignment::customer_admin(CustomerId::random())];

    let err = resolver
        .resolve(&DesiredAssignmentTree::customer_admin(), w.customer, &grantor, &[], false)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientAuthority);
}

#[test]
fn test_grant_customer_admin_denied_to_portfolio_viewer() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let grantor = vec![w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1)];

    let err = resolver
        .resolve(&DesiredAssignmentTree::customer_admin(), w.customer, &grantor, &[], false)
        .unwrap_err();
    assert!(err.is_authorization());
}

// ============================================================================
// Portfolio and Site Grants
// ============================================================================

#[test]
fn test_portfolio_admin_granted_by_portfolio_admin_or_customer_admin() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "Admin")]);
    let expected = vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)];

    for grantor in [
        vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)],
        w.customer_admin(),
    ] {
        let result = resolver.resolve(&req, w.customer, &grantor, &[], false).unwrap();
        assert_eq!(result, expected);
    }
}

#[test]
fn test_site_viewer_granted_without_portfolio_role() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, "Viewer"))
    ]);
    let expected = vec![w.site(WellKnownRoleId::SiteViewer, w.s)];

    for grantor in [
        vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)],
        w.customer_admin(),
        vec![w.site(WellKnownRoleId::SiteAdmin, w.s)],
    ] {
        let result = resolver.resolve(&req, w.customer, &grantor, &[], false).unwrap();
        assert_eq!(result, expected);
    }
}

#[test]
fn test_site_admin_of_another_site_cannot_grant() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, "Viewer"))
    ]);
    let grantor = vec![w.site(WellKnownRoleId::SiteAdmin, w.s2)];

    let err = resolver.resolve(&req, w.customer, &grantor, &[], false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientAuthority);
    assert_eq!(err.context_value("siteId"), Some(w.s.to_string()));
}

#[test]
fn test_portfolio_admin_cannot_grant_on_other_portfolio() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let grantor = vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)];

    let err = resolver
        .resolve(&request(vec![ManagedPortfolio::new(w.p2, "Viewer")]), w.customer, &grantor, &[], false)
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InsufficientAuthority);
    assert_eq!(err.context_value("portfolioId"), Some(w.p2.to_string()));
}

#[test]
fn test_site_from_other_customer_is_mismatch() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.foreign_site, "Viewer"))
    ]);

    let err = resolver.resolve(&req, w.customer, &w.customer_admin(), &[], false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceMismatch);
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn test_unknown_site_is_mismatch() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(SiteId::random(), "Viewer"))
    ]);

    let err = resolver.resolve(&req, w.customer, &w.customer_admin(), &[], false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceMismatch);
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_creating_user_without_assignments_fails() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, ""))]);

    let err = resolver.resolve(&req, w.customer, &w.customer_admin(), &[], false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoScopeSpecified);
}

#[test]
fn test_update_may_remove_every_assignment() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, ""))]);
    let existing = vec![w.stored(w.site(WellKnownRoleId::SiteViewer, w.s))];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_site_request_drops_customer_admin() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, "Viewer"))
    ]);
    let existing = vec![w.stored(RoleAssignment::customer_admin(w.customer))];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    assert_eq!(result, vec![w.site(WellKnownRoleId::SiteViewer, w.s)]);
}

#[test]
fn test_remove_one_site_keeps_the_other() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, ""))]);
    let existing = vec![
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s2)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s)),
    ];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, false)
        .unwrap();
    assert_eq!(result, vec![existing[0].clone()]);
}

// ============================================================================
// Replacement, Escalation and Elision
// ============================================================================

#[test]
fn test_portfolio_then_its_sites() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "Viewer").with_site(ManagedSite::new(w.s, "Admin"))
    ]);
    let existing = vec![
        w.stored(w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s)),
    ];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    assert_eq!(
        result,
        vec![
            w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1),
            w.site(WellKnownRoleId::SiteAdmin, w.s),
        ]
    );
}

#[test]
fn test_site_viewer_under_portfolio_viewer_is_kept() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "Viewer").with_site(ManagedSite::new(w.s, "Viewer"))
    ]);

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &[], false)
        .unwrap();
    assert_eq!(
        result,
        vec![
            w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1),
            w.site(WellKnownRoleId::SiteViewer, w.s),
        ]
    );
}

#[test]
fn test_upgrade_site_keeps_other_sites() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "").with_site(ManagedSite::new(w.s, "Admin"))
    ]);
    let existing = vec![
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s2)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s)),
    ];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    assert_eq!(
        result,
        vec![existing[0].clone(), w.site(WellKnownRoleId::SiteAdmin, w.s)]
    );
}

#[test]
fn test_portfolio_viewer_replaces_cleared_sites() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "Viewer")
        .with_site(ManagedSite::new(w.s, ""))
        .with_site(ManagedSite::new(w.s2, ""))]);
    let existing = vec![
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s2)),
    ];
    let grantor = vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)];

    let result = resolver.resolve(&req, w.customer, &grantor, &existing, true).unwrap();
    assert_eq!(result, vec![w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1)]);
}

#[test]
fn test_sites_of_other_portfolios_are_carried_first() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "Viewer")
        .with_site(ManagedSite::new(w.s, ""))
        .with_site(ManagedSite::new(w.s2, ""))]);
    let existing = vec![
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s2)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s3)),
        w.stored(w.site(WellKnownRoleId::SiteViewer, w.s4)),
    ];

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    assert_eq!(
        result,
        vec![
            existing[2].clone(),
            existing[3].clone(),
            w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1),
        ]
    );
}

#[test]
fn test_portfolio_admin_absorbs_site_roles() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![ManagedPortfolio::new(w.p1, "Admin")
        .with_site(ManagedSite::new(w.s, "Viewer"))
        .with_site(ManagedSite::new(w.s2, "Admin"))]);

    let result = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &[], false)
        .unwrap();
    assert_eq!(result, vec![w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p1)]);
}

#[test]
fn test_resolving_twice_is_stable() {
    let w = world();
    let resolver = AssignmentDiffResolver::new(&w.sites);
    let req = request(vec![
        ManagedPortfolio::new(w.p1, "Viewer").with_site(ManagedSite::new(w.s, "Admin")),
        ManagedPortfolio::new(w.p2, "Admin"),
    ]);
    let existing = vec![w.stored(w.site(WellKnownRoleId::SiteViewer, w.s3))];

    let first = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &existing, true)
        .unwrap();
    let second = resolver
        .resolve(&req, w.customer, &w.customer_admin(), &first, true)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            w.portfolio(WellKnownRoleId::PortfolioViewer, w.p1),
            w.site(WellKnownRoleId::SiteAdmin, w.s),
            w.portfolio(WellKnownRoleId::PortfolioAdmin, w.p2),
        ]
    );
}
