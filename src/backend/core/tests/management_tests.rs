//! Integration tests for the management service over the in-memory directory.

use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use std::sync::Arc;

use portal_access::config::NotificationConfig;
use portal_access::error::ErrorCode;
use portal_access::hierarchy::{CustomerId, PortfolioId, PortfolioRecord, PrincipalId, SiteId, SiteRecord};
use portal_access::management::{
    AssignmentStore, CreateManagedUserRequest, InMemoryDirectory, ManagementService,
    NotificationTemplate, UpdateManagedUserRequest, UserDirectory,
};
use portal_access::rbac::{
    DesiredAssignmentTree, ManagedPortfolio, ManagedSite, RoleAssignment, User, UserStatus,
    WellKnownRoleId,
};

// ============================================================================
// Test Utilities
// ============================================================================

struct Fixture {
    directory: Arc<InMemoryDirectory>,
    service: ManagementService,
    customer: CustomerId,
    north: PortfolioId,
    south: PortfolioId,
    harbour: SiteId,
    quay: SiteId,
    mill: SiteId,
    admin: PrincipalId,
}

fn fixture_with(config: NotificationConfig) -> Fixture {
    let directory = Arc::new(InMemoryDirectory::new());
    let customer = CustomerId::random();
    let (north, south) = (PortfolioId::random(), PortfolioId::random());
    let (harbour, quay, mill) = (SiteId::random(), SiteId::random(), SiteId::random());

    directory.add_portfolio(PortfolioRecord {
        id: north,
        customer_id: customer,
        name: "North".to_string(),
        sites: vec![
            SiteRecord::new(harbour, north, customer).with_name("Harbour"),
            SiteRecord::new(quay, north, customer).with_name("Quay"),
        ],
    });
    directory.add_portfolio(PortfolioRecord {
        id: south,
        customer_id: customer,
        name: "South".to_string(),
        sites: vec![SiteRecord::new(mill, south, customer).with_name("Mill")],
    });

    let admin = random_user(customer);
    let admin_id = admin.id;
    directory.add_user(admin, vec![RoleAssignment::customer_admin(customer)]);

    Fixture {
        service: ManagementService::in_memory(directory.clone(), config),
        directory,
        customer,
        north,
        south,
        harbour,
        quay,
        mill,
        admin: admin_id,
    }
}

fn fixture() -> Fixture {
    fixture_with(NotificationConfig::default())
}

fn random_user(customer: CustomerId) -> User {
    User::new(
        customer,
        FirstName().fake::<String>(),
        LastName().fake::<String>(),
        unique_email(),
    )
}

/// Fake local part, made unique so that no two fixtures collide on e-mail.
fn unique_email() -> String {
    let local: String = FirstName().fake();
    format!("{}.{}@example.com", local.to_lowercase(), PrincipalId::random())
}

fn create_request(access: DesiredAssignmentTree) -> CreateManagedUserRequest {
    CreateManagedUserRequest {
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        email: unique_email(),
        contact_number: Some("+44 20 7946 0000".to_string()),
        company: None,
        access,
    }
}

fn update_request(access: DesiredAssignmentTree) -> UpdateManagedUserRequest {
    UpdateManagedUserRequest {
        first_name: "Mary".to_string(),
        last_name: "Jackson".to_string(),
        contact_number: None,
        company: Some("Langley".to_string()),
        access,
    }
}

impl Fixture {
    /// An active user holding the given assignments.
    fn add_managed(&self, assignments: Vec<RoleAssignment>) -> PrincipalId {
        let user = random_user(self.customer);
        let id = user.id;
        self.directory.add_user(user, assignments);
        id
    }

    fn harbour_viewer(&self) -> DesiredAssignmentTree {
        DesiredAssignmentTree::with_portfolios(vec![ManagedPortfolio::new(self.north, "")
            .with_site(ManagedSite::new(self.harbour, "Viewer").with_name("Harbour"))])
    }
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_user_with_site_access() {
    let f = fixture();
    let request = create_request(f.harbour_viewer());
    let email = request.email.clone();

    let view = f
        .service
        .create_managed_user(f.customer, f.admin, request, "en")
        .await
        .unwrap();

    assert_eq!(view.email, email);
    assert_eq!(view.status, UserStatus::Pending);
    assert!(!view.is_customer_admin);
    assert_eq!(view.portfolios, f.harbour_viewer().portfolios().to_vec());

    let stored = f.directory.get_assignments(view.id).await.unwrap();
    assert_eq!(
        stored,
        vec![RoleAssignment::site(
            WellKnownRoleId::SiteViewer,
            f.harbour,
            Some(f.north),
            f.customer
        )
        .with_principal(view.id)]
    );

    let sent = f.directory.sent_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, NotificationTemplate::SiteAssigned);
    assert_eq!(sent[0].user_id, view.id);
    assert_eq!(sent[0].data["SitesInTitle"], "Harbour");
    assert_eq!(sent[0].data["SitesLabel"], "site");
}

#[tokio::test]
async fn test_create_customer_admin_sends_super_user_template() {
    let f = fixture();

    let view = f
        .service
        .create_managed_user(
            f.customer,
            f.admin,
            create_request(DesiredAssignmentTree::customer_admin()),
            "de",
        )
        .await
        .unwrap();

    assert!(view.is_customer_admin);
    assert!(view.portfolios.is_empty());
    let sent = f.directory.sent_notifications();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, NotificationTemplate::AssignSuperUserRole);
    assert_eq!(sent[0].locale, "de");
}

#[tokio::test]
async fn test_create_with_taken_email_fails() {
    let f = fixture();
    let first = create_request(f.harbour_viewer());
    let mut second = create_request(f.harbour_viewer());
    second.email = first.email.to_uppercase();

    f.service
        .create_managed_user(f.customer, f.admin, first, "en")
        .await
        .unwrap();
    let err = f
        .service
        .create_managed_user(f.customer, f.admin, second, "en")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::UserAlreadyExists);
}

#[tokio::test]
async fn test_create_beyond_authority_writes_nothing() {
    let f = fixture();
    let portfolio_admin = f.add_managed(vec![RoleAssignment::portfolio(
        WellKnownRoleId::PortfolioAdmin,
        f.north,
        f.customer,
    )]);
    let users_before = f.directory.user_count();

    let request = create_request(DesiredAssignmentTree::with_portfolios(vec![
        ManagedPortfolio::new(f.south, "Viewer"),
    ]));
    let err = f
        .service
        .create_managed_user(f.customer, portfolio_admin, request, "en")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InsufficientAuthority);
    assert_eq!(f.directory.user_count(), users_before);
    assert!(f.directory.sent_notifications().is_empty());
}

#[tokio::test]
async fn test_create_with_foreign_portfolio_is_mismatch() {
    let f = fixture();
    let foreign = PortfolioId::random();
    let users_before = f.directory.user_count();

    let request = create_request(DesiredAssignmentTree::with_portfolios(vec![
        ManagedPortfolio::new(f.north, "Viewer"),
        ManagedPortfolio::new(foreign, "Admin"),
    ]));
    let err = f
        .service
        .create_managed_user(f.customer, f.admin, request, "en")
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ResourceMismatch);
    assert_eq!(err.context_value("portfolioId"), Some(foreign.to_string()));
    assert_eq!(f.directory.user_count(), users_before);
}

#[tokio::test]
async fn test_directory_rejects_duplicate_email() {
    let f = fixture();
    let first = random_user(f.customer);
    let mut second = random_user(CustomerId::random());
    second.email = first.email.to_uppercase();

    f.directory.create_user(first).await.unwrap();
    let err = f.directory.create_user(second.clone()).await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::UserAlreadyExists);
    assert!(f.directory.get_user(second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_by_viewer_is_unauthorized() {
    let f = fixture();
    let viewer = f.add_managed(vec![RoleAssignment::portfolio(
        WellKnownRoleId::PortfolioViewer,
        f.north,
        f.customer,
    )]);

    let err = f
        .service
        .create_managed_user(f.customer, viewer, create_request(f.harbour_viewer()), "en")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_create_without_notifications() {
    let f = fixture_with(NotificationConfig {
        enabled: false,
        ..NotificationConfig::default()
    });

    f.service
        .create_managed_user(f.customer, f.admin, create_request(f.harbour_viewer()), "en")
        .await
        .unwrap();
    assert!(f.directory.sent_notifications().is_empty());
}

// ============================================================================
// Read
// ============================================================================

#[tokio::test]
async fn test_get_user_lists_portfolio_sites() {
    let f = fixture();
    let managed = f.add_managed(vec![RoleAssignment::portfolio(
        WellKnownRoleId::PortfolioViewer,
        f.north,
        f.customer,
    )]);

    let view = f
        .service
        .get_managed_user(f.customer, f.admin, managed)
        .await
        .unwrap();

    assert!(!view.is_customer_admin);
    assert_eq!(view.portfolios.len(), 1);
    let north = &view.portfolios[0];
    assert_eq!(north.portfolio_id, f.north);
    assert_eq!(north.portfolio_name.as_deref(), Some("North"));
    assert_eq!(north.role, "Viewer");
    let sites: Vec<(SiteId, &str)> = north.sites.iter().map(|s| (s.site_id, s.role.as_str())).collect();
    assert_eq!(sites, vec![(f.harbour, "Viewer"), (f.quay, "Viewer")]);
}

#[tokio::test]
async fn test_get_customer_admin_omits_portfolios() {
    let f = fixture();
    let managed = f.add_managed(vec![RoleAssignment::customer_admin(f.customer)]);

    let view = f
        .service
        .get_managed_user(f.customer, f.admin, managed)
        .await
        .unwrap();
    assert!(view.is_customer_admin);
    assert!(view.portfolios.is_empty());
}

#[tokio::test]
async fn test_get_unknown_user() {
    let f = fixture();

    let err = f
        .service
        .get_managed_user(f.customer, f.admin, PrincipalId::random())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UserNotFound);
}

#[tokio::test]
async fn test_get_pending_user_is_unauthorized() {
    let f = fixture();
    let view = f
        .service
        .create_managed_user(f.customer, f.admin, create_request(f.harbour_viewer()), "en")
        .await
        .unwrap();

    let err = f
        .service
        .get_managed_user(f.customer, f.admin, view.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_managed_portfolios_of_site_user() {
    let f = fixture();
    let managed = f.add_managed(vec![RoleAssignment::site(
        WellKnownRoleId::SiteAdmin,
        f.mill,
        Some(f.south),
        f.customer,
    )]);

    let portfolios = f.service.managed_portfolios(f.customer, managed).await.unwrap();

    assert_eq!(portfolios.len(), 1);
    assert_eq!(portfolios[0].portfolio_id, f.south);
    assert_eq!(portfolios[0].role, "");
    assert_eq!(portfolios[0].sites.len(), 1);
    assert_eq!(portfolios[0].sites[0].site_name, "Mill");
    assert_eq!(portfolios[0].sites[0].role, "Admin");
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_replaces_touched_and_keeps_rest() {
    let f = fixture();
    let managed = f.add_managed(vec![
        RoleAssignment::site(WellKnownRoleId::SiteViewer, f.harbour, Some(f.north), f.customer),
        RoleAssignment::site(WellKnownRoleId::SiteViewer, f.mill, Some(f.south), f.customer),
    ]);

    let access = DesiredAssignmentTree::with_portfolios(vec![ManagedPortfolio::new(f.north, "Admin")]);
    let view = f
        .service
        .update_managed_user(f.customer, f.admin, managed, update_request(access), "en")
        .await
        .unwrap();

    assert_eq!(view.first_name, "Mary");
    assert_eq!(view.portfolios.len(), 1);
    assert_eq!(view.portfolios[0].portfolio_id, f.north);
    assert_eq!(view.portfolios[0].role, "Admin");
    let stored = f.directory.get_assignments(managed).await.unwrap();
    assert_eq!(
        stored,
        vec![
            RoleAssignment::site(WellKnownRoleId::SiteViewer, f.mill, Some(f.south), f.customer)
                .with_principal(managed),
            RoleAssignment::portfolio(WellKnownRoleId::PortfolioAdmin, f.north, f.customer)
                .with_principal(managed),
        ]
    );

    let user = f.directory.get_user(managed).await.unwrap().unwrap();
    assert_eq!(user.company.as_deref(), Some("Langley"));
    // No site was granted explicitly, so nothing is announced.
    assert!(f.directory.sent_notifications().is_empty());
}

#[tokio::test]
async fn test_update_may_clear_all_access() {
    let f = fixture();
    let managed = f.add_managed(vec![RoleAssignment::site(
        WellKnownRoleId::SiteViewer,
        f.harbour,
        Some(f.north),
        f.customer,
    )]);

    let access = DesiredAssignmentTree::with_portfolios(vec![ManagedPortfolio::new(f.north, "")
        .with_site(ManagedSite::new(f.harbour, ""))]);
    f.service
        .update_managed_user(f.customer, f.admin, managed, update_request(access), "en")
        .await
        .unwrap();

    assert!(f.directory.get_assignments(managed).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_by_unrelated_site_admin_is_unauthorized() {
    let f = fixture();
    let site_admin = f.add_managed(vec![RoleAssignment::site(
        WellKnownRoleId::SiteAdmin,
        f.quay,
        Some(f.north),
        f.customer,
    )]);
    let managed = f.add_managed(vec![RoleAssignment::site(
        WellKnownRoleId::SiteViewer,
        f.mill,
        Some(f.south),
        f.customer,
    )]);

    let err = f
        .service
        .update_managed_user(
            f.customer,
            site_admin,
            managed,
            update_request(f.harbour_viewer()),
            "en",
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_pending_user() {
    let f = fixture();
    let view = f
        .service
        .create_managed_user(f.customer, f.admin, create_request(f.harbour_viewer()), "en")
        .await
        .unwrap();
    let users_before = f.directory.user_count();

    f.service
        .delete_managed_user(f.customer, f.admin, view.id)
        .await
        .unwrap();

    assert_eq!(f.directory.user_count(), users_before - 1);
    assert!(f.directory.get_assignments(view.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_unknown_user() {
    let f = fixture();

    let err = f
        .service
        .delete_managed_user(f.customer, f.admin, PrincipalId::random())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UserNotFound);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_creates_are_independent() {
    let f = fixture();
    let users_before = f.directory.user_count();

    let creates = (0..8).map(|_| {
        let service = f.service.clone();
        let request = create_request(f.harbour_viewer());
        let (customer, admin) = (f.customer, f.admin);
        async move { service.create_managed_user(customer, admin, request, "en").await }
    });
    let results = futures::future::join_all(creates).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(f.directory.user_count(), users_before + 8);
    assert_eq!(f.directory.sent_notifications().len(), 8);
}
