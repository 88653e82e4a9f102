//! User management: the async composition of gate, resolver, stores and
//! notifications.
//!
//! Every operation loads what the pure core needs (the actor, the managed
//! user, a snapshot of the sites involved), asks the core for a decision and
//! only then writes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use portal_access::management::{InMemoryDirectory, ManagementService};
//!
//! let directory = Arc::new(InMemoryDirectory::new());
//! let service = ManagementService::in_memory(directory, config.notifications.clone());
//! let view = service.get_managed_user(customer_id, current_user_id, managed_user_id).await?;
//! ```

pub mod models;
pub mod notification;
pub mod store;

pub use models::{
    managed_portfolios_view, CreateManagedUserRequest, ManagedUserView, UpdateManagedUserRequest,
};
pub use notification::{access_granted_notification, Notification, NotificationTemplate};
pub use store::{AssignmentStore, InMemoryDirectory, NotificationSender, SiteRepository, UserDirectory};

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::NotificationConfig;
use crate::error::{AccessError, ErrorCode, Result};
use crate::hierarchy::{CustomerId, PortfolioId, PrincipalId, ResourceType, SiteDirectory, SiteId};
use crate::rbac::{
    ActorSnapshot, AssignmentDiffResolver, AssignmentSet, AuthorizationGate, DesiredAssignmentTree,
    ManagedPortfolio, ManagedUserSnapshot, RoleAssignment, User, UserStatus,
};
use crate::telemetry::metrics::OperationTimer;
use crate::telemetry::LogEventBuilder;

/// Orchestrates managed-user operations for one deployment.
#[derive(Clone)]
pub struct ManagementService {
    assignments: Arc<dyn AssignmentStore>,
    users: Arc<dyn UserDirectory>,
    sites: Arc<dyn SiteRepository>,
    notifier: Arc<dyn NotificationSender>,
    config: NotificationConfig,
}

impl ManagementService {
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        users: Arc<dyn UserDirectory>,
        sites: Arc<dyn SiteRepository>,
        notifier: Arc<dyn NotificationSender>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            assignments,
            users,
            sites,
            notifier,
            config,
        }
    }

    /// A service whose collaborators are all the same in-memory directory.
    pub fn in_memory(directory: Arc<InMemoryDirectory>, config: NotificationConfig) -> Self {
        Self::new(
            directory.clone(),
            directory.clone(),
            directory.clone(),
            directory,
            config,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The managed user with their access, as seen by `current_user_id`.
    #[instrument(skip(self))]
    pub async fn get_managed_user(
        &self,
        customer_id: CustomerId,
        current_user_id: PrincipalId,
        managed_user_id: PrincipalId,
    ) -> Result<ManagedUserView> {
        let timer = OperationTimer::start("get_managed_user");
        let result: Result<ManagedUserView> = async {
            let (actor, managed) = tokio::try_join!(
                self.load_actor(current_user_id),
                self.load_managed(managed_user_id)
            )?;

            let sites = self.site_snapshot(None, &managed.assignments).await?;
            let access =
                AuthorizationGate::new(&sites).ensure_access_user(customer_id, &actor, managed)?;

            let mut view = ManagedUserView::from_user(&access.user);
            view.is_customer_admin = access.assignments.is_customer_admin(customer_id);
            if !view.is_customer_admin {
                view.portfolios = self.portfolios_view(customer_id, &access.assignments).await?;
            }
            Ok(view)
        }
        .await;
        timer.observe(result)
    }

    /// Create a user of `customer_id` with the requested access.
    ///
    /// The new account starts out `Pending` until the user signs in.
    #[instrument(skip(self, request), fields(portfolios = request.access.portfolios().len()))]
    pub async fn create_managed_user(
        &self,
        customer_id: CustomerId,
        current_user_id: PrincipalId,
        request: CreateManagedUserRequest,
        language: &str,
    ) -> Result<ManagedUserView> {
        let timer = OperationTimer::start("create_managed_user");
        let result: Result<ManagedUserView> = async {
            let actor = self.load_actor(current_user_id).await?;
            let no_sites = SiteDirectory::new();
            AuthorizationGate::new(&no_sites).ensure_can_create_user(customer_id, &actor)?;

            self.ensure_email_available(&request.email).await?;
            self.ensure_known_portfolios(customer_id, &request.access).await?;

            let sites = self.site_snapshot(Some(&request.access), &[]).await?;
            let target = AssignmentDiffResolver::new(&sites).resolve(
                &request.access,
                customer_id,
                &actor.assignments,
                &[],
                false,
            )?;

            let mut user = User::new(customer_id, request.first_name, request.last_name, request.email)
                .with_status(UserStatus::Pending);
            user.contact_number = request.contact_number;
            user.company = request.company;
            let user = self.users.create_user(user).await?;

            let view = self
                .post_create_update(customer_id, &user, target, &request.access, language)
                .await?;

            LogEventBuilder::info("Managed user created")
                .field("customerId", customer_id)
                .field("currentUserId", current_user_id)
                .field("userId", user.id)
                .field("email", &user.email)
                .field("isCustomerAdmin", view.is_customer_admin)
                .emit();

            Ok(view)
        }
        .await;
        timer.observe(result)
    }

    /// Update the managed user's profile and access.
    #[instrument(skip(self, request), fields(portfolios = request.access.portfolios().len()))]
    pub async fn update_managed_user(
        &self,
        customer_id: CustomerId,
        current_user_id: PrincipalId,
        managed_user_id: PrincipalId,
        request: UpdateManagedUserRequest,
        language: &str,
    ) -> Result<ManagedUserView> {
        let timer = OperationTimer::start("update_managed_user");
        let result: Result<ManagedUserView> = async {
            let (actor, managed) = tokio::try_join!(
                self.load_actor(current_user_id),
                self.load_managed(managed_user_id)
            )?;

            let sites = self
                .site_snapshot(Some(&request.access), &managed.assignments)
                .await?;
            let access =
                AuthorizationGate::new(&sites).ensure_access_user(customer_id, &actor, managed)?;
            self.ensure_known_portfolios(customer_id, &request.access).await?;

            let target = AssignmentDiffResolver::new(&sites).resolve(
                &request.access,
                customer_id,
                &actor.assignments,
                &access.assignments,
                true,
            )?;

            let mut user = access.user;
            user.first_name = request.first_name;
            user.last_name = request.last_name;
            user.contact_number = request.contact_number;
            user.company = request.company;
            let user = self.users.update_user(user).await?;

            let view = self
                .post_create_update(customer_id, &user, target, &request.access, language)
                .await?;

            LogEventBuilder::info("Managed user updated")
                .field("customerId", customer_id)
                .field("currentUserId", current_user_id)
                .field("userId", user.id)
                .field("email", &user.email)
                .field("isCustomerAdmin", view.is_customer_admin)
                .emit();

            Ok(view)
        }
        .await;
        timer.observe(result)
    }

    /// Delete the managed user. Users that never activated may be deleted too.
    #[instrument(skip(self))]
    pub async fn delete_managed_user(
        &self,
        customer_id: CustomerId,
        current_user_id: PrincipalId,
        managed_user_id: PrincipalId,
    ) -> Result<()> {
        let timer = OperationTimer::start("delete_managed_user");
        let result: Result<()> = async {
            let (actor, managed) = tokio::try_join!(
                self.load_actor(current_user_id),
                self.load_managed(managed_user_id)
            )?;

            let sites = self.site_snapshot(None, &managed.assignments).await?;
            let access =
                AuthorizationGate::new(&sites).ensure_can_delete_user(customer_id, &actor, managed)?;

            self.users.delete_user(access.user.id).await?;

            LogEventBuilder::info("Managed user deleted")
                .field("customerId", customer_id)
                .field("currentUserId", current_user_id)
                .field("userId", access.user.id)
                .field("email", &access.user.email)
                .emit();

            Ok(())
        }
        .await;
        timer.observe(result)
    }

    /// The portfolio view of a user's stored assignments.
    #[instrument(skip(self))]
    pub async fn managed_portfolios(
        &self,
        customer_id: CustomerId,
        user_id: PrincipalId,
    ) -> Result<Vec<ManagedPortfolio>> {
        let assignments = self.assignments.get_assignments(user_id).await?;
        self.portfolios_view(customer_id, &assignments).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_actor(&self, current_user_id: PrincipalId) -> Result<ActorSnapshot> {
        let (user, assignments) = tokio::try_join!(
            self.users.get_user(current_user_id),
            self.assignments.get_assignments(current_user_id)
        )?;
        Ok(ActorSnapshot {
            id: current_user_id,
            status: user.map(|u| u.status),
            assignments,
        })
    }

    async fn load_managed(&self, managed_user_id: PrincipalId) -> Result<ManagedUserSnapshot> {
        let (user, assignments) = tokio::try_join!(
            self.users.get_user(managed_user_id),
            self.assignments.get_assignments(managed_user_id)
        )?;
        let user = user.ok_or_else(|| AccessError::user_not_found(managed_user_id))?;
        Ok(ManagedUserSnapshot { user, assignments })
    }

    /// Fetch every site the core may look up: the request's sites and the
    /// sites of the given assignments.
    async fn site_snapshot(
        &self,
        request: Option<&DesiredAssignmentTree>,
        assignments: &[RoleAssignment],
    ) -> Result<SiteDirectory> {
        let mut ids: BTreeSet<SiteId> = assignments
            .iter()
            .filter(|a| a.resource_type == ResourceType::Site)
            .map(|a| SiteId(a.resource_id))
            .collect();
        if let Some(request) = request {
            ids.extend(
                request
                    .portfolios()
                    .iter()
                    .flat_map(|p| p.sites.iter().map(|s| s.site_id)),
            );
        }
        if ids.is_empty() {
            return Ok(SiteDirectory::new());
        }

        let ids: Vec<SiteId> = ids.into_iter().collect();
        Ok(self.sites.get_sites(&ids).await?.into_iter().collect())
    }

    async fn ensure_email_available(&self, email: &str) -> Result<()> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AccessError::user_already_exists());
        }
        Ok(())
    }

    /// Every portfolio the request names must belong to `customer_id`.
    async fn ensure_known_portfolios(
        &self,
        customer_id: CustomerId,
        request: &DesiredAssignmentTree,
    ) -> Result<()> {
        if request.wants_customer_admin() || request.portfolios().is_empty() {
            return Ok(());
        }

        let known: HashSet<PortfolioId> = self
            .sites
            .get_portfolios(customer_id)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        match request.portfolios().iter().find(|p| !known.contains(&p.portfolio_id)) {
            Some(unknown) => Err(AccessError::new(
                ErrorCode::ResourceMismatch,
                format!("Portfolio {} does not belong to the customer", unknown.portfolio_id),
            )
            .with_entity(ResourceType::Portfolio.as_str(), unknown.portfolio_id)
            .with_context("customerId", customer_id)
            .with_context("portfolioId", unknown.portfolio_id)),
            None => Ok(()),
        }
    }

    async fn portfolios_view(
        &self,
        customer_id: CustomerId,
        assignments: &[RoleAssignment],
    ) -> Result<Vec<ManagedPortfolio>> {
        let portfolios = self.sites.get_portfolios(customer_id).await?;
        Ok(managed_portfolios_view(&portfolios, assignments))
    }

    /// Persist the resolved assignments and announce new access. The view
    /// echoes the requested portfolio tree unless the user is a customer admin.
    async fn post_create_update(
        &self,
        customer_id: CustomerId,
        user: &User,
        target: Vec<RoleAssignment>,
        request: &DesiredAssignmentTree,
        language: &str,
    ) -> Result<ManagedUserView> {
        let stored = self.assignments.replace_assignments(user.id, target).await?;

        let mut view = ManagedUserView::from_user(user);
        view.is_customer_admin = stored.is_customer_admin(customer_id);

        let site_names = if view.is_customer_admin {
            Vec::new()
        } else {
            view.portfolios = request.portfolios().to_vec();
            request.assigned_site_names()
        };

        if self.config.enabled {
            if let Some(notification) = access_granted_notification(
                &self.config,
                user,
                view.is_customer_admin,
                &site_names,
                language,
            ) {
                let template = notification.template;
                self.notifier.send(notification).await.map_err(|e| {
                    AccessError::with_internal(
                        ErrorCode::NotificationFailed,
                        "Failed to send access notification",
                        e.to_string(),
                    )
                    .with_source(e)
                })?;
                info!(user_id = %user.id, template = %template, "Access notification sent");
            }
        }

        Ok(view)
    }
}
