//! Collaborator boundaries of the management service and an in-memory
//! implementation of all of them.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::notification::Notification;
use crate::error::{AccessError, Result};
use crate::hierarchy::{CustomerId, PortfolioId, PortfolioRecord, PrincipalId, SiteId, SiteRecord};
use crate::rbac::{RoleAssignment, User};

// ═══════════════════════════════════════════════════════════════════════════════
// Traits
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistence of role assignments.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get_assignments(&self, principal_id: PrincipalId) -> Result<Vec<RoleAssignment>>;

    /// Replace every assignment of `principal_id`, stamping the principal on
    /// each. Returns what was stored.
    async fn replace_assignments(
        &self,
        principal_id: PrincipalId,
        assignments: Vec<RoleAssignment>,
    ) -> Result<Vec<RoleAssignment>>;
}

/// User records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: PrincipalId) -> Result<Option<User>>;

    /// Any account with this e-mail, across customers.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a new account. E-mails are unique across customers, compared
    /// case-insensitively; a taken e-mail fails with `UserAlreadyExists` and
    /// nothing is written.
    async fn create_user(&self, user: User) -> Result<User>;

    /// The e-mail is left as stored.
    async fn update_user(&self, user: User) -> Result<User>;

    /// Remove the user and their assignments.
    async fn delete_user(&self, user_id: PrincipalId) -> Result<()>;
}

/// Read access to the site hierarchy.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// The records of the given sites; unknown ids are skipped.
    async fn get_sites(&self, site_ids: &[SiteId]) -> Result<Vec<SiteRecord>>;

    /// The customer's portfolios with their sites.
    async fn get_portfolios(&self, customer_id: CustomerId) -> Result<Vec<PortfolioRecord>>;
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory implementation
// ═══════════════════════════════════════════════════════════════════════════════

/// Thread-safe in-memory directory backing tests and offline tooling.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<PrincipalId, User>,
    /// Lower-cased e-mail to account.
    emails: DashMap<String, PrincipalId>,
    assignments: DashMap<PrincipalId, Vec<RoleAssignment>>,
    portfolios: DashMap<PortfolioId, PortfolioRecord>,
    sites: DashMap<SiteId, SiteRecord>,
    outbox: Mutex<Vec<Notification>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a portfolio and its sites.
    pub fn add_portfolio(&self, portfolio: PortfolioRecord) {
        for site in &portfolio.sites {
            self.sites.insert(site.id, site.clone());
        }
        self.portfolios.insert(portfolio.id, portfolio);
    }

    /// Register a user with the given assignments.
    pub fn add_user(&self, user: User, assignments: Vec<RoleAssignment>) {
        let stamped = assignments
            .into_iter()
            .map(|a| a.with_principal(user.id))
            .collect();
        self.assignments.insert(user.id, stamped);
        self.emails.insert(email_key(&user.email), user.id);
        self.users.insert(user.id, user);
    }

    /// Notifications sent so far, oldest first.
    pub fn sent_notifications(&self) -> Vec<Notification> {
        self.outbox.lock().clone()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryDirectory {
    async fn get_assignments(&self, principal_id: PrincipalId) -> Result<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .get(&principal_id)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn replace_assignments(
        &self,
        principal_id: PrincipalId,
        assignments: Vec<RoleAssignment>,
    ) -> Result<Vec<RoleAssignment>> {
        let stamped: Vec<RoleAssignment> = assignments
            .into_iter()
            .map(|a| a.with_principal(principal_id))
            .collect();
        self.assignments.insert(principal_id, stamped.clone());
        Ok(stamped)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, user_id: PrincipalId) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Some(user_id) = self.emails.get(&email_key(email)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn create_user(&self, user: User) -> Result<User> {
        // The entry guard serialises concurrent creates for the same e-mail.
        match self.emails.entry(email_key(&user.email)) {
            Entry::Occupied(_) => Err(AccessError::user_already_exists()),
            Entry::Vacant(slot) => {
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn update_user(&self, mut user: User) -> Result<User> {
        match self.users.get_mut(&user.id) {
            Some(mut existing) => {
                user.email = existing.email.clone();
                *existing = user.clone();
                Ok(user)
            }
            None => Err(AccessError::user_not_found(user.id)),
        }
    }

    async fn delete_user(&self, user_id: PrincipalId) -> Result<()> {
        self.assignments.remove(&user_id);
        let (_, user) = self
            .users
            .remove(&user_id)
            .ok_or_else(|| AccessError::user_not_found(user_id))?;
        self.emails.remove(&email_key(&user.email));
        Ok(())
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl SiteRepository for InMemoryDirectory {
    async fn get_sites(&self, site_ids: &[SiteId]) -> Result<Vec<SiteRecord>> {
        Ok(site_ids
            .iter()
            .filter_map(|id| self.sites.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn get_portfolios(&self, customer_id: CustomerId) -> Result<Vec<PortfolioRecord>> {
        let mut portfolios: Vec<PortfolioRecord> = self
            .portfolios
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .map(|p| p.clone())
            .collect();
        portfolios.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(portfolios)
    }
}

#[async_trait]
impl NotificationSender for InMemoryDirectory {
    async fn send(&self, notification: Notification) -> Result<()> {
        self.outbox.lock().push(notification);
        Ok(())
    }
}
