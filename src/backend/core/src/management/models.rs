//! Request and view shapes for user management.

use serde::{Deserialize, Serialize};

use crate::hierarchy::{CustomerId, PortfolioRecord, PrincipalId};
use crate::rbac::{
    AssignmentSet, DesiredAssignmentTree, ManagedPortfolio, ManagedSite, RoleAssignment, User,
    UserStatus, UserType, WellKnownRoleId,
};

/// Create a user and grant their initial access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManagedUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(flatten)]
    pub access: DesiredAssignmentTree,
}

/// Change a user's profile and access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManagedUserRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(flatten)]
    pub access: DesiredAssignmentTree,
}

/// A managed user as returned to the administration surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedUserView {
    pub id: PrincipalId,
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: UserStatus,
    pub user_type: UserType,
    pub is_customer_admin: bool,
    #[serde(default)]
    pub portfolios: Vec<ManagedPortfolio>,
}

impl ManagedUserView {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            customer_id: user.customer_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            status: user.status,
            user_type: user.user_type,
            is_customer_admin: false,
            portfolios: Vec::new(),
        }
    }
}

/// Project a user's assignments onto the customer's portfolio catalogue.
///
/// A portfolio is listed when the user holds a role on it or on one of its
/// sites. Under a portfolio role every site is listed, inheriting that role
/// unless the site carries its own; otherwise only explicitly assigned sites
/// are listed.
pub fn managed_portfolios_view(
    portfolios: &[PortfolioRecord],
    assignments: &[RoleAssignment],
) -> Vec<ManagedPortfolio> {
    portfolios
        .iter()
        .filter_map(|portfolio| {
            let portfolio_role = assignments.portfolio_role(portfolio.id);

            let sites: Vec<ManagedSite> = portfolio
                .sites
                .iter()
                .filter_map(|site| {
                    let role = assignments
                        .site_role(site.id)
                        .or(portfolio_role.map(inherited_site_role))?;
                    Some(ManagedSite::new(site.id, role.name()).with_name(site.name.clone()))
                })
                .collect();

            if portfolio_role.is_none() && sites.is_empty() {
                return None;
            }

            Some(ManagedPortfolio {
                portfolio_id: portfolio.id,
                portfolio_name: Some(portfolio.name.clone()),
                role: portfolio_role.map(|r| r.name()).unwrap_or_default().to_string(),
                sites,
            })
        })
        .collect()
}

fn inherited_site_role(portfolio_role: WellKnownRoleId) -> WellKnownRoleId {
    if portfolio_role.is_admin() {
        WellKnownRoleId::SiteAdmin
    } else {
        WellKnownRoleId::SiteViewer
    }
}
