//! Access-granted notifications.
//!
//! After a create or update the managed user is told what they can now see:
//! customer admins get `AssignSuperUserRole`, users granted at least one site
//! get `SiteAssigned` listing those sites. Nothing is sent otherwise.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::hierarchy::{CustomerId, PrincipalId};
use crate::rbac::{User, UserType};

/// E-mail templates known to the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationTemplate {
    AssignSuperUserRole,
    SiteAssigned,
}

impl fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A templated e-mail addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub correlation_id: Uuid,
    pub customer_id: CustomerId,
    pub user_id: PrincipalId,
    pub user_type: UserType,
    pub locale: String,
    pub template: NotificationTemplate,
    pub data: BTreeMap<String, String>,
}

/// Build the notification for a freshly created or updated user, if any.
pub fn access_granted_notification(
    config: &NotificationConfig,
    user: &User,
    is_customer_admin: bool,
    site_names: &[String],
    locale: &str,
) -> Option<Notification> {
    let mut data = BTreeMap::new();
    data.insert("LoginUrl".to_string(), config.portal_base_url.clone());

    let template = if is_customer_admin {
        NotificationTemplate::AssignSuperUserRole
    } else if !site_names.is_empty() {
        data.insert(
            "SitesInTitle".to_string(),
            sites_in_title(site_names, config.max_sites_in_title),
        );
        data.insert("SitesInBody".to_string(), sites_in_body(site_names));
        let label = if site_names.len() > 1 { "sites" } else { "site" };
        data.insert("SitesLabel".to_string(), label.to_string());
        NotificationTemplate::SiteAssigned
    } else {
        return None;
    };

    Some(Notification {
        correlation_id: Uuid::new_v4(),
        customer_id: user.customer_id,
        user_id: user.id,
        user_type: user.user_type,
        locale: locale.to_string(),
        template,
        data,
    })
}

/// The first `max` names, comma-joined and escaped, with `...` when cut.
pub fn sites_in_title(site_names: &[String], max: usize) -> String {
    let shown = site_names
        .iter()
        .take(max)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let title = html_escape(&shown);
    if site_names.len() > max {
        format!("{}...", title)
    } else {
        title
    }
}

/// One escaped `<li>` per site.
pub fn sites_in_body(site_names: &[String]) -> String {
    site_names
        .iter()
        .map(|name| format!("<li>{}</li>", html_escape(name)))
        .collect()
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
