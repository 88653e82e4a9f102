//! Resolve a desired assignment tree offline.
//!
//! The scenario carries everything the resolver needs: the request, the
//! grantor's and the managed user's assignments, and the relevant sites.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tabled::Tabled;

use portal_access::error::ErrorResponse;
use portal_access::hierarchy::{CustomerId, SiteDirectory, SiteRecord};
use portal_access::rbac::{AssignmentDiffResolver, DesiredAssignmentTree, RoleAssignment};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ResolveArgs {
    /// Scenario file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    scenario: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveScenario {
    customer_id: CustomerId,
    #[serde(default)]
    is_update: bool,
    request: DesiredAssignmentTree,
    #[serde(default)]
    grantor: Vec<RoleAssignment>,
    #[serde(default)]
    existing: Vec<RoleAssignment>,
    #[serde(default)]
    sites: Vec<SiteRecord>,
}

#[derive(Tabled, Serialize)]
struct AssignmentRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Portfolio")]
    portfolio: String,
}

impl From<&RoleAssignment> for AssignmentRow {
    fn from(a: &RoleAssignment) -> Self {
        Self {
            role: a.role_id.to_string(),
            scope: a.resource_type.to_string(),
            resource_id: a.resource_id.to_string(),
            portfolio: a.portfolio_id.map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

/// Returns `false` when the request was rejected.
pub fn execute(args: ResolveArgs, format: OutputFormat) -> Result<bool> {
    let scenario: ResolveScenario = super::load_scenario(&args.scenario)?;
    let sites: SiteDirectory = scenario.sites.into_iter().collect();

    let result = AssignmentDiffResolver::new(&sites).resolve(
        &scenario.request,
        scenario.customer_id,
        &scenario.grantor,
        &scenario.existing,
        scenario.is_update,
    );

    match result {
        Ok(assignments) => {
            match format {
                OutputFormat::Table => {
                    output::print_header("Resolved assignments");
                    let rows: Vec<AssignmentRow> = assignments.iter().map(AssignmentRow::from).collect();
                    output::print_list(&rows, format)?;
                }
                _ => output::print_item(&assignments, format)?,
            }
            Ok(true)
        }
        Err(err) => {
            match format {
                OutputFormat::Table => {
                    output::print_denied(&format!("{}: {}", err.code(), err.user_message()));
                    let mut keys: Vec<&String> = err.details().context.keys().collect();
                    keys.sort();
                    for key in keys {
                        output::print_detail(key, &err.context_value(key).unwrap_or_default());
                    }
                }
                _ => output::print_item(&ErrorResponse::from(&err), format)?,
            }
            Ok(false)
        }
    }
}
