//! Evaluate the authorization gate against a scenario.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use portal_access::hierarchy::{CustomerId, SiteDirectory, SiteRecord};
use portal_access::rbac::{
    ActorSnapshot, AuthorizationGate, ManagedUserSnapshot, PolicyDecision,
};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum CheckCommands {
    /// May the actor view or change the managed user?
    Access {
        /// Scenario file (YAML, or JSON with a .json extension)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// May the actor create users for the customer?
    Create {
        /// Scenario file (YAML, or JSON with a .json extension)
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckScenario {
    customer_id: CustomerId,
    actor: ActorSnapshot,
    #[serde(default)]
    managed_user: Option<ManagedUserSnapshot>,
    #[serde(default)]
    sites: Vec<SiteRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    operation: &'static str,
    customer_id: CustomerId,
    allowed: bool,
    #[serde(flatten)]
    decision: PolicyDecision,
}

/// Returns `false` when the gate denies.
pub fn execute(cmd: CheckCommands, format: OutputFormat) -> Result<bool> {
    let (operation, path) = match &cmd {
        CheckCommands::Access { scenario } => ("access", scenario),
        CheckCommands::Create { scenario } => ("create", scenario),
    };
    let scenario: CheckScenario = super::load_scenario(path)?;
    let sites: SiteDirectory = scenario.sites.into_iter().collect();
    let gate = AuthorizationGate::new(&sites);

    let decision = match cmd {
        CheckCommands::Access { .. } => {
            let managed = scenario
                .managed_user
                .as_ref()
                .context("An access check needs a managedUser in the scenario")?;
            gate.evaluate_access(scenario.customer_id, &scenario.actor, managed)
        }
        CheckCommands::Create { .. } => gate.evaluate_create(scenario.customer_id, &scenario.actor),
    };

    let verdict = Verdict {
        operation,
        customer_id: scenario.customer_id,
        allowed: decision.is_allowed(),
        decision,
    };

    match format {
        OutputFormat::Table => {
            output::print_header(&format!("Check {}", operation));
            output::print_detail("Customer", &verdict.customer_id.to_string());
            output::print_detail("Actor", &scenario.actor.id.to_string());
            if let Some(managed) = &scenario.managed_user {
                output::print_detail("Managed user", &managed.user.id.to_string());
            }
            println!();
            match &verdict.decision {
                PolicyDecision::Allow(grant) => output::print_success(&format!("Allowed as {}", grant)),
                PolicyDecision::Deny(reason) => output::print_denied(&format!("Denied: {}", reason)),
            }
        }
        _ => output::print_item(&verdict, format)?,
    }

    Ok(verdict.allowed)
}
