//! Role-based access over the Customer → Portfolio → Site hierarchy.
//!
//! This module provides:
//! - **Roles**: the five well-known roles and the role-name catalog
//! - **Models**: users, role assignments, assignment-set queries
//! - **Request**: the desired permission tree clients submit
//! - **Resolver**: reconciles a desired tree into a target assignment list
//! - **Policy**: decides whether an actor may manage another user
//!
//! # Usage
//!
//! ```rust,ignore
//! use portal_access::rbac::{AssignmentDiffResolver, AuthorizationGate};
//!
//! let resolver = AssignmentDiffResolver::new(&sites);
//! let target = resolver.resolve(&request, customer_id, &grantor, &existing, true)?;
//!
//! let gate = AuthorizationGate::new(&sites);
//! let access = gate.ensure_access_user(customer_id, &actor, managed)?;
//! ```

pub mod models;
pub mod policy;
pub mod request;
pub mod resolver;
pub mod roles;

pub use models::{AssignmentSet, ResourceRef, RoleAssignment, User, UserStatus, UserType};
pub use policy::{
    AccessGrant, ActorSnapshot, AuthorizationGate, DenyReason, ManagedUserAccess,
    ManagedUserSnapshot, PolicyDecision,
};
pub use request::{DesiredAssignmentTree, ManagedPortfolio, ManagedSite};
pub use resolver::{partition_touched_vs_untouched, AssignmentDiffResolver, Partition, TouchedScopes};
pub use roles::{RoleCatalog, RoleLevel, RoleName, WellKnownRoleId};
