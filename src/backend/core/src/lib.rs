#![allow(clippy::result_large_err)]
//! # Portal Access
//!
//! Hierarchical role-assignment resolution and authorization for the
//! Customer → Portfolio → Site tenancy model.
//!
//! ## Architecture
//!
//! - **Hierarchy**: typed ids, site records and the site-lookup capability
//! - **RBAC**: the role catalog, the assignment diff resolver and the
//!   authorization gate; all pure and synchronous
//! - **Management**: async orchestration over user, assignment and site
//!   stores, with access-granted notifications
//! - **Telemetry**: structured logging with redaction of personal data
//! - **Config**: environment and file based configuration

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod management;
pub mod rbac;
pub mod telemetry;

pub use error::{AccessError, ErrorCode, ErrorContext, ErrorDetails, ErrorKind, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{AccessError, ErrorCode, ErrorKind, Result};
    pub use crate::hierarchy::{
        CustomerId, PortfolioId, PortfolioRecord, PrincipalId, ResourceType, SiteDirectory, SiteId,
        SiteLookup, SiteRecord,
    };
    pub use crate::management::{
        CreateManagedUserRequest, InMemoryDirectory, ManagedUserView, ManagementService,
        UpdateManagedUserRequest,
    };
    pub use crate::rbac::{
        ActorSnapshot, AssignmentDiffResolver, AssignmentSet, AuthorizationGate,
        DesiredAssignmentTree, ManagedPortfolio, ManagedSite, ManagedUserSnapshot, PolicyDecision,
        RoleAssignment, RoleCatalog, RoleName, User, UserStatus, WellKnownRoleId,
    };
}
