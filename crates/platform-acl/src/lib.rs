//! # Platform ACL (Access Control Lists)
//!
//! This crate provides the role/resource access control lists used by the
//! Relay platform's request dispatch pipeline.
//!
//! ## Overview
//!
//! The platform-acl crate handles:
//! - **Roles**: Named permission levels with single-parent inheritance
//! - **Role Table**: The ordered role list mapping numeric identities to roles
//! - **Resources**: Coarse protection boundaries (one per module/controller area)
//! - **Permission Matrix**: Allow/deny rules evaluated through inheritance
//!
//! ## Architecture
//!
//! ```text
//! Rule = Role + (Resource | *) + (allow | deny)
//!
//! anonymous ─→ member ─→ moderator        administrator
//!   allow(anonymous, login)                 allow(administrator, *)
//!   allow(member, account)
//!   deny(member, login)      ← closer rule wins over inherited allow
//! ```
//!
//! ## Evaluation
//!
//! - The role's own rules are checked first, then each ancestor in turn
//! - At one level, an exact resource rule beats the wildcard rule
//! - Re-installing the same key overwrites it (latest rule wins)
//! - No applicable rule means deny
//!
//! ## Usage
//!
//! ```rust
//! use platform_acl::{PermissionMatrix, ResourceRegistry, RoleTable};
//!
//! let table = RoleTable::default();
//! let resources = ResourceRegistry::from_names(["login", "member", "admin"]).unwrap();
//! let mut matrix = PermissionMatrix::new(table.registry().unwrap(), resources);
//!
//! matrix.allow("anonymous", Some("login")).unwrap();
//! matrix.allow("member", Some("member")).unwrap();
//! matrix.allow("administrator", None).unwrap();
//!
//! assert!(matrix.is_allowed("moderator", "member")); // inherited from member
//! assert!(matrix.is_allowed("administrator", "admin"));
//! assert!(!matrix.is_allowed("member", "admin"));
//! ```

pub mod error;
pub mod permissions;
pub mod resources;
pub mod roles;

// Re-export main types for convenience
pub use error::{AclError, AclResult};
pub use permissions::{Effect, PermissionMatrix, Rule};
pub use resources::{Resource, ResourceRegistry};
pub use roles::{Role, RoleDefinition, RoleRegistry, RoleTable};
