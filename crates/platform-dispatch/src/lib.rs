//! # Platform Dispatch Guard
//!
//! This crate provides the per-request authorization step of the Relay
//! platform's dispatch pipeline, built on `platform-acl`.
//!
//! ## Overview
//!
//! The platform-dispatch crate handles:
//! - **Authorizer**: Resolves the caller's identity index to a role and answers
//!   access questions for that caller
//! - **Dispatch Guard**: Runs once per request cycle, denies by redirecting to
//!   the login page, and publishes the authorizer
//! - **Collaborators**: Narrow contracts for authentication, request, view,
//!   navigation, and registry
//! - **Configuration**: The immutable role/resource/rule setup shared by all
//!   requests
//!
//! ## Request Flow
//!
//! ```text
//! Request → DispatchGuard::pre_dispatch
//!             ├─ GuardConfig::base_matrix (roles, resources, rules)
//!             ├─ AuthProvider → RoleTable::resolve → session rules
//!             ├─ NavigationMenu ← matrix + role
//!             ├─ ProcessRegistry ← Arc<Authorizer> ("acl")
//!             ├─ Authorizer::authorize_dispatch(module, controller)
//!             │     └─ deny → RequestContext retargeted to default/login/index
//!             └─ ViewSink ← auth_role, auth_id, auth_name, auth_email
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use platform_dispatch::{Collaborators, DispatchGuard, GuardConfig};
//! use platform_dispatch::memory::{MemoryNavigation, MemoryRegistry, MemoryRequest, MemoryView, StaticAuth};
//! use std::sync::Arc;
//!
//! // Once, at bootstrap
//! let config = GuardConfig::from_env().unwrap();
//! config.validate().unwrap();
//! let config = Arc::new(config);
//!
//! // Per request
//! let auth = StaticAuth::authenticated(1);
//! let (mut view, mut navigation, mut registry) =
//!     (MemoryView::new(), MemoryNavigation::new(), MemoryRegistry::new());
//! let mut request = MemoryRequest::new("member", "index", "index");
//!
//! let mut guard = DispatchGuard::new(Arc::clone(&config));
//! let outcome = guard
//!     .pre_dispatch(
//!         &mut request,
//!         &mut Collaborators {
//!             auth: &auth,
//!             storage: &auth,
//!             view: &mut view,
//!             navigation: &mut navigation,
//!             registry: &mut registry,
//!         },
//!     )
//!     .unwrap();
//!
//! if outcome.is_redirect() {
//!     return; // the pipeline re-dispatches to the login page
//! }
//!
//! // Later stages receive the authorizer explicitly
//! let acl = guard.authorizer().unwrap();
//! if acl.has_allowed_role(["moderator", "administrator"]).unwrap() {
//!     // moderation tools
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `memory` (default): In-memory collaborator implementations

pub mod authorizer;
pub mod collaborators;
pub mod config;
pub mod guard;
#[cfg(feature = "memory")]
pub mod memory;

// Re-export main types
pub use authorizer::Authorizer;
pub use collaborators::{
    AuthProvider, AuthStorage, Collaborators, NavigationMenu, ProcessRegistry, RequestContext,
    StoredIdentity, ViewSink,
};
pub use config::{ConfigError, GuardConfig, RedirectTarget, SessionRules};
pub use guard::{DispatchGuard, GuardOutcome, GuardState};
