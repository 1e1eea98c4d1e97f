//! The per-request dispatch guard.
//!
//! A [`DispatchGuard`] is created for each request and runs at most once per
//! request cycle:
//!
//! ```text
//! Idle ──pre_dispatch──→ Completed
//!   build roles, resources, rules
//!   resolve caller role → install session rules
//!   publish to navigation menu and registry
//!   authorize module/controller → redirect on deny
//!   assign auth_* view fields
//! ```
//!
//! A redirect marks the request not yet dispatched, so the pipeline runs the
//! dispatch cycle again and calls the guard a second time. That call is a
//! no-op.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use platform_acl::AclResult;

use crate::authorizer::Authorizer;
use crate::collaborators::{Collaborators, RequestContext};
use crate::config::{GuardConfig, RedirectTarget};

/// Result of one guard invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The guard already ran in this request cycle; nothing was done.
    Skipped,
    /// The request may proceed unchanged.
    Allowed,
    /// The request was retargeted to the login page.
    Redirected(RedirectTarget),
}

impl GuardOutcome {
    /// Check if this invocation denied the request.
    pub fn is_redirect(&self) -> bool {
        matches!(self, GuardOutcome::Redirected(_))
    }
}

/// Lifecycle of a guard within one request cycle.
#[derive(Debug, Clone)]
pub enum GuardState {
    /// Has not run yet.
    Idle,
    /// Ran once; holds what it produced.
    Completed {
        /// The authorizer published for this request.
        authorizer: Arc<Authorizer>,
        /// The decision taken.
        outcome: GuardOutcome,
        /// When the guard completed.
        completed_at: DateTime<Utc>,
    },
}

impl GuardState {
    /// The decision taken, once completed.
    pub fn outcome(&self) -> Option<&GuardOutcome> {
        match self {
            GuardState::Completed { outcome, .. } => Some(outcome),
            GuardState::Idle => None,
        }
    }

    /// When the guard completed.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            GuardState::Completed { completed_at, .. } => Some(*completed_at),
            GuardState::Idle => None,
        }
    }
}

/// Per-request authorization guard.
///
/// # Example
///
/// ```
/// use platform_dispatch::memory::{MemoryNavigation, MemoryRegistry, MemoryRequest, MemoryView, StaticAuth};
/// use platform_dispatch::{Collaborators, DispatchGuard, GuardConfig, GuardOutcome, RequestContext};
/// use std::sync::Arc;
///
/// let config = Arc::new(GuardConfig::default());
/// let auth = StaticAuth::anonymous();
/// let mut view = MemoryView::new();
/// let mut navigation = MemoryNavigation::new();
/// let mut registry = MemoryRegistry::new();
/// let mut request = MemoryRequest::new("member", "index", "index");
///
/// let mut guard = DispatchGuard::new(config);
/// let mut collaborators = Collaborators {
///     auth: &auth,
///     storage: &auth,
///     view: &mut view,
///     navigation: &mut navigation,
///     registry: &mut registry,
/// };
/// let outcome = guard.pre_dispatch(&mut request, &mut collaborators).unwrap();
///
/// assert!(outcome.is_redirect());
/// assert_eq!(request.controller_name(), "login");
/// assert_eq!(guard.pre_dispatch(&mut request, &mut collaborators).unwrap(), GuardOutcome::Skipped);
/// ```
#[derive(Debug)]
pub struct DispatchGuard {
    config: Arc<GuardConfig>,
    cycle_id: Uuid,
    state: GuardState,
}

impl DispatchGuard {
    /// Create an idle guard for a new request cycle.
    pub fn new(config: Arc<GuardConfig>) -> Self {
        Self {
            config,
            cycle_id: Uuid::now_v7(),
            state: GuardState::Idle,
        }
    }

    /// Run the authorization step for `request`.
    ///
    /// Returns [`GuardOutcome::Skipped`] without touching anything if the
    /// guard already completed in this cycle. A denial is reported as
    /// [`GuardOutcome::Redirected`], never as an error.
    ///
    /// # Errors
    ///
    /// `RoleNotFound`, `ResourceNotFound`, `DuplicateRole`, `DuplicateResource`
    /// for a broken setup, and `IdentityOutOfRange` when the authentication
    /// provider reports an identity index with no role. The guard stays idle.
    #[instrument(
        skip(self, request, collaborators),
        fields(cycle_id = %self.cycle_id, module = %request.module_name())
    )]
    pub fn pre_dispatch(
        &mut self,
        request: &mut dyn RequestContext,
        collaborators: &mut Collaborators<'_>,
    ) -> AclResult<GuardOutcome> {
        if self.is_completed() {
            debug!("Guard already ran in this cycle");
            return Ok(GuardOutcome::Skipped);
        }

        let authorizer = self.setup(collaborators).map_err(|e| {
            error!(error = %e, code = e.error_code(), "Access control setup failed");
            e
        })?;

        collaborators
            .navigation
            .set_default_permission_source(Arc::clone(authorizer.matrix()));
        collaborators
            .navigation
            .set_default_role(&authorizer.role().key);
        collaborators
            .registry
            .set(&self.config.registry_key, Arc::clone(&authorizer));

        let outcome = self.authorize(&authorizer, request);
        self.assign_view(&authorizer, collaborators);

        self.state = GuardState::Completed {
            authorizer,
            outcome: outcome.clone(),
            completed_at: Utc::now(),
        };
        Ok(outcome)
    }

    /// Check if the guard already ran in this cycle.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, GuardState::Completed { .. })
    }

    /// The authorizer produced by the completed run, for explicit hand-off
    /// to later pipeline stages.
    pub fn authorizer(&self) -> Option<&Arc<Authorizer>> {
        match &self.state {
            GuardState::Completed { authorizer, .. } => Some(authorizer),
            GuardState::Idle => None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Identifier of this request cycle, as recorded in log spans.
    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    /// Build the registries, install base and session rules, and resolve the
    /// caller.
    fn setup(&self, collaborators: &Collaborators<'_>) -> AclResult<Arc<Authorizer>> {
        let authenticated = collaborators.auth.has_identity();
        let identity = authenticated.then(|| collaborators.auth.identity_index());
        let role = self.config.roles.resolve(identity)?;
        debug!(role = %role.key, authenticated, "Resolved caller role");

        let mut matrix = self.config.base_matrix()?;
        matrix.install(
            self.config
                .session_rules
                .rules_for(&role.key, authenticated),
        )?;

        let authorizer = Authorizer::new(Arc::clone(&self.config), Arc::new(matrix), identity)?;
        Ok(Arc::new(authorizer))
    }

    fn authorize(&self, authorizer: &Authorizer, request: &mut dyn RequestContext) -> GuardOutcome {
        let module = request.module_name().to_string();
        let controller = request.controller_name().to_string();

        if authorizer.authorize_dispatch(&module, &controller) {
            info!(
                role = %authorizer.role().key,
                module = %module,
                controller = %controller,
                action = %request.action_name(),
                "Request allowed"
            );
            return GuardOutcome::Allowed;
        }

        let target = self.config.redirect.clone();
        warn!(
            role = %authorizer.role().key,
            module = %module,
            controller = %controller,
            redirect = %format!("{}/{}/{}", target.module, target.controller, target.action),
            "Request denied, redirecting"
        );
        target.apply(request);
        GuardOutcome::Redirected(target)
    }

    fn assign_view(&self, authorizer: &Authorizer, collaborators: &mut Collaborators<'_>) {
        let stored = collaborators.storage.read();
        let view = &mut *collaborators.view;
        view.assign("auth_role", json!(authorizer.role_name()));
        view.assign("auth_id", json!(stored.id.unwrap_or(0)));
        view.assign("auth_name", json!(stored.name.unwrap_or_default()));
        view.assign("auth_email", json!(stored.email.unwrap_or_default()));
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::{MemoryNavigation, MemoryRegistry, MemoryRequest, MemoryView, StaticAuth};
    use platform_acl::AclError;

    fn run(
        guard: &mut DispatchGuard,
        auth: &StaticAuth,
        request: &mut MemoryRequest,
    ) -> (AclResult<GuardOutcome>, MemoryView) {
        let mut view = MemoryView::new();
        let mut navigation = MemoryNavigation::new();
        let mut registry = MemoryRegistry::new();
        let mut collaborators = Collaborators {
            auth,
            storage: auth,
            view: &mut view,
            navigation: &mut navigation,
            registry: &mut registry,
        };
        let outcome = guard.pre_dispatch(request, &mut collaborators);
        (outcome, view)
    }

    #[test]
    fn test_starts_idle() {
        let guard = DispatchGuard::new(Arc::new(GuardConfig::default()));
        assert!(!guard.is_completed());
        assert!(guard.authorizer().is_none());
        assert!(matches!(guard.state(), GuardState::Idle));
        assert!(guard.state().outcome().is_none());
        assert!(guard.state().completed_at().is_none());
    }

    #[test]
    fn test_completes_once() {
        let mut guard = DispatchGuard::new(Arc::new(GuardConfig::default()));
        let auth = StaticAuth::authenticated(1);
        let mut request = MemoryRequest::new("member", "index", "index");

        let (outcome, _) = run(&mut guard, &auth, &mut request);
        assert_eq!(outcome.unwrap(), GuardOutcome::Allowed);
        assert!(guard.is_completed());
        assert_eq!(guard.authorizer().unwrap().role().key, "member");

        let (outcome, view) = run(&mut guard, &auth, &mut request);
        assert_eq!(outcome.unwrap(), GuardOutcome::Skipped);
        assert_eq!(view.assignments(), 0);
    }

    #[test]
    fn test_completed_state_records_decision() {
        let mut guard = DispatchGuard::new(Arc::new(GuardConfig::default()));
        let auth = StaticAuth::anonymous();
        let mut request = MemoryRequest::new("admin", "users", "list");
        let before = Utc::now();

        let (outcome, _) = run(&mut guard, &auth, &mut request);
        let outcome = outcome.unwrap();
        assert!(outcome.is_redirect());
        assert_eq!(guard.state().outcome(), Some(&outcome));

        let completed_at = guard.state().completed_at().unwrap();
        assert!(completed_at >= before);
        assert!(completed_at <= Utc::now());

        // The skipped re-dispatch keeps the original decision.
        let (skipped, _) = run(&mut guard, &auth, &mut request);
        assert_eq!(skipped.unwrap(), GuardOutcome::Skipped);
        assert_eq!(guard.state().outcome(), Some(&outcome));
        assert_eq!(guard.state().completed_at(), Some(completed_at));
    }

    #[test]
    fn test_out_of_range_identity_leaves_guard_idle() {
        let mut guard = DispatchGuard::new(Arc::new(GuardConfig::default()));
        let auth = StaticAuth::authenticated(4);
        let mut request = MemoryRequest::new("default", "index", "index");

        let (outcome, view) = run(&mut guard, &auth, &mut request);
        assert!(matches!(
            outcome,
            Err(AclError::IdentityOutOfRange { index: 4, roles: 4 })
        ));
        assert!(!guard.is_completed());
        assert_eq!(view.assignments(), 0);
        assert_eq!(request.module_name(), "default");
        assert!(request.is_dispatched());
    }

    #[test]
    fn test_broken_setup_propagates() {
        let mut config = GuardConfig::default();
        config.session_rules.authenticated_denies.push("profile".to_string());
        let mut guard = DispatchGuard::new(Arc::new(config));
        let auth = StaticAuth::authenticated(1);
        let mut request = MemoryRequest::new("member", "index", "index");

        let (outcome, _) = run(&mut guard, &auth, &mut request);
        assert!(matches!(outcome, Err(AclError::ResourceNotFound(_))));
    }

    #[test]
    fn test_custom_redirect_target() {
        let mut config = GuardConfig::default();
        config.redirect = RedirectTarget {
            module: "auth".to_string(),
            controller: "session".to_string(),
            action: "new".to_string(),
        };
        let mut guard = DispatchGuard::new(Arc::new(config));
        let auth = StaticAuth::anonymous();
        let mut request = MemoryRequest::new("admin", "users", "list");

        let (outcome, _) = run(&mut guard, &auth, &mut request);
        assert!(outcome.unwrap().is_redirect());
        assert_eq!(request.module_name(), "auth");
        assert_eq!(request.controller_name(), "session");
        assert_eq!(request.action_name(), "new");
    }

    #[test]
    fn test_each_request_gets_its_own_cycle() {
        let config = Arc::new(GuardConfig::default());
        let first = DispatchGuard::new(Arc::clone(&config));
        let second = DispatchGuard::new(config);
        assert_ne!(first.cycle_id(), second.cycle_id());
    }
}
