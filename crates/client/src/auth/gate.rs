//! Access gate: decide what a protected region does with the current session.
//!
//! [`evaluate`] is pure: for a fixed requirement, snapshot and context it
//! always returns the same decision. Checks run in a fixed order and the
//! first failing check wins; page composition relies on that ordering (an
//! unauthenticated session redirects to login before any role check can
//! declare it forbidden).

use std::collections::BTreeSet;

use tradeline_shared::{ApprovalStatus, Permission, Role, SessionSnapshot};

/// What to do when the role check fails.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoleDenial {
    #[default]
    Forbidden,
    Redirect(String),
}

/// Declarative access requirement for one protected region.
/// Build with the constructors and `with_*` methods; the convenience
/// constructors only pre-fill fields, they add no logic of their own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessRequirement {
    pub require_authenticated: bool,
    pub required_roles: Option<BTreeSet<Role>>,
    pub required_permission: Option<Permission>,
    pub require_email_verified: bool,
    pub require_approved: bool,
    pub role_denial: RoleDenial,
}

impl AccessRequirement {
    /// No requirements: always renders (once the session has loaded).
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_authenticated: true,
            ..Self::default()
        }
    }

    pub fn role(role: Role) -> Self {
        Self::roles([role])
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            require_authenticated: true,
            required_roles: Some(roles.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn admin_only() -> Self {
        Self::role(Role::Admin)
    }

    pub fn supplier_only() -> Self {
        Self::role(Role::Supplier)
    }

    pub fn buyer_only() -> Self {
        Self::role(Role::Buyer)
    }

    pub fn permission(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            require_authenticated: true,
            required_permission: Some(Permission::new(resource, action)),
            ..Self::default()
        }
    }

    pub fn with_permission(mut self, resource: impl Into<String>, action: impl Into<String>) -> Self {
        self.required_permission = Some(Permission::new(resource, action));
        self
    }

    pub fn with_email_verified(mut self) -> Self {
        self.require_email_verified = true;
        self
    }

    pub fn with_approval(mut self) -> Self {
        self.require_approved = true;
        self
    }

    /// Fail the role check with a redirect instead of the Forbidden view.
    pub fn with_role_redirect(mut self, path: impl Into<String>) -> Self {
        self.role_denial = RoleDenial::Redirect(path.into());
        self
    }
}

/// Paths the gate needs to compute redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateContext {
    /// Where unauthenticated sessions are sent.
    pub login_path: String,
    /// The location being protected; carried as `return_to` so the login
    /// flow can send the user back.
    pub current_path: String,
}

/// A navigation command issued by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub return_to: Option<String>,
}

/// Blocking states, each with enough detail for distinct user guidance.
/// These are expected, modeled conditions, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockingView {
    Loading,
    /// The session itself failed to load; offer a retry.
    SessionError { message: String },
    AccountLocked,
    Forbidden,
    EmailVerificationRequired,
    /// Carries the sub-state: pending, rejected and suspended accounts each
    /// get their own messaging.
    ApprovalRequired { status: ApprovalStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    RedirectTo(Redirect),
    ShowBlockingView(BlockingView),
}

/// Evaluate an access requirement against a session snapshot.
///
/// Check order (first failure wins): loading, session error, authentication,
/// account lock, roles, email verification, approval, fine-grained
/// permission. Admin-equivalent roles satisfy the permission check
/// unconditionally (see [`SessionSnapshot::can`]).
pub fn evaluate(
    requirement: &AccessRequirement,
    session: &SessionSnapshot,
    ctx: &GateContext,
) -> GateDecision {
    if session.is_loading() {
        return GateDecision::ShowBlockingView(BlockingView::Loading);
    }

    if let Some(message) = session.error_message() {
        return GateDecision::ShowBlockingView(BlockingView::SessionError {
            message: message.to_string(),
        });
    }

    if requirement.require_authenticated && !session.is_authenticated() {
        return GateDecision::RedirectTo(Redirect {
            path: ctx.login_path.clone(),
            return_to: Some(ctx.current_path.clone()),
        });
    }

    if let Some(user) = session.user() {
        if user.locked {
            return GateDecision::ShowBlockingView(BlockingView::AccountLocked);
        }
    }

    if let Some(required) = &requirement.required_roles {
        if !session.has_any_role(required) {
            return match &requirement.role_denial {
                RoleDenial::Forbidden => GateDecision::ShowBlockingView(BlockingView::Forbidden),
                RoleDenial::Redirect(path) => GateDecision::RedirectTo(Redirect {
                    path: path.clone(),
                    return_to: None,
                }),
            };
        }
    }

    if requirement.require_email_verified {
        let verified = session.user().map(|u| u.email_verified).unwrap_or(false);
        if !verified {
            return GateDecision::ShowBlockingView(BlockingView::EmailVerificationRequired);
        }
    }

    if requirement.require_approved {
        let status = session
            .user()
            .map(|u| u.approval_status)
            .unwrap_or_default();
        if !status.is_approved() {
            return GateDecision::ShowBlockingView(BlockingView::ApprovalRequired { status });
        }
    }

    if let Some(permission) = &requirement.required_permission {
        if !session.can(&permission.resource, &permission.action) {
            return GateDecision::ShowBlockingView(BlockingView::Forbidden);
        }
    }

    GateDecision::Render
}
