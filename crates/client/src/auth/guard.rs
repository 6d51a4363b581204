//! Route guard: the gate's navigation side effect.
//!
//! [`RouteGuard`] re-evaluates on every snapshot change but acts only on the
//! transition into a new redirect target. Repeated evaluations resolving to
//! the same redirect fire navigation exactly once.

use tradeline_shared::SessionSnapshot;

use super::gate::{evaluate, AccessRequirement, GateContext, GateDecision, Redirect};

/// Injected routing capability. The host application decides what
/// navigation means; the guard only issues commands.
pub trait Navigator {
    fn navigate(&self, redirect: &Redirect);
    fn go_back(&self);
}

/// Guards one protected region with a fixed requirement.
pub struct RouteGuard<N: Navigator> {
    requirement: AccessRequirement,
    login_path: String,
    navigator: N,
    /// Redirect target last acted on; cleared when the decision leaves
    /// `RedirectTo`.
    last_redirect: Option<String>,
}

impl<N: Navigator> RouteGuard<N> {
    pub fn new(requirement: AccessRequirement, login_path: impl Into<String>, navigator: N) -> Self {
        Self {
            requirement,
            login_path: login_path.into(),
            navigator,
            last_redirect: None,
        }
    }

    pub fn requirement(&self) -> &AccessRequirement {
        &self.requirement
    }

    /// Evaluate against the current snapshot, firing navigation on redirect
    /// edges. Call on every session change and on location change.
    pub fn apply(&mut self, session: &SessionSnapshot, current_path: &str) -> GateDecision {
        let ctx = GateContext {
            login_path: self.login_path.clone(),
            current_path: current_path.to_string(),
        };
        let decision = evaluate(&self.requirement, session, &ctx);

        match &decision {
            GateDecision::RedirectTo(redirect) => {
                if self.last_redirect.as_deref() != Some(redirect.path.as_str()) {
                    self.navigator.navigate(redirect);
                    self.last_redirect = Some(redirect.path.clone());
                }
            }
            _ => self.last_redirect = None,
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tradeline_shared::{PermissionTable, Role, SessionSnapshot, SessionUser};

    use super::*;
    use crate::auth::gate::BlockingView;

    #[derive(Default)]
    struct RecordingNavigator {
        navigations: RefCell<Vec<Redirect>>,
    }

    impl Navigator for &RecordingNavigator {
        fn navigate(&self, redirect: &Redirect) {
            self.navigations.borrow_mut().push(redirect.clone());
        }

        fn go_back(&self) {}
    }

    fn buyer() -> SessionUser {
        SessionUser {
            user_id: "u-9".into(),
            display_name: None,
            roles: [Role::Buyer].into_iter().collect(),
            permissions: PermissionTable::new(),
            email_verified: true,
            approval_status: tradeline_shared::ApprovalStatus::Approved,
            locked: false,
        }
    }

    #[test]
    fn repeated_redirect_decisions_navigate_once() {
        let nav = RecordingNavigator::default();
        let mut guard = RouteGuard::new(AccessRequirement::authenticated(), "/login", &nav);

        let anonymous = SessionSnapshot::ready(None);
        for _ in 0..3 {
            let decision = guard.apply(&anonymous, "/orders");
            assert!(matches!(decision, GateDecision::RedirectTo(_)));
        }

        let navigations = nav.navigations.borrow();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].path, "/login");
        assert_eq!(navigations[0].return_to.as_deref(), Some("/orders"));
    }

    #[test]
    fn redirect_fires_again_after_decision_changes() {
        let nav = RecordingNavigator::default();
        let mut guard = RouteGuard::new(AccessRequirement::authenticated(), "/login", &nav);

        guard.apply(&SessionSnapshot::ready(None), "/orders");
        // User signs in, then signs out again: a fresh edge.
        let decision = guard.apply(&SessionSnapshot::ready(Some(buyer())), "/orders");
        assert_eq!(decision, GateDecision::Render);
        guard.apply(&SessionSnapshot::ready(None), "/orders");

        assert_eq!(nav.navigations.borrow().len(), 2);
    }

    #[test]
    fn blocking_views_never_navigate() {
        let nav = RecordingNavigator::default();
        let mut guard = RouteGuard::new(AccessRequirement::admin_only(), "/login", &nav);

        let decision = guard.apply(&SessionSnapshot::ready(Some(buyer())), "/admin");
        assert_eq!(
            decision,
            GateDecision::ShowBlockingView(BlockingView::Forbidden)
        );
        assert!(nav.navigations.borrow().is_empty());
    }
}
