//! Authentication session management.
//!
//! One `AuthSession` is constructed at app start and owns all session state.
//! It is the single writer of [`SessionSnapshot`]s; the gate and any other
//! consumer subscribe to the watch channel and only read.

use tokio::sync::watch;
use tradeline_shared::{ApiError, LoginRequest, SessionSnapshot};

use crate::api_client::ApiClient;
use crate::{log_info, log_warn};

/// The session provider. Injected into guards and page composition; never
/// accessed through globals.
pub struct AuthSession {
    api: ApiClient,
    base_url: String,
    state: watch::Sender<SessionSnapshot>,
}

impl AuthSession {
    /// Create a session provider against the given backend. The snapshot
    /// starts in `Loading`; call [`load`] to resolve it.
    ///
    /// [`load`]: AuthSession::load
    pub fn new(provider_domain: impl Into<String>) -> Self {
        let base_url = normalize_base_url(&provider_domain.into());
        let api = ApiClient::new().with_base_url(base_url.clone());
        let (state, _) = watch::channel(SessionSnapshot::loading());
        Self {
            api,
            base_url,
            state,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to snapshot changes. Guards re-evaluate on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Fetch the current session from the backend. On transport failure the
    /// snapshot moves to `Error` with a user-facing message and a retry is
    /// up to the caller (call `load` again).
    pub async fn load(&self) {
        self.state.send_replace(SessionSnapshot::loading());
        match self.api.current_session().await {
            Ok(current) => {
                log_info!(
                    "session loaded (authenticated: {})",
                    current.user.is_some()
                );
                self.state.send_replace(SessionSnapshot::ready(current.user));
            }
            Err(err) => {
                log_warn!("session load failed: {}", err);
                self.state
                    .send_replace(SessionSnapshot::error(err.user_message()));
            }
        }
    }

    /// Exchange credentials for a session. On success the bearer token is
    /// attached to subsequent API calls and the snapshot becomes
    /// authenticated.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .api
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.api = self.api.clone().with_token(Some(response.token));
        self.state
            .send_replace(SessionSnapshot::ready(Some(response.user)));
        Ok(())
    }

    /// Log out. The server-side invalidation is best effort; local state is
    /// cleared regardless.
    pub async fn logout(&mut self) {
        if let Err(err) = self.api.logout().await {
            log_warn!("server-side logout failed: {}", err);
        }
        self.api = self.api.clone().with_token(None);
        self.state.send_replace(SessionSnapshot::ready(None));
    }

    /// Request a fresh verification mail for the signed-in account
    pub async fn resend_verification(&self) -> Result<(), ApiError> {
        self.api.resend_verification().await
    }

    /// Leave the `Error` phase so the caller can retry or continue
    /// anonymously.
    pub fn clear_error(&self) {
        let errored = self.state.borrow().error_message().is_some();
        if errored {
            self.state.send_replace(SessionSnapshot::ready(None));
        }
    }

    // --- URL construction ---

    /// Construct an API URL on the session's provider
    pub fn api_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            return if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            };
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Construct a WebSocket URL (http/https swapped to ws/wss)
    pub fn ws_url(&self, path: &str) -> String {
        http_to_ws(&self.api_url(path))
    }

    /// Construct the realtime endpoint URL carrying the session identity as
    /// query parameters: `...?identity=<id>&role=<role>`. Returns the plain
    /// URL when no one is signed in.
    pub fn ws_url_with_identity(&self, path: &str) -> String {
        let base = self.ws_url(path);
        let snapshot = self.state.borrow();
        let Some(user) = snapshot.user() else {
            return base;
        };
        let role = user
            .primary_role()
            .map(|r| r.as_str())
            .unwrap_or("buyer");
        let separator = if base.contains('?') { '&' } else { '?' };
        format!(
            "{base}{separator}identity={}&role={}",
            urlencoding::encode(&user.user_id),
            role
        )
    }

    #[cfg(test)]
    pub(crate) fn set_snapshot(&self, snapshot: SessionSnapshot) {
        self.state.send_replace(snapshot);
    }
}

/// Normalize a provider domain to a base URL. Bare local hosts get `http`,
/// anything else `https`; full URLs pass through.
fn normalize_base_url(domain: &str) -> String {
    let domain = domain.trim();
    if domain.is_empty() {
        return String::new();
    }
    if domain.contains("://") {
        return domain.trim_end_matches('/').to_string();
    }
    let host_part = domain.split(':').next().unwrap_or(domain);
    let is_local = host_part == "localhost"
        || host_part == "127.0.0.1"
        || host_part == "0.0.0.0"
        || host_part.starts_with("192.168.")
        || host_part.starts_with("10.");
    if is_local {
        format!("http://{}", domain.trim_end_matches('/'))
    } else {
        format!("https://{}", domain.trim_end_matches('/'))
    }
}

/// Convert an HTTP/HTTPS URL to WS/WSS
fn http_to_ws(url_str: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(url_str) {
        let swapped = match parsed.scheme() {
            "https" => parsed.set_scheme("wss").is_ok(),
            "http" => parsed.set_scheme("ws").is_ok(),
            _ => false,
        };
        if swapped {
            return parsed.to_string();
        }
    }
    url_str.to_string()
}

#[cfg(test)]
mod tests {
    use tradeline_shared::{PermissionTable, Role, SessionUser};

    use super::*;

    fn supplier() -> SessionUser {
        SessionUser {
            user_id: "supplier 42".into(),
            display_name: None,
            roles: [Role::Supplier].into_iter().collect(),
            permissions: PermissionTable::new(),
            email_verified: true,
            approval_status: tradeline_shared::ApprovalStatus::Approved,
            locked: false,
        }
    }

    #[test]
    fn local_domains_get_plain_http() {
        let session = AuthSession::new("localhost:8080");
        assert_eq!(
            session.api_url("/api/session"),
            "http://localhost:8080/api/session"
        );
    }

    #[test]
    fn remote_domains_get_https_and_wss() {
        let session = AuthSession::new("market.example.com");
        assert_eq!(
            session.ws_url("/api/ws"),
            "wss://market.example.com/api/ws"
        );
    }

    #[test]
    fn identity_params_are_urlencoded() {
        let session = AuthSession::new("localhost:8080");
        session.set_snapshot(SessionSnapshot::ready(Some(supplier())));
        assert_eq!(
            session.ws_url_with_identity("/api/ws"),
            "ws://localhost:8080/api/ws?identity=supplier%2042&role=supplier"
        );
    }

    #[test]
    fn anonymous_ws_url_has_no_identity() {
        let session = AuthSession::new("localhost:8080");
        session.set_snapshot(SessionSnapshot::ready(None));
        assert_eq!(
            session.ws_url_with_identity("/api/ws"),
            "ws://localhost:8080/api/ws"
        );
    }

    #[test]
    fn starts_loading_and_clear_error_recovers() {
        let session = AuthSession::new("localhost:8080");
        assert!(session.snapshot().is_loading());

        session.set_snapshot(SessionSnapshot::error("boom"));
        session.clear_error();
        let snapshot = session.snapshot();
        assert!(snapshot.error_message().is_none());
        assert!(!snapshot.is_loading());
        assert!(!snapshot.is_authenticated());
    }

    #[test]
    fn clear_error_leaves_ready_sessions_alone() {
        let session = AuthSession::new("localhost:8080");
        session.set_snapshot(SessionSnapshot::ready(Some(supplier())));
        session.clear_error();
        assert!(session.snapshot().is_authenticated());
    }
}
