//! Shared data models for the tradeline marketplace.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Identity & access ---

/// Marketplace account role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Buyer,
    Supplier,
    Admin,
}

impl Role {
    /// Admin-equivalent roles bypass the fine-grained permission table:
    /// an admin session satisfies every resource/action check unconditionally.
    /// This is a deliberate rule of the access model, not a fallback.
    pub fn is_admin_equivalent(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Supplier => "supplier",
            Role::Admin => "admin",
        }
    }
}

/// Supplier/buyer account approval state, driven by the admin review flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl ApprovalStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalStatus::Approved)
    }
}

/// Fine-grained permissions: resource name -> allowed actions.
pub type PermissionTable = BTreeMap<String, BTreeSet<String>>;

/// A single resource/action pair, as required by a protected region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub resource: String,
    pub action: String,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// The authenticated user as reported by `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub display_name: Option<String>,
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub permissions: PermissionTable,
    pub email_verified: bool,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub locked: bool,
}

impl SessionUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin_equivalent)
    }

    /// Highest-privilege role, used e.g. for the realtime identity params.
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.iter().max().copied()
    }
}

/// Session loading phase. The snapshot is `Loading` until the first
/// `/api/session` round trip resolves, then `Ready` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Error(String),
}

/// Point-in-time view of the authentication session. Owned and mutated by
/// `AuthSession`; everything else only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<SessionUser>,
}

impl SessionSnapshot {
    pub fn loading() -> Self {
        Self {
            phase: SessionPhase::Loading,
            user: None,
        }
    }

    pub fn ready(user: Option<SessionUser>) -> Self {
        Self {
            phase: SessionPhase::Ready,
            user,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Error(message.into()),
            user: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Loading
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Error(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_any_role(&self, roles: &BTreeSet<Role>) -> bool {
        self.user
            .as_ref()
            .map(|u| u.roles.iter().any(|r| roles.contains(r)))
            .unwrap_or(false)
    }

    /// Whether the session may perform `action` on `resource`.
    ///
    /// Admin-equivalent roles pass unconditionally, regardless of the
    /// permission table contents (see [`Role::is_admin_equivalent`]).
    pub fn can(&self, resource: &str, action: &str) -> bool {
        let Some(user) = self.user.as_ref() else {
            return false;
        };
        if user.is_admin() {
            return true;
        }
        user.permissions
            .get(resource)
            .map(|actions| actions.contains(action))
            .unwrap_or(false)
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

// --- Session API payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSession {
    pub user: Option<SessionUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

// --- Marketplace objects carried over the realtime channel ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub rfq_id: String,
    pub supplier_id: String,
    pub unit_price_cents: i64,
    pub currency: String,
    pub lead_time_days: u32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrderState {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

/// A message in an RFQ negotiation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(roles: &[Role], permissions: PermissionTable) -> SessionUser {
        SessionUser {
            user_id: "u-1".into(),
            display_name: None,
            roles: roles.iter().copied().collect(),
            permissions,
            email_verified: true,
            approval_status: ApprovalStatus::Approved,
            locked: false,
        }
    }

    #[test]
    fn permission_check_consults_table() {
        let mut table = PermissionTable::new();
        table.insert("listings".into(), ["edit".to_string()].into_iter().collect());
        let snap = SessionSnapshot::ready(Some(user_with(&[Role::Supplier], table)));

        assert!(snap.can("listings", "edit"));
        assert!(!snap.can("listings", "delete"));
        assert!(!snap.can("orders", "edit"));
    }

    #[test]
    fn admin_bypasses_permission_table() {
        let snap = SessionSnapshot::ready(Some(user_with(&[Role::Admin], PermissionTable::new())));
        assert!(snap.can("anything", "at-all"));
    }

    #[test]
    fn anonymous_has_no_permissions() {
        let snap = SessionSnapshot::ready(None);
        assert!(!snap.can("listings", "view"));
        assert!(!snap.is_authenticated());
    }

    #[test]
    fn primary_role_prefers_admin() {
        let user = user_with(&[Role::Buyer, Role::Admin], PermissionTable::new());
        assert_eq!(user.primary_role(), Some(Role::Admin));
    }
}
