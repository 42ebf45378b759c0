use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the three named record sets treated as a single persistable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Requests,
    AdminLogs,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Users,
        Collection::Requests,
        Collection::AdminLogs,
    ];

    /// Stable name, used for storage file names.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Requests => "requests",
            Collection::AdminLogs => "admin_logs",
        }
    }

    /// Path segment under `/api/` on the HTTP surface.
    pub fn route_path(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Requests => "requests",
            Collection::AdminLogs => "admin/logs",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Account role. The wire format spells the requester role `"user"`,
/// which is kept for compatibility with existing data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "user")]
    Requester,
    Responder,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Requester => "user",
            Role::Responder => "responder",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Stored in the clear — this is demo data, not an auth system.
    pub password: String,
    pub role: Role,
    /// Only meaningful for responders; gates their visibility to requesters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl User {
    pub fn is_verified_responder(&self) -> bool {
        self.role == Role::Responder && self.verified.unwrap_or(false)
    }
}

/// A help request moving through pending -> accepted -> resolved.
/// Transitions are forward-only and records are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: String,
    pub requester_id: String,
    /// Present from acceptance onward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder_id: Option<String>,
    pub status: RequestStatus,
    /// Free-text incident category.
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub severity: String,
    /// Creation time, epoch milliseconds. Immutable.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Responder's post-incident check-in, set at resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_status: Option<String>,
}

/// Immutable audit entry. `admin_name` is a denormalized snapshot taken
/// at write time so the trail survives user deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLog {
    pub id: String,
    pub admin_id: String,
    pub admin_name: String,
    pub action: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub timestamp: i64,
}

/// The administrator record served when the user collection has never
/// been written, so the system is usable on first run.
pub fn default_admin() -> User {
    User {
        id: "admin-1".to_string(),
        name: "Admin User".to_string(),
        email: "admin@example.com".to_string(),
        password: "password".to_string(),
        role: Role::Admin,
        verified: None,
    }
}

/// Contents served for a collection that has never been written.
pub fn seed_records(collection: Collection) -> Vec<Value> {
    match collection {
        Collection::Users => serde_json::to_value(default_admin())
            .map(|v| vec![v])
            .unwrap_or_default(),
        Collection::Requests | Collection::AdminLogs => Vec::new(),
    }
}

/// Fresh opaque record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as epoch milliseconds, the record timestamp format.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
