//! Help-request state machine plus the admin audit trail. All mutations
//! are read-modify-write over the whole cached collection, applied
//! optimistically through the sync layer. Statuses only move forward:
//! pending -> accepted -> resolved.

use tracing::warn;

use aidlink_types::models::{new_id, now_millis};
use aidlink_types::{AdminLog, HelpRequest, RequestStatus, Role, User};

use crate::error::ClientError;
use crate::session::SessionManager;
use crate::sync::SyncClient;

/// Fields a caller may change on a non-resolved request. Status and
/// requesterId are deliberately not expressible here.
#[derive(Debug, Clone, Default)]
pub struct RequestPatch {
    /// Incident category ("type" on the wire).
    pub kind: Option<String>,
}

#[derive(Clone)]
pub struct RequestLifecycle {
    sync: SyncClient,
    session: SessionManager,
}

impl RequestLifecycle {
    pub fn new(sync: SyncClient, session: SessionManager) -> Self {
        Self { sync, session }
    }

    /// Open a new pending request for the current identity. Rejected if
    /// the requester already has a non-resolved request open.
    pub async fn create_request(
        &self,
        kind: &str,
        location: &str,
        severity: &str,
    ) -> Result<HelpRequest, ClientError> {
        let requester = self.session.current().ok_or(ClientError::NoActiveSession)?;

        let mut requests = self.sync.requests.snapshot();
        if requests
            .iter()
            .any(|r| r.requester_id == requester.id && r.status != RequestStatus::Resolved)
        {
            return Err(ClientError::DuplicateRequest {
                requester_id: requester.id,
            });
        }

        let request = HelpRequest {
            id: new_id(),
            requester_id: requester.id,
            responder_id: None,
            status: RequestStatus::Pending,
            kind: kind.to_string(),
            location: location.to_string(),
            severity: severity.to_string(),
            timestamp: now_millis(),
            outcome: None,
            emotional_status: None,
        };

        requests.push(request.clone());
        self.persist_requests(requests).await;
        Ok(request)
    }

    /// pending -> accepted, claiming the request for a responder. A
    /// repeat call by the same responder is a no-op; a request that is
    /// gone or already someone else's fails as stale.
    pub async fn accept_request(
        &self,
        request_id: &str,
        responder_id: &str,
    ) -> Result<(), ClientError> {
        let mut requests = self.sync.requests.snapshot();
        let Some(request) = requests.iter_mut().find(|r| r.id == request_id) else {
            return Err(stale_request(request_id));
        };

        match request.status {
            RequestStatus::Pending => {
                request.status = RequestStatus::Accepted;
                request.responder_id = Some(responder_id.to_string());
            }
            // Already handled by this responder: idempotent no-op.
            _ if request.responder_id.as_deref() == Some(responder_id) => return Ok(()),
            _ => return Err(stale_request(request_id)),
        }

        self.persist_requests(requests).await;
        Ok(())
    }

    /// Change the mutable fields of a not-yet-resolved request. A
    /// resolved request is left untouched.
    pub async fn update_request(
        &self,
        request_id: &str,
        patch: RequestPatch,
    ) -> Result<(), ClientError> {
        let mut requests = self.sync.requests.snapshot();
        let Some(request) = requests.iter_mut().find(|r| r.id == request_id) else {
            return Err(stale_request(request_id));
        };

        if request.status == RequestStatus::Resolved {
            warn!("Ignoring update to resolved request {}", request_id);
            return Ok(());
        }

        let Some(kind) = patch.kind else {
            return Ok(());
        };
        request.kind = kind;

        self.persist_requests(requests).await;
        Ok(())
    }

    /// accepted -> resolved, recording the outcome and the responder's
    /// post-incident check-in. Resolving twice is a no-op, as is
    /// resolving a request that was never accepted.
    pub async fn resolve_request(
        &self,
        request_id: &str,
        outcome: Option<&str>,
        emotional_status: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut requests = self.sync.requests.snapshot();
        let Some(request) = requests.iter_mut().find(|r| r.id == request_id) else {
            return Err(stale_request(request_id));
        };

        if request.status != RequestStatus::Accepted {
            return Ok(());
        }

        request.status = RequestStatus::Resolved;
        request.outcome = outcome.map(str::to_string);
        request.emotional_status = emotional_status.map(str::to_string);

        self.persist_requests(requests).await;
        Ok(())
    }

    /// Approve a responder and record the action in the audit trail.
    pub async fn verify_responder(&self, user_id: &str) -> Result<(), ClientError> {
        let admin = self.session.current().ok_or(ClientError::NoActiveSession)?;

        let mut users = self.sync.users.snapshot();
        let Some(target) = users.iter_mut().find(|u| u.id == user_id) else {
            return Err(stale_user(user_id));
        };

        target.verified = Some(true);
        let details = format!("Verified responder: {}", target.name);

        self.persist_users(users).await;
        self.append_admin_log(&admin, "VERIFY", details, Some(user_id))
            .await;
        Ok(())
    }

    /// Remove a user. The audit entry is written first, while the
    /// record still exists, so the trail keeps the name and role.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), ClientError> {
        let admin = self.session.current().ok_or(ClientError::NoActiveSession)?;

        let users = self.sync.users.snapshot();
        let Some(target) = users.iter().find(|u| u.id == user_id) else {
            return Err(stale_user(user_id));
        };

        let details = format!("Deleted user: {} ({})", target.name, target.role.as_str());
        self.append_admin_log(&admin, "DELETE", details, Some(user_id))
            .await;

        let remaining = users.into_iter().filter(|u| u.id != user_id).collect();
        self.persist_users(remaining).await;
        Ok(())
    }

    // -- Dashboard queries --

    /// The requester's open request, if any (at most one by convention).
    pub fn active_request_for(&self, requester_id: &str) -> Option<HelpRequest> {
        self.sync
            .requests
            .snapshot()
            .into_iter()
            .find(|r| r.requester_id == requester_id && r.status != RequestStatus::Resolved)
    }

    /// Next pending request a responder could take: not their own, not
    /// one they have locally declined.
    pub fn incoming_for_responder(
        &self,
        responder_id: &str,
        declined: &[String],
    ) -> Option<HelpRequest> {
        self.sync.requests.snapshot().into_iter().find(|r| {
            r.status == RequestStatus::Pending
                && r.requester_id != responder_id
                && !declined.contains(&r.id)
        })
    }

    /// The case a responder is currently working.
    pub fn active_case_for(&self, responder_id: &str) -> Option<HelpRequest> {
        self.sync.requests.snapshot().into_iter().find(|r| {
            r.status == RequestStatus::Accepted && r.responder_id.as_deref() == Some(responder_id)
        })
    }

    /// Responders awaiting admin approval.
    pub fn verification_queue(&self) -> Vec<User> {
        self.sync
            .users
            .snapshot()
            .into_iter()
            .filter(|u| u.role == Role::Responder && !u.verified.unwrap_or(false))
            .collect()
    }

    /// Lookup for display. An orphaned id (user deleted after the fact)
    /// comes back `None` and renders as "not found", never a crash.
    pub fn user(&self, user_id: &str) -> Option<User> {
        self.sync
            .users
            .snapshot()
            .into_iter()
            .find(|u| u.id == user_id)
    }

    // -- Internals --

    /// Persist-failure policy: keep the optimistic state, log, and let
    /// the next poll reconcile. Nothing is retried.
    async fn persist_requests(&self, requests: Vec<HelpRequest>) {
        if let Err(e) = self.sync.requests.apply(requests).await {
            warn!("Help request write not persisted: {}", e);
        }
    }

    async fn persist_users(&self, users: Vec<User>) {
        if let Err(e) = self.sync.users.apply(users).await {
            warn!("User write not persisted: {}", e);
        }
    }

    async fn append_admin_log(
        &self,
        admin: &User,
        action: &str,
        details: String,
        target_id: Option<&str>,
    ) {
        let log = AdminLog {
            id: new_id(),
            admin_id: admin.id.clone(),
            admin_name: admin.name.clone(),
            action: action.to_string(),
            details,
            target_id: target_id.map(str::to_string),
            timestamp: now_millis(),
        };

        // Optimistic prepend locally; the store prepends the single
        // posted record the same way.
        let mut logs = self.sync.admin_logs.snapshot();
        logs.insert(0, log.clone());
        self.sync.admin_logs.replace_local(logs);

        match serde_json::to_value(&log) {
            Ok(value) => {
                if let Err(e) = self.sync.backend().append_log(value).await {
                    warn!("Admin log entry not persisted: {:#}", e);
                }
            }
            Err(e) => warn!("Could not encode admin log entry: {}", e),
        }
    }
}

fn stale_request(id: &str) -> ClientError {
    ClientError::StaleReference {
        kind: "request",
        id: id.to_string(),
    }
}

fn stale_user(id: &str) -> ClientError {
    ClientError::StaleReference {
        kind: "user",
        id: id.to_string(),
    }
}
