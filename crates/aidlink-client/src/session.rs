//! Tab-scoped identity. The current user is only ever derived from the
//! user collection, never stored alongside it, and is re-derived each
//! time the collection changes so verification flips and deletions by
//! an admin show up without re-login.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aidlink_types::models::new_id;
use aidlink_types::{Collection, Role, User};

use crate::error::ClientError;
use crate::sync::SyncClient;

/// Out-of-band signals the UI must render differently from a plain
/// logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The identity vanished from the reconciled user collection: an
    /// admin removed the account while this tab was logged in.
    AccountRemoved,
}

/// Signup form contents; the id is assigned here, not by the caller.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    sync: SyncClient,
    current: watch::Sender<Option<User>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(sync: SyncClient) -> Self {
        let (current, _) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                sync,
                current,
                events,
            }),
        }
    }

    pub fn current(&self) -> Option<User> {
        self.inner.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.inner.current.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Create an account and log it in immediately. Responders start
    /// unverified; an admin has to approve them before requesters see
    /// them. A failed persist is logged and the optimistic state kept.
    pub async fn sign_up(&self, profile: NewProfile) -> User {
        let user = User {
            id: new_id(),
            name: profile.name,
            email: profile.email,
            password: profile.password,
            role: profile.role,
            verified: match profile.role {
                Role::Responder => Some(false),
                Role::Requester | Role::Admin => None,
            },
        };

        let mut users = self.inner.sync.users.snapshot();
        users.push(user.clone());
        if let Err(e) = self.inner.sync.users.apply(users).await {
            warn!("Signup for {} not persisted yet: {}", user.email, e);
        }

        info!("Signed up {} as {}", user.email, user.role.as_str());
        self.inner.current.send_replace(Some(user.clone()));
        user
    }

    /// Exact email+password lookup against the authoritative user
    /// collection (not the cache — another tab may have just signed
    /// up). Any miss or transport failure is the same generic
    /// `AuthFailure`; login never distinguishes unknown email from
    /// wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let values = self
            .inner
            .sync
            .backend()
            .fetch(Collection::Users)
            .await
            .map_err(|e| {
                warn!("Login fetch failed: {:#}", e);
                ClientError::AuthFailure
            })?;
        let users: Vec<User> =
            serde_json::from_value(Value::Array(values)).map_err(|_| ClientError::AuthFailure)?;

        let user = users
            .iter()
            .find(|u| u.email == email && u.password == password)
            .cloned()
            .ok_or(ClientError::AuthFailure)?;

        // Sync the cache with what we just fetched while we're at it.
        self.inner.sync.users.replace_local(users);
        self.inner.current.send_replace(Some(user.clone()));
        info!("Logged in {}", user.email);
        Ok(user)
    }

    pub fn logout(&self) {
        self.inner.current.send_replace(None);
    }

    /// Re-derive the identity from the latest user collection. A
    /// changed record replaces the cached identity in place (this is
    /// how a responder learns they were approved); a missing record
    /// forces logout with a distinct `AccountRemoved` signal. The
    /// seeded admin is exempt from forced logout.
    pub fn reconcile(&self, users: &[User]) {
        let Some(current) = self.current() else {
            return;
        };

        match users.iter().find(|u| u.id == current.id) {
            Some(fresh) => {
                if *fresh != current {
                    self.inner.current.send_replace(Some(fresh.clone()));
                }
            }
            None => {
                if current.role == Role::Admin {
                    return;
                }
                info!("Account {} removed by an administrator, logging out", current.id);
                self.inner.current.send_replace(None);
                let _ = self.inner.events.send(SessionEvent::AccountRemoved);
            }
        }
    }

    /// Watch the user cache and reconcile on every change (poll results
    /// and local writes alike).
    pub fn spawn_reconciler(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let session = self.clone();
        let mut users_rx = session.inner.sync.users.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = users_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let users = users_rx.borrow_and_update().clone();
                        session.reconcile(&users);
                    }
                }
            }
        })
    }
}
