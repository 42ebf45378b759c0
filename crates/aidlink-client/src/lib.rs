//! The per-tab side of AidLink: a polling sync layer that keeps local
//! collection caches consistent with the store, the session identity
//! derived from those caches, the help-request lifecycle built on top,
//! and the scripted first-aid triage dialogue.

pub mod backend;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod sync;
pub mod triage;

pub use backend::{HttpBackend, MemoryBackend, StoreBackend};
pub use error::ClientError;
pub use lifecycle::{RequestLifecycle, RequestPatch};
pub use session::{NewProfile, SessionEvent, SessionManager};
pub use sync::{CollectionHandle, SyncClient, DEFAULT_POLL_INTERVAL};
