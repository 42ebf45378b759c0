use thiserror::Error;

/// Everything here is recovered locally — the UI stays usable and the
/// poll loop is the only self-healing mechanism.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An action requiring an identity ran without one.
    #[error("no active session")]
    NoActiveSession,

    /// Credentials matched no record. Deliberately does not say whether
    /// the email or the password was wrong.
    #[error("invalid email or password")]
    AuthFailure,

    /// The store write behind an optimistic update failed. The local
    /// state is kept as-is; the correlation id ties the failure back to
    /// the originating write.
    #[error("persist failed (correlation id {correlation_id})")]
    PersistFailure { correlation_id: String },

    /// The addressed record is no longer present, or was already taken
    /// by someone else. The next poll will straighten out the UI.
    #[error("{kind} {id} not found")]
    StaleReference { kind: &'static str, id: String },

    /// The requester already has a non-resolved request open.
    #[error("requester {requester_id} already has an active request")]
    DuplicateRequest { requester_id: String },
}
