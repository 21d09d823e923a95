pub type SaviResult<T> = Result<T, SaviError>;

#[derive(thiserror::Error, Debug)]
pub enum SaviError {
    /// Request failure or stream abort. Never fatal to the process; the
    /// caller rolls UI state back to pre-action.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed wire data that is fatal to a single call (bad JSON on a
    /// non-streaming endpoint, RLE counts overrunning the declared size).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A caller bug: the operation was invoked against state it is never
    /// valid against (unknown object id, out-of-range frame, ...).
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Synchronously rejected action with no state change (object cap,
    /// creation gating). Discoverable up front via the matching pure
    /// eligibility check.
    #[error("capacity: {0}")]
    Capacity(String),

    /// Annotation edits are rejected while a tracking stream is active.
    #[error("busy: {0}")]
    Busy(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SaviError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SaviError::protocol("x")
                .to_string()
                .contains("protocol error:")
        );
        assert!(
            SaviError::invariant("x")
                .to_string()
                .contains("invariant violation:")
        );
        assert!(SaviError::capacity("x").to_string().contains("capacity:"));
        assert!(SaviError::busy("x").to_string().contains("busy:"));
        assert!(
            SaviError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = SaviError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
