pub type ReplayResult<T> = Result<T, ReplayError>;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    /// A dataset fetch failed (network or parse). Surfaced to the caller of
    /// `load`; never retried automatically and nothing partial is installed.
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    /// Timestamp/pose cardinality mismatch or otherwise inconsistent dataset
    /// metadata. The load aborts before any scene swap.
    #[error("malformed dataset: {0}")]
    MalformedDataset(String),

    /// A scrub- or capture-dependent operation was requested with no dataset
    /// bound.
    #[error("no active scene: {0}")]
    NoActiveScene(String),

    /// The export sink reported a failure during an active capture session.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReplayError {
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDataset(msg.into())
    }

    pub fn no_active_scene(msg: impl Into<String>) -> Self {
        Self::NoActiveScene(msg.into())
    }

    pub fn capture_failed(msg: impl Into<String>) -> Self {
        Self::CaptureFailed(msg.into())
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
            ReplayError::data_unavailable("x")
                .to_string()
                .contains("dataset unavailable:")
        );
        assert!(
            ReplayError::malformed("x")
                .to_string()
                .contains("malformed dataset:")
        );
        assert!(
            ReplayError::no_active_scene("x")
                .to_string()
                .contains("no active scene:")
        );
        assert!(
            ReplayError::capture_failed("x")
                .to_string()
                .contains("capture failed:")
        );
        assert!(
            ReplayError::validation("x")
                .to_string()
                .contains("validation error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ReplayError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
