pub type RasterpadResult<T> = Result<T, RasterpadError>;

#[derive(thiserror::Error, Debug)]
pub enum RasterpadError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RasterpadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            RasterpadError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            RasterpadError::resource("x")
                .to_string()
                .contains("resource error:")
        );
        assert!(
            RasterpadError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = RasterpadError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
