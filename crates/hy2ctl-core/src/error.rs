//! Error types for hy2ctl core library.

use thiserror::Error;

/// Result type alias using hy2ctl Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hy2ctl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Tunnel configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bandwidth conversion error
    #[error(transparent)]
    Bandwidth(#[from] BandwidthError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while turning a raw payload into a [`crate::TunnelConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The payload could not be decoded into the expected shape.
    #[error("Malformed config: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The payload decoded but a field failed semantic validation.
    #[error("Invalid config: {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field path of an [`ConfigError::Invalid`] error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            Self::Malformed(_) => None,
        }
    }
}

/// Errors from bandwidth string and value conversion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BandwidthError {
    #[error("invalid bandwidth format: {0:?}")]
    InvalidFormat(String),

    #[error("unsupported bandwidth unit: {0:?}")]
    UnsupportedUnit(String),

    #[error("bandwidth value out of range: {0:?}")]
    Overflow(String),

    #[error("invalid type {0} for bandwidth")]
    InvalidType(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandwidth::string_to_bps;
    use crate::config;

    fn load(raw: &str, rate: &str) -> Result<u64> {
        config::validate(raw.as_bytes())?;
        Ok(string_to_bps(rate)?)
    }

    #[test]
    fn core_errors_convert_with_question_mark() {
        assert_eq!(
            load(r#"{"server":"h","auth":"a"}"#, "8 kbps").ok(),
            Some(1000)
        );
        assert!(matches!(
            load("{", "8 kbps"),
            Err(Error::Config(ConfigError::Malformed(_)))
        ));
        assert!(matches!(
            load(r#"{"server":"h","auth":"a"}"#, "8 furlongs"),
            Err(Error::Bandwidth(BandwidthError::UnsupportedUnit(_)))
        ));
    }

    #[test]
    fn invalid_display_names_field() {
        let err = ConfigError::invalid("quic.maxIdleTimeout", "too short");
        assert_eq!(err.field(), Some("quic.maxIdleTimeout"));
        assert_eq!(
            Error::from(err).to_string(),
            "Invalid config: quic.maxIdleTimeout: too short"
        );
    }
}
