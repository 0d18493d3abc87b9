use thiserror::Error;

/// Errors a probe session can return to its caller.
///
/// Unreachable or unresolvable targets are not errors, they come back as a
/// 100% loss summary. Only bad configuration and a broken transport end up here.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A request field failed validation. No probe was attempted.
    #[error("invalid {field}: {reason}")]
    Config { field: &'static str, reason: String },

    /// The ICMP transport itself failed (socket, privileges, ...).
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProbeError {
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending config field, if this is a config error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Config { field, .. } => Some(*field),
            Self::Transport(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("icmp socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("icmp transport error: {0}")]
    Other(String),
}
