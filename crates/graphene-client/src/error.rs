use curator_core::CuratorError;

/// Errors raised by the condenser client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid key: {0}")]
    Key(String),
    #[error("cannot serialize transaction: {0}")]
    Serialize(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<ClientError> for CuratorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Key(msg) => CuratorError::Credential(msg),
            ClientError::Serialize(msg) => CuratorError::Validation(msg),
            other => CuratorError::Platform(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_into_engine_taxonomy() {
        let err: CuratorError = ClientError::Rpc {
            code: -32000,
            message: "missing required posting authority".into(),
        }
        .into();
        assert!(err.is_retryable());

        let err: CuratorError = ClientError::Key("bad checksum".into()).into();
        assert!(matches!(err, CuratorError::Credential(_)));

        let err: CuratorError = ClientError::Serialize("symbol too long".into()).into();
        assert!(err.is_validation());
    }
}
