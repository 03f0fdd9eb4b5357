use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not connected to {0}")]
    NotConnected(String),

    #[error("api not ready: {0}")]
    NotReady(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid ui setting: {0}")]
    InvalidSetting(String),

    #[error("extension error: {0}")]
    Extension(String),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<codec::Error> for ApiError {
    fn from(err: codec::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for ApiError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Serialization(format!("invalid hex: {err}"))
    }
}

impl From<jsonrpsee::core::ClientError> for ApiError {
    fn from(err: jsonrpsee::core::ClientError) -> Self {
        Self::Rpc(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
