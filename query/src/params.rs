use serde::{Deserialize, Serialize};
use wallet_api::error::ApiError;
use wallet_api::ss58;

/// A single argument to a subscribed storage query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryParam {
    AccountId([u8; 32]),
    /// SS58 address, or `0x`-prefixed hex of a 32-byte account id.
    Address(String),
    Bytes(Vec<u8>),
    /// Not known yet; a query with a null argument is not issued.
    Null,
}

impl QueryParam {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn account_id(&self) -> Result<[u8; 32], ApiError> {
        match self {
            Self::AccountId(id) => Ok(*id),
            Self::Address(address) => ss58::account_id_from_str(address),
            Self::Bytes(bytes) => <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
                ApiError::InvalidAddress(format!("expected 32 account bytes, got {}", bytes.len()))
            }),
            Self::Null => Err(ApiError::InvalidArgument("account not known yet")),
        }
    }
}

/// A query is issued only with at least one argument and no null ones.
pub fn is_callable(params: &[QueryParam]) -> bool {
    !params.is_empty() && !params.iter().any(QueryParam::is_null)
}

impl From<[u8; 32]> for QueryParam {
    fn from(id: [u8; 32]) -> Self {
        Self::AccountId(id)
    }
}

impl From<&str> for QueryParam {
    fn from(address: &str) -> Self {
        Self::Address(address.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(address: String) -> Self {
        Self::Address(address)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
