use std::str::FromStr;

use hex::FromHexError;
use thiserror::Error;

/// Acknowledgment payload given as hex on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken(Vec<u8>);

impl AckToken {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum InvalidTokenError {
    #[error("acknowledgment token is empty")]
    Empty,
    #[error("acknowledgment token is not hex: {0}")]
    Hex(#[from] FromHexError),
}

impl FromStr for AckToken {
    type Err = InvalidTokenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(InvalidTokenError::Empty);
        }
        Ok(Self(hex::decode(value)?))
    }
}
