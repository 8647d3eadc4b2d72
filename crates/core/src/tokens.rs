use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

pub const DEFAULT_TOKEN_BYTES: usize = 24;
pub const MIN_TOKEN_BYTES: usize = 16;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token length {requested} is below the {minimum}-byte minimum")]
    TooShort { requested: usize, minimum: usize },
    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(String),
}

/// URL-safe, unpadded base64 of `byte_len` bytes drawn from the OS CSPRNG.
pub fn random_token(byte_len: usize) -> Result<String, TokenError> {
    if byte_len < MIN_TOKEN_BYTES {
        return Err(TokenError::TooShort { requested: byte_len, minimum: MIN_TOKEN_BYTES });
    }
    let mut bytes = vec![0_u8; byte_len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|error| TokenError::EntropyUnavailable(error.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// The approval and customer-view credentials minted for one quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityTokens {
    pub approval: String,
    pub customer_view: String,
}

impl CapabilityTokens {
    pub fn issue(byte_len: usize) -> Result<Self, TokenError> {
        let approval = random_token(byte_len)?;
        let mut customer_view = random_token(byte_len)?;
        while customer_view == approval {
            customer_view = random_token(byte_len)?;
        }
        Ok(Self { approval, customer_view })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::tokens::{
        random_token, CapabilityTokens, TokenError, DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES,
    };

    #[test]
    fn default_token_is_url_safe_and_unpadded() {
        let token = random_token(DEFAULT_TOKEN_BYTES).expect("token");

        // 24 bytes encode to exactly 32 characters without padding.
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn ten_thousand_tokens_never_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(random_token(DEFAULT_TOKEN_BYTES).expect("token")));
        }
    }

    #[test]
    fn short_tokens_are_refused() {
        assert_eq!(
            random_token(8),
            Err(TokenError::TooShort { requested: 8, minimum: MIN_TOKEN_BYTES })
        );
        assert!(random_token(MIN_TOKEN_BYTES).is_ok());
    }

    #[test]
    fn issued_pair_is_distinct() {
        let tokens = CapabilityTokens::issue(DEFAULT_TOKEN_BYTES).expect("pair");
        assert_ne!(tokens.approval, tokens.customer_view);
    }
}
