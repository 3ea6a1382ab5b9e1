//! JWT token issuance and verification.
//!
//! Both token kinds are signed with the same HS256 secret and told apart by
//! the `typ` claim, so an access token can never be replayed as a refresh
//! token or the other way around.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, sent as a bearer credential
    Access,
    /// Long-lived refresh token, only ever stored in an HttpOnly cookie
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (principal identifier)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 30 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 30 * 60;

/// Default refresh token lifetime: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Lifetimes applied when minting tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_secs: u64,
    pub refresh_secs: u64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access_secs: ACCESS_TOKEN_DURATION_SECS,
            refresh_secs: REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetimes(secret, TokenLifetimes::default())
    }

    pub fn with_lifetimes(secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetimes,
        }
    }

    /// Mint an access token for `subject`.
    pub fn issue_access_token(&self, subject: &str) -> Result<IssuedToken, JwtError> {
        let now = now_secs()?;
        let duration = self.lifetimes.access_secs;
        let claims = AccessClaims {
            sub: subject.to_string(),
            token_type: TokenType::Access,
            iat: now,
            exp: now + duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: claims.exp,
            duration,
        })
    }

    /// Mint a refresh token for `subject`.
    pub fn issue_refresh_token(&self, subject: &str) -> Result<IssuedToken, JwtError> {
        let now = now_secs()?;
        let duration = self.lifetimes.refresh_secs;
        let claims = RefreshClaims {
            sub: subject.to_string(),
            token_type: TokenType::Refresh,
            iat: now,
            exp: now + duration,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: claims.exp,
            duration,
        })
    }

    /// Validate and decode an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let token_data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &strict_validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate a refresh token and return its subject.
    pub fn verify_refresh_token(&self, token: &str) -> Result<String, JwtError> {
        let token_data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &strict_validation())
                .map_err(JwtError::Decoding)?;

        if token_data.claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims.sub)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token (bad signature, malformed, expired)
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Decoding(e) => write!(f, "Failed to decode token: {}", e),
            JwtError::TimeError => write!(f, "System time error"),
            JwtError::WrongTokenType => write!(f, "Wrong token type"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-for-testing";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let config = JwtConfig::new(SECRET);

        let result = config.issue_refresh_token("42").unwrap();
        assert_eq!(result.duration, REFRESH_TOKEN_DURATION_SECS);
        assert_eq!(result.expires_at, result.issued_at + REFRESH_TOKEN_DURATION_SECS);

        let subject = config.verify_refresh_token(&result.token).unwrap();
        assert_eq!(subject, "42");
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let config = JwtConfig::new(SECRET);

        let result = config.issue_access_token("42").unwrap();
        assert_eq!(result.duration, ACCESS_TOKEN_DURATION_SECS);

        let claims = config.verify_access_token(&result.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp, result.expires_at);
    }

    #[test]
    fn test_pair_shares_subject() {
        let config = JwtConfig::new(SECRET);

        let access = config.issue_access_token("alice").unwrap();
        let refresh = config.issue_refresh_token("alice").unwrap();

        let access_claims = config.verify_access_token(&access.token).unwrap();
        let refresh_subject = config.verify_refresh_token(&refresh.token).unwrap();
        assert_eq!(access_claims.sub, refresh_subject);
    }

    #[test]
    fn test_custom_lifetimes() {
        let lifetimes = TokenLifetimes {
            access_secs: 90,
            refresh_secs: 3600,
        };
        let config = JwtConfig::with_lifetimes(SECRET, lifetimes);

        assert_eq!(config.issue_access_token("1").unwrap().duration, 90);
        assert_eq!(config.issue_refresh_token("1").unwrap().duration, 3600);
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(SECRET);

        let access = config.issue_access_token("42").unwrap();
        let refresh = config.issue_refresh_token("42").unwrap();

        assert!(matches!(
            config.verify_refresh_token(&access.token),
            Err(JwtError::WrongTokenType)
        ));
        assert!(matches!(
            config.verify_access_token(&refresh.token),
            Err(JwtError::WrongTokenType)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(SECRET);

        assert!(config.verify_refresh_token("invalid-token").is_err());
        assert!(config.verify_access_token("").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let result = config1.issue_refresh_token("42").unwrap();
        assert!(config2.verify_refresh_token(&result.token).is_err());
    }

    #[test]
    fn test_expired_refresh_token() {
        let encoding_key = EncodingKey::from_secret(SECRET);
        let now = now();

        // Correctly signed, but exp is in the past
        let claims = RefreshClaims {
            sub: "42".to_string(),
            token_type: TokenType::Refresh,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(SECRET);
        assert!(matches!(
            config.verify_refresh_token(&token),
            Err(JwtError::Decoding(_))
        ));
    }

    #[test]
    fn test_expired_access_token() {
        let encoding_key = EncodingKey::from_secret(SECRET);
        let now = now();

        let claims = AccessClaims {
            sub: "42".to_string(),
            token_type: TokenType::Access,
            iat: now - 10,
            exp: now - 1,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let config = JwtConfig::new(SECRET);
        assert!(config.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let config = JwtConfig::new(SECRET);
        let issued = config.issue_refresh_token("42").unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged_payload = "eyJzdWIiOiI5OTkiLCJ0eXAiOiJyZWZyZXNoIiwiaWF0IjowLCJleHAiOjk5OTk5OTk5OTl9";
        parts[1] = forged_payload;
        let forged = parts.join(".");

        assert!(config.verify_refresh_token(&forged).is_err());
    }
}
