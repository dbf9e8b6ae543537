//! Opaque activation, password-reset and authentication tokens
//!
//! The plaintext goes to the client once; only its SHA-256 digest is stored.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::database::{models::user::UserAccount, DatabaseError};
use crate::validator::Validator;

/// Random bytes per token
pub const TOKEN_BYTES: usize = 16;

/// Length of the hex-encoded plaintext
pub const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Which operation a token may be spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    PasswordReset,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::PasswordReset => "password-reset",
            Scope::Authentication => "authentication",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// Fresh token for `user_id`, valid for `ttl`
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let plaintext = hex::encode(bytes);
        let hash = hash_token(&plaintext);

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

/// SHA-256 of the plaintext. Tokens carry enough entropy that a slow hash buys nothing.
pub fn hash_token(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Shape check done before any lookup
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH && plaintext.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_LENGTH,
        "token",
        format!("must be {} bytes long", TOKEN_LENGTH),
    );
    v.check(is_well_formed(plaintext), "token", "must be a hexadecimal string");
}

/// Persistence for tokens; lookups resolve straight to the owning account.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError>;

    /// Owner of the unexpired `scope` token whose hash matches `plaintext`.
    ///
    /// Missing and expired tokens are both `DatabaseError::NotFound`.
    async fn get_for_scope(&self, scope: Scope, plaintext: &str) -> Result<UserAccount, DatabaseError>;

    /// Revoke every `scope` token held by `user_id`
    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError>;

    /// Generate and persist a token; the returned plaintext is not recoverable later.
    async fn new_token(&self, user_id: i64, ttl: Duration, scope: Scope) -> Result<Token, DatabaseError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }
}
