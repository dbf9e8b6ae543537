pub mod password;
pub mod tokens;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::Extensions};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;

use crate::database::models::user::UserAccount;
use crate::error::ApiError;

/// Account discriminant used by route allow-lists. Persisted and serialized as its integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum AccountType {
    Shopper = 1,
    Marketier = 2,
    ProductOwner = 3,
    Admin = 4,
}

impl AccountType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

#[derive(Debug, Error)]
#[error("unknown account type {0}")]
pub struct InvalidAccountType(pub i16);

impl TryFrom<i16> for AccountType {
    type Error = InvalidAccountType;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccountType::Shopper),
            2 => Ok(AccountType::Marketier),
            3 => Ok(AccountType::ProductOwner),
            4 => Ok(AccountType::Admin),
            other => Err(InvalidAccountType(other)),
        }
    }
}

impl Serialize for AccountType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.as_i16())
    }
}

/// Who is calling. Set on every request by the authentication middleware.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(Arc<UserAccount>),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("request identity missing in {0}: authentication middleware must run first")]
    Missing(&'static str),
}

impl Identity {
    pub fn user(account: UserAccount) -> Self {
        Identity::User(Arc::new(account))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn account(&self) -> Option<&UserAccount> {
        match self {
            Identity::Anonymous => None,
            Identity::User(account) => Some(account),
        }
    }

    pub fn account_type(&self) -> Option<AccountType> {
        self.account().map(|account| account.account_type)
    }

    /// Admins may act for anyone; everybody else only for themselves.
    pub fn can_act_for(&self, user_id: i64) -> bool {
        match self.account() {
            Some(account) => account.account_type == AccountType::Admin || account.user_id == user_id,
            None => false,
        }
    }

    /// Fetch the identity placed by upstream middleware.
    pub fn from_extensions<'a>(
        extensions: &'a Extensions,
        consumer: &'static str,
    ) -> Result<&'a Identity, IdentityError> {
        extensions.get::<Identity>().ok_or(IdentityError::Missing(consumer))
    }

    /// The calling account, or 403 for anonymous callers.
    pub fn require_account(&self) -> Result<&UserAccount, ApiError> {
        self.account().ok_or_else(ApiError::not_permitted)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity::from_extensions(&parts.extensions, "handler")?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_account;

    #[test]
    fn account_type_round_trips_through_integer() {
        for value in 1..=4 {
            assert_eq!(AccountType::try_from(value).unwrap().as_i16(), value);
        }
        assert!(AccountType::try_from(0).is_err());
        assert_eq!(serde_json::to_string(&AccountType::ProductOwner).unwrap(), "3");
    }

    #[test]
    fn anonymous_has_no_account_type() {
        assert!(Identity::Anonymous.is_anonymous());
        assert_eq!(Identity::Anonymous.account_type(), None);
        assert!(!Identity::Anonymous.can_act_for(1));
    }

    #[test]
    fn ownership_rules() {
        let shopper = Identity::user(sample_account(7, AccountType::Shopper));
        assert!(shopper.can_act_for(7));
        assert!(!shopper.can_act_for(8));

        let admin = Identity::user(sample_account(1, AccountType::Admin));
        assert!(admin.can_act_for(8));
    }

    #[test]
    fn missing_identity_is_typed_error() {
        let extensions = Extensions::new();
        let err = Identity::from_extensions(&extensions, "permission check").unwrap_err();
        assert!(err.to_string().contains("permission check"));
    }
}
