//! Test fixtures: sample accounts, an in-memory token store and a router state
//! that never needs a live database for the paths under test.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::auth::tokens::{hash_token, Scope, Token, TokenStore};
use crate::auth::AccountType;
use crate::config::{AppConfig, Environment};
use crate::database::models::user::{NewAccount, UserAccount};
use crate::database::{Database, DatabaseError};
use crate::mailer::LogMailer;
use crate::routes::AppState;

pub fn sample_account(user_id: i64, account_type: AccountType) -> UserAccount {
    let mut account = UserAccount::new(
        NewAccount {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("user{}@example.com", user_id),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).expect("valid date"),
            gender: "female".to_string(),
            address: "12 St James's Square, London".to_string(),
        },
        account_type,
    );
    account.user_id = user_id;
    account.version = 1;
    account
}

#[derive(Default)]
struct MemoryInner {
    tokens: Vec<Token>,
    accounts: HashMap<i64, UserAccount>,
}

/// Token store over a shared in-memory table; clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryTokenStore {
    pub fn with_accounts(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        let store = Self::default();
        for account in accounts {
            store.add_account(account);
        }
        store
    }

    pub fn add_account(&self, account: UserAccount) {
        self.lock().accounts.insert(account.user_id, account);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        inner.tokens.push(token.clone());
        Ok(())
    }

    async fn get_for_scope(&self, scope: Scope, plaintext: &str) -> Result<UserAccount, DatabaseError> {
        let hash = hash_token(plaintext);
        let now = Utc::now();
        let inner = self.lock();

        inner
            .tokens
            .iter()
            .find(|token| token.hash == hash && token.scope == scope && token.expiry > now)
            .and_then(|token| inner.accounts.get(&token.user_id))
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        inner
            .tokens
            .retain(|token| !(token.scope == scope && token.user_id == user_id));
        Ok(())
    }
}

/// Development config over a lazily connected pool, with tokens held in memory.
///
/// Must be called inside a tokio runtime.
pub fn test_state() -> (AppState, MemoryTokenStore) {
    let config = AppConfig::for_environment(Environment::Development);
    let db = Database::connect_lazy(&config.database).expect("lazy pool");
    let store = MemoryTokenStore::default();

    let mut state = AppState::new(config, db, Arc::new(LogMailer));
    state.models = state.models.with_token_store(Arc::new(store.clone()));
    (state, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn store_keeps_working_after_a_panicking_holder() {
        let store = MemoryTokenStore::with_accounts([sample_account(7, AccountType::Shopper)]);
        let token = store
            .new_token(7, Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("test thread failed while holding the store");
        })
        .join();
        assert!(store.inner.is_poisoned());

        let user = store
            .get_for_scope(Scope::Authentication, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(user.user_id, 7);
    }
}
