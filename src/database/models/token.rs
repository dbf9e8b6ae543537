use async_trait::async_trait;
use chrono::Utc;

use super::user::{UserAccount, USER_COLUMNS};
use crate::auth::tokens::{hash_token, Scope, Token, TokenStore};
use crate::database::{Database, DatabaseError};

/// Tokens table in PostgreSQL
#[derive(Clone, Debug)]
pub struct PgTokenStore {
    db: Database,
}

impl PgTokenStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, token: &Token) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
                    .bind(&token.hash)
                    .bind(token.user_id)
                    .bind(token.expiry)
                    .bind(token.scope.as_str())
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }

    async fn get_for_scope(&self, scope: Scope, plaintext: &str) -> Result<UserAccount, DatabaseError> {
        let query = format!(
            "SELECT {} FROM base_users \
             INNER JOIN tokens ON base_users.user_id = tokens.user_id \
             WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3",
            USER_COLUMNS
        );
        let hash = hash_token(plaintext);

        self.db
            .run(async {
                sqlx::query_as::<_, UserAccount>(&query)
                    .bind(hash)
                    .bind(scope.as_str())
                    .bind(Utc::now())
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
                    .bind(scope.as_str())
                    .bind(user_id)
                    .execute(self.db.pool())
                    .await?;
                Ok(())
            })
            .await
    }
}
