use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};

use super::user::{insert_base, update_base, validate_user, UserAccount, USER_COLUMNS};
use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

pub const MAX_SALES_GENERATED: i64 = 10_000_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct MarketierAccount {
    #[serde(flatten)]
    pub account: UserAccount,
    pub display_name: String,
    pub about: String,
    pub sales_generated: i64,
    pub tier: i32,
}

impl<'r> FromRow<'r, PgRow> for MarketierAccount {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            account: UserAccount::from_row(row)?,
            display_name: row.try_get("display_name")?,
            about: row.try_get("about")?,
            sales_generated: row.try_get("sales_generated")?,
            tier: row.try_get("tier")?,
        })
    }
}

pub fn validate_marketier(v: &mut Validator, marketier: &MarketierAccount) {
    validate_user(v, &marketier.account);
    v.check(!marketier.display_name.is_empty(), "display_name", "must be provided");
    v.check(
        marketier.display_name.len() <= 500,
        "display_name",
        "must not be more than 500 bytes long",
    );
    v.check(!marketier.about.is_empty(), "about", "must be provided");
    v.check(marketier.about.len() <= 5000, "about", "must not be more than 5000 bytes long");
    v.check(marketier.sales_generated >= 0, "sales_generated", "must be >= 0");
    v.check(
        marketier.sales_generated <= MAX_SALES_GENERATED,
        "sales_generated",
        "must be <= 10,000,000,000",
    );
    v.check(marketier.tier >= 0, "tier", "must be >= 0");
    v.check(marketier.tier <= 10, "tier", "must be <= 10");
}

#[derive(Clone, Debug)]
pub struct MarketierModel {
    db: Database,
}

impl MarketierModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Base row and role row go in together or not at all.
    pub async fn insert(&self, marketier: &mut MarketierAccount) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                insert_base(&mut *tx, &mut marketier.account).await?;

                sqlx::query(
                    "INSERT INTO marketiers (user_id, display_name, about, sales_generated, tier) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(marketier.account.user_id)
                .bind(&marketier.display_name)
                .bind(&marketier.about)
                .bind(marketier.sales_generated)
                .bind(marketier.tier)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<MarketierAccount, DatabaseError> {
        if user_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let query = format!(
            "SELECT {}, display_name, about, sales_generated, tier \
             FROM base_users INNER JOIN marketiers ON base_users.user_id = marketiers.user_id \
             WHERE base_users.user_id = $1",
            USER_COLUMNS
        );
        self.db
            .run(async {
                sqlx::query_as::<_, MarketierAccount>(&query)
                    .bind(user_id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, marketier: &mut MarketierAccount) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                update_base(&mut *tx, &mut marketier.account).await?;

                sqlx::query(
                    "UPDATE marketiers SET display_name = $1, about = $2, sales_generated = $3, tier = $4 \
                     WHERE user_id = $5",
                )
                .bind(&marketier.display_name)
                .bind(&marketier.about)
                .bind(marketier.sales_generated)
                .bind(marketier.tier)
                .bind(marketier.account.user_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }
}
