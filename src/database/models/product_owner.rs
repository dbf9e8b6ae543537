use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};

use super::marketier::MAX_SALES_GENERATED;
use super::user::{insert_base, update_base, validate_user, UserAccount, USER_COLUMNS};
use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

#[derive(Debug, Clone, Serialize)]
pub struct ProductOwnerAccount {
    #[serde(flatten)]
    pub account: UserAccount,
    pub display_name: String,
    pub about: String,
    pub sales_generated: i64,
}

impl<'r> FromRow<'r, PgRow> for ProductOwnerAccount {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            account: UserAccount::from_row(row)?,
            display_name: row.try_get("display_name")?,
            about: row.try_get("about")?,
            sales_generated: row.try_get("sales_generated")?,
        })
    }
}

pub fn validate_product_owner(v: &mut Validator, owner: &ProductOwnerAccount) {
    validate_user(v, &owner.account);
    v.check(!owner.display_name.is_empty(), "display_name", "must be provided");
    v.check(
        owner.display_name.len() <= 500,
        "display_name",
        "must not be more than 500 bytes long",
    );
    v.check(!owner.about.is_empty(), "about", "must be provided");
    v.check(owner.about.len() <= 5000, "about", "must not be more than 5000 bytes long");
    v.check(owner.sales_generated >= 0, "sales_generated", "must be >= 0");
    v.check(
        owner.sales_generated <= MAX_SALES_GENERATED,
        "sales_generated",
        "must be <= 10,000,000,000",
    );
}

#[derive(Clone, Debug)]
pub struct ProductOwnerModel {
    db: Database,
}

impl ProductOwnerModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, owner: &mut ProductOwnerAccount) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                insert_base(&mut *tx, &mut owner.account).await?;

                sqlx::query(
                    "INSERT INTO product_owners (user_id, display_name, about, sales_generated) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(owner.account.user_id)
                .bind(&owner.display_name)
                .bind(&owner.about)
                .bind(owner.sales_generated)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<ProductOwnerAccount, DatabaseError> {
        if user_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let query = format!(
            "SELECT {}, display_name, about, sales_generated \
             FROM base_users INNER JOIN product_owners ON base_users.user_id = product_owners.user_id \
             WHERE base_users.user_id = $1",
            USER_COLUMNS
        );
        self.db
            .run(async {
                sqlx::query_as::<_, ProductOwnerAccount>(&query)
                    .bind(user_id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, owner: &mut ProductOwnerAccount) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let mut tx = self.db.pool().begin().await?;
                update_base(&mut *tx, &mut owner.account).await?;

                sqlx::query(
                    "UPDATE product_owners SET display_name = $1, about = $2, sales_generated = $3 \
                     WHERE user_id = $4",
                )
                .bind(&owner.display_name)
                .bind(&owner.about)
                .bind(owner.sales_generated)
                .bind(owner.account.user_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            })
            .await
    }
}
