use serde::Serialize;
use sqlx::FromRow;

use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    pub about: String,
    pub stars: i16,
    pub version: i32,
}

pub fn validate_product(v: &mut Validator, product: &Product) {
    v.check(!product.name.is_empty(), "name", "must be provided");
    v.check(product.name.len() <= 250, "name", "must not be more than 250 bytes long");
    v.check(!product.about.is_empty(), "about", "must be provided");
    v.check(product.about.len() <= 2500, "about", "must not be more than 2500 bytes long");
    v.check((0..=5).contains(&product.stars), "stars", "must be between 0 and 5");
}

#[derive(Clone, Debug)]
pub struct ProductModel {
    db: Database,
}

impl ProductModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, product: &mut Product) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let (product_id, stars, version): (i64, i16, i32) = sqlx::query_as(
                    "INSERT INTO products (name, about) VALUES ($1, $2) RETURNING product_id, stars, version",
                )
                .bind(&product.name)
                .bind(&product.about)
                .fetch_one(self.db.pool())
                .await?;

                product.product_id = product_id;
                product.stars = stars;
                product.version = version;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, product_id: i64) -> Result<Product, DatabaseError> {
        if product_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                sqlx::query_as::<_, Product>(
                    "SELECT product_id, name, about, stars, version FROM products WHERE product_id = $1",
                )
                .bind(product_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, product: &mut Product) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let version: i32 = sqlx::query_scalar(
                    "UPDATE products SET name = $1, about = $2, stars = $3, version = version + 1 \
                     WHERE product_id = $4 AND version = $5 RETURNING version",
                )
                .bind(&product.name)
                .bind(&product.about)
                .bind(product.stars)
                .bind(product.product_id)
                .bind(product.version)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::EditConflict)?;

                product.version = version;
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, product_id: i64) -> Result<(), DatabaseError> {
        if product_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
                    .bind(product_id)
                    .execute(self.db.pool())
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(DatabaseError::NotFound);
                }
                Ok(())
            })
            .await
    }
}
