use serde::Serialize;
use sqlx::FromRow;

use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct Review {
    pub review_id: i64,
    /// Author; only the author or an admin may change the review.
    pub user_id: i64,
    pub title: String,
    pub about: String,
    pub version: i32,
}

pub fn validate_review(v: &mut Validator, review: &Review) {
    v.check(!review.title.is_empty(), "title", "must be provided");
    v.check(review.title.len() <= 250, "title", "must not be more than 250 bytes long");
    v.check(!review.about.is_empty(), "about", "must be provided");
    v.check(review.about.len() <= 1000, "about", "must not be more than 1000 bytes long");
}

#[derive(Clone, Debug)]
pub struct ReviewModel {
    db: Database,
}

impl ReviewModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, review: &mut Review) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let (review_id, version): (i64, i32) = sqlx::query_as(
                    "INSERT INTO reviews (user_id, title, about) VALUES ($1, $2, $3) RETURNING review_id, version",
                )
                .bind(review.user_id)
                .bind(&review.title)
                .bind(&review.about)
                .fetch_one(self.db.pool())
                .await?;

                review.review_id = review_id;
                review.version = version;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, review_id: i64) -> Result<Review, DatabaseError> {
        if review_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                sqlx::query_as::<_, Review>(
                    "SELECT review_id, user_id, title, about, version FROM reviews WHERE review_id = $1",
                )
                .bind(review_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, review: &mut Review) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let version: i32 = sqlx::query_scalar(
                    "UPDATE reviews SET title = $1, about = $2, version = version + 1 \
                     WHERE review_id = $3 AND version = $4 RETURNING version",
                )
                .bind(&review.title)
                .bind(&review.about)
                .bind(review.review_id)
                .bind(review.version)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::EditConflict)?;

                review.version = version;
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, review_id: i64) -> Result<(), DatabaseError> {
        if review_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                let result = sqlx::query("DELETE FROM reviews WHERE review_id = $1")
                    .bind(review_id)
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
