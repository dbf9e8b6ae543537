use serde::Serialize;
use sqlx::FromRow;

use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

/// A message submitted through the contact form
#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct Contact {
    pub contact_id: i64,
    pub subject: String,
    pub about: String,
    pub version: i32,
}

pub fn validate_contact(v: &mut Validator, contact: &Contact) {
    v.check(!contact.subject.is_empty(), "subject", "must be provided");
    v.check(contact.subject.len() <= 250, "subject", "must not be more than 250 bytes long");
    v.check(!contact.about.is_empty(), "about", "must be provided");
    v.check(contact.about.len() <= 4000, "about", "must not be more than 4000 bytes long");
}

#[derive(Clone, Debug)]
pub struct ContactModel {
    db: Database,
}

impl ContactModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, contact: &mut Contact) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let (contact_id, version): (i64, i32) = sqlx::query_as(
                    "INSERT INTO contacts (subject, about) VALUES ($1, $2) RETURNING contact_id, version",
                )
                .bind(&contact.subject)
                .bind(&contact.about)
                .fetch_one(self.db.pool())
                .await?;

                contact.contact_id = contact_id;
                contact.version = version;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, contact_id: i64) -> Result<Contact, DatabaseError> {
        if contact_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                sqlx::query_as::<_, Contact>(
                    "SELECT contact_id, subject, about, version FROM contacts WHERE contact_id = $1",
                )
                .bind(contact_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, contact: &mut Contact) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let version: i32 = sqlx::query_scalar(
                    "UPDATE contacts SET subject = $1, about = $2, version = version + 1 \
                     WHERE contact_id = $3 AND version = $4 RETURNING version",
                )
                .bind(&contact.subject)
                .bind(&contact.about)
                .bind(contact.contact_id)
                .bind(contact.version)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::EditConflict)?;

                contact.version = version;
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, contact_id: i64) -> Result<(), DatabaseError> {
        if contact_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                let result = sqlx::query("DELETE FROM contacts WHERE contact_id = $1")
                    .bind(contact_id)
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
