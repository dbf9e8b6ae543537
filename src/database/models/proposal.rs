use serde::Serialize;
use sqlx::FromRow;

use crate::database::{Database, DatabaseError};
use crate::validator::Validator;

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct Proposal {
    pub proposal_id: i64,
    pub title: String,
    pub about: String,
    pub version: i32,
}

pub fn validate_proposal(v: &mut Validator, proposal: &Proposal) {
    v.check(!proposal.title.is_empty(), "title", "must be provided");
    v.check(proposal.title.len() <= 250, "title", "must not be more than 250 bytes long");
    v.check(!proposal.about.is_empty(), "about", "must be provided");
    v.check(proposal.about.len() <= 4000, "about", "must not be more than 4000 bytes long");
}

#[derive(Clone, Debug)]
pub struct ProposalModel {
    db: Database,
}

impl ProposalModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, proposal: &mut Proposal) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let (proposal_id, version): (i64, i32) = sqlx::query_as(
                    "INSERT INTO proposals (title, about) VALUES ($1, $2) RETURNING proposal_id, version",
                )
                .bind(&proposal.title)
                .bind(&proposal.about)
                .fetch_one(self.db.pool())
                .await?;

                proposal.proposal_id = proposal_id;
                proposal.version = version;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, proposal_id: i64) -> Result<Proposal, DatabaseError> {
        if proposal_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                sqlx::query_as::<_, Proposal>(
                    "SELECT proposal_id, title, about, version FROM proposals WHERE proposal_id = $1",
                )
                .bind(proposal_id)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, proposal: &mut Proposal) -> Result<(), DatabaseError> {
        self.db
            .run(async {
                let version: i32 = sqlx::query_scalar(
                    "UPDATE proposals SET title = $1, about = $2, version = version + 1 \
                     WHERE proposal_id = $3 AND version = $4 RETURNING version",
                )
                .bind(&proposal.title)
                .bind(&proposal.about)
                .bind(proposal.proposal_id)
                .bind(proposal.version)
                .fetch_optional(self.db.pool())
                .await?
                .ok_or(DatabaseError::EditConflict)?;

                proposal.version = version;
                Ok(())
            })
            .await
    }

    pub async fn delete(&self, proposal_id: i64) -> Result<(), DatabaseError> {
        if proposal_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                let result = sqlx::query("DELETE FROM proposals WHERE proposal_id = $1")
                    .bind(proposal_id)
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
