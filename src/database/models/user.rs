use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, Executor, FromRow, Postgres, Row};

use crate::auth::{password::Password, AccountType};
use crate::database::manager::is_unique_violation;
use crate::database::{Database, DatabaseError};
use crate::validator::{permitted_value, validate_email, validate_password_plaintext, Validator};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_ACTIVATED: &str = "ACTIVATED";

pub const GENDERS: [&str; 3] = ["male", "female", "other"];

/// Column list for selecting a base account, usable in joins.
pub(crate) const USER_COLUMNS: &str = "base_users.user_id, first_name, last_name, email, date_of_birth, \
     gender, address, password_hash, account_creation_time, last_login_time, account_status, \
     version, account_type";

const EMAIL_CONSTRAINT: &str = "base_users_email_key";

/// The account row every role shares
#[derive(Debug, Clone, Serialize)]
pub struct UserAccount {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub address: String,
    #[serde(skip)]
    pub password: Password,
    pub account_creation_time: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub account_status: String,
    pub version: i32,
    pub account_type: AccountType,
}

/// Registration fields common to every role
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub address: String,
}

impl UserAccount {
    /// Unsaved account; ids, timestamps and version come back from the insert.
    pub fn new(fields: NewAccount, account_type: AccountType) -> Self {
        Self {
            user_id: 0,
            first_name: fields.first_name,
            last_name: fields.last_name,
            email: fields.email,
            date_of_birth: fields.date_of_birth,
            gender: fields.gender,
            address: fields.address,
            password: Password::default(),
            account_creation_time: Utc::now(),
            last_login_time: None,
            account_status: STATUS_PENDING.to_string(),
            version: 0,
            account_type,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.account_status == STATUS_ACTIVATED
    }
}

impl<'r> FromRow<'r, PgRow> for UserAccount {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let account_type: i16 = row.try_get("account_type")?;
        let account_type = AccountType::try_from(account_type).map_err(|e| sqlx::Error::ColumnDecode {
            index: "account_type".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            user_id: row.try_get("user_id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            date_of_birth: row.try_get("date_of_birth")?,
            gender: row.try_get("gender")?,
            address: row.try_get("address")?,
            password: Password::from_hash(row.try_get("password_hash")?),
            account_creation_time: row.try_get("account_creation_time")?,
            last_login_time: row.try_get("last_login_time")?,
            account_status: row.try_get("account_status")?,
            version: row.try_get("version")?,
            account_type,
        })
    }
}

pub fn validate_user(v: &mut Validator, user: &UserAccount) {
    v.check(!user.first_name.is_empty(), "first_name", "must be provided");
    v.check(user.first_name.len() <= 500, "first_name", "must not be more than 500 bytes long");
    v.check(!user.last_name.is_empty(), "last_name", "must be provided");
    v.check(user.last_name.len() <= 500, "last_name", "must not be more than 500 bytes long");
    validate_email(v, &user.email);

    let age = years_between(user.date_of_birth, Utc::now().date_naive());
    v.check(age <= 150, "date_of_birth", "you must not be more than 150 years old");
    v.check(age >= 18, "date_of_birth", "you must be more than 18 years old");

    v.check(
        permitted_value(&user.gender.as_str(), &GENDERS),
        "gender",
        "must be 'male', 'female', or 'other'",
    );
    v.check(!user.address.is_empty(), "address", "must be provided");
    v.check(user.address.len() <= 2500, "address", "must be less than 2500 bytes long");

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }
}

fn years_between(born: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years
}

/// Insert the base row; shared with the role models inside their transactions.
pub(crate) async fn insert_base<'e, E>(executor: E, user: &mut UserAccount) -> Result<(), DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = r#"
        INSERT INTO base_users (first_name, last_name, email, date_of_birth, gender, address, password_hash, account_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING user_id, account_creation_time, account_status, version
    "#;

    let row = sqlx::query(query)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.date_of_birth)
        .bind(&user.gender)
        .bind(&user.address)
        .bind(user.password.hash()?)
        .bind(user.account_type.as_i16())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, EMAIL_CONSTRAINT) {
                DatabaseError::DuplicateEmail
            } else {
                DatabaseError::Sqlx(e)
            }
        })?;

    user.user_id = row.try_get("user_id")?;
    user.account_creation_time = row.try_get("account_creation_time")?;
    user.account_status = row.try_get("account_status")?;
    user.version = row.try_get("version")?;
    Ok(())
}

/// Versioned update of the base row. A stale version is an edit conflict.
pub(crate) async fn update_base<'e, E>(executor: E, user: &mut UserAccount) -> Result<(), DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = r#"
        UPDATE base_users
        SET first_name = $1, last_name = $2, email = $3, address = $4, password_hash = $5,
            last_login_time = $6, account_status = $7, version = version + 1
        WHERE user_id = $8 AND version = $9
        RETURNING version
    "#;

    let row = sqlx::query(query)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.address)
        .bind(user.password.hash()?)
        .bind(user.last_login_time)
        .bind(&user.account_status)
        .bind(user.user_id)
        .bind(user.version)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, EMAIL_CONSTRAINT) {
                DatabaseError::DuplicateEmail
            } else {
                DatabaseError::Sqlx(e)
            }
        })?
        .ok_or(DatabaseError::EditConflict)?;

    user.version = row.try_get("version")?;
    Ok(())
}

/// Base accounts: shoppers and admins, plus lookups used by every role
#[derive(Clone, Debug)]
pub struct UserModel {
    db: Database,
}

impl UserModel {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, user: &mut UserAccount) -> Result<(), DatabaseError> {
        self.db.run(insert_base(self.db.pool(), user)).await
    }

    pub async fn get_by_id(&self, user_id: i64) -> Result<UserAccount, DatabaseError> {
        if user_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        let query = format!("SELECT {} FROM base_users WHERE user_id = $1", USER_COLUMNS);
        self.db
            .run(async {
                sqlx::query_as::<_, UserAccount>(&query)
                    .bind(user_id)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<UserAccount, DatabaseError> {
        let query = format!("SELECT {} FROM base_users WHERE email = $1", USER_COLUMNS);
        self.db
            .run(async {
                sqlx::query_as::<_, UserAccount>(&query)
                    .bind(email)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or(DatabaseError::NotFound)
            })
            .await
    }

    pub async fn update(&self, user: &mut UserAccount) -> Result<(), DatabaseError> {
        self.db.run(update_base(self.db.pool(), user)).await
    }

    pub async fn delete(&self, user_id: i64) -> Result<(), DatabaseError> {
        if user_id < 1 {
            return Err(DatabaseError::NotFound);
        }

        self.db
            .run(async {
                let result = sqlx::query("DELETE FROM base_users WHERE user_id = $1")
                    .bind(user_id)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_account;

    #[test]
    fn new_accounts_start_pending() {
        let user = sample_account(0, AccountType::Shopper);
        assert!(!user.is_activated());
        assert_eq!(user.account_status, STATUS_PENDING);
    }

    #[test]
    fn serialization_omits_password() {
        let mut user = sample_account(5, AccountType::Shopper);
        user.password.set("sekrit-password").unwrap();
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["account_type"], 1);
        assert_eq!(value["user_id"], 5);
    }

    #[test]
    fn validation_flags_bad_fields() {
        let mut user = sample_account(0, AccountType::Shopper);
        user.gender = "robot".to_string();
        user.email = "nope".to_string();
        user.date_of_birth = Utc::now().date_naive();
        user.password.set("short").unwrap();

        let mut v = Validator::new();
        validate_user(&mut v, &user);
        let errors = v.errors();
        assert!(errors.contains_key("gender"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("date_of_birth"));
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn sample_account_is_valid() {
        let mut v = Validator::new();
        validate_user(&mut v, &sample_account(0, AccountType::Marketier));
        assert!(v.valid(), "{:?}", v.errors());
    }

    #[test]
    fn age_counts_whole_years() {
        let born = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        assert_eq!(years_between(born, NaiveDate::from_ymd_opt(2018, 6, 14).unwrap()), 17);
        assert_eq!(years_between(born, NaiveDate::from_ymd_opt(2018, 6, 15).unwrap()), 18);
    }
}
