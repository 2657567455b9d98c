use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use concert_core::identity::{AuthToken, User};
use concert_core::payment::CreditCard;
use concert_core::repository::UserRepository;
use concert_core::{CoreError, CoreResult};
use concert_shared::dto::CardType;
use concert_shared::Masked;

use crate::storage_error;

pub struct StoreUserRepository {
    pool: PgPool,
}

impl StoreUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    salt: String,
    first_name: String,
    last_name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            username: row.username,
            password_hash: row.password_hash,
            salt: row.salt,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    token: String,
    username: String,
    issued_at: DateTime<Utc>,
}

impl From<TokenRow> for AuthToken {
    fn from(row: TokenRow) -> Self {
        AuthToken {
            token: row.token,
            username: row.username,
            issued_at: row.issued_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CreditCardRow {
    card_type: String,
    name: String,
    number: String,
    expiry_date: NaiveDate,
}

impl TryFrom<CreditCardRow> for CreditCard {
    type Error = CoreError;

    fn try_from(row: CreditCardRow) -> CoreResult<Self> {
        let card_type = CardType::parse(&row.card_type)
            .ok_or_else(|| CoreError::StorageError(format!("unknown card type '{}'", row.card_type)))?;
        Ok(CreditCard {
            card_type,
            name: row.name,
            number: Masked::new(row.number),
            expiry_date: row.expiry_date,
        })
    }
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, salt, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.pool)
        .await
        .map_err(|e| match storage_error(e) {
            CoreError::Conflict(_) => CoreError::Conflict(format!("username {} is taken", user.username)),
            other => other,
        })?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, salt, first_name, last_name FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.map(User::from))
    }

    async fn save_token(&self, token: &AuthToken) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (username, token, issued_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO UPDATE SET token = EXCLUDED.token, issued_at = EXCLUDED.issued_at
            "#,
        )
        .bind(&token.username)
        .bind(&token.token)
        .bind(token.issued_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> CoreResult<Option<AuthToken>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT token, username, issued_at FROM auth_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(AuthToken::from))
    }

    async fn find_token_for_user(&self, username: &str) -> CoreResult<Option<AuthToken>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT token, username, issued_at FROM auth_tokens WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(AuthToken::from))
    }

    async fn save_credit_card(&self, username: &str, card: &CreditCard) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credit_cards (username, card_type, name, number, expiry_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO UPDATE SET
                card_type = EXCLUDED.card_type,
                name = EXCLUDED.name,
                number = EXCLUDED.number,
                expiry_date = EXCLUDED.expiry_date
            "#,
        )
        .bind(username)
        .bind(card.card_type.as_str())
        .bind(&card.name)
        .bind(card.number.expose())
        .bind(card.expiry_date)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn find_credit_card(&self, username: &str) -> CoreResult<Option<CreditCard>> {
        sqlx::query_as::<_, CreditCardRow>(
            "SELECT card_type, name, number, expiry_date FROM credit_cards WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .map(CreditCard::try_from)
        .transpose()
    }
}
