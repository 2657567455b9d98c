use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use concert_shared::dto::UserDto;

use crate::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub first_name: String,
    pub last_name: String,
}

fn password_mac(pepper: &str, salt: &str, password: &str) -> CoreResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes())
        .map_err(|e| CoreError::InternalError(format!("Failed to create HMAC: {}", e)))?;
    mac.update(salt.as_bytes());
    mac.update(b":");
    mac.update(password.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `salt:password` keyed by the server pepper.
pub fn hash_password(pepper: &str, salt: &str, password: &str) -> CoreResult<String> {
    let mac = password_mac(pepper, salt, password)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl User {
    /// Builds a user from a registration payload. All four fields are required.
    pub fn register(dto: &UserDto, pepper: &str) -> CoreResult<Self> {
        let password = dto.password.as_ref().map(|p| p.expose().as_str()).unwrap_or_default();
        if dto.username.trim().is_empty()
            || password.is_empty()
            || dto.first_name.trim().is_empty()
            || dto.last_name.trim().is_empty()
        {
            return Err(CoreError::ValidationError(
                "username, password, first_name and last_name are required".to_string(),
            ));
        }

        let salt = Uuid::new_v4().simple().to_string();
        Ok(Self {
            username: dto.username.trim().to_string(),
            password_hash: hash_password(pepper, &salt, password)?,
            salt,
            first_name: dto.first_name.trim().to_string(),
            last_name: dto.last_name.trim().to_string(),
        })
    }

    pub fn verify_password(&self, pepper: &str, candidate: &str) -> bool {
        let Ok(expected) = hex::decode(&self.password_hash) else {
            return false;
        };
        match password_mac(pepper, &self.salt, candidate) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    pub fn to_dto(&self) -> UserDto {
        UserDto {
            username: self.username.clone(),
            password: None,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<&UserDto> for Credentials {
    type Error = CoreError;

    fn try_from(dto: &UserDto) -> CoreResult<Self> {
        let password = dto.password.as_ref().map(|p| p.expose().clone()).unwrap_or_default();
        if dto.username.trim().is_empty() || password.is_empty() {
            return Err(CoreError::ValidationError("username and password are required".to_string()));
        }
        Ok(Self {
            username: dto.username.trim().to_string(),
            password,
        })
    }
}

/// Opaque bearer token. One live token per user.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn issue(username: &str, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            issued_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at > ttl
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
