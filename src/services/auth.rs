use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, NaiveDateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::{AppError, AppResult};
use crate::models::{Role, User};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn issue_token(user: &User, secret: &str, expiration_hours: i64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        exp: (now + Duration::hours(expiration_hours)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create token: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Validates a sign-up and hashes its password. Call before taking the
/// database lock.
pub fn new_customer(input: RegisterInput, now: NaiveDateTime) -> AppResult<User> {
    let name = input.name.trim();
    let email = input.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if input.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    Ok(User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        phone: input.phone.filter(|p| !p.trim().is_empty()),
        password_hash: hash_password(&input.password)?,
        role: Role::Customer,
        created_at: now,
    })
}

pub fn register(conn: &Connection, user: User) -> AppResult<User> {
    if queries::get_user_by_email(conn, &user.email)?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    queries::create_user(conn, &user).map_err(|e| {
        if db::is_constraint_violation(&e) {
            AppError::Conflict("Email already registered".to_string())
        } else {
            AppError::Internal(e)
        }
    })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub fn find_account(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    Ok(queries::get_user_by_email(conn, &email.trim().to_lowercase())?)
}

/// Checks a password against a looked-up account. Unknown email and wrong
/// password are indistinguishable.
pub fn authenticate(account: Option<User>, password: &str) -> AppResult<User> {
    account
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))
}

/// Creates the admin account on first start. Skipped when no password is configured.
pub fn seed_admin(
    conn: &Connection,
    email: &str,
    password: &str,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    if password.is_empty() {
        tracing::warn!("ADMIN_PASSWORD not set, skipping admin seeding");
        return Ok(());
    }

    let email = email.trim().to_lowercase();
    if queries::get_user_by_email(conn, &email)?.is_some() {
        return Ok(());
    }

    let admin = User {
        id: Uuid::new_v4().to_string(),
        name: "Administrator".to_string(),
        email,
        phone: None,
        password_hash: hash_password(password)?,
        role: Role::Admin,
        created_at: now,
    };
    queries::create_user(conn, &admin).context("failed to create admin account")?;

    tracing::info!(email = %admin.email, "admin account created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{at, setup_db};

    fn login(conn: &Connection, email: &str, password: &str) -> AppResult<User> {
        authenticate(find_account(conn, email)?, password)
    }

    fn signup(conn: &Connection, email: &str) -> AppResult<User> {
        register(conn, new_customer(input(email), at("2025-01-01 00:00:00"))?)
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            name: "Meera".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            phone: Some("9876543210".to_string()),
        }
    }

    #[test]
    fn test_register_then_login() {
        let conn = setup_db();
        let user = signup(&conn, "Meera@Example.com").unwrap();
        assert_eq!(user.email, "meera@example.com");
        assert_eq!(user.role, Role::Customer);
        assert_ne!(user.password_hash, "secret123");

        let logged_in = login(&conn, "meera@example.com", "secret123").unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let conn = setup_db();
        signup(&conn, "meera@example.com").unwrap();

        assert!(matches!(
            login(&conn, "meera@example.com", "wrong"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            login(&conn, "nobody@example.com", "secret123"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let conn = setup_db();
        signup(&conn, "meera@example.com").unwrap();
        assert!(matches!(
            signup(&conn, "meera@example.com"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        let mut bad = input("meera@example.com");
        bad.password = "123".to_string();
        assert!(matches!(
            new_customer(bad, at("2025-01-01 00:00:00")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_password_checked_apart_from_lookup() {
        let user = new_customer(input("meera@example.com"), at("2025-01-01 00:00:00")).unwrap();
        assert_eq!(
            authenticate(Some(user.clone()), "secret123").unwrap().id,
            user.id
        );
        assert!(matches!(
            authenticate(Some(user), "wrong"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(None, "secret123"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_token_round_trip() {
        let conn = setup_db();
        let user = signup(&conn, "meera@example.com").unwrap();
        let token = issue_token(&user, "test-secret", 1).unwrap();

        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user.id);
        assert!(!claims.is_admin());

        assert!(matches!(
            verify_token(&token, "other-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_seed_admin_once() {
        let conn = setup_db();
        seed_admin(&conn, "admin@mandabam.com", "adminpass", at("2025-01-01 00:00:00")).unwrap();
        seed_admin(&conn, "admin@mandabam.com", "adminpass", at("2025-01-01 00:00:00")).unwrap();

        let admin = login(&conn, "admin@mandabam.com", "adminpass").unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[test]
    fn test_seed_admin_skipped_without_password() {
        let conn = setup_db();
        seed_admin(&conn, "admin@mandabam.com", "", at("2025-01-01 00:00:00")).unwrap();
        assert!(queries::get_user_by_email(&conn, "admin@mandabam.com").unwrap().is_none());
    }
}
