//! User accounts.
//!
//! Users sign up with an email address; the username is derived from the
//! local part of the address and made unique with a numeric suffix.

use anyhow::Context;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use journal_common::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").ok());

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, is_active, created_at, updated_at";

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 password hash (never exposed in API responses)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// User store backed by SQLite.
#[derive(Clone)]
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    /// Open (or create) the user table in the given database.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            ",
        )
        .context("Failed to create users table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Internal(format!("user store lock poisoned: {}", e)))
    }

    /// Register a new user.
    pub fn signup(&self, request: &SignupRequest) -> Result<User> {
        if request.password != request.password_confirm {
            return Err(Error::InvalidInput("Passwords do not match".into()));
        }

        let email = request.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(Error::InvalidInput("Invalid email address".into()));
        }

        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        // Hash before taking the lock; Argon2 is slow by design.
        let password_hash = hash_password(&request.password)?;

        let conn = self.lock()?;

        if find_by(&conn, "email", &email)?.is_some() {
            return Err(Error::InvalidInput("Email already registered".into()));
        }

        let username = unique_username(&conn, local_part(&email))?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            r"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            ",
            params![
                id,
                username,
                email,
                password_hash,
                request.first_name,
                request.last_name,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Internal(format!("Failed to create user '{}': {}", email, e)))?;

        tracing::info!(user_id = %id, username = %username, "User registered");

        Ok(User {
            id,
            username,
            email,
            password_hash,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by ID.
    pub fn get(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        find_by(&conn, "id", id)
    }

    /// Get a user by email address.
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        find_by(&conn, "email", &email.trim().to_lowercase())
    }

    /// Return the user when the password matches.
    ///
    /// Inactive users are returned too; the caller decides how to report them.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_by_email(email)? else {
            return Ok(None);
        };

        if !verify_password(password, &user.password_hash)? {
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Enable or disable an account.
    pub fn set_active(&self, id: &str, is_active: bool) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
                params![is_active, Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| Error::Internal(format!("Failed to update user {}: {}", id, e)))?;
        Ok(rows > 0)
    }
}

fn find_by(conn: &Connection, field: &str, value: &str) -> Result<Option<User>> {
    let query = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, field);

    conn.query_row(&query, params![value], row_to_user)
        .optional()
        .map_err(|e| Error::Internal(format!("Failed to get user by {}: {}", field, e)))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// `base`, then `base1`, `base2`, ... until one is free.
fn unique_username(conn: &Connection, base: &str) -> Result<String> {
    let mut candidate = base.to_string();
    let mut suffix = 1u32;
    while find_by(conn, "username", &candidate)?.is_some() {
        candidate = format!("{}{}", base, suffix);
        suffix += 1;
    }
    Ok(candidate)
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| Error::Internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (UserStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("journal.db");
        let store = UserStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: "password123".to_string(),
            password_confirm: "password123".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }

    #[test]
    fn test_signup_creates_user() {
        let (store, _dir) = create_test_store();

        let user = store.signup(&signup_request("Jane.Doe@Example.com")).unwrap();

        assert_eq!(user.email, "jane.doe@example.com");
        assert_eq!(user.username, "jane.doe");
        assert_eq!(user.first_name, "Test");
        assert!(user.is_active);

        let found = store.get(&user.id).unwrap().unwrap();
        assert_eq!(found.email, user.email);
    }

    #[test]
    fn test_username_collision_gets_suffix() {
        let (store, _dir) = create_test_store();

        let first = store.signup(&signup_request("sam@one.com")).unwrap();
        let second = store.signup(&signup_request("sam@two.com")).unwrap();
        let third = store.signup(&signup_request("sam@three.com")).unwrap();

        assert_eq!(first.username, "sam");
        assert_eq!(second.username, "sam1");
        assert_eq!(third.username, "sam2");
    }

    #[test]
    fn test_duplicate_email_fails() {
        let (store, _dir) = create_test_store();

        store.signup(&signup_request("dup@example.com")).unwrap();
        let err = store.signup(&signup_request("DUP@example.com")).unwrap_err();

        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("already registered")));
    }

    #[test]
    fn test_password_mismatch_fails() {
        let (store, _dir) = create_test_store();

        let mut request = signup_request("a@example.com");
        request.password_confirm = "different123".into();

        let err = store.signup(&request).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("do not match")));
    }

    #[test]
    fn test_short_password_fails() {
        let (store, _dir) = create_test_store();

        let mut request = signup_request("a@example.com");
        request.password = "short".into();
        request.password_confirm = "short".into();

        assert!(matches!(store.signup(&request), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_email_fails() {
        let (store, _dir) = create_test_store();

        for email in ["", "no-at-sign", "a@b", "two@@example.com", "sp ace@example.com"] {
            assert!(
                matches!(store.signup(&signup_request(email)), Err(Error::InvalidInput(_))),
                "accepted {email:?}"
            );
        }
    }

    #[test]
    fn test_verify_password() {
        let (store, _dir) = create_test_store();
        store.signup(&signup_request("auth@example.com")).unwrap();

        assert!(store
            .verify_password("auth@example.com", "password123")
            .unwrap()
            .is_some());
        assert!(store
            .verify_password("auth@example.com", "wrongpassword")
            .unwrap()
            .is_none());
        assert!(store
            .verify_password("nobody@example.com", "password123")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_set_active() {
        let (store, _dir) = create_test_store();
        let user = store.signup(&signup_request("off@example.com")).unwrap();

        assert!(store.set_active(&user.id, false).unwrap());
        let user = store.verify_password("off@example.com", "password123").unwrap().unwrap();
        assert!(!user.is_active);

        assert!(!store.set_active("missing", false).unwrap());
    }

    #[test]
    fn test_hash_is_not_serialized() {
        let (store, _dir) = create_test_store();
        let user = store.signup(&signup_request("safe@example.com")).unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "safe");
    }

    #[test]
    fn test_password_hashing() {
        let password = "testpassword123";
        let hash = hash_password(password).unwrap();

        assert!(!hash.contains(password));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrongpassword", &hash).unwrap());
    }
}
