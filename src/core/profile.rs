//! Local sign-in that scopes the study room to one user.
//!
//! There is no account server: logging in simply records a user and a token
//! in the store so later commands know whose notes to show.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::storage::{KeyValueStore, StorageError};

pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    InvalidInput,
    PasswordMismatch,
    NotLoggedIn,
    Random(String),
    Storage(StorageError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidInput => write!(f, "Name, email and password are all required"),
            AuthError::PasswordMismatch => write!(f, "Passwords do not match"),
            AuthError::NotLoggedIn => {
                write!(f, "Not logged in. Run `sensai login` or `sensai signup` first.")
            }
            AuthError::Random(message) => write!(f, "Failed to generate an id: {message}"),
            AuthError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err)
    }
}

/// Short lowercase base-36 id, like `k3j9x2a`.
fn random_id(len: usize) -> Result<String, AuthError> {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bytes = vec![0_u8; len];
    getrandom::fill(&mut bytes).map_err(|err| AuthError::Random(err.to_string()))?;
    Ok(bytes
        .iter()
        .map(|byte| ALPHABET[usize::from(*byte) % ALPHABET.len()] as char)
        .collect())
}

pub struct Profile<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> Profile<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    fn start_session(&self, name: &str, email: &str) -> Result<User, AuthError> {
        let user = User {
            id: random_id(6)?,
            name: name.to_string(),
            email: email.to_string(),
        };
        let token = format!("dummy-token-{}", random_id(6)?);
        let user_json = serde_json::to_vec(&user).map_err(|source| StorageError::Serialize {
            key: USER_KEY.to_string(),
            source,
        })?;

        self.store.put(TOKEN_KEY, token.as_bytes())?;
        self.store.put(USER_KEY, &user_json)?;
        info!(user_id = %user.id, "started local session");
        Ok(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let name = email.split('@').next().unwrap_or(email);
        self.start_session(name, email)
    }

    pub fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<User, AuthError> {
        if password != confirm_password {
            return Err(AuthError::PasswordMismatch);
        }
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput);
        }
        self.start_session(name, email)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.delete(TOKEN_KEY)?;
        self.store.delete(USER_KEY)?;
        Ok(())
    }

    /// The signed-in user, present only when both the token and the user record exist.
    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        if self.store.get(TOKEN_KEY)?.is_none() {
            return Ok(None);
        }
        let Some(bytes) = self.store.get(USER_KEY)? else {
            return Ok(None);
        };
        let user = serde_json::from_slice(&bytes).map_err(|source| StorageError::Serialize {
            key: USER_KEY.to_string(),
            source,
        })?;
        Ok(Some(user))
    }

    pub fn require_user(&self) -> Result<User, AuthError> {
        self.current_user()?.ok_or(AuthError::NotLoggedIn)
    }
}
