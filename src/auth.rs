//! Credential verification for the privileged roles.
//!
//! Passwords are never compared in plaintext: the configuration carries bcrypt hashes
//! and `BcryptVerifier` checks submissions against them.

use thiserror::Error;
use tracing::warn;

use crate::config::AuthConfig;
use crate::domain::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
  #[error("invalid credentials for role {0}")]
  InvalidCredentials(Role),
  #[error("a password is required for role {0}")]
  MissingPassword(Role),
  #[error("stored credential for role {0} is not a valid bcrypt hash")]
  BadHash(Role),
}

pub trait CredentialVerifier: Send + Sync {
  /// Ok(()) when `password` grants access to `role`.
  fn verify(&self, role: Role, password: Option<&str>) -> Result<(), AuthError>;
}

/// Verifies against per-role bcrypt hashes. Roles without a hash are open.
pub struct BcryptVerifier {
  config: AuthConfig,
}

impl BcryptVerifier {
  pub fn new(config: AuthConfig) -> Self {
    for role in [Role::Teacher, Role::SystemAdmin] {
      if config.hash_for(role).is_none() {
        warn!(target: "studygen", %role, "No password hash configured; role is open to anyone");
      }
    }
    Self { config }
  }
}

impl CredentialVerifier for BcryptVerifier {
  fn verify(&self, role: Role, password: Option<&str>) -> Result<(), AuthError> {
    let Some(hash) = self.config.hash_for(role) else {
      return Ok(());
    };
    let password = password.ok_or(AuthError::MissingPassword(role))?;
    match bcrypt::verify(password, hash) {
      Ok(true) => Ok(()),
      Ok(false) => Err(AuthError::InvalidCredentials(role)),
      Err(_) => Err(AuthError::BadHash(role)),
    }
  }
}
