//! Bearer token lookup for authenticated requests.

use std::sync::RwLock;

/// Source of the bearer token attached to every remote request.
///
/// Returning `None` means "signed out": mutating store operations fail,
/// fetches fall back to the persisted snapshot.
pub trait CredentialProvider: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// Reads the token from the environment on every call.
///
/// Checks FUNDSYNC_TOKEN first, then FUNDSYNC_API_TOKEN as fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
  fn token(&self) -> Option<String> {
    std::env::var("FUNDSYNC_TOKEN")
      .or_else(|_| std::env::var("FUNDSYNC_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

/// Token held in memory, set on sign-in and cleared on sign-out.
#[derive(Debug, Default)]
pub struct SessionCredentials {
  token: RwLock<Option<String>>,
}

impl SessionCredentials {
  pub fn new(token: Option<String>) -> Self {
    Self {
      token: RwLock::new(token),
    }
  }

  pub fn set(&self, token: impl Into<String>) {
    if let Ok(mut guard) = self.token.write() {
      *guard = Some(token.into());
    }
  }

  pub fn clear(&self) {
    if let Ok(mut guard) = self.token.write() {
      *guard = None;
    }
  }
}

impl CredentialProvider for SessionCredentials {
  fn token(&self) -> Option<String> {
    self.token.read().ok().and_then(|guard| guard.clone())
  }
}
