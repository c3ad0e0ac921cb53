//! Credential handling.
//!
//! Passwords and session tokens are held in [`SecureString`], which zeroes its
//! buffer on drop and never prints its contents through `Debug`.

use zeroize::ZeroizeOnDrop;

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the underlying value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Shortens a token for diagnostics: the first four characters followed by `***`.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    if prefix.len() < token.len() {
        format!("{prefix}***")
    } else {
        "***".to_string()
    }
}
