//! This file defines types that handle password validation and hashing.
//! `ValidatedPassword` wraps a string and ensures it meets the password rules.
//! `PasswordHash` converts a `ValidatedPassword` into a salted and hashed password.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The minimum number of characters in a password.
pub const PASSWORD_MIN_LENGTH: usize = 8;

const SPECIAL_CHARACTERS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?"#;

/// A password that has been validated, but not yet hashed.
///
/// This struct can be used to construct a [PasswordHash].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] listing every rule the password breaks, see [password_problems].
    pub fn new(raw_password_string: &str) -> Result<Self, Error> {
        let problems = password_problems(raw_password_string);

        if problems.is_empty() {
            Ok(Self(raw_password_string.to_owned()))
        } else {
            Err(Error::TooWeak(problems.join("; ")))
        }
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// The caller should ensure that `raw_password_string` is a valid and secure password.
    pub fn new_unchecked(raw_password_string: &str) -> Self {
        Self(raw_password_string.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// Check `password` against the password rules and describe each rule it breaks.
///
/// A password needs at least [PASSWORD_MIN_LENGTH] characters, an uppercase
/// letter, a digit and a special character. An empty vec means the password is fine.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();

    if password.chars().count() < PASSWORD_MIN_LENGTH {
        problems.push("A senha deve ter pelo menos 8 caracteres");
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("A senha deve conter pelo menos uma letra maiúscula");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("A senha deve conter pelo menos um número");
    }

    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        problems.push("A senha deve conter pelo menos um caractere especial");
    }

    problems
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash read back from storage.
    pub fn new_unchecked(hash: &str) -> Self {
        Self(hash.to_owned())
    }

    /// Check that `raw_password` matches the stored password.
    ///
    /// # Errors
    ///
    /// This function will return an error if the stored hash is malformed.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::{PasswordHash, ValidatedPassword, password_problems};

    #[test]
    fn accepts_password_meeting_all_rules() {
        assert!(ValidatedPassword::new("Senha$egura1").is_ok());
    }

    #[test]
    fn reports_every_broken_rule() {
        let problems = password_problems("abc");

        assert_eq!(problems.len(), 4, "got {problems:?}");
    }

    #[test]
    fn reports_only_missing_special_character() {
        let problems = password_problems("SenhaForte123");

        assert_eq!(
            problems,
            vec!["A senha deve conter pelo menos um caractere especial"]
        );
    }

    #[test]
    fn weak_password_is_too_weak_error() {
        let result = ValidatedPassword::new("password");

        assert!(matches!(result, Err(Error::TooWeak(_))), "got {result:?}");
    }

    #[test]
    fn validated_password_display_is_masked() {
        let password = ValidatedPassword::new_unchecked("Senha$egura1");

        assert_eq!(password.to_string(), "********");
    }

    #[test]
    fn hash_verifies_original_password() {
        let hash = PasswordHash::new(ValidatedPassword::new_unchecked("Senha$egura1"), 4).unwrap();

        assert!(hash.verify("Senha$egura1").unwrap());
        assert!(!hash.verify("senha$egura1").unwrap());
    }
}
