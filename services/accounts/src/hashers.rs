//! Password hashing
//!
//! Encoded passwords are self-describing strings of the form
//! `algorithm$<parameters>$salt$digest`. The text before the first `$` names
//! the hasher, so records hashed with an older algorithm keep verifying
//! after the preferred hasher changes, and can be upgraded on next login.

use std::fmt;
use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::SaltString,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use constant_time_eq::constant_time_eq;
use pbkdf2::pbkdf2_hmac;
use rand::distributions::{Alphanumeric, DistString};
use sha2::Sha256;

use crate::error::{AccountsError, AccountsResult};

/// Marks an account that cannot log in with a password
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";
const UNUSABLE_PASSWORD_SUFFIX_LENGTH: usize = 40;

/// A password hashing algorithm
pub trait PasswordHasher: Send + Sync + fmt::Debug {
    /// Tag written before the first `$` of every encoded password
    fn algorithm(&self) -> &'static str;

    /// Hash `password` with a fresh random salt
    fn encode(&self, password: &str) -> AccountsResult<String>;

    /// Check `password` against an encoding produced by this hasher.
    /// Malformed encodings verify as `false`.
    fn verify(&self, password: &str, encoded: &str) -> bool;

    /// Whether `encoded` was produced with weaker parameters than this
    /// hasher is configured with
    fn must_update(&self, _encoded: &str) -> bool {
        false
    }
}

/// Argon2id in the PHC string format, prefixed with `argon2`
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    memory_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl Argon2Hasher {
    pub const ALGORITHM: &'static str = "argon2";

    pub fn new(memory_kib: u32, time_cost: u32, parallelism: u32) -> AccountsResult<Self> {
        let hasher = Self {
            memory_kib,
            time_cost,
            parallelism,
        };
        hasher.params()?;
        Ok(hasher)
    }

    fn params(&self) -> AccountsResult<Params> {
        Params::new(self.memory_kib, self.time_cost, self.parallelism, None)
            .map_err(|e| AccountsError::Configuration(format!("Invalid Argon2 parameters: {}", e)))
    }

    fn phc(encoded: &str) -> Option<&str> {
        encoded
            .strip_prefix(Self::ALGORITHM)
            .filter(|phc| phc.starts_with("$argon2"))
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            time_cost: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    fn encode(&self, password: &str) -> AccountsResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params()?);
        let phc = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AccountsError::Hashing(format!("Failed to hash password: {}", e)))?
            .to_string();

        Ok(format!("{}{}", Self::ALGORITHM, phc))
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some(parsed_hash) = Self::phc(encoded).and_then(|phc| PasswordHash::new(phc).ok())
        else {
            return false;
        };

        // Parameters are taken from the parsed hash, not from `self`.
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    fn must_update(&self, encoded: &str) -> bool {
        let Some(parsed_hash) = Self::phc(encoded).and_then(|phc| PasswordHash::new(phc).ok())
        else {
            return false;
        };
        if parsed_hash.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(&parsed_hash) {
            Ok(params) => {
                params.m_cost() != self.memory_kib
                    || params.t_cost() != self.time_cost
                    || params.p_cost() != self.parallelism
            }
            Err(_) => true,
        }
    }
}

/// PBKDF2-HMAC-SHA256: `pbkdf2_sha256$iterations$salt$base64(digest)`
#[derive(Debug, Clone)]
pub struct Pbkdf2Sha256Hasher {
    iterations: u32,
}

struct Pbkdf2Parts<'a> {
    iterations: u32,
    salt: &'a str,
}

impl Pbkdf2Sha256Hasher {
    pub const ALGORITHM: &'static str = "pbkdf2_sha256";
    pub const DEFAULT_ITERATIONS: u32 = 600_000;

    pub fn new(iterations: u32) -> AccountsResult<Self> {
        if iterations == 0 {
            return Err(AccountsError::Configuration(
                "PBKDF2 iterations must be positive".to_string(),
            ));
        }
        Ok(Self { iterations })
    }

    fn encode_with(password: &str, salt: &str, iterations: u32) -> String {
        let mut digest = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut digest);
        format!(
            "{}${}${}${}",
            Self::ALGORITHM,
            iterations,
            salt,
            STANDARD.encode(digest)
        )
    }

    fn decode(encoded: &str) -> Option<Pbkdf2Parts<'_>> {
        let mut parts = encoded.splitn(4, '$');
        if parts.next()? != Self::ALGORITHM {
            return None;
        }
        let iterations = parts.next()?.parse().ok().filter(|n| *n > 0)?;
        let salt = parts.next().filter(|s| !s.is_empty())?;
        parts.next().filter(|d| !d.is_empty())?;
        Some(Pbkdf2Parts { iterations, salt })
    }
}

impl Default for Pbkdf2Sha256Hasher {
    fn default() -> Self {
        Self {
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }
}

impl PasswordHasher for Pbkdf2Sha256Hasher {
    fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    fn encode(&self, password: &str) -> AccountsResult<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Ok(Self::encode_with(password, salt.as_str(), self.iterations))
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some(parts) = Self::decode(encoded) else {
            return false;
        };
        let candidate = Self::encode_with(password, parts.salt, parts.iterations);
        constant_time_eq(candidate.as_bytes(), encoded.as_bytes())
    }

    fn must_update(&self, encoded: &str) -> bool {
        Self::decode(encoded).is_some_and(|parts| parts.iterations != self.iterations)
    }
}

/// The ordered set of hashers in use. The first one hashes new passwords;
/// all of them are accepted when verifying.
#[derive(Debug, Clone)]
pub struct Hashers {
    hashers: Vec<Arc<dyn PasswordHasher>>,
}

impl Hashers {
    pub fn new(hashers: Vec<Arc<dyn PasswordHasher>>) -> AccountsResult<Self> {
        if hashers.is_empty() {
            return Err(AccountsError::Configuration(
                "at least one password hasher is required".to_string(),
            ));
        }
        Ok(Self { hashers })
    }

    /// Build hashers from algorithm names, first one preferred
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        pbkdf2_iterations: u32,
        argon2: Argon2Hasher,
    ) -> AccountsResult<Self> {
        let mut hashers: Vec<Arc<dyn PasswordHasher>> = Vec::with_capacity(names.len());
        for name in names {
            match name.as_ref().trim() {
                Argon2Hasher::ALGORITHM => hashers.push(Arc::new(argon2.clone())),
                Pbkdf2Sha256Hasher::ALGORITHM => {
                    hashers.push(Arc::new(Pbkdf2Sha256Hasher::new(pbkdf2_iterations)?))
                }
                other => {
                    return Err(AccountsError::Configuration(format!(
                        "unknown password hasher: {}",
                        other
                    )));
                }
            }
        }
        Self::new(hashers)
    }

    pub fn preferred(&self) -> &dyn PasswordHasher {
        self.hashers[0].as_ref()
    }

    /// Hasher that produced `encoded`, judged by its algorithm tag
    pub fn identify(&self, encoded: &str) -> Option<&dyn PasswordHasher> {
        let algorithm = encoded.split('$').next()?;
        self.hashers
            .iter()
            .find(|h| h.algorithm() == algorithm)
            .map(|h| h.as_ref())
    }

    pub fn make_hash(&self, password: &str) -> AccountsResult<String> {
        self.preferred().encode(password)
    }

    /// Never fails: unknown algorithms, malformed and unusable encodings
    /// all verify as `false`.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        if !is_usable(encoded) {
            return false;
        }
        self.identify(encoded)
            .is_some_and(|hasher| hasher.verify(password, encoded))
    }

    /// Whether a verified password should be re-hashed with the preferred
    /// hasher
    pub fn must_update(&self, encoded: &str) -> bool {
        match self.identify(encoded) {
            Some(hasher) => {
                hasher.algorithm() != self.preferred().algorithm() || hasher.must_update(encoded)
            }
            None => false,
        }
    }
}

/// An encoding no password verifies against
pub fn make_unusable() -> String {
    format!(
        "{}{}",
        UNUSABLE_PASSWORD_PREFIX,
        Alphanumeric.sample_string(&mut rand::thread_rng(), UNUSABLE_PASSWORD_SUFFIX_LENGTH)
    )
}

pub fn is_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

#[cfg(test)]
pub(crate) fn fast_hashers() -> Hashers {
    Hashers::new(vec![
        Arc::new(Argon2Hasher::new(1024, 1, 1).unwrap()),
        Arc::new(Pbkdf2Sha256Hasher::new(1_000).unwrap()),
    ])
    .unwrap()
}
