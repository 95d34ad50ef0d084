//! Request authentication for the hub protocol.
//!
//! The hub authenticates every request with a chained MD5 password hash and a
//! per-request `verifyCode`. Both are recomputed for each request from the
//! process-wide credentials; nothing is cached.

use super::transaction::{MeterNumber, TransactionId};
use crate::error::{Result, VendError};
use md5::{Digest, Md5};
use std::fmt;
use std::sync::Arc;

/// Static hub credentials. Immutable after startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    key: String,
}

impl Credentials {
    /// Fails with a configuration error when any part is missing.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            username: username.into(),
            password: password.into(),
            key: key.into(),
        };
        for (name, value) in [
            ("username", &credentials.username),
            ("password", &credentials.password),
            ("key", &credentials.key),
        ] {
            if value.trim().is_empty() {
                return Err(VendError::Configuration(format!(
                    "hub {name} is not set"
                )));
            }
        }
        Ok(credentials)
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Per-request authentication values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBundle {
    pub hashed_password: String,
    pub verify_code: String,
}

impl SignatureBundle {
    /// The value sent as the `userPass` attribute.
    pub fn user_pass_hash(&self) -> &str {
        &self.hashed_password
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Arc<Credentials>,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Three chained rounds: `md5(md5(md5(password) + USERNAME) + key)`.
    pub fn compute_hashed_password(&self) -> String {
        let credentials = &self.credentials;
        let round1 = md5_hex(&credentials.password);
        let round2 = md5_hex(&format!("{round1}{}", credentials.username.to_uppercase()));
        md5_hex(&format!("{round2}{}", credentials.key))
    }

    /// `md5(transID + meterNum + hashedPassword)`, no separators.
    pub fn compute_signature(
        transaction_id: &str,
        meter_number: &str,
        hashed_password: &str,
    ) -> String {
        md5_hex(&format!("{transaction_id}{meter_number}{hashed_password}"))
    }

    pub fn sign(
        &self,
        transaction_id: &TransactionId,
        meter_number: Option<&MeterNumber>,
    ) -> SignatureBundle {
        let hashed_password = self.compute_hashed_password();
        let meter = meter_number.map(MeterNumber::as_str).unwrap_or_default();
        let verify_code = Self::compute_signature(transaction_id.as_str(), meter, &hashed_password);
        SignatureBundle {
            hashed_password,
            verify_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new(Credentials::new("vendor01", "s3cret", "K3Y").unwrap())
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(matches!(
            Credentials::new("", "p", "k"),
            Err(VendError::Configuration(_))
        ));
        assert!(matches!(
            Credentials::new("u", " ", "k"),
            Err(VendError::Configuration(_))
        ));
        assert!(matches!(
            Credentials::new("u", "p", ""),
            Err(VendError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", Credentials::new("vendor01", "s3cret", "K3Y").unwrap());
        assert!(rendered.contains("vendor01"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("K3Y"));
    }

    #[test]
    fn test_md5_known_vectors() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_signature_concatenation_order() {
        assert_eq!(
            Signer::compute_signature("a", "b", "c"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_ne!(
            Signer::compute_signature("b", "a", "c"),
            Signer::compute_signature("a", "b", "c")
        );
    }

    #[test]
    fn test_hashed_password_chain() {
        let expected = md5_hex(&format!(
            "{}K3Y",
            md5_hex(&format!("{}VENDOR01", md5_hex("s3cret")))
        ));
        assert_eq!(signer().compute_hashed_password(), expected);
        assert_eq!(expected.len(), 32);
    }

    #[test]
    fn test_username_case_does_not_matter() {
        let lower = Signer::new(Credentials::new("vendor01", "s3cret", "K3Y").unwrap());
        let upper = Signer::new(Credentials::new("VENDOR01", "s3cret", "K3Y").unwrap());
        assert_eq!(lower.compute_hashed_password(), upper.compute_hashed_password());
    }

    #[test]
    fn test_signature_deterministic_and_sensitive() {
        let hashed = signer().compute_hashed_password();
        let base = Signer::compute_signature("20250101000000ABCDEF0123456789", "0123456789", &hashed);
        assert_eq!(
            base,
            Signer::compute_signature("20250101000000ABCDEF0123456789", "0123456789", &hashed)
        );
        assert_ne!(
            base,
            Signer::compute_signature("20250101000000ABCDEF012345678A", "0123456789", &hashed)
        );
        assert_ne!(
            base,
            Signer::compute_signature("20250101000000ABCDEF0123456789", "0123456788", &hashed)
        );
        let mut other_hash = hashed.clone();
        other_hash.replace_range(0..1, if hashed.starts_with('0') { "1" } else { "0" });
        assert_ne!(
            base,
            Signer::compute_signature("20250101000000ABCDEF0123456789", "0123456789", &other_hash)
        );
    }

    #[test]
    fn test_sign_bundle() {
        let signer = signer();
        let id = TransactionId::generate();
        let meter = MeterNumber::parse("0123456789").unwrap();
        let bundle = signer.sign(&id, Some(&meter));
        assert_eq!(bundle.user_pass_hash(), signer.compute_hashed_password());
        assert_eq!(
            bundle.verify_code,
            Signer::compute_signature(id.as_str(), "0123456789", &bundle.hashed_password)
        );
    }
}
