//! HMAC-SHA256 verification of inbound platform webhooks.
//!
//! The platform signs the exact request body with the app secret and sends
//! `X-Hub-Signature-256: sha256=<hex>`. Verification must run on the raw bytes
//! before any JSON parsing.

use crate::errors::SignatureError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<Arc<[u8]>>,
}

impl SignatureVerifier {
    /// An empty or absent secret disables enforcement.
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| Arc::from(s.as_bytes())),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            tracing::warn!("App secret not configured, skipping webhook signature verification");
            return Ok(());
        };

        let signature = signature.ok_or(SignatureError::Missing)?;
        let expected = sign(secret, body);

        if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Computes the header value the platform would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Length is not treated as secret, so differing lengths return early.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    scan(a, b).diff == 0
}

struct Scan {
    diff: u8,
    visited: usize,
}

// Visits every position regardless of where the first mismatch is.
fn scan(a: &[u8], b: &[u8]) -> Scan {
    a.iter().zip(b.iter()).fold(
        Scan {
            diff: 0,
            visited: 0,
        },
        |acc, (x, y)| Scan {
            diff: acc.diff | (x ^ y),
            visited: acc.visited + 1,
        },
    )
}
