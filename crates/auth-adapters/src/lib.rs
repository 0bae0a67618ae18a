//! # auth-adapters
//!
//! HMAC-SHA256 implementation of `IdentityProvider`.
//!
//! A credential is `<author_id>.<hex(hmac_sha256(secret, author_id))>`. Whoever
//! holds the secret (this service, or a login gateway in front of it) can mint
//! credentials; the board only ever sees the verified author id.

use domains::{AuthError, AuthorId, IdentityProvider, Principal};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Shortest secret accepted for signing credentials.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("signing secret must be at least {MIN_SECRET_BYTES} bytes, got {0}")]
pub struct WeakSecret(pub usize);

#[derive(Clone)]
pub struct HmacIdentityProvider {
    mac: HmacSha256,
}

impl HmacIdentityProvider {
    pub fn new(secret: &[u8]) -> Result<Self, WeakSecret> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(WeakSecret(secret.len()));
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| WeakSecret(secret.len()))?;
        Ok(Self { mac })
    }

    fn sign(&self, author: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(author.as_bytes());
        mac
    }
}

impl IdentityProvider for HmacIdentityProvider {
    fn issue(&self, author: &AuthorId) -> String {
        let signature = self.sign(author.as_str()).finalize().into_bytes();
        format!("{}.{}", author, hex::encode(signature))
    }

    fn verify(&self, credential: &str) -> Result<Principal, AuthError> {
        // Author ids may contain '.', the signature never does.
        let (author, signature) = credential.rsplit_once('.').ok_or(AuthError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::Malformed)?;
        let author_id =
            AuthorId::parse(author).map_err(|err| AuthError::InvalidAuthor(err.to_string()))?;
        // Signed over the canonical id so padded credentials don't verify.
        if author_id.as_str() != author {
            return Err(AuthError::BadSignature);
        }
        self.sign(author_id.as_str())
            .verify_slice(&signature)
            .map_err(|_| {
                tracing::debug!(author = %author_id, "credential signature mismatch");
                AuthError::BadSignature
            })?;
        Ok(Principal::new(author_id))
    }
}
