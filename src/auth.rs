// ============================================================================
// AUTHORIZATION - Record signatures and caller identity
// ============================================================================
//
// Two distinct layers of authorization:
//
// 1. Record authorization: every mutating pool/bet record is self-authorizing
//    via its rendezvous key (the record id IS the verification key). Verified
//    here with an injected, stateless `SignatureVerifier`.
// 2. Caller authorization: the surrounding RPC layer authenticates the caller
//    with a separate user-owned key. That layer is an external collaborator,
//    modelled by the `Authorizer` and `AccountRegistry` traits.

use async_trait::async_trait;
use ed25519_dalek::{Verifier, VerifyingKey};

use crate::error::AuthError;
use crate::model::{PublicKey, Signature, UserId};

/// Caller-supplied authentication envelope: the user-owned owner key plus a
/// signature over the request, produced by that key. Resolution to a user id
/// is delegated to the `Authorizer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
    pub owner: PublicKey,
    pub signature: Signature,
}

/// Stateless detached-signature verifier. Injected into the engine and
/// payout validator rather than reached through a global.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verifies `signature` over `message` against `key`. A malformed key is
    /// simply a failed verification; the caller treats all failures as
    /// terminal `PermissionDenied`.
    pub fn verify(&self, key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(key.as_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        verifying_key.verify(message, &sig).is_ok()
    }
}

/// Resolves a caller's authenticated user id from a signed request.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, auth: &Auth) -> Result<UserId, AuthError>;
}

/// Account registration oracle. Unregistered callers are denied before any
/// pool state is touched.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    async fn is_registered(&self, user_id: &UserId) -> Result<bool, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Keypair;

    #[test]
    fn verify_accepts_valid_signature() {
        let keypair = Keypair::generate();
        let verifier = SignatureVerifier::new();
        let message = b"the signed payload";

        let signature = keypair.sign(message);
        assert!(verifier.verify(&keypair.public(), message, &signature));
    }

    #[test]
    fn verify_rejects_wrong_key_and_tampered_message() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let verifier = SignatureVerifier::new();
        let message = b"the signed payload";

        let signature = keypair.sign(message);
        assert!(!verifier.verify(&other.public(), message, &signature));
        assert!(!verifier.verify(&keypair.public(), b"another payload", &signature));
    }

    #[test]
    fn verify_rejects_malformed_key() {
        let keypair = Keypair::generate();
        let verifier = SignatureVerifier::new();
        let signature = keypair.sign(b"payload");

        // Not a valid curve point
        let bad_key = PublicKey([0xff; 32]);
        assert!(!verifier.verify(&bad_key, b"payload", &signature));
    }
}
