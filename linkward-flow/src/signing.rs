use crate::ContextError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Secret used to sign carried deep-link context.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Use `bytes` as the HMAC key. 32 bytes or more is recommended.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A random 32-byte key. Context signed with it does not survive a restart.
    pub fn generate() -> Self {
        Self(rand::random::<[u8; 32]>().to_vec())
    }

    fn mac(&self) -> Result<HmacSha256, ContextError> {
        HmacSha256::new_from_slice(&self.0)
            .map_err(|e| ContextError::Malformed(format!("signing key: {e}")))
    }

    /// Sign `payload`, producing `base64url(payload).base64url(hmac)`.
    pub fn sign(&self, payload: &[u8]) -> Result<String, ContextError> {
        let mut mac = self.mac()?;
        mac.update(payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify a value produced by [`SigningKey::sign`] and return its payload.
    pub fn verify(&self, signed: &str) -> Result<Vec<u8>, ContextError> {
        let (encoded_payload, encoded_signature) = signed
            .split_once('.')
            .ok_or_else(|| ContextError::Malformed("missing signature".to_string()))?;
        let payload = URL_SAFE_NO_PAD
            .decode(encoded_payload)
            .map_err(|e| ContextError::Malformed(format!("payload encoding: {e}")))?;
        let signature = URL_SAFE_NO_PAD
            .decode(encoded_signature)
            .map_err(|e| ContextError::Malformed(format!("signature encoding: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| ContextError::BadSignature)?;
        Ok(payload)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::new(b"an-example-signing-key-of-32-byt".to_vec());
        let signed = key.sign(b"{\"source\":\"invite\"}").unwrap();
        assert_eq!(key.verify(&signed).unwrap(), b"{\"source\":\"invite\"}");
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let key = SigningKey::generate();
        let signed = key.sign(b"{\"source\":\"ref\"}").unwrap();
        let (_, signature) = signed.split_once('.').unwrap();
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(b"{\"source\":\"invite\"}"),
            signature
        );
        assert!(matches!(key.verify(&forged), Err(ContextError::BadSignature)));
    }

    #[test]
    fn test_other_key_is_rejected() {
        let signed = SigningKey::generate().sign(b"payload").unwrap();
        assert!(matches!(
            SigningKey::generate().verify(&signed),
            Err(ContextError::BadSignature)
        ));
        assert!(matches!(
            SigningKey::generate().verify("no-dot-here"),
            Err(ContextError::Malformed(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        assert_eq!(format!("{:?}", SigningKey::new("secret")), "SigningKey(..)");
    }
}
