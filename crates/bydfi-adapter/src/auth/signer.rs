/*
[INPUT]:  Payload strings and API credentials
[OUTPUT]: Hex-encoded HMAC-SHA256 signatures
[POS]:    Auth layer - cryptographic signing for request authentication
[UPDATE]: When changing signing algorithm or signature encoding
*/

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::auth::Credentials;
use crate::http::{BydfiError, Result};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer keyed with the API secret
#[derive(Debug, Clone)]
pub struct HmacSigner {
    credentials: Credentials,
}

impl HmacSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// API key sent next to the signature
    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    /// Sign a payload and return the lowercase hex digest
    pub fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a hex signature against a payload
    pub fn verify(&self, payload: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.credentials.api_secret().as_bytes())
            .map_err(|err| BydfiError::Config(format!("invalid API secret: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> HmacSigner {
        HmacSigner::new(Credentials::new("test-key", secret).unwrap())
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let signer = signer("Jefe");
        let signature = signer.sign("what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer("NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j");
        let payload = "symbol=BTC-USDT&side=BUY&type=LIMIT&timestamp=1591702613943";
        let signature = signer.sign(payload).unwrap();

        assert_eq!(signature.len(), 64);
        assert!(signer.verify(payload, &signature));
        assert!(!signer.verify("symbol=ETH-USDT", &signature));
        assert!(!signer.verify(payload, "not-hex"));
    }

    #[test]
    fn test_different_secret_changes_signature() {
        let payload = "timestamp=1";
        assert_ne!(
            signer("secret-a").sign(payload).unwrap(),
            signer("secret-b").sign(payload).unwrap()
        );
    }
}
