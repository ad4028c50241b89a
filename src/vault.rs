use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("crypto error: {0}")]
pub struct CryptoError(pub String);

/// Encryption seam for backend credentials. Production deployments plug in a
/// KMS-backed implementation; the engine only ever sees ciphertext strings.
pub trait CredentialVault: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;
}

/// Base64-encoding vault for development and tests. Not an encryption scheme;
/// it exists so secret handling and carry-forward behavior are observable
/// without a key service.
#[derive(Debug, Clone, Default)]
pub struct Base64Vault;

impl CredentialVault for Base64Vault {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(BASE64.encode(plaintext.as_bytes()))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(ciphertext.as_bytes())
            .map_err(|e| CryptoError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| CryptoError(e.to_string()))
    }
}

/// Vault that always fails, for exercising crypto error propagation in tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct FailingVault;

#[cfg(test)]
impl CredentialVault for FailingVault {
    fn encrypt(&self, _plaintext: &str) -> Result<String, CryptoError> {
        Err(CryptoError("key service unavailable".to_string()))
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<String, CryptoError> {
        Err(CryptoError("key service unavailable".to_string()))
    }
}
