//! # Signing Key Store
//!
//! Holds the RSA signing key used to mint JWTs and exposes it as a JWKS
//! document for verifiers. The key is a singleton per process: loaded from
//! disk if a key file already exists, generated and persisted on first use
//! otherwise.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

const KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("failed to generate RSA key: {0}")]
    Generation(String),
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write key file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse key material: {0}")]
    Parse(String),
}

/// The process-wide RSA signing key, plus its precomputed JWKS `kid`.
pub struct KeyStore {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    kid: String,
}

impl KeyStore {
    /// Loads the key at `path`, generating and persisting a fresh one if
    /// the file doesn't exist.
    pub fn load_or_generate(path: &Path) -> Result<Self, KeyStoreError> {
        let private_key = if path.exists() {
            let pem = std::fs::read_to_string(path).map_err(|e| KeyStoreError::Read {
                path: path.display().to_string(),
                source: e,
            })?;
            RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| KeyStoreError::Parse(e.to_string()))?
        } else {
            let mut rng = rand::thread_rng();
            let key = RsaPrivateKey::new(&mut rng, KEY_BITS)
                .map_err(|e| KeyStoreError::Generation(e.to_string()))?;
            let pem = key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| KeyStoreError::Generation(e.to_string()))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| KeyStoreError::Write {
                    path: path.display().to_string(),
                    source: e,
                })?;
            }
            std::fs::write(path, pem.as_bytes()).map_err(|e| KeyStoreError::Write {
                path: path.display().to_string(),
                source: e,
            })?;
            key
        };

        let public_key = RsaPublicKey::from(&private_key);
        let kid = compute_kid(&public_key);

        Ok(Self {
            private_key,
            public_key,
            kid,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Key suitable for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> Result<EncodingKey, KeyStoreError> {
        let pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyStoreError::Generation(e.to_string()))?;
        EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| KeyStoreError::Parse(e.to_string()))
    }

    /// Key suitable for `jsonwebtoken::decode`, used by tests that verify
    /// issued tokens round-trip.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeyStoreError> {
        let n = URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be());
        DecodingKey::from_rsa_components(&n, &e).map_err(|e| KeyStoreError::Parse(e.to_string()))
    }

    /// Renders the standard JWKS document for this key.
    pub fn jwks(&self) -> JwksDocument {
        JwksDocument {
            keys: vec![Jwk {
                kty: "RSA",
                use_: "sig",
                alg: "RS256",
                kid: self.kid.clone(),
                n: URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
            }],
        }
    }
}

fn compute_kid(public_key: &RsaPublicKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key.n().to_bytes_be());
    hasher.update(public_key.e().to_bytes_be());
    let digest = hasher.finalize();
    hex_encode(&digest[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One entry of a JWKS document, per RFC 7517.
#[derive(Debug, Serialize)]
pub struct Jwk {
    pub kty: &'static str,
    #[serde(rename = "use")]
    pub use_: &'static str,
    pub alg: &'static str,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Serialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// Minimal OIDC discovery document.
#[derive(Debug, Serialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    pub id_token_signing_alg_values_supported: Vec<&'static str>,
}
