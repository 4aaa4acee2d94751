use serde::{Deserialize, Serialize};

use crate::core::models::b64;
use crate::core::models::key_entry::KeyEntry;

/// An encrypt-side backend configuration: one scheme plus the recipient
/// material it wraps layer keys for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptBackend {
    /// PGP identities (email addresses or names) resolved against the
    /// gpg keyring at encrypt time.
    Pgp { identities: Vec<String> },
    /// PEM public keys the layer key is sealed to.
    PublicKeyEnvelope { keys: Vec<Vec<u8>> },
    /// PEM x509 certificates the layer key is wrapped for.
    CertificateEnvelope { certs: Vec<Vec<u8>> },
}

/// A decrypt-side backend configuration: one scheme plus the key
/// material that can unwrap layer keys. Serializable because it crosses
/// the side channel inside a processor payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum DecryptBackend {
    /// GPG secret keyrings (with optional passwords). An empty keyring
    /// list means "use the local default keyring".
    Pgp { keyrings: Vec<KeyEntry> },
    /// Plain private keys with optional passwords.
    PrivateKey { keys: Vec<KeyEntry> },
    /// x509 certificates, required to pick the matching PKCS7 envelope.
    Certificate {
        #[serde(with = "b64::vec_bytes")]
        certs: Vec<Vec<u8>>,
    },
}

/// Encrypt-side half of a crypto configuration. The optional attached
/// decrypt configuration keeps an already-encrypted image decryptable
/// by its original keys when recipients are added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptConfig {
    pub backends: Vec<EncryptBackend>,
    pub decrypt: Option<DecryptConfig>,
}

impl EncryptConfig {
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Bind a decrypt configuration onto this encrypt configuration, so
    /// the per-layer transform can re-wrap existing layer keys for the
    /// union of old and new recipients.
    pub fn attach_decrypt_config(&mut self, dc: DecryptConfig) {
        match &mut self.decrypt {
            Some(existing) => existing.merge(&dc),
            None => self.decrypt = Some(dc),
        }
    }

    fn merge(&mut self, other: &EncryptConfig) {
        for backend in &other.backends {
            match backend {
                EncryptBackend::Pgp { identities } => {
                    if let Some(EncryptBackend::Pgp { identities: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, EncryptBackend::Pgp { .. }))
                    {
                        union_into(dst, identities);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
                EncryptBackend::PublicKeyEnvelope { keys } => {
                    if let Some(EncryptBackend::PublicKeyEnvelope { keys: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, EncryptBackend::PublicKeyEnvelope { .. }))
                    {
                        union_into(dst, keys);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
                EncryptBackend::CertificateEnvelope { certs } => {
                    if let Some(EncryptBackend::CertificateEnvelope { certs: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, EncryptBackend::CertificateEnvelope { .. }))
                    {
                        union_into(dst, certs);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
            }
        }

        if let Some(dc) = &other.decrypt {
            self.attach_decrypt_config(dc.clone());
        }
    }
}

/// Decrypt-side half of a crypto configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptConfig {
    pub backends: Vec<DecryptBackend>,
}

impl DecryptConfig {
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn merge(&mut self, other: &DecryptConfig) {
        for backend in &other.backends {
            match backend {
                DecryptBackend::Pgp { keyrings } => {
                    if let Some(DecryptBackend::Pgp { keyrings: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, DecryptBackend::Pgp { .. }))
                    {
                        union_into(dst, keyrings);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
                DecryptBackend::PrivateKey { keys } => {
                    if let Some(DecryptBackend::PrivateKey { keys: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, DecryptBackend::PrivateKey { .. }))
                    {
                        union_into(dst, keys);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
                DecryptBackend::Certificate { certs } => {
                    if let Some(DecryptBackend::Certificate { certs: dst }) = self
                        .backends
                        .iter_mut()
                        .find(|b| matches!(b, DecryptBackend::Certificate { .. }))
                    {
                        union_into(dst, certs);
                    } else {
                        self.backends.push(backend.clone());
                    }
                }
            }
        }
    }
}

/// Accumulator of per-backend encrypt and decrypt configurations.
///
/// The empty configuration performs no cryptographic transformation and
/// is the identity of [`CryptoConfig::combine`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoConfig {
    pub encrypt: EncryptConfig,
    pub decrypt: DecryptConfig,
}

impl CryptoConfig {
    pub fn encrypt_with_pgp(identities: Vec<String>) -> Self {
        Self {
            encrypt: EncryptConfig {
                backends: vec![EncryptBackend::Pgp { identities }],
                decrypt: None,
            },
            ..Self::default()
        }
    }

    pub fn encrypt_with_pub_keys(keys: Vec<Vec<u8>>) -> Self {
        Self {
            encrypt: EncryptConfig {
                backends: vec![EncryptBackend::PublicKeyEnvelope { keys }],
                decrypt: None,
            },
            ..Self::default()
        }
    }

    pub fn encrypt_with_certs(certs: Vec<Vec<u8>>) -> Self {
        Self {
            encrypt: EncryptConfig {
                backends: vec![EncryptBackend::CertificateEnvelope { certs }],
                decrypt: None,
            },
            ..Self::default()
        }
    }

    pub fn decrypt_with_gpg_keyrings(keyrings: Vec<KeyEntry>) -> Self {
        Self {
            decrypt: DecryptConfig {
                backends: vec![DecryptBackend::Pgp { keyrings }],
            },
            ..Self::default()
        }
    }

    pub fn decrypt_with_priv_keys(keys: Vec<KeyEntry>) -> Self {
        Self {
            decrypt: DecryptConfig {
                backends: vec![DecryptBackend::PrivateKey { keys }],
            },
            ..Self::default()
        }
    }

    pub fn decrypt_with_certs(certs: Vec<Vec<u8>>) -> Self {
        Self {
            decrypt: DecryptConfig {
                backends: vec![DecryptBackend::Certificate { certs }],
            },
            ..Self::default()
        }
    }

    /// Union a sequence of configurations, preserving the order they
    /// were supplied in. Merging two backends of the same scheme unions
    /// their material without duplicating it, so combining a config
    /// with itself is a no-op.
    pub fn combine<I: IntoIterator<Item = CryptoConfig>>(configs: I) -> Self {
        let mut combined = Self::default();
        for config in configs {
            combined.encrypt.merge(&config.encrypt);
            combined.decrypt.merge(&config.decrypt);
        }
        combined
    }
}

/// Append each item not already present, keeping first-seen order.
fn union_into<T: Clone + PartialEq>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}
