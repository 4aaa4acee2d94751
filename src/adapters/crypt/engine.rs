use std::collections::BTreeSet;
use std::io::{Cursor, Read};

use openssl::encrypt::{Decrypter, Encrypter};
use openssl::pkey::{PKey, Private};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::rsa::Padding;
use openssl::stack::Stack;
use openssl::symm::Cipher;
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::adapters::crypt::gpg::GpgClient;
use crate::core::errors::{LayerlockError, Result};
use crate::core::models::b64;
use crate::core::models::crypto_config::{
    CryptoConfig, DecryptBackend, DecryptConfig, EncryptBackend, EncryptConfig,
};
use crate::core::models::descriptor::{
    Descriptor, ENCRYPTED_SUFFIX, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};
use crate::core::models::key_entry::KeyEntry;
use crate::core::traits::image_store::ImageStore;
use crate::core::traits::layer_crypto::{LayerCrypto, LayerFilter};

/// First line of every encrypted layer blob.
const MAGIC: &[u8] = b"LAYERLOCK/1\n";
const CIPHER_NAME: &str = "aes-256-gcm";

/// Per-layer transform over an image store: AES-256-GCM layer cipher
/// with the layer key wrapped once per recipient, one scheme per
/// backend. The wrapped-key header travels inside the blob, so a layer
/// is self-contained for the side-channel receiver.
pub struct CryptoEngine {
    gpg: GpgClient,
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// One wrapped copy of the layer key. `recipient` identifies who can
/// unwrap it (pgp identity, or the digest of the public key or
/// certificate), which is what makes re-encryption for the same
/// recipient set detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WrappedKey {
    scheme: WrapScheme,
    recipient: String,
    #[serde(with = "b64::bytes")]
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WrapScheme {
    Pgp,
    PublicKeyEnvelope,
    Pkcs7,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerHeader {
    cipher: String,
    #[serde(with = "b64::bytes")]
    nonce: Vec<u8>,
    #[serde(with = "b64::bytes")]
    tag: Vec<u8>,
    wrapped: Vec<WrappedKey>,
}

impl CryptoEngine {
    pub fn new(gpg: GpgClient) -> Self {
        Self { gpg }
    }

    // ---- layer blob format ----

    fn encode_blob(header: &LayerHeader, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut out = MAGIC.to_vec();
        let header_json =
            serde_json::to_vec(header).map_err(|e| LayerlockError::EncryptionFailed {
                reason: format!("could not serialize layer header: {e}"),
            })?;
        out.extend_from_slice(&header_json);
        out.push(b'\n');
        out.extend_from_slice(ciphertext);
        Ok(out)
    }

    fn parse_blob(data: &[u8]) -> Result<(LayerHeader, &[u8])> {
        let rest = data
            .strip_prefix(MAGIC)
            .ok_or_else(|| LayerlockError::MalformedLayer {
                detail: "missing magic".to_string(),
            })?;
        let newline =
            rest.iter()
                .position(|&b| b == b'\n')
                .ok_or_else(|| LayerlockError::MalformedLayer {
                    detail: "missing header".to_string(),
                })?;

        let header: LayerHeader = serde_json::from_slice(&rest[..newline]).map_err(|e| {
            LayerlockError::MalformedLayer {
                detail: format!("bad header: {e}"),
            }
        })?;

        Ok((header, &rest[newline + 1..]))
    }

    // ---- key wrapping ----

    fn pgp_id(identity: &str) -> String {
        format!("pgp:{identity}")
    }

    fn jwe_id(pem: &[u8]) -> String {
        format!("jwe:sha256:{}", hex::encode(Sha256::digest(pem)))
    }

    fn pkcs7_id(pem: &[u8]) -> String {
        format!("pkcs7:sha256:{}", hex::encode(Sha256::digest(pem)))
    }

    /// All recipient identifiers an encrypt configuration wraps for.
    fn recipient_ids(config: &EncryptConfig) -> Vec<String> {
        let mut ids = Vec::new();
        for backend in &config.backends {
            match backend {
                EncryptBackend::Pgp { identities } => {
                    ids.extend(identities.iter().map(|i| Self::pgp_id(i)));
                }
                EncryptBackend::PublicKeyEnvelope { keys } => {
                    ids.extend(keys.iter().map(|k| Self::jwe_id(k)));
                }
                EncryptBackend::CertificateEnvelope { certs } => {
                    ids.extend(certs.iter().map(|c| Self::pkcs7_id(c)));
                }
            }
        }
        ids
    }

    /// Wrap the layer key for every recipient not already covered by
    /// `existing`, in backend order.
    fn wrap_layer_key(
        &self,
        config: &EncryptConfig,
        key: &[u8],
        existing: &[WrappedKey],
    ) -> Result<Vec<WrappedKey>> {
        let covered: BTreeSet<&str> = existing.iter().map(|w| w.recipient.as_str()).collect();
        let mut wraps = Vec::new();

        for backend in &config.backends {
            match backend {
                EncryptBackend::Pgp { identities } => {
                    for identity in identities {
                        let recipient = Self::pgp_id(identity);
                        if covered.contains(recipient.as_str()) {
                            continue;
                        }
                        let data = self.gpg.encrypt_for(std::slice::from_ref(identity), key)?;
                        wraps.push(WrappedKey {
                            scheme: WrapScheme::Pgp,
                            recipient,
                            data,
                        });
                    }
                }
                EncryptBackend::PublicKeyEnvelope { keys } => {
                    for pem in keys {
                        let recipient = Self::jwe_id(pem);
                        if covered.contains(recipient.as_str()) {
                            continue;
                        }
                        wraps.push(WrappedKey {
                            scheme: WrapScheme::PublicKeyEnvelope,
                            recipient,
                            data: seal_to_public_key(pem, key)?,
                        });
                    }
                }
                EncryptBackend::CertificateEnvelope { certs } => {
                    for pem in certs {
                        let recipient = Self::pkcs7_id(pem);
                        if covered.contains(recipient.as_str()) {
                            continue;
                        }
                        wraps.push(WrappedKey {
                            scheme: WrapScheme::Pkcs7,
                            recipient,
                            data: wrap_pkcs7(pem, key)?,
                        });
                    }
                }
            }
        }

        Ok(wraps)
    }

    /// Try every wrapped key against the supplied decrypt material;
    /// first successful unwrap wins.
    fn unwrap_layer_key(&self, config: &DecryptConfig, wrapped: &[WrappedKey]) -> Result<Vec<u8>> {
        let mut priv_keys: Vec<&KeyEntry> = Vec::new();
        let mut keyrings: Vec<&KeyEntry> = Vec::new();
        let mut certs: Vec<&Vec<u8>> = Vec::new();
        let mut pgp_default = false;

        for backend in &config.backends {
            match backend {
                DecryptBackend::Pgp { keyrings: rings } => {
                    if rings.is_empty() {
                        pgp_default = true;
                    }
                    keyrings.extend(rings.iter());
                }
                DecryptBackend::PrivateKey { keys } => priv_keys.extend(keys.iter()),
                DecryptBackend::Certificate { certs: c } => certs.extend(c.iter()),
            }
        }

        for wrap in wrapped {
            match wrap.scheme {
                WrapScheme::PublicKeyEnvelope => {
                    for key in &priv_keys {
                        if let Ok(lek) = open_with_private_key(key, &wrap.data) {
                            return Ok(lek);
                        }
                    }
                }
                WrapScheme::Pkcs7 => {
                    for cert in &certs {
                        for key in &priv_keys {
                            if let Ok(lek) = unwrap_pkcs7(cert, key, &wrap.data) {
                                return Ok(lek);
                            }
                        }
                    }
                }
                WrapScheme::Pgp => {
                    for ring in &keyrings {
                        if let Ok(lek) = self.gpg.decrypt_with_keyring(ring, &wrap.data) {
                            return Ok(lek);
                        }
                    }
                    if pgp_default
                        && let Ok(lek) = self.gpg.decrypt_default(&wrap.data)
                    {
                        return Ok(lek);
                    }
                }
            }
        }

        Err(LayerlockError::DecryptionNoKey)
    }

    // ---- single-layer transforms ----

    fn encrypt_layer_blob(&self, config: &EncryptConfig, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut key = vec![0u8; 32];
        let mut nonce = vec![0u8; 12];
        openssl::rand::rand_bytes(&mut key).map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("rng failure: {e}"),
        })?;
        openssl::rand::rand_bytes(&mut nonce).map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("rng failure: {e}"),
        })?;

        let mut tag = vec![0u8; 16];
        let ciphertext = openssl::symm::encrypt_aead(
            Cipher::aes_256_gcm(),
            &key,
            Some(&nonce),
            &[],
            plaintext,
            &mut tag,
        )
        .map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("layer cipher failed: {e}"),
        })?;

        let wrapped = self.wrap_layer_key(config, &key, &[])?;
        let header = LayerHeader {
            cipher: CIPHER_NAME.to_string(),
            nonce,
            tag,
            wrapped,
        };

        Self::encode_blob(&header, &ciphertext)
    }

    /// Extend an already-encrypted layer with wraps for recipients it
    /// does not cover yet. Returns `None` when every recipient is
    /// already present — the no-op that makes re-encryption cheap.
    fn rewrap_layer_blob(&self, config: &EncryptConfig, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let (mut header, ciphertext) = Self::parse_blob(data)?;

        let covered: BTreeSet<&str> = header.wrapped.iter().map(|w| w.recipient.as_str()).collect();
        let missing = Self::recipient_ids(config)
            .into_iter()
            .any(|id| !covered.contains(id.as_str()));
        if !missing {
            return Ok(None);
        }

        let Some(dc) = &config.decrypt else {
            return Err(LayerlockError::EncryptionFailed {
                reason: "layer is already encrypted; decryption keys are required to add recipients"
                    .to_string(),
            });
        };

        let key = self.unwrap_layer_key(dc, &header.wrapped)?;
        let new_wraps = self.wrap_layer_key(config, &key, &header.wrapped)?;
        header.wrapped.extend(new_wraps);

        Ok(Some(Self::encode_blob(&header, ciphertext)?))
    }

    fn decrypt_layer_blob(&self, config: &DecryptConfig, data: &[u8]) -> Result<Vec<u8>> {
        let (header, ciphertext) = Self::parse_blob(data)?;
        if header.cipher != CIPHER_NAME {
            return Err(LayerlockError::MalformedLayer {
                detail: format!("unsupported cipher '{}'", header.cipher),
            });
        }

        let key = self.unwrap_layer_key(config, &header.wrapped)?;

        openssl::symm::decrypt_aead(
            Cipher::aes_256_gcm(),
            &key,
            Some(&header.nonce),
            &[],
            ciphertext,
            &header.tag,
        )
        .map_err(|_| LayerlockError::DecryptionFailed {
            reason: "layer authentication failed".to_string(),
        })
    }

    // ---- manifest-tree walk ----

    fn transform_target(
        &self,
        store: &dyn ImageStore,
        target: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
        direction: Direction,
    ) -> Result<(Descriptor, bool)> {
        match target.media_type.as_str() {
            MEDIA_TYPE_IMAGE_INDEX => {
                self.transform_index(store, target, config, filter, direction)
            }
            MEDIA_TYPE_IMAGE_MANIFEST => {
                self.transform_manifest(store, target, config, filter, direction)
            }
            other => Err(LayerlockError::Store {
                detail: format!("unsupported target media type '{other}'"),
            }),
        }
    }

    fn transform_index(
        &self,
        store: &dyn ImageStore,
        desc: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
        direction: Direction,
    ) -> Result<(Descriptor, bool)> {
        let raw = store.read_blob(&desc.digest)?;
        let mut index: serde_json::Value = parse_manifest_json(&raw, &desc.digest)?;

        let Some(entries) = index.get_mut("manifests").and_then(|m| m.as_array_mut()) else {
            return Err(LayerlockError::Store {
                detail: format!("index {} has no manifests", desc.digest),
            });
        };

        let mut changed = false;
        for entry in entries.iter_mut() {
            let child: Descriptor = serde_json::from_value(entry.clone()).map_err(|e| {
                LayerlockError::Store {
                    detail: format!("bad manifest entry in {}: {e}", desc.digest),
                }
            })?;

            let (new_child, child_changed) = match child.media_type.as_str() {
                MEDIA_TYPE_IMAGE_MANIFEST => {
                    self.transform_manifest(store, &child, config, filter, direction)?
                }
                MEDIA_TYPE_IMAGE_INDEX => {
                    self.transform_index(store, &child, config, filter, direction)?
                }
                _ => continue,
            };

            if child_changed {
                entry["digest"] = json!(new_child.digest);
                entry["size"] = json!(new_child.size);
                changed = true;
            }
        }

        if !changed {
            return Ok((desc.clone(), false));
        }

        let bytes = serde_json::to_vec(&index).map_err(|e| LayerlockError::Store {
            detail: format!("could not serialize index: {e}"),
        })?;
        let new_desc = store.write_blob(&bytes, &desc.media_type)?;
        Ok((new_desc, true))
    }

    fn transform_manifest(
        &self,
        store: &dyn ImageStore,
        desc: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
        direction: Direction,
    ) -> Result<(Descriptor, bool)> {
        let raw = store.read_blob(&desc.digest)?;
        let mut manifest: serde_json::Value = parse_manifest_json(&raw, &desc.digest)?;

        let Some(layers) = manifest.get_mut("layers").and_then(|l| l.as_array_mut()) else {
            return Err(LayerlockError::Store {
                detail: format!("manifest {} has no layers", desc.digest),
            });
        };

        let mut changed = false;
        for layer in layers.iter_mut() {
            let layer_desc: Descriptor = serde_json::from_value(layer.clone()).map_err(|e| {
                LayerlockError::Store {
                    detail: format!("bad layer entry in {}: {e}", desc.digest),
                }
            })?;
            if !filter(&layer_desc) {
                continue;
            }

            let replacement = match direction {
                Direction::Encrypt if layer_desc.is_encrypted() => self
                    .rewrap_layer_blob(&config.encrypt, &store.read_blob(&layer_desc.digest)?)?
                    .map(|bytes| (bytes, layer_desc.media_type.clone())),
                Direction::Encrypt => {
                    let data = store.read_blob(&layer_desc.digest)?;
                    let bytes = self.encrypt_layer_blob(&config.encrypt, &data)?;
                    Some((bytes, format!("{}{ENCRYPTED_SUFFIX}", layer_desc.media_type)))
                }
                Direction::Decrypt if layer_desc.is_encrypted() => {
                    let data = store.read_blob(&layer_desc.digest)?;
                    let bytes = self.decrypt_layer_blob(&config.decrypt, &data)?;
                    let media_type = layer_desc
                        .media_type
                        .strip_suffix(ENCRYPTED_SUFFIX)
                        .unwrap_or(&layer_desc.media_type)
                        .to_string();
                    Some((bytes, media_type))
                }
                Direction::Decrypt => None,
            };

            if let Some((bytes, media_type)) = replacement {
                let new_desc = store.write_blob(&bytes, &media_type)?;
                layer["mediaType"] = json!(media_type);
                layer["digest"] = json!(new_desc.digest);
                layer["size"] = json!(new_desc.size);
                changed = true;
            }
        }

        if !changed {
            return Ok((desc.clone(), false));
        }

        let bytes = serde_json::to_vec(&manifest).map_err(|e| LayerlockError::Store {
            detail: format!("could not serialize manifest: {e}"),
        })?;
        let mut new_desc = store.write_blob(&bytes, &desc.media_type)?;
        new_desc.platform = desc.platform.clone();
        Ok((new_desc, true))
    }
}

impl LayerCrypto for CryptoEngine {
    fn encrypt_image(
        &self,
        store: &dyn ImageStore,
        target: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
    ) -> Result<(Descriptor, bool)> {
        // Zero backends means no transformation, by design.
        if config.encrypt.is_empty() {
            return Ok((target.clone(), false));
        }
        self.transform_target(store, target, config, filter, Direction::Encrypt)
    }

    fn decrypt_image(
        &self,
        store: &dyn ImageStore,
        target: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
    ) -> Result<(Descriptor, bool)> {
        if config.decrypt.is_empty() {
            return Ok((target.clone(), false));
        }
        self.transform_target(store, target, config, filter, Direction::Decrypt)
    }

    fn decrypt_layer<'a>(
        &self,
        config: &DecryptConfig,
        mut input: Box<dyn Read + 'a>,
        _descriptor: &Descriptor,
    ) -> Result<Box<dyn Read + 'a>> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;

        let plaintext = self.decrypt_layer_blob(config, &data)?;
        Ok(Box::new(Cursor::new(plaintext)))
    }
}

fn parse_manifest_json(raw: &[u8], digest: &str) -> Result<serde_json::Value> {
    serde_json::from_slice(raw).map_err(|e| LayerlockError::Store {
        detail: format!("could not parse {digest}: {e}"),
    })
}

fn load_private_key(entry: &KeyEntry) -> Result<PKey<Private>> {
    let parsed = match &entry.password {
        Some(password) => PKey::private_key_from_pem_passphrase(&entry.data, password),
        None => PKey::private_key_from_pem(&entry.data)
            .or_else(|_| PKey::private_key_from_der(&entry.data)),
    };

    parsed.map_err(|e| LayerlockError::DecryptionFailed {
        reason: format!("could not load private key: {e}"),
    })
}

/// Seal the layer key to a PEM public key with RSA-OAEP.
fn seal_to_public_key(pem: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let pkey = PKey::public_key_from_pem(pem).map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("could not load public key: {e}"),
    })?;

    let mut encrypter = Encrypter::new(&pkey).map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("envelope setup failed: {e}"),
    })?;
    encrypter
        .set_rsa_padding(Padding::PKCS1_OAEP)
        .map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("envelope setup failed: {e}"),
        })?;

    let len = encrypter
        .encrypt_len(key)
        .map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("envelope failed: {e}"),
        })?;
    let mut out = vec![0u8; len];
    let written =
        encrypter
            .encrypt(key, &mut out)
            .map_err(|e| LayerlockError::EncryptionFailed {
                reason: format!("envelope failed: {e}"),
            })?;
    out.truncate(written);

    Ok(out)
}

fn open_with_private_key(entry: &KeyEntry, sealed: &[u8]) -> Result<Vec<u8>> {
    let pkey = load_private_key(entry)?;

    let mut decrypter = Decrypter::new(&pkey).map_err(|e| LayerlockError::DecryptionFailed {
        reason: format!("envelope setup failed: {e}"),
    })?;
    decrypter
        .set_rsa_padding(Padding::PKCS1_OAEP)
        .map_err(|e| LayerlockError::DecryptionFailed {
            reason: format!("envelope setup failed: {e}"),
        })?;

    let len = decrypter
        .decrypt_len(sealed)
        .map_err(|e| LayerlockError::DecryptionFailed {
            reason: format!("envelope failed: {e}"),
        })?;
    let mut out = vec![0u8; len];
    let written =
        decrypter
            .decrypt(sealed, &mut out)
            .map_err(|e| LayerlockError::DecryptionFailed {
                reason: format!("envelope failed: {e}"),
            })?;
    out.truncate(written);

    Ok(out)
}

/// Wrap the layer key in a PKCS7 envelope for one certificate.
fn wrap_pkcs7(cert_pem: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cert = X509::from_pem(cert_pem).map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("could not load certificate: {e}"),
    })?;
    let mut certs = Stack::new().map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("pkcs7 setup failed: {e}"),
    })?;
    certs.push(cert).map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("pkcs7 setup failed: {e}"),
    })?;

    let envelope = Pkcs7::encrypt(&certs, key, Cipher::aes_256_cbc(), Pkcs7Flags::BINARY)
        .map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("pkcs7 envelope failed: {e}"),
        })?;

    envelope.to_der().map_err(|e| LayerlockError::EncryptionFailed {
        reason: format!("pkcs7 envelope failed: {e}"),
    })
}

fn unwrap_pkcs7(cert_pem: &[u8], entry: &KeyEntry, data: &[u8]) -> Result<Vec<u8>> {
    let envelope = Pkcs7::from_der(data).map_err(|e| LayerlockError::DecryptionFailed {
        reason: format!("bad pkcs7 envelope: {e}"),
    })?;
    let cert = X509::from_pem(cert_pem).map_err(|e| LayerlockError::DecryptionFailed {
        reason: format!("could not load certificate: {e}"),
    })?;
    let pkey = load_private_key(entry)?;

    envelope
        .decrypt(&pkey, &cert, Pkcs7Flags::empty())
        .map_err(|e| LayerlockError::DecryptionFailed {
            reason: format!("pkcs7 unwrap failed: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use openssl::hash::MessageDigest;
    use openssl::rsa::Rsa;
    use openssl::x509::{X509Builder, X509NameBuilder};

    use crate::core::models::image::ImageRecord;

    /// In-memory content store, just enough for the engine walk.
    struct MemStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemStore {
        fn new() -> Self {
            Self {
                blobs: Mutex::new(HashMap::new()),
            }
        }

        fn put(&self, data: &[u8], media_type: &str) -> Descriptor {
            self.write_blob(data, media_type).unwrap()
        }
    }

    impl ImageStore for MemStore {
        fn get(&self, name: &str) -> Result<ImageRecord> {
            Err(LayerlockError::ImageNotFound {
                name: name.to_string(),
            })
        }

        fn create(&self, record: ImageRecord) -> Result<ImageRecord> {
            Ok(record)
        }

        fn layer_descriptors(&self, _target: &Descriptor) -> Result<Vec<Descriptor>> {
            Ok(Vec::new())
        }

        fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(digest)
                .cloned()
                .ok_or_else(|| LayerlockError::Store {
                    detail: format!("no blob {digest}"),
                })
        }

        fn write_blob(&self, data: &[u8], media_type: &str) -> Result<Descriptor> {
            let digest = format!("sha256:{}", hex::encode(Sha256::digest(data)));
            self.blobs
                .lock()
                .unwrap()
                .insert(digest.clone(), data.to_vec());
            Ok(Descriptor {
                media_type: media_type.to_string(),
                digest,
                size: data.len() as u64,
                platform: None,
            })
        }
    }

    fn engine() -> CryptoEngine {
        CryptoEngine::new(GpgClient::new())
    }

    fn rsa_keypair() -> (Vec<u8>, KeyEntry) {
        let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let pub_pem = pkey.public_key_to_pem().unwrap();
        let priv_pem = pkey.private_key_to_pem_pkcs8().unwrap();
        (
            pub_pem,
            KeyEntry {
                data: priv_pem,
                password: None,
            },
        )
    }

    fn cert_keypair() -> (Vec<u8>, KeyEntry) {
        let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "layerlock-test").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder
            .set_not_before(&openssl::asn1::Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&openssl::asn1::Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();

        (
            builder.build().to_pem().unwrap(),
            KeyEntry {
                data: pkey.private_key_to_pem_pkcs8().unwrap(),
                password: None,
            },
        )
    }

    fn jwe_configs(pub_pem: &[u8], key: &KeyEntry) -> (CryptoConfig, CryptoConfig) {
        let enc = CryptoConfig::encrypt_with_pub_keys(vec![pub_pem.to_vec()]);
        let dec = CryptoConfig::decrypt_with_priv_keys(vec![key.clone()]);
        (enc, dec)
    }

    /// Store a manifest with the given layer blobs, returning its
    /// descriptor.
    fn build_manifest(store: &MemStore, layers: &[(&[u8], &str)]) -> Descriptor {
        let layer_descs: Vec<Descriptor> = layers
            .iter()
            .map(|(data, media_type)| store.put(data, media_type))
            .collect();

        let config_desc = store.put(b"{}", "application/vnd.oci.image.config.v1+json");
        let manifest = json!({
            "schemaVersion": 2,
            "mediaType": MEDIA_TYPE_IMAGE_MANIFEST,
            "config": {
                "mediaType": config_desc.media_type,
                "digest": config_desc.digest,
                "size": config_desc.size,
            },
            "layers": layer_descs.iter().map(|d| json!({
                "mediaType": d.media_type,
                "digest": d.digest,
                "size": d.size,
            })).collect::<Vec<_>>(),
        });

        store.put(
            &serde_json::to_vec(&manifest).unwrap(),
            MEDIA_TYPE_IMAGE_MANIFEST,
        )
    }

    const TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

    #[test]
    fn layer_blob_round_trip_with_public_key_envelope() {
        let (pub_pem, priv_key) = rsa_keypair();
        let (enc, dec) = jwe_configs(&pub_pem, &priv_key);
        let engine = engine();

        let blob = engine
            .encrypt_layer_blob(&enc.encrypt, b"layer bytes")
            .unwrap();
        assert!(blob.starts_with(MAGIC));

        let plain = engine.decrypt_layer_blob(&dec.decrypt, &blob).unwrap();
        assert_eq!(plain, b"layer bytes");
    }

    #[test]
    fn wrong_private_key_cannot_unwrap() {
        let (pub_pem, _) = rsa_keypair();
        let (_, other_key) = rsa_keypair();
        let enc = CryptoConfig::encrypt_with_pub_keys(vec![pub_pem]);
        let dec = CryptoConfig::decrypt_with_priv_keys(vec![other_key]);
        let engine = engine();

        let blob = engine.encrypt_layer_blob(&enc.encrypt, b"secret").unwrap();
        let err = engine.decrypt_layer_blob(&dec.decrypt, &blob).unwrap_err();
        assert!(matches!(err, LayerlockError::DecryptionNoKey));
    }

    #[test]
    fn pkcs7_round_trip() {
        let (cert_pem, priv_key) = cert_keypair();
        let enc = CryptoConfig::encrypt_with_certs(vec![cert_pem.clone()]);
        let mut dec = CryptoConfig::decrypt_with_certs(vec![cert_pem]);
        dec = CryptoConfig::combine(vec![
            dec,
            CryptoConfig::decrypt_with_priv_keys(vec![priv_key]),
        ]);
        let engine = engine();

        let blob = engine.encrypt_layer_blob(&enc.encrypt, b"layer").unwrap();
        let plain = engine.decrypt_layer_blob(&dec.decrypt, &blob).unwrap();
        assert_eq!(plain, b"layer");
    }

    #[test]
    fn tampered_blob_fails_authentication() {
        let (pub_pem, priv_key) = rsa_keypair();
        let (enc, dec) = jwe_configs(&pub_pem, &priv_key);
        let engine = engine();

        let mut blob = engine.encrypt_layer_blob(&enc.encrypt, b"bytes").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;

        let err = engine.decrypt_layer_blob(&dec.decrypt, &blob).unwrap_err();
        assert!(matches!(err, LayerlockError::DecryptionFailed { .. }));
    }

    #[test]
    fn image_encrypt_decrypt_round_trip() {
        let (pub_pem, priv_key) = rsa_keypair();
        let (enc, dec) = jwe_configs(&pub_pem, &priv_key);
        let engine = engine();
        let store = MemStore::new();

        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP), (b"layer one", TAR_GZIP)]);

        let (encrypted, modified) = engine
            .encrypt_image(&store, &target, &enc, &|_| true)
            .unwrap();
        assert!(modified);
        assert_ne!(encrypted.digest, target.digest);

        // Every layer now carries the encrypted media type.
        let manifest: serde_json::Value =
            serde_json::from_slice(&store.read_blob(&encrypted.digest).unwrap()).unwrap();
        for layer in manifest["layers"].as_array().unwrap() {
            assert!(
                layer["mediaType"]
                    .as_str()
                    .unwrap()
                    .ends_with(ENCRYPTED_SUFFIX)
            );
        }

        let (decrypted, modified) = engine
            .decrypt_image(&store, &encrypted, &dec, &|_| true)
            .unwrap();
        assert!(modified);

        let manifest: serde_json::Value =
            serde_json::from_slice(&store.read_blob(&decrypted.digest).unwrap()).unwrap();
        let layers = manifest["layers"].as_array().unwrap();
        let first = store
            .read_blob(layers[0]["digest"].as_str().unwrap())
            .unwrap();
        assert_eq!(first, b"layer zero");
    }

    #[test]
    fn reencrypting_for_same_recipients_is_a_noop() {
        let (pub_pem, priv_key) = rsa_keypair();
        let (mut enc, dec) = jwe_configs(&pub_pem, &priv_key);
        enc.encrypt.attach_decrypt_config(dec.decrypt.clone());
        let engine = engine();
        let store = MemStore::new();

        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP)]);

        let (encrypted, modified) = engine
            .encrypt_image(&store, &target, &enc, &|_| true)
            .unwrap();
        assert!(modified);

        let (again, modified) = engine
            .encrypt_image(&store, &encrypted, &enc, &|_| true)
            .unwrap();
        assert!(!modified);
        assert_eq!(again, encrypted);
    }

    #[test]
    fn adding_a_recipient_rewraps_without_reencrypting() {
        let (pub_a, key_a) = rsa_keypair();
        let (pub_b, key_b) = rsa_keypair();
        let engine = engine();
        let store = MemStore::new();

        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP)]);

        let (enc_a, dec_a) = jwe_configs(&pub_a, &key_a);
        let (encrypted, _) = engine
            .encrypt_image(&store, &target, &enc_a, &|_| true)
            .unwrap();

        // Encrypt again for both recipients, decryptable with A's key.
        let mut enc_ab =
            CryptoConfig::encrypt_with_pub_keys(vec![pub_a.clone(), pub_b.clone()]);
        enc_ab.encrypt.attach_decrypt_config(dec_a.decrypt.clone());

        let (extended, modified) = engine
            .encrypt_image(&store, &encrypted, &enc_ab, &|_| true)
            .unwrap();
        assert!(modified);

        // B can now decrypt.
        let dec_b = CryptoConfig::decrypt_with_priv_keys(vec![key_b]);
        let (decrypted, modified) = engine
            .decrypt_image(&store, &extended, &dec_b, &|_| true)
            .unwrap();
        assert!(modified);

        let manifest: serde_json::Value =
            serde_json::from_slice(&store.read_blob(&decrypted.digest).unwrap()).unwrap();
        let first = store
            .read_blob(manifest["layers"][0]["digest"].as_str().unwrap())
            .unwrap();
        assert_eq!(first, b"layer zero");
    }

    #[test]
    fn decrypting_plaintext_image_is_a_noop() {
        let (_, priv_key) = rsa_keypair();
        let dec = CryptoConfig::decrypt_with_priv_keys(vec![priv_key]);
        let engine = engine();
        let store = MemStore::new();

        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP)]);
        let (result, modified) = engine
            .decrypt_image(&store, &target, &dec, &|_| true)
            .unwrap();

        assert!(!modified);
        assert_eq!(result, target);
    }

    #[test]
    fn empty_config_transforms_nothing() {
        let engine = engine();
        let store = MemStore::new();
        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP)]);

        let (result, modified) = engine
            .encrypt_image(&store, &target, &CryptoConfig::default(), &|_| true)
            .unwrap();
        assert!(!modified);
        assert_eq!(result, target);
    }

    #[test]
    fn filter_limits_the_transform() {
        let (pub_pem, _) = rsa_keypair();
        let enc = CryptoConfig::encrypt_with_pub_keys(vec![pub_pem]);
        let engine = engine();
        let store = MemStore::new();

        let target = build_manifest(&store, &[(b"layer zero", TAR_GZIP), (b"layer one", TAR_GZIP)]);

        // Only the second layer is selected.
        let manifest: serde_json::Value =
            serde_json::from_slice(&store.read_blob(&target.digest).unwrap()).unwrap();
        let selected = manifest["layers"][1]["digest"].as_str().unwrap().to_string();

        let (encrypted, modified) = engine
            .encrypt_image(&store, &target, &enc, &move |d| d.digest == selected)
            .unwrap();
        assert!(modified);

        let manifest: serde_json::Value =
            serde_json::from_slice(&store.read_blob(&encrypted.digest).unwrap()).unwrap();
        let layers = manifest["layers"].as_array().unwrap();
        assert!(!layers[0]["mediaType"].as_str().unwrap().ends_with(ENCRYPTED_SUFFIX));
        assert!(layers[1]["mediaType"].as_str().unwrap().ends_with(ENCRYPTED_SUFFIX));
    }

    #[test]
    fn decrypt_layer_streams_plaintext() {
        let (pub_pem, priv_key) = rsa_keypair();
        let (enc, dec) = jwe_configs(&pub_pem, &priv_key);
        let engine = engine();

        let blob = engine
            .encrypt_layer_blob(&enc.encrypt, b"streamed layer")
            .unwrap();

        let desc = Descriptor {
            media_type: format!("{TAR_GZIP}{ENCRYPTED_SUFFIX}"),
            digest: "sha256:irrelevant".to_string(),
            size: blob.len() as u64,
            platform: None,
        };

        let mut reader = engine
            .decrypt_layer(&dec.decrypt, Box::new(Cursor::new(blob)), &desc)
            .unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"streamed layer");
    }
}
