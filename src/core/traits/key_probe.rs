use crate::core::errors::Result;

/// Port for sniffing the shape of key and certificate material.
///
/// The classifier decides buckets with these probes; the probes never
/// decide buckets themselves.
pub trait KeyProbe: Send + Sync {
    /// Whether the bytes parse as a PEM public key.
    fn is_public_key(&self, data: &[u8]) -> bool;

    /// Whether the bytes parse as a PEM x509 certificate.
    fn is_certificate(&self, data: &[u8]) -> bool;

    /// Whether the bytes parse as a private key, unlocked with the
    /// given password if one was supplied. A wrong or missing password
    /// is an error (`WrongPassword`), distinct from "not a private
    /// key at all" which is `Ok(false)`.
    fn is_private_key(&self, data: &[u8], password: Option<&[u8]>) -> Result<bool>;

    /// Whether the bytes look like a GPG secret keyring.
    fn is_gpg_keyring(&self, data: &[u8]) -> bool;
}
