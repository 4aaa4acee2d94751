use std::path::PathBuf;

/// All domain errors for Layerlock.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum LayerlockError {
    #[error(
        "Invalid recipient format: '{spec}'\n\n  \
         Recipients must be given as <protocol>:<value>, e.g.\n    \
         pgp:alice@example.com\n    \
         jwe:/path/to/pubkey.pem\n    \
         pkcs7:/path/to/cert.pem"
    )]
    InvalidRecipientFormat { spec: String },

    #[error("Recipient protocol '{protocol}' not recognized (expected pgp, jwe or pkcs7)")]
    UnsupportedProtocol { protocol: String },

    #[error("File {path} is not a public key")]
    NotAPublicKey { path: PathBuf },

    #[error("File {path} is not an x509 certificate")]
    NotACertificate { path: PathBuf },

    #[error(
        "Wrong or missing password for private key {path}\n\n  \
         Pass the password with one of:\n    \
         --key <file>:pass=<password>\n    \
         --key <file>:file=<passwordfile>\n    \
         --key <file>:fd=<descriptor>"
    )]
    WrongPassword { path: PathBuf },

    #[error("Unidentified private key in file {path}")]
    UnidentifiedKey { path: PathBuf },

    #[error("Could not parse file descriptor '{fd}' in password specifier")]
    InvalidPasswordFd { fd: String },

    #[error("Invalid platform specifier '{specifier}': {detail}")]
    PlatformParse { specifier: String, detail: String },

    #[error("Image '{name}' not found in store")]
    ImageNotFound { name: String },

    #[error("Payload type '{type_url}' is not registered with this receiver")]
    PayloadType { type_url: String },

    #[error("Side-channel descriptor {fd} is invalid: {detail}")]
    Transport { fd: i32, detail: String },

    #[error("Could not acquire lease: {detail}")]
    LeaseFailed { detail: String },

    #[error("Encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    #[error("Malformed encrypted layer: {detail}")]
    MalformedLayer { detail: String },

    #[error(
        "Decryption failed: no matching key\n\n  \
         None of the supplied private keys, certificates or GPG keyrings\n  \
         can unwrap this layer's key. Check --key and --dec-recipient."
    )]
    DecryptionNoKey,

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Store error: {detail}")]
    Store { detail: String },

    #[error("Audit log error: {detail}")]
    AuditError { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LayerlockError>;
