pub mod commands;
pub mod context;
pub mod output;

use clap::{Args, Parser, Subcommand};

/// Selectively encrypt and decrypt container image layers. Any
/// backend, any platform.
#[derive(Parser, Debug)]
#[command(name = "layerlock", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// OCI image layout directory to operate on
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Path to alternative config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Path to the gpg binary
    #[arg(long, global = true)]
    pub gpg_binary: Option<String>,

    /// GnuPG home directory for pgp recipients and keyrings
    #[arg(long, global = true)]
    pub gpg_homedir: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypt image layers for a set of recipients
    Encrypt {
        /// Image to encrypt
        image: String,
        /// Name to register the encrypted image under (default: replace
        /// the source image)
        new_name: Option<String>,

        /// Recipient of the image, as <protocol>:<value>
        /// (pgp:alice@example.com, jwe:/path/key.pem, pkcs7:/path/cert.pem)
        #[arg(long = "recipient")]
        recipients: Vec<String>,

        #[command(flatten)]
        selection: SelectionFlags,

        #[command(flatten)]
        decryption: DecryptionFlags,
    },

    /// Decrypt image layers with the supplied keys
    Decrypt {
        /// Image to decrypt
        image: String,
        /// Name to register the decrypted image under (default: replace
        /// the source image)
        new_name: Option<String>,

        #[command(flatten)]
        selection: SelectionFlags,

        #[command(flatten)]
        decryption: DecryptionFlags,
    },

    /// List an image's layers with their per-platform indices
    Layers {
        /// Image to inspect
        image: String,

        #[command(flatten)]
        selection: SelectionFlags,
    },

    /// Decrypt one layer for an external processor: payload envelope on
    /// fd 3, encrypted layer on stdin, plaintext on stdout
    Stream,
}

/// Layer and platform selection shared by encrypt, decrypt and layers.
#[derive(Args, Debug, Default)]
pub struct SelectionFlags {
    /// Layer to act on: a layer number, or a negative number counting
    /// from the topmost layer (-1). Default: all layers
    #[arg(long = "layer", allow_negative_numbers = true)]
    pub layers: Vec<i32>,

    /// Platform to act on, e.g. linux/amd64. Default: all platforms
    #[arg(long = "platform")]
    pub platforms: Vec<String>,
}

/// Decryption inputs shared by encrypt (for add-recipient flows) and
/// decrypt.
#[derive(Args, Debug, Default)]
pub struct DecryptionFlags {
    /// Private key or GPG secret keyring file, optionally with a
    /// password: <file>[:pass=<pwd>|:file=<pwdfile>|:fd=<descriptor>]
    #[arg(long = "key")]
    pub keys: Vec<String>,

    /// Recipient usable for decryption (pkcs7 certificates)
    #[arg(long = "dec-recipient")]
    pub dec_recipients: Vec<String>,
}
