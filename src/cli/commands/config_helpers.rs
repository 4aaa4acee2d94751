use crate::adapters::crypt::gpg::GpgClient;
use crate::cli::DecryptionFlags;
use crate::core::errors::{LayerlockError, Result};
use crate::core::models::crypto_config::CryptoConfig;
use crate::core::services::classifier;
use crate::core::traits::key_probe::KeyProbe;

/// Build the combined encrypt configuration from `--recipient` inputs,
/// with the decryption flags attached so an already-encrypted image
/// stays decryptable when recipients are added.
pub fn build_encrypt_config(
    recipients: &[String],
    flags: &DecryptionFlags,
    gpg: &GpgClient,
    probe: &dyn KeyProbe,
) -> Result<CryptoConfig> {
    let set = classifier::classify_recipients(recipients, probe)?;

    let mut configs = Vec::new();
    if !set.pgp_identities.is_empty() {
        if !gpg.is_available() {
            return Err(LayerlockError::InvalidConfig {
                detail: "pgp recipients given but gpg is not installed or not found in PATH"
                    .to_string(),
            });
        }
        configs.push(CryptoConfig::encrypt_with_pgp(set.pgp_identities));
    }
    if !set.certs.is_empty() {
        configs.push(CryptoConfig::encrypt_with_certs(set.certs));
    }
    if !set.pub_keys.is_empty() {
        configs.push(CryptoConfig::encrypt_with_pub_keys(set.pub_keys));
    }

    let mut config = CryptoConfig::combine(configs);

    let decrypt = build_decrypt_config(flags, gpg, probe)?;
    if !decrypt.decrypt.is_empty() {
        config.encrypt.attach_decrypt_config(decrypt.decrypt);
    }

    Ok(config)
}

/// Build the combined decrypt configuration from `--key` and
/// `--dec-recipient` inputs. With no explicit keys and gpg installed,
/// the local default keyring is offered for pgp-wrapped layers.
pub fn build_decrypt_config(
    flags: &DecryptionFlags,
    gpg: &GpgClient,
    probe: &dyn KeyProbe,
) -> Result<CryptoConfig> {
    // x509 certs are needed to pick the matching pkcs7 envelope.
    let recipients = classifier::classify_recipients(&flags.dec_recipients, probe)?;
    let keys = classifier::classify_private_keys(&flags.keys, probe)?;

    let mut configs = Vec::new();

    if !keys.gpg_keyrings.is_empty() {
        configs.push(CryptoConfig::decrypt_with_gpg_keyrings(keys.gpg_keyrings));
    } else if keys.private_keys.is_empty() && gpg.is_available() {
        // Fall back to the user's own keyring only when no private key
        // material was passed at all.
        configs.push(CryptoConfig::decrypt_with_gpg_keyrings(Vec::new()));
    }

    if !recipients.certs.is_empty() {
        configs.push(CryptoConfig::decrypt_with_certs(recipients.certs));
    }
    if !keys.private_keys.is_empty() {
        configs.push(CryptoConfig::decrypt_with_priv_keys(keys.private_keys));
    }

    Ok(CryptoConfig::combine(configs))
}
