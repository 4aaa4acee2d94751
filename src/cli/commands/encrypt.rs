use crate::adapters::crypt::engine::CryptoEngine;
use crate::adapters::keys::openssl_probe::OpensslKeyProbe;
use crate::adapters::platform::compat_matcher::CompatMatcher;
use crate::adapters::store::file_lease::FileLeaseManager;
use crate::adapters::store::oci_dir::OciDirStore;
use crate::cli::{DecryptionFlags, SelectionFlags, context, output};
use crate::core::errors::{LayerlockError, Result};
use crate::core::models::audit_entry::AuditAction;
use crate::core::services::image_crypto::ImageCryptoService;
use crate::core::traits::image_store::ImageStore;

/// Execute the `layerlock encrypt` command.
///
/// Encrypts the selected layers for the given recipients and registers
/// the result; with no explicit new name the source image is replaced.
pub fn execute(
    image_name: &str,
    new_name: Option<&str>,
    recipients: &[String],
    selection: &SelectionFlags,
    decryption: &DecryptionFlags,
) -> Result<()> {
    if recipients.is_empty() {
        return Err(LayerlockError::InvalidConfig {
            detail: "no recipients given -- nothing to do".to_string(),
        });
    }

    let store = OciDirStore::open(&context::store_dir())?;
    let image = store.get(image_name)?;

    let gpg = context::gpg_client();
    let config =
        super::config_helpers::build_encrypt_config(recipients, decryption, &gpg, &OpensslKeyProbe)?;

    let engine = CryptoEngine::new(gpg);
    let leases = FileLeaseManager::new(&context::store_dir());
    let service = ImageCryptoService {
        store: &store,
        crypto: &engine,
        leases: &leases,
        matcher: &CompatMatcher,
    };

    let new_name = new_name.unwrap_or(image_name);
    output::detail(&format!("Store: {}", context::store_display()));
    for recipient in recipients {
        output::detail(&format!("Recipient: {recipient}"));
    }

    let sp = output::spinner(&format!(
        "Encrypting {image_name} for {} recipient(s)...",
        recipients.len()
    ));
    let result = service.encrypt(
        &image,
        new_name,
        &config,
        &selection.platforms,
        &selection.layers,
    );
    let record = match result {
        Ok(record) => record,
        Err(e) => {
            sp.finish_and_clear();
            return Err(e);
        }
    };

    if record.target == image.target {
        output::finish_spinner(sp, &format!("{image_name} is already encrypted; nothing to do"));
        return Ok(());
    }

    output::finish_spinner(
        sp,
        &format!(
            "Encrypted {image_name} for {} recipient(s)",
            recipients.len()
        ),
    );
    output::success(&format!("Registered {}", record.name));

    super::audit_helpers::log_audit(
        AuditAction::Encrypt,
        image_name,
        Some(record.name.clone()),
        Some(format!("{} recipient(s)", recipients.len())),
    );

    Ok(())
}
