use std::collections::BTreeSet;

use crate::core::errors::Result;
use crate::core::models::crypto_config::CryptoConfig;
use crate::core::models::descriptor::Descriptor;
use crate::core::models::image::ImageRecord;
use crate::core::services::layer_select;
use crate::core::traits::image_store::ImageStore;
use crate::core::traits::layer_crypto::LayerCrypto;
use crate::core::traits::lease::LeaseManager;
use crate::core::traits::platform_match::PlatformMatcher;

/// Drives end-to-end encryption or decryption of a whole image:
/// resolves the layer filter, runs the per-layer transform under a
/// lease, and registers a new image record if anything changed.
pub struct ImageCryptoService<'a> {
    pub store: &'a dyn ImageStore,
    pub crypto: &'a dyn LayerCrypto,
    pub leases: &'a dyn LeaseManager,
    pub matcher: &'a dyn PlatformMatcher,
}

enum Direction {
    Encrypt,
    Decrypt,
}

impl ImageCryptoService<'_> {
    /// Encrypt the selected layers of `image` and register the result
    /// under `new_name`. Returns the original record untouched when the
    /// image is already in the desired state.
    pub fn encrypt(
        &self,
        image: &ImageRecord,
        new_name: &str,
        config: &CryptoConfig,
        platforms: &[String],
        layers: &[i32],
    ) -> Result<ImageRecord> {
        self.run(image, new_name, config, platforms, layers, Direction::Encrypt)
    }

    /// Symmetric counterpart of [`ImageCryptoService::encrypt`].
    pub fn decrypt(
        &self,
        image: &ImageRecord,
        new_name: &str,
        config: &CryptoConfig,
        platforms: &[String],
        layers: &[i32],
    ) -> Result<ImageRecord> {
        self.run(image, new_name, config, platforms, layers, Direction::Decrypt)
    }

    fn run(
        &self,
        image: &ImageRecord,
        new_name: &str,
        config: &CryptoConfig,
        platforms: &[String],
        layers: &[i32],
        direction: Direction,
    ) -> Result<ImageRecord> {
        let platform_list = layer_select::parse_platforms(platforms)?;

        let alldescs = self.store.layer_descriptors(&image.target)?;
        let (_, selected) =
            layer_select::filter_layer_descriptors(&alldescs, layers, &platform_list, self.matcher);

        // Digests are the canonical equality key for descriptors.
        let digests: BTreeSet<String> = selected.into_iter().map(|d| d.digest).collect();
        let filter = move |d: &Descriptor| digests.contains(&d.digest);

        // Held for the whole mutation; dropped (and thereby released)
        // on every exit path below.
        let _lease = self.leases.acquire()?;

        let (target, modified) = match direction {
            Direction::Encrypt => {
                self.crypto
                    .encrypt_image(self.store, &image.target, config, &filter)?
            }
            Direction::Decrypt => {
                self.crypto
                    .decrypt_image(self.store, &image.target, config, &filter)?
            }
        };

        if !modified {
            return Ok(image.clone());
        }

        self.store.create(ImageRecord {
            name: new_name.to_string(),
            target,
            labels: image.labels.clone(),
        })
    }
}
