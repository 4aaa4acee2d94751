use std::io::Read;

use crate::core::errors::Result;
use crate::core::models::crypto_config::{CryptoConfig, DecryptConfig};
use crate::core::models::descriptor::Descriptor;
use crate::core::traits::image_store::ImageStore;

/// Predicate selecting which layer descriptors an operation acts on.
pub type LayerFilter<'a> = dyn Fn(&Descriptor) -> bool + 'a;

/// Port for the per-layer cryptographic transform.
///
/// The whole-image operations walk the manifest tree under `target`,
/// transform every layer the filter selects, and return the new target
/// descriptor plus a flag telling whether anything changed. An
/// unchanged image is a supported no-op, not an error.
pub trait LayerCrypto: Send + Sync {
    fn encrypt_image(
        &self,
        store: &dyn ImageStore,
        target: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
    ) -> Result<(Descriptor, bool)>;

    fn decrypt_image(
        &self,
        store: &dyn ImageStore,
        target: &Descriptor,
        config: &CryptoConfig,
        filter: &LayerFilter,
    ) -> Result<(Descriptor, bool)>;

    /// Decrypt a single layer read from `input`, returning the
    /// plaintext stream. Used by the side-channel receiver.
    fn decrypt_layer<'a>(
        &self,
        config: &DecryptConfig,
        input: Box<dyn Read + 'a>,
        descriptor: &Descriptor,
    ) -> Result<Box<dyn Read + 'a>>;
}
