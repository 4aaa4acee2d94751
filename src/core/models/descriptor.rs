use serde::{Deserialize, Serialize};

use crate::core::models::platform::Platform;

/// Media-type suffix marking a layer blob as encrypted.
pub const ENCRYPTED_SUFFIX: &str = "+encrypted";

pub const MEDIA_TYPE_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// Content address of a blob: digest, size and media type, optionally
/// tagged with the target platform it was resolved from. Field names
/// follow the OCI descriptor JSON shape. Immutable once obtained from
/// an image manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Descriptor {
    /// Whether this descriptor points at an encrypted layer blob.
    pub fn is_encrypted(&self) -> bool {
        self.media_type.ends_with(ENCRYPTED_SUFFIX)
    }
}

/// An image layer paired with its position in the owning platform's
/// layer sequence, starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub index: u32,
    pub descriptor: Descriptor,
}
