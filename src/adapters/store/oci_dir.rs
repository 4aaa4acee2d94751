use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::core::errors::{LayerlockError, Result};
use crate::core::models::descriptor::{
    Descriptor, MEDIA_TYPE_IMAGE_INDEX, MEDIA_TYPE_IMAGE_MANIFEST,
};
use crate::core::models::image::ImageRecord;
use crate::core::models::platform::Platform;
use crate::core::traits::image_store::ImageStore;

const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// Image store over an OCI image-layout directory: `oci-layout`,
/// `index.json`, and content-addressed blobs under `blobs/<alg>/<hex>`.
/// Images are named through the standard `ref.name` annotation on
/// index entries.
pub struct OciDirStore {
    root: PathBuf,
}

impl OciDirStore {
    /// Open an existing layout directory.
    pub fn open(root: &Path) -> Result<Self> {
        let store = Self {
            root: root.to_path_buf(),
        };
        if !store.index_path().exists() {
            return Err(LayerlockError::Store {
                detail: format!(
                    "{} is not an OCI image layout (missing index.json)",
                    root.display()
                ),
            });
        }
        Ok(store)
    }

    /// Create the layout skeleton if it is not there yet.
    pub fn init(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;

        let layout_path = root.join("oci-layout");
        if !layout_path.exists() {
            fs::write(&layout_path, br#"{"imageLayoutVersion":"1.0.0"}"#)?;
        }

        let index_path = root.join("index.json");
        if !index_path.exists() {
            fs::write(&index_path, br#"{"schemaVersion":2,"manifests":[]}"#)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn blob_path(&self, digest: &str) -> Result<PathBuf> {
        let Some((algorithm, hex_part)) = digest.split_once(':') else {
            return Err(LayerlockError::Store {
                detail: format!("malformed digest '{digest}'"),
            });
        };
        Ok(self.root.join("blobs").join(algorithm).join(hex_part))
    }

    fn read_index(&self) -> Result<serde_json::Value> {
        let raw = fs::read(self.index_path())?;
        serde_json::from_slice(&raw).map_err(|e| LayerlockError::Store {
            detail: format!("could not parse index.json: {e}"),
        })
    }

    fn write_index(&self, index: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(index).map_err(|e| LayerlockError::Store {
            detail: format!("could not serialize index.json: {e}"),
        })?;
        fs::write(self.index_path(), bytes)?;
        Ok(())
    }

    fn entry_name(entry: &serde_json::Value) -> Option<&str> {
        entry
            .get("annotations")
            .and_then(|a| a.get(REF_NAME_ANNOTATION))
            .and_then(|v| v.as_str())
    }

    fn entry_to_record(entry: &serde_json::Value, name: &str) -> Result<ImageRecord> {
        let target: Descriptor =
            serde_json::from_value(entry.clone()).map_err(|e| LayerlockError::Store {
                detail: format!("bad index entry for '{name}': {e}"),
            })?;

        let mut labels = BTreeMap::new();
        if let Some(annotations) = entry.get("annotations").and_then(|a| a.as_object()) {
            for (key, value) in annotations {
                if key == REF_NAME_ANNOTATION {
                    continue;
                }
                if let Some(value) = value.as_str() {
                    labels.insert(key.clone(), value.to_string());
                }
            }
        }

        Ok(ImageRecord {
            name: name.to_string(),
            target,
            labels,
        })
    }

    /// Depth-first walk collecting layer descriptors in manifest order,
    /// tagging each with the platform of the manifest it came from.
    fn collect_layers(
        &self,
        desc: &Descriptor,
        platform: Option<&Platform>,
        out: &mut Vec<Descriptor>,
    ) -> Result<()> {
        let raw = self.read_blob(&desc.digest)?;
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| LayerlockError::Store {
                detail: format!("could not parse {}: {e}", desc.digest),
            })?;

        match desc.media_type.as_str() {
            MEDIA_TYPE_IMAGE_INDEX => {
                let Some(entries) = value.get("manifests").and_then(|m| m.as_array()) else {
                    return Err(LayerlockError::Store {
                        detail: format!("index {} has no manifests", desc.digest),
                    });
                };
                for entry in entries {
                    let child: Descriptor =
                        serde_json::from_value(entry.clone()).map_err(|e| {
                            LayerlockError::Store {
                                detail: format!("bad manifest entry in {}: {e}", desc.digest),
                            }
                        })?;
                    match child.media_type.as_str() {
                        MEDIA_TYPE_IMAGE_MANIFEST | MEDIA_TYPE_IMAGE_INDEX => {
                            let child_platform = child.platform.clone();
                            self.collect_layers(
                                &child,
                                child_platform.as_ref().or(platform),
                                out,
                            )?;
                        }
                        _ => continue,
                    }
                }
            }
            MEDIA_TYPE_IMAGE_MANIFEST => {
                let Some(layers) = value.get("layers").and_then(|l| l.as_array()) else {
                    return Err(LayerlockError::Store {
                        detail: format!("manifest {} has no layers", desc.digest),
                    });
                };
                for layer in layers {
                    let mut layer_desc: Descriptor =
                        serde_json::from_value(layer.clone()).map_err(|e| {
                            LayerlockError::Store {
                                detail: format!("bad layer entry in {}: {e}", desc.digest),
                            }
                        })?;
                    layer_desc.platform = platform.cloned();
                    out.push(layer_desc);
                }
            }
            other => {
                return Err(LayerlockError::Store {
                    detail: format!("unsupported target media type '{other}'"),
                });
            }
        }

        Ok(())
    }
}

impl ImageStore for OciDirStore {
    fn get(&self, name: &str) -> Result<ImageRecord> {
        let index = self.read_index()?;
        let entries = index
            .get("manifests")
            .and_then(|m| m.as_array())
            .ok_or_else(|| LayerlockError::Store {
                detail: "index.json has no manifests".to_string(),
            })?;

        for entry in entries {
            if Self::entry_name(entry) == Some(name) {
                return Self::entry_to_record(entry, name);
            }
        }

        Err(LayerlockError::ImageNotFound {
            name: name.to_string(),
        })
    }

    fn create(&self, record: ImageRecord) -> Result<ImageRecord> {
        let mut index = self.read_index()?;
        let entries = index
            .get_mut("manifests")
            .and_then(|m| m.as_array_mut())
            .ok_or_else(|| LayerlockError::Store {
                detail: "index.json has no manifests".to_string(),
            })?;

        // Re-registering a name replaces the previous record.
        entries.retain(|entry| Self::entry_name(entry) != Some(record.name.as_str()));

        let mut annotations = serde_json::Map::new();
        for (key, value) in &record.labels {
            annotations.insert(key.clone(), json!(value));
        }
        annotations.insert(REF_NAME_ANNOTATION.to_string(), json!(record.name));

        entries.push(json!({
            "mediaType": record.target.media_type,
            "digest": record.target.digest,
            "size": record.target.size,
            "annotations": annotations,
        }));

        self.write_index(&index)?;
        Ok(record)
    }

    fn layer_descriptors(&self, target: &Descriptor) -> Result<Vec<Descriptor>> {
        let mut out = Vec::new();
        self.collect_layers(target, None, &mut out)?;
        Ok(out)
    }

    fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(digest)?;
        fs::read(&path).map_err(|_| LayerlockError::Store {
            detail: format!("no blob {digest} in {}", self.root.display()),
        })
    }

    fn write_blob(&self, data: &[u8], media_type: &str) -> Result<Descriptor> {
        let digest = format!("sha256:{}", hex::encode(Sha256::digest(data)));
        let path = self.blob_path(&digest)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;

        Ok(Descriptor {
            media_type: media_type.to_string(),
            digest,
            size: data.len() as u64,
            platform: None,
        })
    }
}
