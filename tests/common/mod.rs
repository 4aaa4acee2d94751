//! Shared helpers for the CLI tests: build a real OCI image-layout
//! directory with named images, and generate key material.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};

pub const MEDIA_TYPE_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

pub const REF_NAME: &str = "org.opencontainers.image.ref.name";

/// Write a blob into `<root>/blobs/sha256/<hex>`, returning (digest, size).
pub fn write_blob(root: &Path, data: &[u8]) -> (String, u64) {
    let hex_digest = hex::encode(Sha256::digest(data));
    let dir = root.join("blobs").join("sha256");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(&hex_digest), data).unwrap();
    (format!("sha256:{hex_digest}"), data.len() as u64)
}

pub fn read_blob(root: &Path, digest: &str) -> Vec<u8> {
    let hex_part = digest.strip_prefix("sha256:").unwrap();
    std::fs::read(root.join("blobs").join("sha256").join(hex_part)).unwrap()
}

pub fn read_index(root: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(root.join("index.json")).unwrap()).unwrap()
}

fn write_layout_skeleton(root: &Path) {
    std::fs::create_dir_all(root).unwrap();
    let layout = root.join("oci-layout");
    if !layout.exists() {
        std::fs::write(layout, br#"{"imageLayoutVersion":"1.0.0"}"#).unwrap();
    }
    let index = root.join("index.json");
    if !index.exists() {
        std::fs::write(
            index,
            serde_json::to_vec(&json!({"schemaVersion": 2, "manifests": []})).unwrap(),
        )
        .unwrap();
    }
}

fn write_manifest(root: &Path, layers: &[&[u8]]) -> (String, u64) {
    let (config_digest, config_size) = write_blob(root, b"{}");
    let layer_entries: Vec<serde_json::Value> = layers
        .iter()
        .map(|data| {
            let (digest, size) = write_blob(root, data);
            json!({"mediaType": MEDIA_TYPE_TAR_GZIP, "digest": digest, "size": size})
        })
        .collect();

    let manifest = json!({
        "schemaVersion": 2,
        "mediaType": MEDIA_TYPE_MANIFEST,
        "config": {"mediaType": MEDIA_TYPE_CONFIG, "digest": config_digest, "size": config_size},
        "layers": layer_entries,
    });
    write_blob(root, &serde_json::to_vec(&manifest).unwrap())
}

fn register(root: &Path, name: &str, media_type: &str, digest: &str, size: u64) {
    let mut index = read_index(root);
    index["manifests"].as_array_mut().unwrap().push(json!({
        "mediaType": media_type,
        "digest": digest,
        "size": size,
        "annotations": {REF_NAME: name},
    }));
    std::fs::write(root.join("index.json"), serde_json::to_vec(&index).unwrap()).unwrap();
}

/// A named single-platform image: one manifest, the given layer blobs.
pub fn single_platform_image(root: &Path, name: &str, layers: &[&[u8]]) {
    write_layout_skeleton(root);
    let (digest, size) = write_manifest(root, layers);
    register(root, name, MEDIA_TYPE_MANIFEST, &digest, size);
}

/// A named two-platform image: linux/amd64 with `amd64_layers`, then
/// linux/arm64 with `arm64_layers`, behind a nested index.
pub fn multi_platform_image(root: &Path, name: &str, amd64_layers: &[&[u8]], arm64_layers: &[&[u8]]) {
    write_layout_skeleton(root);
    let (amd64_digest, amd64_size) = write_manifest(root, amd64_layers);
    let (arm64_digest, arm64_size) = write_manifest(root, arm64_layers);

    let index = json!({
        "schemaVersion": 2,
        "mediaType": MEDIA_TYPE_INDEX,
        "manifests": [
            {
                "mediaType": MEDIA_TYPE_MANIFEST,
                "digest": amd64_digest, "size": amd64_size,
                "platform": {"os": "linux", "architecture": "amd64"},
            },
            {
                "mediaType": MEDIA_TYPE_MANIFEST,
                "digest": arm64_digest, "size": arm64_size,
                "platform": {"os": "linux", "architecture": "arm64"},
            },
        ],
    });
    let (digest, size) = write_blob(root, &serde_json::to_vec(&index).unwrap());
    register(root, name, MEDIA_TYPE_INDEX, &digest, size);
}

/// Look an image up by name and return its target (media type, digest).
pub fn image_target(root: &Path, name: &str) -> Option<(String, String)> {
    let index = read_index(root);
    for entry in index["manifests"].as_array().unwrap() {
        if entry["annotations"][REF_NAME].as_str() == Some(name) {
            return Some((
                entry["mediaType"].as_str().unwrap().to_string(),
                entry["digest"].as_str().unwrap().to_string(),
            ));
        }
    }
    None
}

/// The layer entries of the manifest an image name points at. For an
/// index target, returns the first platform's layers.
pub fn image_layers(root: &Path, name: &str) -> Vec<serde_json::Value> {
    let (media_type, digest) = image_target(root, name).expect("image not registered");
    let manifest_digest = if media_type == MEDIA_TYPE_INDEX {
        let index: serde_json::Value = serde_json::from_slice(&read_blob(root, &digest)).unwrap();
        index["manifests"][0]["digest"].as_str().unwrap().to_string()
    } else {
        digest
    };

    let manifest: serde_json::Value =
        serde_json::from_slice(&read_blob(root, &manifest_digest)).unwrap();
    manifest["layers"].as_array().unwrap().clone()
}

/// Generate an RSA keypair and write `pub.pem` / `priv.pem` into `dir`.
pub fn rsa_keypair_files(dir: &Path) -> (PathBuf, PathBuf) {
    let pkey = openssl::pkey::PKey::from_rsa(openssl::rsa::Rsa::generate(2048).unwrap()).unwrap();

    let pub_path = dir.join("pub.pem");
    let priv_path = dir.join("priv.pem");
    std::fs::write(&pub_path, pkey.public_key_to_pem().unwrap()).unwrap();
    std::fs::write(&priv_path, pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();

    (pub_path, priv_path)
}
