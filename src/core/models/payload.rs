use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::errors::{LayerlockError, Result};
use crate::core::models::crypto_config::DecryptConfig;
use crate::core::models::descriptor::Descriptor;

/// Type identifier of the processor payload envelope.
pub const PAYLOAD_TYPE_URL: &str = "dev.layerlock.v1.ProcessorPayload";

/// Everything an external layer processor needs to decrypt one layer:
/// the layer's descriptor and the decrypt configuration that can unwrap
/// its key. Constructed once per layer, serialized, transmitted over
/// the side channel and deserialized exactly once by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorPayload {
    pub decrypt_config: DecryptConfig,
    pub descriptor: Descriptor,
}

/// Self-describing envelope the payload travels in. The receiver checks
/// the type tag before touching the value.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    type_url: String,
    value: serde_json::Value,
}

/// Registry of payload types a receiver accepts.
///
/// Registration is an explicit initialization step the host performs
/// once before using the side channel; there is no process-wide
/// registry populated at load time.
#[derive(Debug, Default)]
pub struct PayloadRegistry {
    known: BTreeSet<String>,
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a registry that already accepts the processor payload
    /// type — what both ends of the side channel want.
    pub fn with_default_types() -> Self {
        let mut registry = Self::new();
        registry.register(PAYLOAD_TYPE_URL);
        registry
    }

    pub fn register(&mut self, type_url: &str) {
        self.known.insert(type_url.to_string());
    }

    /// Serialize a payload into its type-tagged envelope.
    pub fn marshal(&self, payload: &ProcessorPayload) -> Result<Vec<u8>> {
        if !self.known.contains(PAYLOAD_TYPE_URL) {
            return Err(LayerlockError::PayloadType {
                type_url: PAYLOAD_TYPE_URL.to_string(),
            });
        }

        let envelope = Envelope {
            type_url: PAYLOAD_TYPE_URL.to_string(),
            value: serde_json::to_value(payload).map_err(|e| LayerlockError::EncryptionFailed {
                reason: format!("could not marshal processor payload: {e}"),
            })?,
        };

        serde_json::to_vec(&envelope).map_err(|e| LayerlockError::EncryptionFailed {
            reason: format!("could not marshal payload envelope: {e}"),
        })
    }

    /// Deserialize a type-tagged envelope, rejecting any type tag other
    /// than the registered processor payload type.
    pub fn unmarshal(&self, data: &[u8]) -> Result<ProcessorPayload> {
        let envelope: Envelope =
            serde_json::from_slice(data).map_err(|e| LayerlockError::Transport {
                fd: 3,
                detail: format!("could not parse payload envelope: {e}"),
            })?;

        if envelope.type_url != PAYLOAD_TYPE_URL || !self.known.contains(&envelope.type_url) {
            return Err(LayerlockError::PayloadType {
                type_url: envelope.type_url,
            });
        }

        serde_json::from_value(envelope.value).map_err(|e| LayerlockError::Transport {
            fd: 3,
            detail: format!("malformed processor payload: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::crypto_config::DecryptBackend;
    use crate::core::models::key_entry::KeyEntry;

    fn sample_payload() -> ProcessorPayload {
        ProcessorPayload {
            decrypt_config: DecryptConfig {
                backends: vec![DecryptBackend::PrivateKey {
                    keys: vec![KeyEntry {
                        data: b"some pem".to_vec(),
                        password: Some(b"hunter2".to_vec()),
                    }],
                }],
            },
            descriptor: Descriptor {
                media_type: "application/vnd.oci.image.layer.v1.tar+gzip+encrypted".to_string(),
                digest: "sha256:deadbeef".to_string(),
                size: 1234,
                platform: None,
            },
        }
    }

    #[test]
    fn marshal_unmarshal_round_trip() {
        let registry = PayloadRegistry::with_default_types();
        let payload = sample_payload();

        let bytes = registry.marshal(&payload).unwrap();
        let back = registry.unmarshal(&bytes).unwrap();

        assert_eq!(back, payload);
    }

    #[test]
    fn altered_type_tag_is_rejected_by_name() {
        let registry = PayloadRegistry::with_default_types();
        let bytes = registry.marshal(&sample_payload()).unwrap();

        let tampered = String::from_utf8(bytes)
            .unwrap()
            .replace(PAYLOAD_TYPE_URL, "dev.layerlock.v1.SomethingElse");

        let err = registry.unmarshal(tampered.as_bytes()).unwrap_err();
        match err {
            LayerlockError::PayloadType { type_url } => {
                assert_eq!(type_url, "dev.layerlock.v1.SomethingElse");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unregistered_receiver_rejects_valid_payload() {
        let sender = PayloadRegistry::with_default_types();
        let receiver = PayloadRegistry::new();

        let bytes = sender.marshal(&sample_payload()).unwrap();
        assert!(receiver.unmarshal(&bytes).is_err());
    }

    #[test]
    fn garbage_bytes_are_a_transport_error() {
        let registry = PayloadRegistry::with_default_types();
        let err = registry.unmarshal(b"not json").unwrap_err();
        assert!(matches!(err, LayerlockError::Transport { .. }));
    }
}
