use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::models::descriptor::Descriptor;

/// A named image record as registered with the image store: the name it
/// resolves under, the top-level target descriptor (manifest or index),
/// and its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub target: Descriptor,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}
