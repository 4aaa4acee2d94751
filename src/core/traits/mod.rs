pub mod audit;
pub mod image_store;
pub mod key_probe;
pub mod layer_crypto;
pub mod lease;
pub mod platform_match;
