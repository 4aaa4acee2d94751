pub mod classifier;
pub mod image_crypto;
pub mod layer_select;
