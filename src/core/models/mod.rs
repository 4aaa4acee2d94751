pub mod audit_entry;
pub mod b64;
pub mod crypto_config;
pub mod descriptor;
pub mod image;
pub mod key_entry;
pub mod payload;
pub mod platform;
pub mod recipient;
