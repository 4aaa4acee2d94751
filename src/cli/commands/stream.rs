use crate::adapters::crypt::engine::CryptoEngine;
use crate::adapters::stream::fd_transport;
use crate::cli::context;
use crate::core::errors::Result;
use crate::core::models::payload::PayloadRegistry;
use crate::core::traits::layer_crypto::LayerCrypto;

/// Execute the `layerlock stream` command.
///
/// The invoking processor hands over one payload envelope on fd 3 and
/// the encrypted layer bytes on stdin; the plaintext goes to stdout in
/// fixed-size chunks.
pub fn execute() -> Result<()> {
    let registry = PayloadRegistry::with_default_types();

    let data = fd_transport::read_payload(fd_transport::PAYLOAD_FD)?;
    let payload = registry.unmarshal(&data)?;

    let engine = CryptoEngine::new(context::gpg_client());

    let stdin = std::io::stdin();
    let plaintext = engine.decrypt_layer(
        &payload.decrypt_config,
        Box::new(stdin.lock()),
        &payload.descriptor,
    )?;

    let stdout = std::io::stdout();
    fd_transport::copy_chunks(plaintext, stdout.lock())?;

    Ok(())
}
