use crate::adapters::platform::compat_matcher::CompatMatcher;
use crate::adapters::store::oci_dir::OciDirStore;
use crate::cli::{SelectionFlags, context, output};
use crate::core::errors::Result;
use crate::core::services::layer_select;
use crate::core::traits::image_store::ImageStore;

/// Execute the `layerlock layers` command: print the per-platform
/// layer table of an image, honoring the same selection flags the
/// encrypt and decrypt commands take.
pub fn execute(image_name: &str, selection: &SelectionFlags) -> Result<()> {
    let store = OciDirStore::open(&context::store_dir())?;
    let image = store.get(image_name)?;

    let platform_list = layer_select::parse_platforms(&selection.platforms)?;
    let alldescs = store.layer_descriptors(&image.target)?;
    let (infos, _) = layer_select::filter_layer_descriptors(
        &alldescs,
        &selection.layers,
        &platform_list,
        &CompatMatcher,
    );

    output::header(&format!("Layers of {image_name}"));
    println!(
        "  {:>5}  {:<16}  {:<9}  {:>10}  {}",
        "INDEX", "PLATFORM", "ENCRYPTED", "SIZE", "DIGEST"
    );

    for info in &infos {
        let platform = info
            .descriptor
            .platform
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let encrypted = if info.descriptor.is_encrypted() {
            "yes"
        } else {
            "no"
        };
        println!(
            "  {:>5}  {:<16}  {:<9}  {:>10}  {}",
            info.index, platform, encrypted, info.descriptor.size, info.descriptor.digest
        );
    }

    if infos.is_empty() {
        output::warning("No layers match the given selection");
    }

    Ok(())
}
