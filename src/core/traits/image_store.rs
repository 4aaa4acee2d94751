use crate::core::errors::Result;
use crate::core::models::descriptor::Descriptor;
use crate::core::models::image::ImageRecord;

/// Port for the image metadata service and its content-addressable
/// blob store.
///
/// Implementations live in `adapters::store` (e.g. OciDirStore). The
/// core layer only depends on this trait, never on a concrete store.
pub trait ImageStore: Send + Sync {
    /// Resolve an image record by name.
    fn get(&self, name: &str) -> Result<ImageRecord>;

    /// Register an image record under its name, replacing any existing
    /// record with the same name. Returns the stored record.
    fn create(&self, record: ImageRecord) -> Result<ImageRecord>;

    /// The flat list of layer descriptors reachable from `target`,
    /// covering all platforms in manifest order. Descriptors from a
    /// multi-platform index are tagged with their manifest's platform.
    fn layer_descriptors(&self, target: &Descriptor) -> Result<Vec<Descriptor>>;

    /// Read a blob by digest.
    fn read_blob(&self, digest: &str) -> Result<Vec<u8>>;

    /// Write a blob, returning its content-addressed descriptor with
    /// the given media type.
    fn write_blob(&self, data: &[u8], media_type: &str) -> Result<Descriptor>;
}
