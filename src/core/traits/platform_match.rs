use crate::core::models::platform::Platform;

/// Port for platform-compatibility matching, used by the user-facing
/// platform filter. Index-sequence segmentation in the layer selector
/// deliberately does NOT go through this — it uses exact equality.
pub trait PlatformMatcher: Send + Sync {
    /// Whether a layer tagged `have` satisfies a request for `want`.
    fn matches(&self, have: &Platform, want: &Platform) -> bool;
}
