use crate::core::models::platform::Platform;
use crate::core::traits::platform_match::PlatformMatcher;

/// Compatibility matcher for the user-facing platform filter: two
/// platforms match when their normalized os/arch/variant agree, so
/// `linux/x86_64` selects layers tagged `linux/amd64` and `linux/arm64`
/// selects `linux/arm64/v8`.
pub struct CompatMatcher;

impl PlatformMatcher for CompatMatcher {
    fn matches(&self, have: &Platform, want: &Platform) -> bool {
        let have = have.normalized();
        let want = want.normalized();

        have.os == want.os
            && have.architecture == want.architecture
            && have.variant == want.variant
    }
}
