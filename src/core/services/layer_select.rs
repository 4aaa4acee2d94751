use crate::core::errors::Result;
use crate::core::models::descriptor::{Descriptor, LayerInfo};
use crate::core::models::platform::Platform;
use crate::core::traits::platform_match::PlatformMatcher;

/// Parse an array of platform specifier strings. A malformed specifier
/// fails the whole operation before any selection runs.
pub fn parse_platforms(specifiers: &[String]) -> Result<Vec<Platform>> {
    specifiers.iter().map(|s| Platform::parse(s)).collect()
}

/// Whether a layer is user-selected given its position in the owning
/// platform's sequence.
///
/// A layer can be described with its positive index (0 = bottommost)
/// or its negative index (-1 = topmost). An empty selector list means
/// "all layers".
pub fn is_user_selected_layer(layer_index: i32, layers_total: i32, layers: &[i32]) -> bool {
    if layers.is_empty() {
        return true;
    }
    let neg_number = layer_index - layers_total;

    layers.iter().any(|&l| l == neg_number || l == layer_index)
}

/// Whether a layer's platform satisfies the user's platform filter.
/// An empty filter means "all platforms"; an untagged layer cannot
/// satisfy a non-empty filter.
pub fn is_user_selected_platform(
    platform: Option<&Platform>,
    platform_list: &[Platform],
    matcher: &dyn PlatformMatcher,
) -> bool {
    if platform_list.is_empty() {
        return true;
    }
    let Some(platform) = platform else {
        return false;
    };

    platform_list.iter().any(|want| matcher.matches(platform, want))
}

/// Count the descriptors sharing `platform`, by exact value equality.
fn count_layers(descs: &[Descriptor], platform: Option<&Platform>) -> i32 {
    descs.iter().filter(|d| d.platform.as_ref() == platform).count() as i32
}

/// Single pass over the flat, manifest-ordered descriptor list of an
/// image: segment it into per-platform sequences and keep the
/// descriptors matching both the index and the platform filter.
///
/// Sequence segmentation resets on exact platform change; only the
/// user-facing platform filter uses compatibility matching. The two
/// notions differ on purpose.
pub fn filter_layer_descriptors(
    alldescs: &[Descriptor],
    layers: &[i32],
    platform_list: &[Platform],
    matcher: &dyn PlatformMatcher,
) -> (Vec<LayerInfo>, Vec<Descriptor>) {
    let mut layer_infos = Vec::new();
    let mut descs = Vec::new();

    let mut cur_platform: Option<Option<&Platform>> = None;
    let mut layer_index: i32 = 0;
    let mut layers_total: i32 = 0;

    for desc in alldescs {
        let platform = desc.platform.as_ref();
        if cur_platform != Some(platform) {
            cur_platform = Some(platform);
            layer_index = 0;
            layers_total = count_layers(alldescs, platform);
        } else {
            layer_index += 1;
        }

        if is_user_selected_layer(layer_index, layers_total, layers)
            && is_user_selected_platform(platform, platform_list, matcher)
        {
            layer_infos.push(LayerInfo {
                index: layer_index as u32,
                descriptor: desc.clone(),
            });
            descs.push(desc.clone());
        }
    }

    (layer_infos, descs)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Normalized-equality matcher, enough for selector tests.
    struct EqMatcher;

    impl PlatformMatcher for EqMatcher {
        fn matches(&self, have: &Platform, want: &Platform) -> bool {
            have.normalized() == want.normalized()
        }
    }

    fn layer(digest: &str, platform: Option<&str>) -> Descriptor {
        Descriptor {
            media_type: "application/vnd.oci.image.layer.v1.tar+gzip".to_string(),
            digest: format!("sha256:{digest}"),
            size: 100,
            platform: platform.map(|p| Platform::parse(p).unwrap()),
        }
    }

    /// 3 amd64 layers followed by 2 arm64 layers, manifest order.
    fn two_platform_image() -> Vec<Descriptor> {
        vec![
            layer("a0", Some("linux/amd64")),
            layer("a1", Some("linux/amd64")),
            layer("a2", Some("linux/amd64")),
            layer("b0", Some("linux/arm64")),
            layer("b1", Some("linux/arm64")),
        ]
    }

    #[test]
    fn empty_filters_select_every_descriptor() {
        let descs = two_platform_image();
        let (infos, selected) = filter_layer_descriptors(&descs, &[], &[], &EqMatcher);

        assert_eq!(selected.len(), 5);
        assert_eq!(
            infos.iter().map(|li| li.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 0, 1],
        );
    }

    #[test]
    fn negative_index_symmetry() {
        let descs = two_platform_image();

        // For every layer i of a platform with n layers, selecting i
        // and selecting i - n pick the same descriptors.
        for (total, platform) in [(3i32, "linux/amd64"), (2, "linux/arm64")] {
            let platforms = vec![Platform::parse(platform).unwrap()];
            for i in 0..total {
                let (_, positive) =
                    filter_layer_descriptors(&descs, &[i], &platforms, &EqMatcher);
                let (_, negative) =
                    filter_layer_descriptors(&descs, &[i - total], &platforms, &EqMatcher);
                assert_eq!(positive, negative, "index {i} of {platform}");
                assert_eq!(positive.len(), 1);
            }
        }
    }

    #[test]
    fn topmost_of_one_platform() {
        // Selector [-1] with platform filter ["linux/amd64"] picks
        // exactly the last amd64 layer (index 2).
        let descs = two_platform_image();
        let platforms = vec![Platform::parse("linux/amd64").unwrap()];

        let (infos, selected) = filter_layer_descriptors(&descs, &[-1], &platforms, &EqMatcher);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].digest, "sha256:a2");
        assert_eq!(infos[0].index, 2);
    }

    #[test]
    fn negative_index_resolves_per_platform() {
        // Without a platform filter, -1 is the topmost layer of EACH
        // platform, not of the global flattened list.
        let descs = two_platform_image();
        let (_, selected) = filter_layer_descriptors(&descs, &[-1], &[], &EqMatcher);

        let digests: Vec<_> = selected.iter().map(|d| d.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:a2", "sha256:b1"]);
    }

    #[test]
    fn platform_filter_uses_compat_matching() {
        // x86_64 is an alias of amd64; the filter accepts it.
        let descs = two_platform_image();
        let platforms = vec![Platform::parse("linux/x86_64").unwrap()];

        let (_, selected) = filter_layer_descriptors(&descs, &[], &platforms, &EqMatcher);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn single_platform_untagged_image_selects_by_index_only() {
        let descs = vec![layer("c0", None), layer("c1", None), layer("c2", None)];

        let (infos, selected) = filter_layer_descriptors(&descs, &[1], &[], &EqMatcher);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].digest, "sha256:c1");
        assert_eq!(infos[0].index, 1);
    }

    #[test]
    fn untagged_layers_fail_a_platform_filter() {
        let descs = vec![layer("c0", None)];
        let platforms = vec![Platform::parse("linux/amd64").unwrap()];

        let (_, selected) = filter_layer_descriptors(&descs, &[], &platforms, &EqMatcher);
        assert!(selected.is_empty());
    }

    #[test]
    fn out_of_range_selector_selects_nothing() {
        let descs = two_platform_image();
        let (_, selected) = filter_layer_descriptors(&descs, &[7], &[], &EqMatcher);
        assert!(selected.is_empty());
    }

    #[test]
    fn parse_platforms_propagates_parse_errors() {
        assert!(parse_platforms(&["linux//v7".to_string()]).is_err());
        assert!(parse_platforms(&["linux/amd64".to_string()]).is_ok());
    }
}
