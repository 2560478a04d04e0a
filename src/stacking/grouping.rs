use super::criteria::{CriterionSpec, KeyMiss, resolve};
use super::{Asset, CriteriaKey, Group};
use crate::error::StackError;
use tracing::debug;

/// Samples reported with a criteria mismatch
const MAX_SAMPLES: usize = 5;

/// Group assets sharing an identical criteria key.
///
/// Only groups with at least two members are returned, in key order; members
/// keep their input order. Unmatched assets are dropped when `skip_unmatched`
/// is set. Otherwise any regex mismatch, or any group of unmatched assets,
/// fails the whole call once grouping is complete.
pub fn group_assets(
    assets: Vec<Asset>,
    criteria: &[CriterionSpec],
    skip_unmatched: bool,
) -> Result<Vec<Group>, StackError> {
    let total = assets.len();
    let mut regex_misses: Vec<(String, String)> = Vec::new();

    let mut keyed: Vec<(CriteriaKey, Asset)> = assets
        .into_iter()
        .map(|asset| {
            let key = match resolve(&asset, criteria) {
                Ok(parts) => CriteriaKey::Matched(parts),
                Err(KeyMiss::RegexMismatch { value, pattern }) => {
                    regex_misses.push((value, pattern));
                    CriteriaKey::Unmatched
                }
                Err(_) => CriteriaKey::Unmatched,
            };
            (key, asset)
        })
        .collect();

    if skip_unmatched {
        keyed.retain(|(key, _)| key.is_matched());
    }

    // stable: equal keys keep their input order
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: Vec<Group> = Vec::new();
    for (key, asset) in keyed {
        match groups.last_mut() {
            Some(group) if group.key == key => group.assets.push(asset),
            _ => groups.push(Group {
                key,
                assets: vec![asset],
            }),
        }
    }

    let candidates = groups.len();
    groups.retain(|group| group.assets.len() > 1);

    debug!(
        "Grouped {} assets into {} candidate groups, {} stackable",
        total,
        candidates,
        groups.len()
    );

    if !skip_unmatched {
        validate(&groups, &regex_misses)?;
    }

    Ok(groups)
}

fn validate(groups: &[Group], regex_misses: &[(String, String)]) -> Result<(), StackError> {
    if let Some((_, pattern)) = regex_misses.first() {
        return Err(StackError::CriteriaMismatch {
            key: format!("regex `{}`", pattern),
            samples: regex_misses
                .iter()
                .take(MAX_SAMPLES)
                .map(|(value, _)| value.clone())
                .collect(),
        });
    }

    if let Some(group) = groups.iter().find(|g| !g.key.is_matched()) {
        return Err(StackError::CriteriaMismatch {
            key: group.key.to_string(),
            samples: group
                .assets
                .iter()
                .take(MAX_SAMPLES)
                .map(|a| a.original_file_name().to_string())
                .collect(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacking::criteria::{default_criteria, parse_criteria, resolve_key};
    use crate::stacking::test_support::{asset, names};
    use crate::stacking::KeyPart;
    use serde_json::json;

    const TIME: &str = "2023-05-01T10:00:00.000Z";

    fn photo(id: &str, name: &str, time: &str) -> Asset {
        asset(id, name, json!({ "localDateTime": time }))
    }

    #[test]
    fn test_same_stem_and_time_form_one_group() {
        let assets = vec![
            photo("1", "IMG_2482.jpg", TIME),
            photo("2", "IMG_2482.cr2", TIME),
        ];
        let groups = group_assets(assets, &default_criteria(), false).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0].assets), vec!["IMG_2482.jpg", "IMG_2482.cr2"]);
    }

    #[test]
    fn test_singletons_are_discarded() {
        let assets = vec![
            photo("1", "IMG_2482.jpg", TIME),
            photo("2", "IMG_2483.cr2", TIME),
        ];
        let groups = group_assets(assets, &default_criteria(), false).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_same_time_different_name_not_grouped() {
        let assets = vec![photo("1", "alpha.jpg", TIME), photo("2", "beta.jpg", TIME)];
        assert!(group_assets(assets, &default_criteria(), false).unwrap().is_empty());
    }

    #[test]
    fn test_same_name_different_time_not_grouped() {
        let assets = vec![
            photo("1", "test_filename.jpg", TIME),
            photo("2", "test_filename.raw", "2023-05-01T10:00:01.000Z"),
        ];
        assert!(group_assets(assets, &default_criteria(), false).unwrap().is_empty());
    }

    #[test]
    fn test_same_instant_in_other_offset_not_grouped() {
        let assets = vec![
            photo("1", "IMG_1.jpg", "2023-05-01T10:00:00+02:00"),
            photo("2", "IMG_1.cr2", "2023-05-01T08:00:00Z"),
        ];
        assert!(group_assets(assets, &default_criteria(), false).unwrap().is_empty());
    }

    #[test]
    fn test_groups_come_out_in_key_order() {
        let t2 = "2023-06-01T08:00:00.000Z";
        let assets = vec![
            photo("1", "test_filename.raw", TIME),
            photo("2", "test_Filename.raw", t2),
            photo("3", "test_filename.jpg", TIME),
            photo("4", "test_Filename.jpg", t2),
        ];
        let groups = group_assets(assets, &default_criteria(), false).unwrap();
        assert_eq!(groups.len(), 2);
        // uppercase sorts first
        assert_eq!(names(&groups[0].assets), vec!["test_Filename.raw", "test_Filename.jpg"]);
        assert_eq!(names(&groups[1].assets), vec!["test_filename.raw", "test_filename.jpg"]);
        assert_eq!(
            groups[1].key,
            CriteriaKey::Matched(vec![
                KeyPart::Text("test_filename".to_string()),
                KeyPart::from_value(&json!(TIME)),
            ])
        );
    }

    #[test]
    fn test_members_share_key_and_keys_are_distinct() {
        let criteria = default_criteria();
        let assets: Vec<Asset> = ["a.jpg", "b.jpg", "a.cr2", "c.png", "b.raw", "a.xmp", "d.jpg"]
            .iter()
            .enumerate()
            .map(|(i, n)| photo(&i.to_string(), n, TIME))
            .collect();
        let groups = group_assets(assets, &criteria, false).unwrap();
        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.assets.len() > 1);
            for a in &group.assets {
                assert_eq!(resolve_key(a, &criteria, false).unwrap(), group.key);
            }
        }
        assert_ne!(groups[0].key, groups[1].key);
        assert_eq!(names(&groups[0].assets), vec!["a.jpg", "a.cr2", "a.xmp"]);
    }

    #[test]
    fn test_null_thumbhash_assets_fail_without_skip() {
        let criteria = parse_criteria(r#"[{"key": "thumbhash"}]"#).unwrap();
        let assets = vec![
            asset("1", "IMG_1234.jpg", json!({ "thumbhash": "foo" })),
            asset("2", "IMG_1234.png", json!({ "thumbhash": null })),
            asset("3", "IMG_1234.raw", json!({})),
        ];

        let err = group_assets(assets.clone(), &criteria, false).unwrap_err();
        match err {
            StackError::CriteriaMismatch { samples, .. } => {
                assert_eq!(samples, vec!["IMG_1234.png", "IMG_1234.raw"]);
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(group_assets(assets, &criteria, true).unwrap().is_empty());
    }

    #[test]
    fn test_skip_unmatched_keeps_matched_groups() {
        let criteria = parse_criteria(r#"[{"key": "localDateTime"}]"#).unwrap();
        let assets = vec![
            photo("1", "test_filename.jpg", TIME),
            asset("2", "test_filename.jpg", json!({ "localDateTime": null })),
            asset("3", "test_filename.jpg", json!({ "localDateTime": null })),
            photo("4", "test_filename.jpg", TIME),
        ];

        let err = group_assets(assets.clone(), &criteria, false).unwrap_err();
        assert!(err.to_string().contains("Some photos do not match the criteria"));

        let groups = group_assets(assets, &criteria, true).unwrap();
        assert_eq!(groups.len(), 1);
        let ids: Vec<&str> = groups[0].assets.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_single_unmatched_asset_is_ignored_without_regex() {
        let criteria = parse_criteria(r#"[{"key": "thumbhash"}]"#).unwrap();
        let assets = vec![
            asset("1", "a.jpg", json!({ "thumbhash": "x" })),
            asset("2", "a.cr2", json!({ "thumbhash": "x" })),
            asset("3", "b.jpg", json!({})),
        ];
        let groups = group_assets(assets, &criteria, false).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_regex_mismatch_fails_after_grouping() {
        let criteria =
            parse_criteria(r#"[{"key": "originalFileName", "regex": {"key": "(IMG_[0-9]+)"}}]"#).unwrap();
        let assets = vec![
            asset("1", "IMG_1.jpg", json!({})),
            asset("2", "IMG_1.cr2", json!({})),
            asset("3", "DSCF0001.jpg", json!({})),
        ];

        match group_assets(assets.clone(), &criteria, false).unwrap_err() {
            StackError::CriteriaMismatch { key, samples } => {
                assert!(key.contains("(IMG_[0-9]+)"));
                assert_eq!(samples, vec!["DSCF0001.jpg"]);
            }
            other => panic!("unexpected error: {}", other),
        }

        let groups = group_assets(assets, &criteria, true).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0].assets), vec!["IMG_1.jpg", "IMG_1.cr2"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_assets(Vec::new(), &default_criteria(), false).unwrap().is_empty());
    }
}
