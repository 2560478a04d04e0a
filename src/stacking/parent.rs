use super::{Asset, Group, Stack};
use tracing::info;

/// Extensions preferred as stack parent
pub const PREFERRED_PARENT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

const EXTENSION_BONUS: i32 = 100;

/// Chooses which asset of a group becomes the stack parent.
///
/// Lower scores win. A preferred extension is worth 100, and each promote
/// substring found in the file name is worth 1. Ties fall back to the raw file
/// name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRanking {
    preferred_extensions: Vec<String>,
    promote: Vec<String>,
}

impl Default for ParentRanking {
    fn default() -> Self {
        ParentRanking::new("")
    }
}

impl ParentRanking {
    /// Build from a comma separated promote list. Empty entries are ignored.
    pub fn new(promote_list: &str) -> Self {
        let promote = promote_list
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect();

        ParentRanking {
            preferred_extensions: PREFERRED_PARENT_EXTENSIONS
                .iter()
                .map(|e| format!(".{}", e))
                .collect(),
            promote,
        }
    }

    pub fn promote(&self) -> &[String] {
        &self.promote
    }

    /// Sort key of an asset: `(score, file name)`.
    pub fn rank_for_parent(&self, asset: &Asset) -> (i32, String) {
        let file_name = asset.original_file_name();
        let lower = file_name.to_lowercase();
        let mut score = 0;

        if self.preferred_extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
            score -= EXTENSION_BONUS;
        }

        for key in &self.promote {
            if lower.contains(key.as_str()) {
                info!("promoting {} for key {}", file_name, key);
                score -= 1;
            }
        }

        (score, file_name.to_string())
    }

    /// Reorder group members so the preferred parent comes first.
    pub fn stratify(&self, mut members: Vec<Asset>) -> Vec<Asset> {
        members.sort_by_cached_key(|asset| self.rank_for_parent(asset));
        members
    }

    /// Rank a group into a stack. `None` for an empty group.
    pub fn into_stack(&self, group: Group) -> Option<Stack> {
        let mut ranked = self.stratify(group.assets).into_iter();
        let parent = ranked.next()?;
        Some(Stack {
            key: group.key,
            parent,
            children: ranked.collect(),
        })
    }
}
