//! Filtered and sorted views of the diary collection

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::DiaryRecord;

/// Sort direction by creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(format!(
                "Unknown sort order '{}'. Use 'newest' or 'oldest'",
                other
            )),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Newest => write!(f, "newest"),
            SortOrder::Oldest => write!(f, "oldest"),
        }
    }
}

/// Compute the displayed list: keep records whose title or content contains
/// `query` (case-insensitive), then sort by `created_at`.
///
/// A blank query keeps everything. A non-blank query is matched as typed,
/// surrounding spaces included. Records with equal timestamps keep their
/// input order.
pub fn view(diaries: &[DiaryRecord], query: &str, order: SortOrder) -> Vec<DiaryRecord> {
    let filtering = !query.trim().is_empty();
    let needle = query.to_lowercase();

    let mut result: Vec<DiaryRecord> = diaries
        .iter()
        .filter(|d| !filtering || matches_query(d, &needle))
        .cloned()
        .collect();

    match order {
        SortOrder::Newest => result.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => result.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
    result
}

fn matches_query(diary: &DiaryRecord, needle: &str) -> bool {
    diary.title.to_lowercase().contains(needle) || diary.content.to_lowercase().contains(needle)
}
