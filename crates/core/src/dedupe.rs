use std::collections::HashMap;

use crate::model::{Catalog, DuplicateGroup, DuplicateSummary};

/// Groups catalog entries that share a content checksum.
///
/// Groups come back in first-seen order of their checksum while walking
/// `catalog.entries`; the first entry seen in a group is the original.
pub fn find_duplicates(catalog: &Catalog) -> Vec<DuplicateGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_checksum: HashMap<&str, Vec<usize>> = HashMap::new();

    for (index, entry) in catalog.entries.iter().enumerate() {
        let key = entry.checksums.content_key();
        by_checksum
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(index);
    }

    order
        .into_iter()
        .filter_map(|checksum| {
            let members = by_checksum.remove(checksum)?;
            let (first, rest) = members.split_first()?;
            if rest.is_empty() {
                return None;
            }

            let original = &catalog.entries[*first];
            let duplicates = rest
                .iter()
                .map(|index| catalog.entries[*index].path.clone())
                .collect::<Vec<_>>();
            let wasted_bytes = original
                .size_bytes
                .saturating_mul(duplicates.len() as u64);

            Some(DuplicateGroup {
                checksum: checksum.to_string(),
                size_bytes: original.size_bytes,
                original: original.path.clone(),
                duplicates,
                wasted_bytes,
            })
        })
        .collect()
}

pub fn duplicate_summary(groups: &[DuplicateGroup]) -> DuplicateSummary {
    groups
        .iter()
        .fold(DuplicateSummary::default(), |mut summary, group| {
            summary.groups += 1;
            summary.duplicate_files += group.duplicates.len() as u64;
            summary.wasted_bytes = summary.wasted_bytes.saturating_add(group.wasted_bytes);
            summary
        })
}
