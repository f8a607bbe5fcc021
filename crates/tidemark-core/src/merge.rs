use std::collections::HashMap;

use crate::damage::EnhancedRegion;

/// Fold per-level region lists into one record per region code.
///
/// `levels` must be in ascending sea-level order. A region seen again has the
/// new damages appended after its existing ones, so each damages list stays
/// ordered by level; levels where the region was not flooded leave gaps.
/// Records come out in the order their code was first seen.
pub fn merge_levels<'a, L>(levels: L) -> Vec<EnhancedRegion<'a>>
where
    L: IntoIterator<Item = Vec<EnhancedRegion<'a>>>,
{
    let mut merged: Vec<EnhancedRegion<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for level in levels {
        for entry in level {
            match index.get(entry.code()) {
                Some(&slot) => merged[slot].damages.extend(entry.damages),
                None => {
                    index.insert(entry.code().to_string(), merged.len());
                    merged.push(entry);
                }
            }
        }
    }

    merged
}
