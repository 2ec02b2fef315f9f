use crate::models::{ForwardIndex, PresentationView, ReverseIndex, ViewEntry};

/// Joins the two indices for display: each tag lists its files by name
/// together with all of that file's tags.
///
/// Paths the forward index no longer knows are left out.
pub fn presentation_view(forward: &ForwardIndex, reverse: &ReverseIndex) -> PresentationView {
    reverse
        .iter()
        .map(|(tag, paths)| {
            let entries = paths
                .iter()
                .filter_map(|path| forward.get(path))
                .map(|record| ViewEntry {
                    name: record.display_name.clone(),
                    all_keys: record.tags.clone(),
                })
                .collect();
            (tag.clone(), entries)
        })
        .collect()
}
