//! Merging and ordering of item lists from several sources

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::Item;

/// Concatenate `lists` keeping only the first item for every dedup key.
///
/// Survivors keep their original relative order.
pub fn merge<I>(lists: I) -> Vec<Item>
where
    I: IntoIterator<Item = Vec<Item>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.dedup_key()))
        .collect()
}

/// Append the items of `new` whose key is absent from `existing`,
/// returning how many were added
pub fn append_unique(existing: &mut Vec<Item>, new: &[Item]) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(Item::dedup_key).collect();
    let before = existing.len();
    existing.extend(
        new.iter()
            .filter(|item| seen.insert(item.dedup_key()))
            .cloned(),
    );
    existing.len() - before
}

/// Presentation order: source priority ascending, then most recent first
pub fn compare_for_presentation(a: &Item, b: &Item) -> Ordering {
    a.source_priority
        .cmp(&b.source_priority)
        .then_with(|| b.recency().cmp(&a.recency()))
}

/// Stable sort by [`compare_for_presentation`]
pub fn sort_for_presentation(items: &mut [Item]) {
    items.sort_by(compare_for_presentation);
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::model::{ItemDraft, ItemKind};

    fn item(id: &str, title: &str, priority: u32) -> Item {
        let mut item = ItemDraft::new(
            ItemKind::Resource,
            title,
            format!("https://example.com/{title}"),
        )
        .into_item("test", priority, datetime!(2024-01-01 0:00 UTC));
        item.id = id.to_string();
        item
    }

    #[test]
    fn test_first_occurrence_wins() {
        let merged = merge(vec![
            vec![item("x", "Foo", 1)],
            vec![item("X", "Foo-dup", 2), item("y", "Bar", 2)],
        ]);

        let titles: Vec<_> = merged.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Foo", "Bar"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let lists = vec![
            vec![item("a", "A", 1), item("b", "B", 1)],
            vec![item("b", "B2", 2), item("c", "C", 2)],
        ];
        let once = merge(lists.clone());
        let twice = merge(vec![once.clone(), once.clone()]);
        assert_eq!(once, twice);

        let mut keys: Vec<_> = once.iter().map(Item::dedup_key).collect();
        keys.dedup();
        assert_eq!(keys.len(), once.len());
    }

    #[test]
    fn test_merge_falls_back_to_link() {
        let mut a = item("", "Same", 1);
        let mut b = item("", "Same", 2);
        a.link = "https://example.com/Same/".into();
        b.link = "https://EXAMPLE.com/same".into();

        assert_eq!(merge(vec![vec![a], vec![b]]).len(), 1);
    }

    #[test]
    fn test_append_unique() {
        let mut existing = vec![item("a", "A", 1)];
        let added = append_unique(
            &mut existing,
            &[item("a", "A", 1), item("b", "B", 1), item("b", "B", 1)],
        );
        assert_eq!(added, 1);
        assert_eq!(existing.len(), 2);

        assert_eq!(append_unique(&mut existing, &[item("b", "B", 1)]), 0);
    }

    #[test]
    fn test_sort_priority_then_recency() {
        let mut old = item("old", "Old", 2);
        old.published_at = Some(datetime!(2023-01-01 0:00 UTC));
        let mut recent = item("recent", "Recent", 2);
        recent.published_at = Some(datetime!(2024-06-01 0:00 UTC));
        let top = item("top", "Top", 1);

        let mut items = vec![old, recent, top];
        sort_for_presentation(&mut items);

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "recent", "old"]);
    }

    #[test]
    fn test_sort_never_places_lower_priority_first() {
        let mut items: Vec<_> = (0..20)
            .map(|n| item(&format!("i{n}"), &format!("T{n}"), (n * 7 % 5) as u32))
            .collect();
        sort_for_presentation(&mut items);

        assert!(
            items
                .windows(2)
                .all(|pair| pair[0].source_priority <= pair[1].source_priority)
        );
    }
}
