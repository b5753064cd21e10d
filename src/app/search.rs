use crate::domain::gallery::GalleryItem;

/// Case-insensitive caption match. An empty query matches everything;
/// items without a caption never match a non-empty query.
pub fn caption_matches(item: &GalleryItem, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    item.caption
        .as_deref()
        .map_or(false, |caption| caption.to_lowercase().contains(&needle))
}

pub fn filter_by_caption<'a, I>(items: I, query: &str) -> Vec<&'a GalleryItem>
where
    I: IntoIterator<Item = &'a GalleryItem>,
{
    items
        .into_iter()
        .filter(|item| caption_matches(item, query))
        .collect()
}
