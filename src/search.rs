//! Tag search over the catalog.

use crate::db::{Catalog, Image};
use crate::error::Result;

/// Images carrying any of `tag_ids`, each once, newest first.
///
/// An empty tag list means "no filter" and returns the whole catalog.
pub fn search_by_tags(catalog: &Catalog, tag_ids: &[i64]) -> Result<Vec<Image>> {
    if tag_ids.is_empty() {
        return catalog.get_all_images();
    }
    catalog.get_images_by_tags(tag_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ImportSource, NewImage};
    use std::collections::HashSet;

    fn add_image(catalog: &Catalog, stored_path: &str) -> i64 {
        catalog
            .insert_image(&NewImage {
                original_path: "/src/photo.jpg",
                stored_path,
                thumbnail_path: None,
                filename: "photo",
                extension: ".jpg",
                imported_from: ImportSource::Local,
            })
            .unwrap()
    }

    fn ids(images: &[Image]) -> Vec<i64> {
        images.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = add_image(&catalog, "images/a.jpg");
        let b = add_image(&catalog, "images/b.jpg");
        catalog.insert_tag("unused").unwrap();

        assert_eq!(ids(&search_by_tags(&catalog, &[]).unwrap()), vec![b, a]);
    }

    #[test]
    fn test_any_tag_matches_once_newest_first() {
        let catalog = Catalog::open_in_memory().unwrap();
        let images: Vec<i64> = (0..5)
            .map(|n| add_image(&catalog, &format!("images/{}.jpg", n)))
            .collect();
        let red = catalog.insert_tag("red").unwrap();
        let blue = catalog.insert_tag("blue").unwrap();
        let green = catalog.insert_tag("green").unwrap();

        let tagging = [(0, red), (0, blue), (1, blue), (3, red), (4, green)];
        for (index, tag) in tagging {
            catalog.add_image_tag(images[index], tag).unwrap();
        }

        let found = search_by_tags(&catalog, &[red, blue]).unwrap();
        let found_ids = ids(&found);
        assert_eq!(found_ids, vec![images[3], images[1], images[0]]);

        let unique: HashSet<i64> = found_ids.iter().copied().collect();
        assert_eq!(unique.len(), found_ids.len());

        for window in found.windows(2) {
            assert!(window[0].imported_at >= window[1].imported_at);
        }

        assert_eq!(ids(&search_by_tags(&catalog, &[green]).unwrap()), vec![images[4]]);
        assert!(search_by_tags(&catalog, &[12345]).unwrap().is_empty());
    }
}
