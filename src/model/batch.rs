use sha2::{Digest, Sha256};

use super::image::SourceImage;
use super::item::{BatchItem, ItemSnapshot};

const DIGEST_PREFIX_LEN: usize = 12;

/// Images selected together, in selection order. Membership is fixed at
/// construction; a new selection replaces the whole batch.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    items: Vec<BatchItem>,
}

impl Batch {
    pub fn new(sources: Vec<SourceImage>) -> Self {
        let items = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| BatchItem::new(item_id(&source, index), source))
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&BatchItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut BatchItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    /// Position of `id` when another item shares its file name, `None` when
    /// the name is unique or the id is unknown.
    pub fn shared_name_position(&self, id: &str) -> Option<usize> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        let name = &self.items[pos].source.file_name;
        let shared = self
            .items
            .iter()
            .filter(|i| &i.source.file_name == name)
            .count()
            > 1;
        shared.then_some(pos)
    }

    pub fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.items.iter().map(BatchItem::snapshot).collect()
    }
}

/// `{file name}-{content digest prefix}-{index}`
fn item_id(source: &SourceImage, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&source.bytes);
    let digest = hex::encode(hasher.finalize());
    format!(
        "{}-{}-{}",
        source.file_name,
        &digest[..DIGEST_PREFIX_LEN],
        index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::image::ImageFormat;
    use crate::model::item::ItemState;

    fn source(name: &str, bytes: &[u8]) -> SourceImage {
        SourceImage::new(name, ImageFormat::Png, bytes.to_vec())
    }

    #[test]
    fn items_start_pending_in_selection_order() {
        let batch = Batch::new(vec![source("a.png", b"a"), source("b.png", b"b")]);
        let names: Vec<_> = batch
            .items()
            .iter()
            .map(|i| i.source.file_name.as_str())
            .collect();
        assert_eq!(names, ["a.png", "b.png"]);
        assert!(batch.items().iter().all(|i| i.state == ItemState::Pending));
    }

    #[test]
    fn identical_files_get_distinct_ids() {
        let batch = Batch::new(vec![source("a.png", b"same"), source("a.png", b"same")]);
        let ids = batch.ids();
        assert_ne!(ids[0], ids[1]);
        assert!(ids[0].starts_with("a.png-"));
        assert!(ids[0].ends_with("-0"));
        assert!(ids[1].ends_with("-1"));
    }

    #[test]
    fn shared_name_position_only_for_duplicates() {
        let batch = Batch::new(vec![
            source("a.png", b"1"),
            source("b.png", b"2"),
            source("a.png", b"3"),
        ]);
        let ids = batch.ids();
        assert_eq!(batch.shared_name_position(&ids[0]), Some(0));
        assert_eq!(batch.shared_name_position(&ids[1]), None);
        assert_eq!(batch.shared_name_position(&ids[2]), Some(2));
        assert_eq!(batch.shared_name_position("missing"), None);
    }

    #[test]
    fn lookup_by_id() {
        let mut batch = Batch::new(vec![source("a.png", b"a")]);
        let id = batch.ids().remove(0);
        assert!(batch.get(&id).is_some());
        assert!(batch.get("missing").is_none());

        batch.get_mut(&id).unwrap().state = ItemState::Processing;
        assert_eq!(batch.get(&id).unwrap().state, ItemState::Processing);
    }
}
