use std::sync::Arc;

use serde::Serialize;

use super::image::{ImageFormat, SourceImage};

/// Normalized outcome of one edit call. Holds an image, a text, or both;
/// [`EditResult::new`] refuses to build one with neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditResult {
    image_url: Option<String>,
    text: Option<String>,
}

impl EditResult {
    pub fn new(image_url: Option<String>, text: Option<String>) -> Option<Self> {
        if image_url.is_none() && text.is_none() {
            return None;
        }
        Some(Self { image_url, text })
    }

    /// `data:{mime};base64,{payload}`
    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Processing,
    Completed {
        #[serde(flatten)]
        result: EditResult,
    },
    Error {
        message: String,
    },
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::Processing => "processing",
            ItemState::Completed { .. } => "completed",
            ItemState::Error { .. } => "error",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, ItemState::Completed { .. } | ItemState::Error { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub id: String,
    pub source: Arc<SourceImage>,
    pub state: ItemState,
}

impl BatchItem {
    pub fn new(id: String, source: SourceImage) -> Self {
        Self {
            id,
            source: Arc::new(source),
            state: ItemState::Pending,
        }
    }

    pub fn result(&self) -> Option<&EditResult> {
        match &self.state {
            ItemState::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            item_id: self.id.clone(),
            file_name: self.source.file_name.clone(),
            format: self.source.format,
            size_bytes: self.source.len(),
            state: self.state.clone(),
        }
    }
}

/// What the front end sees of an item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    pub item_id: String,
    pub file_name: String,
    pub format: ImageFormat,
    pub size_bytes: usize,
    #[serde(flatten)]
    pub state: ItemState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edit_result_requires_image_or_text() {
        assert!(EditResult::new(None, None).is_none());
        assert!(EditResult::new(None, Some("caption".into())).is_some());
        assert!(EditResult::new(Some("data:image/png;base64,AA==".into()), None).is_some());
    }

    #[test]
    fn snapshot_flattens_state() {
        let mut item = BatchItem::new(
            "room.png-abc-0".into(),
            SourceImage::new("room.png", ImageFormat::Png, vec![1, 2, 3]),
        );
        item.state = ItemState::Completed {
            result: EditResult::new(Some("data:image/png;base64,AA==".into()), None).unwrap(),
        };

        let value = serde_json::to_value(item.snapshot()).unwrap();
        assert_eq!(
            value,
            json!({
                "item_id": "room.png-abc-0",
                "file_name": "room.png",
                "format": "png",
                "size_bytes": 3,
                "status": "completed",
                "image_url": "data:image/png;base64,AA==",
                "text": null
            })
        );
    }

    #[test]
    fn error_state_serializes_message() {
        let state = ItemState::Error {
            message: "HTTP 500: boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "status": "error", "message": "HTTP 500: boom" })
        );
        assert!(state.is_settled());
        assert!(!ItemState::Processing.is_settled());
    }
}
