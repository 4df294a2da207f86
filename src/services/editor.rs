use std::sync::Arc;

use crate::error::EditError;
use crate::model::image::SourceImage;
use crate::model::item::EditResult;

/// One image plus the instruction to apply to it.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub image: Arc<SourceImage>,
    pub instruction: String,
}

impl EditRequest {
    pub fn new(image: Arc<SourceImage>, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
        }
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if self.instruction.trim().is_empty() {
            return Err(EditError::EmptyInstruction);
        }
        if self.image.is_empty() {
            return Err(EditError::EmptyImage);
        }
        Ok(())
    }
}

/// Anything that can turn an [`EditRequest`] into an [`EditResult`].
///
/// Implementations are shared between the batch driver and retry threads.
pub trait ImageEditor: Send + Sync {
    fn edit(&self, request: &EditRequest) -> Result<EditResult, EditError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::image::ImageFormat;

    #[test]
    fn validate_rejects_blank_instruction_and_empty_image() {
        let image = Arc::new(SourceImage::new("a.png", ImageFormat::Png, vec![1]));
        assert_eq!(
            EditRequest::new(image.clone(), " \n\t").validate(),
            Err(EditError::EmptyInstruction)
        );
        assert!(EditRequest::new(image, "brighten").validate().is_ok());

        let empty = Arc::new(SourceImage::new("b.png", ImageFormat::Png, Vec::new()));
        assert_eq!(
            EditRequest::new(empty, "brighten").validate(),
            Err(EditError::EmptyImage)
        );
    }
}
