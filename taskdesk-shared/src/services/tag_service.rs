//! Tag management

use super::{ServiceError, ServiceResult};
use crate::models::{CreateTagRequest, NewTag, Tag};
use crate::store::TagStore;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Tag operations; cheap to clone
#[derive(Clone)]
pub struct TagService {
    tags: Arc<dyn TagStore>,
}

impl TagService {
    pub fn new(tags: Arc<dyn TagStore>) -> Self {
        Self { tags }
    }

    /// Creates a tag; `Conflict` if a live tag already has the name
    pub async fn create_tag(&self, req: CreateTagRequest) -> ServiceResult<Tag> {
        req.validate()?;

        if self.tags.find_tag_by_name(&req.name).await?.is_some() {
            return Err(ServiceError::Conflict("Tag name already exists".to_string()));
        }

        let tag = self.tags.insert_tag(NewTag::from(req)).await?;
        info!(tag_id = tag.id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    pub async fn get_tag(&self, tag_id: i64) -> ServiceResult<Tag> {
        self.tags
            .find_tag(tag_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("tag", tag_id))
    }

    /// All live tags, ordered by name
    pub async fn list_tags(&self) -> ServiceResult<Vec<Tag>> {
        Ok(self.tags.list_tags().await?)
    }
}
