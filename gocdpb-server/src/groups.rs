//! Pipeline-group administration through whole-document upload.
//!
//! Both operations refuse a target group that already holds pipelines. An
//! existing but empty target is dropped from the document first.

use tracing::info;

use crate::client::ConfigClient;
use crate::error::ServerError;

impl ConfigClient {
    pub fn rename_pipeline_group(&mut self, source: &str, target: &str) -> Result<(), ServerError> {
        self.prepare_group_target(target)?;
        self.document_mut()?.rename_pipeline_group(source, target)?;
        self.upload_full_document()?;
        info!(%source, %target, "pipeline group renamed");
        Ok(())
    }

    pub fn move_all_pipelines_in_group(&mut self, source: &str, target: &str) -> Result<(), ServerError> {
        self.prepare_group_target(target)?;
        let moved = self
            .document_mut()?
            .move_pipelines_between_groups(source, target)?;
        self.upload_full_document()?;
        info!(%source, %target, moved, "pipelines moved");
        Ok(())
    }

    /// Check `target` on the server, fetch a fresh document and drop an
    /// empty `target` from it.
    fn prepare_group_target(&mut self, target: &str) -> Result<(), ServerError> {
        let existing = self
            .get_pipeline_groups()?
            .into_iter()
            .find(|group| group.name == target);
        if let Some(group) = &existing {
            if !group.pipelines.is_empty() {
                return Err(ServerError::GroupNotEmpty {
                    group: target.to_string(),
                    pipelines: group.pipelines.iter().map(|p| p.name.clone()).collect(),
                });
            }
        }

        self.invalidate();
        self.fetch()?;
        if existing.is_some() {
            self.document_mut()?.drop_pipeline_group(target)?;
        }
        Ok(())
    }
}
