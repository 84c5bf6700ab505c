//! Pipeline-creation notifications.

use std::cell::RefCell;
use std::rc::Rc;

/// A pipeline that now exists on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPipeline {
    pub name: String,
    /// Stage names in order; empty for template-based pipelines.
    pub stages: Vec<String>,
}

/// Handle returned by [`crate::ConfigClient::add_observer`], used to remove
/// the observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub(crate) u64);

/// Told about every pipeline the client creates, whether through the REST
/// API or by inserting it into the document.
pub trait PipelineObserver {
    fn pipeline_created(&mut self, pipeline: &CreatedPipeline);
}

/// Pipelines created so far, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedPipelines {
    pipelines: Vec<CreatedPipeline>,
}

impl CreatedPipelines {
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.pipelines.iter().map(|p| p.name.clone()).collect()
    }

    pub fn last(&self) -> Option<&CreatedPipeline> {
        self.pipelines.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CreatedPipeline> {
        self.pipelines.iter()
    }
}

impl PipelineObserver for CreatedPipelines {
    fn pipeline_created(&mut self, pipeline: &CreatedPipeline) {
        self.pipelines.push(pipeline.clone());
    }
}

/// Shared handle, so the owner can read what the client reported.
impl<T: PipelineObserver> PipelineObserver for Rc<RefCell<T>> {
    fn pipeline_created(&mut self, pipeline: &CreatedPipeline) {
        self.borrow_mut().pipeline_created(pipeline);
    }
}
