//! Loads the immutable per-campaign workflow JSON from wherever
//! `Campaign::workflow_file_location` points it at. Object-storage I/O is an
//! explicit external collaborator, so this module only defines
//! the seam plus a minimal HTTP-fetching implementation; the executor and
//! orchestrator depend on the trait, never on a concrete backend.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{EngineError, EngineResult};
use crate::models::workflow::Workflow;

#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn load(&self, location: &str) -> EngineResult<Workflow>;
}

/// Fetches the workflow JSON over HTTP(S) — the common case when
/// `workflow_file_location` is a signed object-storage URL.
pub struct HttpWorkflowSource {
    http: Client,
}

impl HttpWorkflowSource {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

impl Default for HttpWorkflowSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowSource for HttpWorkflowSource {
    async fn load(&self, location: &str) -> EngineResult<Workflow> {
        let response = self.http.get(location).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Transient(format!(
                "failed to load workflow from {location}: {}",
                response.status()
            )));
        }
        let workflow = response.json::<Workflow>().await?;
        Ok(workflow)
    }
}
