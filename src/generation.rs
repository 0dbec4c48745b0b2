//! Script generation fan-out.
//!
//! Each input becomes one generation task. At most `max_workers` tasks hold
//! a permit at a time; results come back in input order. Generated scripts
//! are independent values, so typing them stays on the single worker.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub index: usize,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(index: usize, prompt: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
        }
    }
}

/// Produces a raw layout script for one input. Implemented by the external
/// text-generation client.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Generate scripts for every request, bounded by `max_workers` (at least one).
pub async fn generate_all<G>(
    generator: Arc<G>,
    requests: Vec<GenerationRequest>,
    max_workers: usize,
) -> Vec<Result<String>>
where
    G: ScriptGenerator + ?Sized + 'static,
{
    let workers = max_workers.max(1);
    let permits = Arc::new(Semaphore::new(workers));
    info!(requests = requests.len(), workers, "generating scripts");

    let tasks: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let generator = Arc::clone(&generator);
            let permits = Arc::clone(&permits);
            let index = request.index;
            let task = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow!("generation pool closed"))?;
                debug!(index = request.index, "generation started");
                generator
                    .generate(&request)
                    .await
                    .with_context(|| format!("generation failed for item {}", request.index))
            });
            (index, task)
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (index, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!(e).context(format!("generation task for item {index} aborted"))),
        };
        if let Err(e) = &result {
            warn!(index, error = %e, "script generation failed");
        }
        results.push(result);
    }
    results
}
