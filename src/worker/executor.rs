//! Ordered engine fallback for a single job

use tracing::{debug, info, warn};

use crate::engines::{Artifact, DownloadParams, EngineId, ExtractionJob, ExtractorSet};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub job_id: String,
    pub artifact: Artifact,
    pub engine: EngineId,
    pub attempted: Vec<EngineId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub job_id: String,
    /// Error of the final attempt, or why nothing was attempted
    pub last_error: String,
    /// Per-engine failures in attempt order
    pub failures: Vec<(EngineId, String)>,
    pub attempted: Vec<EngineId>,
}

impl FailedJob {
    /// Aggregate, client-facing failure message
    pub fn message(&self) -> String {
        if self.failures.is_empty() {
            return format!("download failed: {}", self.last_error);
        }

        let details = self
            .failures
            .iter()
            .map(|(engine, error)| format!("{engine}: {error}"))
            .collect::<Vec<_>>()
            .join("; ");
        format!("download failed after {} engine(s): {details}", self.failures.len())
    }
}

/// Terminal result of running the engine list
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(CompletedJob),
    Failed(FailedJob),
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed(done) => &done.job_id,
            JobOutcome::Failed(failed) => &failed.job_id,
        }
    }

    pub fn attempted(&self) -> &[EngineId] {
        match self {
            JobOutcome::Completed(done) => &done.attempted,
            JobOutcome::Failed(failed) => &failed.attempted,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

/// Tries engines one after another until one produces an artifact
pub struct FallbackExecutor {
    extractors: ExtractorSet,
}

impl FallbackExecutor {
    pub fn new(extractors: ExtractorSet) -> Self {
        Self { extractors }
    }

    pub fn extractors(&self) -> &ExtractorSet {
        &self.extractors
    }

    /// Run `engines` in order; the first success ends the job
    ///
    /// Every per-engine failure is a value: it is logged, recorded and the
    /// next candidate is tried. Engines after the winner are never invoked.
    pub async fn execute(
        &self,
        job_id: &str,
        url: &str,
        params: &DownloadParams,
        engines: &[EngineId],
        correlation_id: Option<&str>,
    ) -> JobOutcome {
        let cid = correlation_id.unwrap_or("-");
        let job = ExtractionJob {
            job_id,
            url,
            params,
            correlation_id,
        };

        let mut attempted = Vec::with_capacity(engines.len());
        let mut failures = Vec::new();

        for engine in engines {
            attempted.push(engine.clone());

            let Some(extractor) = self.extractors.get(engine.as_str()) else {
                warn!(correlation_id = cid, job_id, engine = %engine, "No extractor registered for engine");
                failures.push((engine.clone(), "no extractor registered".to_string()));
                continue;
            };

            debug!(correlation_id = cid, job_id, engine = %engine, "Trying engine");
            match extractor.extract(&job).await {
                Ok(artifact) => {
                    info!(
                        correlation_id = cid,
                        job_id,
                        engine = %engine,
                        key = %artifact.key,
                        attempts = attempted.len(),
                        "Engine succeeded"
                    );
                    return JobOutcome::Completed(CompletedJob {
                        job_id: job_id.to_string(),
                        artifact,
                        engine: engine.clone(),
                        attempted,
                    });
                }
                Err(e) => {
                    warn!(correlation_id = cid, job_id, engine = %engine, error = %e, "Engine failed, trying next");
                    failures.push((engine.clone(), e.to_string()));
                }
            }
        }

        let last_error = failures
            .last()
            .map(|(_, error)| error.clone())
            .unwrap_or_else(|| "no engines to try".to_string());

        warn!(correlation_id = cid, job_id, attempts = attempted.len(), "All engines failed");

        JobOutcome::Failed(FailedJob {
            job_id: job_id.to_string(),
            last_error,
            failures,
            attempted,
        })
    }
}
