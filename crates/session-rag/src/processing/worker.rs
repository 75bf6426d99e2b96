//! Background worker for ingestion jobs

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use crate::config::ProcessingConfig;
use crate::error::Error;
use crate::ingestion::IngestPipeline;

use super::job_queue::{IngestJob, JobQueue};

/// Drains the job queue, running up to `concurrency` ingestions at once
pub struct IngestionWorker {
    pipeline: Arc<IngestPipeline>,
    job_queue: Arc<JobQueue>,
    concurrency: usize,
    job_timeout: Duration,
}

impl IngestionWorker {
    /// Create a new ingestion worker
    pub fn new(pipeline: Arc<IngestPipeline>, job_queue: Arc<JobQueue>, config: &ProcessingConfig) -> Self {
        let concurrency = config.concurrency();
        let job_timeout = Duration::from_secs(config.job_timeout_secs);

        tracing::info!(
            "Worker configured: {} concurrent jobs, {}s timeout",
            concurrency,
            config.job_timeout_secs
        );

        Self {
            pipeline,
            job_queue,
            concurrency,
            job_timeout,
        }
    }

    /// Start processing jobs from the queue; returns when every sender is gone
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tracing::info!("Ingestion worker started");

        while let Some(job) = receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let pipeline = self.pipeline.clone();
            let job_queue = self.job_queue.clone();
            let job_timeout = self.job_timeout;

            tokio::spawn(async move {
                Self::process_job(&pipeline, &job_queue, job, job_timeout).await;
                drop(permit);
            });
        }

        tracing::info!("Ingestion worker stopped");
    }

    async fn process_job(
        pipeline: &IngestPipeline,
        job_queue: &Arc<JobQueue>,
        job: IngestJob,
        job_timeout: Duration,
    ) {
        let job_id = job.id;
        tracing::info!("Processing job {} for document {}", job_id, job.document_id);
        job_queue.mark_processing(job_id);

        let sink = job_queue.progress_for(job_id);
        let start_time = Instant::now();

        let result = match timeout(job_timeout, pipeline.run(job.document_id, &sink)).await {
            Ok(inner) => inner,
            Err(_) => {
                tracing::error!(
                    "TIMEOUT processing document {} after {:.1}s (limit: {}s)",
                    job.document_id,
                    start_time.elapsed().as_secs_f64(),
                    job_timeout.as_secs()
                );
                let err = Error::Timeout(job_timeout.as_secs());
                pipeline
                    .abandon(&job.session_id, &job.document_id, &err.to_string())
                    .await;
                Err(err)
            }
        };

        match result {
            Ok(report) => {
                job_queue.mark_complete(job_id);
                tracing::info!(
                    "Job {} completed in {:.1}s ({} chunks)",
                    job_id,
                    start_time.elapsed().as_secs_f64(),
                    report.chunk_count
                );
            }
            Err(e) => {
                let kind = e.failure_kind();
                job_queue.mark_failed(job_id, &e.to_string(), kind);
                tracing::error!("Job {} failed ({:?}): {}", job_id, kind, e);
            }
        }
    }
}
