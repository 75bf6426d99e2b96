//! Job queue for background document ingestion
//!
//! Progress lives in memory; the durable outcome of a job is the status on
//! its document row.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, FailureKind, Result};
use crate::ingestion::IngestProgress;

/// Processing stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Queued,
    Loading,
    Chunking,
    Embedding,
    Storing,
    Complete,
    Failed,
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// Progress information for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub session_id: Uuid,
    pub status: JobStatus,
    pub stage: ProcessingStage,
    pub total_chunks: usize,
    pub chunks_embedded: usize,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    pub fn new(job: &IngestJob) -> Self {
        let now = Utc::now();
        Self {
            job_id: job.id,
            document_id: job.document_id,
            session_id: job.session_id,
            status: JobStatus::Pending,
            stage: ProcessingStage::Queued,
            total_chunks: 0,
            chunks_embedded: 0,
            error: None,
            failure_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn percent_complete(&self) -> f32 {
        match self.stage {
            ProcessingStage::Queued => 0.0,
            ProcessingStage::Loading => 10.0,
            ProcessingStage::Chunking => 20.0,
            ProcessingStage::Embedding if self.total_chunks > 0 => {
                20.0 + 70.0 * (self.chunks_embedded as f32 / self.total_chunks as f32)
            }
            ProcessingStage::Embedding => 20.0,
            ProcessingStage::Storing => 90.0,
            ProcessingStage::Complete | ProcessingStage::Failed => 100.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Complete | JobStatus::Failed)
    }
}

/// A request to ingest one stored document
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub session_id: Uuid,
}

impl IngestJob {
    pub fn new(document_id: Uuid, session_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            session_id,
        }
    }
}

/// Job queue for managing background processing
pub struct JobQueue {
    /// Active jobs with progress
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    /// Channel for sending jobs to workers
    sender: mpsc::Sender<IngestJob>,
    /// Number of jobs processed concurrently
    worker_count: usize,
}

impl JobQueue {
    /// Create a new job queue and the receiver the worker drains
    pub fn new(worker_count: usize) -> (Self, mpsc::Receiver<IngestJob>) {
        let (sender, receiver) = mpsc::channel(1000);

        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            sender,
            worker_count,
        };

        (queue, receiver)
    }

    /// Submit a job for processing
    pub async fn submit(&self, job: IngestJob) -> Result<Uuid> {
        let job_id = job.id;
        self.jobs.insert(job_id, JobProgress::new(&job));

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job: {}", e);
            self.mark_failed(job_id, "Ingestion worker is not running", FailureKind::Transient);
            return Err(Error::internal("Ingestion worker is not running"));
        }

        tracing::debug!("Queued job {}", job_id);
        Ok(job_id)
    }

    /// Get job progress
    pub fn get_progress(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|p| p.clone())
    }

    /// All jobs, newest first, optionally limited to one session
    pub fn list_jobs(&self, session_id: Option<Uuid>) -> Vec<JobProgress> {
        let mut jobs: Vec<JobProgress> = self
            .jobs
            .iter()
            .filter(|e| session_id.map_or(true, |s| e.session_id == s))
            .map(|e| e.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Update job stage
    pub fn update_stage(&self, job_id: Uuid, stage: ProcessingStage) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.stage = stage;
            progress.updated_at = Utc::now();
        }
    }

    pub fn mark_processing(&self, job_id: Uuid) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Processing;
            progress.updated_at = Utc::now();
        }
    }

    pub fn mark_complete(&self, job_id: Uuid) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Complete;
            progress.stage = ProcessingStage::Complete;
            progress.updated_at = Utc::now();
        }
    }

    pub fn mark_failed(&self, job_id: Uuid, error: &str, kind: FailureKind) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Failed;
            progress.stage = ProcessingStage::Failed;
            progress.error = Some(error.to_string());
            progress.failure_kind = Some(kind);
            progress.updated_at = Utc::now();
        }
    }

    /// Set total chunks for the document
    pub fn set_total_chunks(&self, job_id: Uuid, total: usize) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.total_chunks = total;
            progress.chunks_embedded = 0;
            progress.updated_at = Utc::now();
        }
    }

    /// Increment chunks embedded
    pub fn increment_chunks_embedded(&self, job_id: Uuid, count: usize) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.chunks_embedded += count;
            progress.updated_at = Utc::now();
        }
    }

    /// Forget finished jobs belonging to a session
    pub fn forget_session(&self, session_id: Uuid) {
        self.jobs
            .retain(|_, p| p.session_id != session_id || !p.is_finished());
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_jobs: self.jobs.len(),
            worker_count: self.worker_count,
            ..QueueStats::default()
        };
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Progress sink bound to one job
    pub fn progress_for(self: &Arc<Self>, job_id: Uuid) -> JobProgressSink {
        JobProgressSink {
            queue: self.clone(),
            job_id,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
    pub worker_count: usize,
}

/// Forwards pipeline progress into the queue
pub struct JobProgressSink {
    queue: Arc<JobQueue>,
    job_id: Uuid,
}

impl IngestProgress for JobProgressSink {
    fn stage(&self, stage: ProcessingStage) {
        self.queue.update_stage(self.job_id, stage);
    }

    fn chunks_total(&self, total: usize) {
        self.queue.set_total_chunks(self.job_id, total);
    }

    fn chunks_embedded(&self, count: usize) {
        self.queue.increment_chunks_embedded(self.job_id, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_queues_job() {
        let (queue, mut receiver) = JobQueue::new(2);
        let job = IngestJob::new(Uuid::new_v4(), Uuid::new_v4());
        let job_id = queue.submit(job.clone()).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.id, job_id);
        assert_eq!(received.document_id, job.document_id);

        let progress = queue.get_progress(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Pending);
        assert_eq!(progress.stage, ProcessingStage::Queued);
        assert_eq!(progress.percent_complete(), 0.0);
    }

    #[tokio::test]
    async fn submit_without_worker_fails() {
        let (queue, receiver) = JobQueue::new(1);
        drop(receiver);

        let job = IngestJob::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(queue.submit(job.clone()).await.is_err());

        let progress = queue.get_progress(job.id).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert_eq!(progress.failure_kind, Some(FailureKind::Transient));
    }

    #[tokio::test]
    async fn progress_sink_tracks_embedding() {
        let (queue, _receiver) = JobQueue::new(1);
        let queue = Arc::new(queue);
        let job = IngestJob::new(Uuid::new_v4(), Uuid::new_v4());
        let job_id = queue.submit(job).await.unwrap();

        let sink = queue.progress_for(job_id);
        sink.stage(ProcessingStage::Embedding);
        sink.chunks_total(4);
        sink.chunks_embedded(2);

        let progress = queue.get_progress(job_id).unwrap();
        assert_eq!(progress.stage, ProcessingStage::Embedding);
        assert_eq!(progress.chunks_embedded, 2);
        assert!((progress.percent_complete() - 55.0).abs() < 0.01);

        queue.mark_complete(job_id);
        let progress = queue.get_progress(job_id).unwrap();
        assert!(progress.is_finished());
        assert_eq!(progress.percent_complete(), 100.0);
    }

    #[tokio::test]
    async fn list_filters_by_session_and_stats_count() {
        let (queue, _receiver) = JobQueue::new(3);
        let session = Uuid::new_v4();
        let mine = queue.submit(IngestJob::new(Uuid::new_v4(), session)).await.unwrap();
        let other = queue
            .submit(IngestJob::new(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap();

        let listed = queue.list_jobs(Some(session));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].job_id, mine);
        assert_eq!(queue.list_jobs(None).len(), 2);

        queue.mark_failed(other, "HTTP 404", FailureKind::Permanent);
        let stats = queue.stats();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.worker_count, 3);

        queue.mark_complete(mine);
        queue.forget_session(session);
        assert!(queue.get_progress(mine).is_none());
        assert!(queue.get_progress(other).is_some());
    }
}
