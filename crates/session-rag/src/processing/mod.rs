//! Background ingestion with job queue and progress tracking

mod job_queue;
mod worker;

pub use job_queue::{
    IngestJob, JobProgress, JobProgressSink, JobQueue, JobStatus, ProcessingStage, QueueStats,
};
pub use worker::IngestionWorker;
