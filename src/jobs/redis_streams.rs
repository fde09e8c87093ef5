use super::{Job, JobQueue};
use crate::metrics;
use redis::aio::ConnectionManager;
use redis::cmd;
use trellis_config::JobQueueConfig;
use trellis_error::AppResult;

/// Job queue backed by one Redis stream per job type
///
/// XADD {prefix}{type} MAXLEN ~ max_len * type <type> payload <json>
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    config: JobQueueConfig,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, config: JobQueueConfig) -> Self {
        Self { conn, config }
    }

    pub fn stream_key(&self, job: &Job) -> String {
        format!("{}{}", self.config.stream_prefix, job.job_type())
    }

    /// Append `job` to its stream and return the stream entry id
    pub async fn create_job(&self, job: &Job) -> AppResult<String> {
        let key = self.stream_key(job);
        let payload = job.payload_json()?;
        let mut conn = self.conn.clone();

        let stream_id: String = cmd("XADD")
            .arg(&key)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.stream_max_len as i64)
            .arg("*")
            .arg("type")
            .arg(job.job_type())
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        tracing::debug!(
            stream_key = %key,
            stream_id = %stream_id,
            "Pushed job to stream"
        );

        Ok(stream_id)
    }
}

impl JobQueue for RedisJobQueue {
    fn create_job_async(&self, job: Job) {
        metrics::JOBS_EMITTED_TOTAL
            .with_label_values(&[job.job_type()])
            .inc();

        let queue = self.clone();
        tokio::spawn(async move {
            if let Err(e) = queue.create_job(&job).await {
                tracing::error!(
                    job_type = job.job_type(),
                    error = %e,
                    "Cannot create job"
                );
            }
        });
    }
}
