//! Thin wrapper over the broccoli queue used for flag-check jobs.

pub use broccoli_queue::brokers::broker::BrokerMessage;
pub use broccoli_queue::error::BroccoliError;
pub use broccoli_queue::queue::BroccoliQueue;

use common::MqAppConfig;
use common::flag_check::FlagCheckJob;
use tracing::{info, warn};

pub type Mq = BroccoliQueue;

pub async fn init_mq(config: &MqAppConfig) -> Result<Mq, BroccoliError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
}

/// Publish a flag-check job. Returns whether the job was accepted by the broker.
pub async fn enqueue_flag_check(mq: &Mq, queue_name: &str, job: &FlagCheckJob) -> bool {
    match mq.publish(queue_name, None, job, None).await {
        Ok(_) => {
            info!(
                job_id = %job.job_id,
                submission_id = job.submission_id,
                "Flag check enqueued"
            );
            true
        }
        Err(e) => {
            warn!(
                submission_id = job.submission_id,
                error = %e,
                "Failed to enqueue flag check"
            );
            false
        }
    }
}
