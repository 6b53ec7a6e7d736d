use std::sync::Arc;

use common::flag_check::FlagCheckJob;
use sea_orm::DatabaseConnection;
use tracing::{error, info};

use crate::engine::FlagChecker;
use crate::engine::checker::unchecked_submissions;
use crate::queue::{BroccoliError, BrokerMessage, Mq, enqueue_flag_check};

/// Consume flag-check jobs until the queue connection fails.
pub async fn consume_flag_checks(
    checker: Arc<FlagChecker>,
    mq: Arc<Mq>,
    queue_name: String,
    concurrency: usize,
) {
    info!(queue = %queue_name, concurrency, "Starting flag check consumer");

    let result = mq
        .process_messages(
            &queue_name,
            Some(concurrency),
            None,
            move |message: BrokerMessage<FlagCheckJob>| {
                let checker = Arc::clone(&checker);
                async move {
                    let job = message.payload;

                    match checker.check(job.submission_id).await {
                        Ok(verdict) => {
                            info!(
                                job_id = %job.job_id,
                                submission_id = job.submission_id,
                                status = %verdict.status,
                                "Flag check finished"
                            );
                            Ok(())
                        }
                        Err(e) => {
                            error!(
                                job_id = %job.job_id,
                                submission_id = job.submission_id,
                                error = %e,
                                "Flag check failed"
                            );
                            Err(BroccoliError::Job(e.to_string()))
                        }
                    }
                }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Flag check consumer stopped unexpectedly");
    }
}

/// Enqueue every submission still waiting for a check. Run once at startup.
pub async fn requeue_unchecked(
    db: &DatabaseConnection,
    mq: &Mq,
    queue_name: &str,
) -> anyhow::Result<usize> {
    let pending = unchecked_submissions(db).await?;
    let mut requeued = 0;

    for (submission_id, game_id) in pending {
        let job = FlagCheckJob::new(submission_id, game_id);
        if enqueue_flag_check(mq, queue_name, &job).await {
            requeued += 1;
        }
    }

    if requeued > 0 {
        info!(count = requeued, "Re-enqueued unchecked submissions");
    }
    Ok(requeued)
}
