use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Failure of a detached background task, reported when it is settled.
#[derive(Debug, Error)]
pub enum BackgroundTaskError {
    #[error("background task {name} panicked: {message}")]
    Panicked { name: &'static str, message: String },

    #[error("background task {name} was aborted")]
    Aborted { name: &'static str },
}

/// Wait for named background tasks and collect their outcomes.
///
/// Semantics:
/// - Every task is awaited, even when an earlier one failed.
/// - Panics and aborts are logged and returned; they never propagate.
/// - Successful outputs are returned in input order.
pub async fn settle_background_tasks<T>(
    tasks: Vec<(&'static str, JoinHandle<T>)>,
) -> (Vec<T>, Vec<BackgroundTaskError>) {
    let mut outputs = Vec::with_capacity(tasks.len());
    let mut failures = Vec::new();

    for (name, task) in tasks {
        match task.await {
            Ok(output) => {
                debug!(task = name, "Background task settled");
                outputs.push(output);
            }
            Err(join_error) if join_error.is_cancelled() => {
                warn!(task = name, "Background task was aborted");
                failures.push(BackgroundTaskError::Aborted { name });
            }
            Err(join_error) => {
                warn!(task = name, error = %join_error, "Background task panicked");
                failures.push(BackgroundTaskError::Panicked {
                    name,
                    message: join_error.to_string(),
                });
            }
        }
    }

    (outputs, failures)
}

#[cfg(test)]
mod tests {
    use super::{BackgroundTaskError, settle_background_tasks};
    use crate::test_utils::init_tracing;

    #[tokio::test]
    async fn settle_collects_outputs_in_order() {
        init_tracing();
        let tasks = vec![
            ("first", tokio::spawn(async { 1 })),
            ("second", tokio::spawn(async { 2 })),
        ];

        let (outputs, failures) = settle_background_tasks(tasks).await;
        assert_eq!(outputs, vec![1, 2]);
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn settle_reports_aborted_task_and_keeps_going() {
        let slow = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            0
        });
        slow.abort();
        let tasks = vec![("slow", slow), ("fast", tokio::spawn(async { 7 }))];

        let (outputs, failures) = settle_background_tasks(tasks).await;
        assert_eq!(outputs, vec![7]);
        match failures.as_slice() {
            [BackgroundTaskError::Aborted { name }] => assert_eq!(*name, "slow"),
            other => panic!("expected one aborted task, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn settle_reports_panicked_task() {
        let tasks = vec![(
            "boom",
            tokio::spawn(async {
                panic!("sampler exploded");
            }),
        )];

        let (outputs, failures): (Vec<()>, _) = settle_background_tasks(tasks).await;
        assert!(outputs.is_empty());
        assert!(matches!(
            failures.as_slice(),
            [BackgroundTaskError::Panicked { name: "boom", .. }]
        ));
    }
}
