use std::fmt::Display;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use futures::stream::{self, StreamExt};
use tracing::warn;

/// default number of embed extractions allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// runs every task to completion concurrently and collects their outcomes.
///
/// a failing task is logged and becomes `None`; it never cancels its siblings.
/// output order matches input order.
pub async fn join_settled<'a, T, E>(
    label: &str,
    tasks: Vec<BoxFuture<'a, Result<T, E>>>,
) -> Vec<Option<T>>
where
    E: Display,
{
    join_all(tasks)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, result)| settle(label, index, result))
        .collect()
}

/// like [`join_settled`] but keeps at most `limit` tasks in flight.
///
/// outcomes are returned in completion order.
pub async fn join_settled_bounded<'a, T, E>(
    label: &str,
    tasks: Vec<BoxFuture<'a, Result<T, E>>>,
    limit: usize,
) -> Vec<Option<T>>
where
    T: Send + 'a,
    E: Display + Send + 'a,
{
    let indexed: Vec<BoxFuture<'a, (usize, Result<T, E>)>> = tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| task.map(move |result| (index, result)).boxed())
        .collect();

    let mut settled = Vec::with_capacity(indexed.len());
    let mut in_flight = stream::iter(indexed).buffer_unordered(limit.max(1));
    while let Some((index, result)) = in_flight.next().await {
        settled.push(settle(label, index, result));
    }
    settled
}

fn settle<T, E: Display>(label: &str, index: usize, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%label, index, error = %err, "task failed; continuing with the rest");
            None
        }
    }
}
