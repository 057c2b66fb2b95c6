//! Bounded-concurrency execution of independent units.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::error::{EvalError, Result};

/// Run `worker` over every unit with at most `limit` in flight at once.
///
/// Results come back in input order regardless of completion order. A
/// `limit` of 0 is treated as 1. Units are never cancelled once started;
/// a panicking worker surfaces as [`EvalError::TaskJoin`] after the pool
/// drains.
pub async fn run_bounded<T, R, F, Fut>(units: Vec<T>, limit: usize, worker: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = units.len();
    let sem = Arc::new(Semaphore::new(limit.max(1)));
    let worker = Arc::new(worker);

    let mut join_set = JoinSet::new();
    for (idx, unit) in units.into_iter().enumerate() {
        let sem = Arc::clone(&sem);
        let worker = Arc::clone(&worker);
        join_set.spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            (idx, worker(unit).await)
        });
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let mut join_error = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, out)) => slots[idx] = Some(out),
            Err(e) => {
                join_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
    if let Some(e) = join_error {
        return Err(EvalError::TaskJoin(e));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| slot.ok_or_else(|| EvalError::TaskJoin(format!("missing result for unit {idx}"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        // Later units finish first.
        let out = run_bounded(vec![40u64, 30, 20, 10, 0], 5, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        })
        .await
        .unwrap();
        assert_eq!(out, vec![40, 30, 20, 10, 0]);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let out = run_bounded((0..12).collect::<Vec<usize>>(), 3, move |i| {
            let (in_flight, peak) = (Arc::clone(&f), Arc::clone(&p));
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i * 2
            }
        })
        .await
        .unwrap();

        assert_eq!(out, (0..12).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_serially() {
        let out = run_bounded(vec![1, 2, 3], 0, |x| async move { x + 1 }).await.unwrap();
        assert_eq!(out, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out: Vec<u8> = run_bounded(Vec::<u8>::new(), 4, |x| async move { x }).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_worker_is_a_join_error() {
        let result = run_bounded(vec![1, 2], 2, |x: i32| async move {
            if x == 2 {
                panic!("boom");
            }
            x
        })
        .await;
        assert!(matches!(result, Err(EvalError::TaskJoin(_))));
    }
}
