use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;

/// Returned by [`try_join_bounded`] when one of the futures failed.
///
/// Every successful result that was produced before (or while) the run was
/// aborting is handed back in `completed`, so callers holding resources in
/// `T` can release them instead of leaking them.
#[derive(Debug)]
pub struct Aborted<T, E> {
    /// The first error observed.
    pub error: E,
    /// Successful results, in dispatch order.
    pub completed: Vec<T>,
    /// Errors from in-flight futures that failed after `error` was recorded.
    pub suppressed: Vec<E>,
}

async fn indexed<F: Future>(index: usize, future: F) -> (usize, F::Output) {
    (index, future.await)
}

/// Drives `futures` with at most `limit` of them in flight at once, returning
/// their outputs positionally (`output[i]` belongs to the `i`th future).
///
/// Futures are pulled from the iterator lazily, so they are only constructed
/// once a slot frees up. On the first `Err`, no further futures are
/// dispatched; futures already in flight are polled to completion and their
/// outcomes are collected into [`Aborted`].
///
/// A `limit` of zero is treated as one.
///
/// # Examples
///
/// ```
/// use depinfo_asyncutils::try_join_bounded;
///
/// # futures::executor::block_on(async {
/// let doubled = try_join_bounded((1..=5).map(|n| async move { Ok::<_, ()>(n * 2) }), 2).await;
/// assert_eq!(doubled.unwrap(), vec![2, 4, 6, 8, 10]);
/// # });
/// ```
pub async fn try_join_bounded<I, F, T, E>(futures: I, limit: usize) -> Result<Vec<T>, Aborted<T, E>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut pending = futures.into_iter().enumerate();
    let mut processing = FuturesUnordered::new();
    processing.extend(pending.by_ref().take(limit.max(1)).map(|(index, future)| indexed(index, future)));

    let mut slots: Vec<Option<T>> = Vec::new();
    let mut error: Option<E> = None;
    let mut suppressed = Vec::new();
    while let Some((index, result)) = processing.next().await {
        match result {
            Ok(value) => {
                if slots.len() <= index {
                    slots.resize_with(index + 1, || None);
                }
                slots[index] = Some(value);
            },
            Err(e) if error.is_none() => error = Some(e),
            Err(e) => suppressed.push(e),
        }
        // Pop-n-push, but only while nothing has failed yet.
        if error.is_none()
            && let Some((index, future)) = pending.next()
        {
            processing.push(indexed(index, future));
        }
    }

    // Without an error every slot up to the last index has been filled, so
    // flattening keeps outputs aligned with their inputs.
    let completed = slots.into_iter().flatten().collect();
    match error {
        None => Ok(completed),
        Some(error) => Err(Aborted { error, completed, suppressed }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_results_are_positional() {
        // Later futures finish first.
        let futures = (0..4u64).map(|n| async move {
            sleep(Duration::from_millis(40 - n * 10)).await;
            Ok::<_, ()>(n)
        });
        let results = try_join_bounded(futures, 4).await.unwrap();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let futures: Vec<std::future::Ready<Result<u8, ()>>> = vec![];
        let results = try_join_bounded(futures, 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[rstest]
    #[case(1, 6)]
    #[case(2, 6)]
    #[case(3, 10)]
    #[case(8, 3)]
    #[tokio::test]
    async fn test_limit_is_respected(#[case] limit: usize, #[case] count: usize) {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let futures = (0..count).map(|n| {
            let (in_flight, peak) = (&in_flight, &peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(n)
            }
        });
        let results = try_join_bounded(futures, limit).await.unwrap();
        assert_eq!(results.len(), count);
        assert!(peak.load(Ordering::SeqCst) <= limit);
        assert_eq!(peak.load(Ordering::SeqCst), limit.min(count));
    }

    #[tokio::test]
    async fn test_zero_limit_still_progresses() {
        let futures = (0..3).map(|n| async move { Ok::<_, ()>(n) });
        assert_eq!(try_join_bounded(futures, 0).await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_first_error_stops_dispatch() {
        let started = AtomicUsize::new(0);
        let futures = (0..10).map(|n| {
            let started = &started;
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    return Err(format!("batch {n} failed"));
                }
                sleep(Duration::from_millis(10)).await;
                Ok(n)
            }
        });
        let aborted = try_join_bounded(futures, 2).await.unwrap_err();
        assert_eq!(aborted.error, "batch 1 failed");
        // Future 0 was already in flight and is allowed to finish.
        assert_eq!(aborted.completed, vec![0]);
        assert!(aborted.suppressed.is_empty());
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_later_errors_are_suppressed() {
        let futures = (0..3u64).map(|n| async move {
            sleep(Duration::from_millis(n * 10)).await;
            if n == 2 { Ok(n) } else { Err(n) }
        });
        let aborted = try_join_bounded(futures, 3).await.unwrap_err();
        assert_eq!(aborted.error, 0);
        assert_eq!(aborted.suppressed, vec![1]);
        assert_eq!(aborted.completed, vec![2]);
    }
}
