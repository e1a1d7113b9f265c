use futures::future::BoxFuture;

use super::error::Result;
use crate::store::BookingStore;

/// Runs `f` inside one store transaction: commit on `Ok`, rollback on `Err`.
///
/// If `f` panics the handle is dropped during unwinding, which discards the
/// transaction in every `BookingStore` implementation.
///
/// ```ignore
/// let n = with_transaction(&store, |store, tx| {
///     Box::pin(async move { Ok(store.participants(tx, id).await?.len()) })
/// })
/// .await?;
/// ```
pub async fn with_transaction<S, T, F>(store: &S, f: F) -> Result<T>
where
    S: BookingStore,
    T: Send,
    F: for<'t> FnOnce(&'t S, &'t mut S::Tx) -> BoxFuture<'t, Result<T>> + Send,
{
    let mut tx = store.begin().await?;
    match f(store, &mut tx).await {
        Ok(value) => {
            store.commit(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback(tx).await {
                tracing::warn!("Rollback after failed transaction also failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
