//! Bounded channels for backpressure between workers and the saver.

use tokio::sync::mpsc;

/// Create a bounded channel pair holding at most `capacity` items.
///
/// When the buffer is full, workers block on send until the saver drains it,
/// which caps the number of scored records held in memory.
pub fn bounded_channel<T>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_channel() {
        let (tx, mut rx) = bounded_channel::<i32>(10);

        tx.send(42).await.unwrap();
        let received = rx.recv().await;

        assert_eq!(received, Some(42));
    }

    #[tokio::test]
    async fn test_full_channel_rejects_try_send() {
        let (tx, mut rx) = bounded_channel::<i32>(2);
        tx.try_send(1).unwrap();
        tx.try_send(2).unwrap();
        assert!(tx.try_send(3).is_err());

        assert_eq!(rx.recv().await, Some(1));
        tx.try_send(3).unwrap();
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let (tx, mut rx) = bounded_channel::<&str>(0);
        tx.send("one").await.unwrap();
        drop(tx);
        assert_eq!(rx.recv().await, Some("one"));
        assert_eq!(rx.recv().await, None);
    }
}
