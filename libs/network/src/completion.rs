//! Completion queues.
//!
//! Each service loop waits on exactly one queue. Armed I/O posts its result
//! as an event; shutdown posts a sentinel. A `wait()` that yields `None`
//! means every producer handle is gone and the queue can never fire again,
//! which loops treat as an exit signal.

use tokio::sync::mpsc;

/// One dequeued entry: a finished operation or the shutdown sentinel.
#[derive(Debug)]
pub enum Completion<T> {
    Event(T),
    Sentinel,
}

/// Producer side of a completion queue.
#[derive(Debug)]
pub struct CompletionQueue<T> {
    tx: mpsc::UnboundedSender<Completion<T>>,
}

impl<T> Clone for CompletionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> CompletionQueue<T> {
    /// Enqueues a finished operation. Posting onto a queue whose receiver is
    /// gone is a no-op.
    pub fn post(&self, event: T) {
        let _ = self.tx.send(Completion::Event(event));
    }

    /// Enqueues the shutdown sentinel.
    pub fn post_sentinel(&self) {
        let _ = self.tx.send(Completion::Sentinel);
    }
}

/// Consumer side of a completion queue, held by one service loop.
#[derive(Debug)]
pub struct CompletionReceiver<T> {
    rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T> CompletionReceiver<T> {
    /// Waits indefinitely for the next completion.
    pub async fn wait(&mut self) -> Option<Completion<T>> {
        self.rx.recv().await
    }
}

/// Creates a completion queue pair.
pub fn completion_queue<T>() -> (CompletionQueue<T>, CompletionReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CompletionQueue { tx }, CompletionReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_post_order() {
        let (queue, mut rx) = completion_queue();
        queue.post(1u32);
        queue.post(2u32);
        assert!(matches!(rx.wait().await, Some(Completion::Event(1))));
        assert!(matches!(rx.wait().await, Some(Completion::Event(2))));
    }

    #[tokio::test]
    async fn sentinel_is_delivered_after_pending_events() {
        let (queue, mut rx) = completion_queue();
        queue.post(7u32);
        queue.post_sentinel();
        assert!(matches!(rx.wait().await, Some(Completion::Event(7))));
        assert!(matches!(rx.wait().await, Some(Completion::Sentinel)));
    }

    #[tokio::test]
    async fn abandoned_queue_yields_none() {
        let (queue, mut rx) = completion_queue::<u32>();
        drop(queue);
        assert!(rx.wait().await.is_none());
    }
}
