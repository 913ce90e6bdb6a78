//! Cross-thread call queue into the interaction thread.
//!
//! Background work never touches editor state directly. It enqueues closures
//! through a [`UiHandle`]; the interaction thread owns the [`UiTaskQueue`]
//! and runs them on its own tick via [`UiTaskQueue::drain`]. Each call is
//! paired with a [`UiFuture`] the caller may block on.
//!
//! Ordering is plain FIFO per queue. A batch is sent as a single queue item,
//! so nothing enqueued afterwards, from any thread, can run in between.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::EditorError;

type UiCall<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum QueueItem<S> {
    Call(UiCall<S>),
    Batch(Vec<UiCall<S>>),
}

type Notifier = Arc<dyn Fn() + Send + Sync + 'static>;

/// Result of a queued call, resolved once the interaction thread has run it.
#[must_use = "a UiFuture does nothing unless waited on or dropped deliberately"]
pub struct UiFuture<R> {
    rx: oneshot::Receiver<R>,
}

impl<R> UiFuture<R> {
    /// Block the calling thread until the call has run.
    ///
    /// Must not be called from the interaction thread itself (it would wait on
    /// its own drain) nor from inside an async runtime.
    pub fn wait(self) -> Result<R, EditorError> {
        self.rx.blocking_recv().map_err(|_| EditorError::QueueClosed)
    }

    /// Take the result if the call already ran.
    pub fn try_take(&mut self) -> Option<R> {
        self.rx.try_recv().ok()
    }
}

impl<R> fmt::Debug for UiFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiFuture").finish_non_exhaustive()
    }
}

/// Producer side of the queue. Cheap to clone and `Send`.
pub struct UiHandle<S> {
    tx: mpsc::UnboundedSender<QueueItem<S>>,
    notify: Option<Notifier>,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl<S: 'static> UiHandle<S> {
    fn wrap<F, R>(f: F) -> (UiCall<S>, UiFuture<R>)
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let call: UiCall<S> = Box::new(move |state: &mut S| {
            // The caller may have stopped waiting.
            let _ = tx.send(f(state));
        });
        (call, UiFuture { rx })
    }

    fn send(&self, item: QueueItem<S>) {
        // A closed queue drops the call, and with it the oneshot sender, so
        // the matching future resolves to `QueueClosed`.
        if self.tx.send(item).is_err() {
            tracing::debug!("UI queue closed, dropping call");
        }
    }

    /// Queue a call without waking the interaction thread.
    pub fn enqueue<F, R>(&self, f: F) -> UiFuture<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (call, fut) = Self::wrap(f);
        self.send(QueueItem::Call(call));
        fut
    }

    /// Queue several calls that run back to back, in order.
    pub fn enqueue_batch<I, F, R>(&self, calls: I) -> Vec<UiFuture<R>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (calls, futures): (Vec<_>, Vec<_>) = calls.into_iter().map(Self::wrap).unzip();
        self.send(QueueItem::Batch(calls));
        futures
    }

    /// Wake the interaction thread so it drains the queue.
    pub fn signal(&self) {
        if let Some(notify) = &self.notify {
            notify();
        }
    }

    /// Queue a call, wake the interaction thread and block on the result.
    pub fn call<F, R>(&self, f: F) -> Result<R, EditorError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let fut = self.enqueue(f);
        self.signal();
        fut.wait()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the queue, owned by the interaction thread.
pub struct UiTaskQueue<S> {
    rx: mpsc::UnboundedReceiver<QueueItem<S>>,
    handle: UiHandle<S>,
}

impl<S: 'static> Default for UiTaskQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> UiTaskQueue<S> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: UiHandle { tx, notify: None },
        }
    }

    /// Queue whose handles call `notify` when signalled, so an event loop can
    /// schedule a drain.
    pub fn with_notifier(notify: impl Fn() + Send + Sync + 'static) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: UiHandle {
                tx,
                notify: Some(Arc::new(notify)),
            },
        }
    }

    /// A new producer handle for this queue.
    pub fn handle(&self) -> UiHandle<S> {
        self.handle.clone()
    }

    /// Run every pending call on `state`. Returns the number of calls run.
    pub fn drain(&mut self, state: &mut S) -> usize {
        let mut ran = 0;
        while let Ok(item) = self.rx.try_recv() {
            match item {
                QueueItem::Call(call) => {
                    call(state);
                    ran += 1;
                }
                QueueItem::Batch(calls) => {
                    for call in calls {
                        call(state);
                        ran += 1;
                    }
                }
            }
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_drain_runs_in_fifo_order() {
        let mut queue = UiTaskQueue::<Vec<u32>>::new();
        let handle = queue.handle();
        let a = handle.enqueue(|log| {
            log.push(1);
            "a"
        });
        let b = handle.enqueue(|log| {
            log.push(2);
            "b"
        });

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 2);
        assert_eq!(log, vec![1, 2]);
        assert_eq!(a.wait().unwrap(), "a");
        assert_eq!(b.wait().unwrap(), "b");
        assert_eq!(queue.drain(&mut log), 0);
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut queue = UiTaskQueue::<Vec<u32>>::new();
        let handle = queue.handle();
        let futures = handle.enqueue_batch((0..3).map(|i| {
            move |log: &mut Vec<u32>| {
                log.push(i);
                i * 10
            }
        }));
        let after = handle.enqueue(|log: &mut Vec<u32>| log.push(99));

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 4);
        assert_eq!(log, vec![0, 1, 2, 99]);
        let results: Vec<u32> = futures.into_iter().map(|f| f.wait().unwrap()).collect();
        assert_eq!(results, vec![0, 10, 20]);
        after.wait().unwrap();
    }

    #[test]
    fn test_try_take_before_and_after_drain() {
        let mut queue = UiTaskQueue::<u32>::new();
        let mut fut = queue.handle().enqueue(|n| *n + 1);
        assert_eq!(fut.try_take(), None);
        let mut state = 41;
        queue.drain(&mut state);
        assert_eq!(fut.try_take(), Some(42));
    }

    #[test]
    fn test_background_call_blocks_until_drained() {
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let mut queue = UiTaskQueue::<String>::with_notifier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let handle = queue.handle();

        let worker = thread::spawn(move || handle.call(|text: &mut String| text.len()));

        let mut state = String::from("魔王");
        while !worker.is_finished() {
            queue.drain(&mut state);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(worker.join().unwrap(), Ok(6));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_queue_resolves_closed() {
        let queue = UiTaskQueue::<u32>::new();
        let handle = queue.handle();
        let fut = handle.enqueue(|n| *n);
        drop(queue);
        assert_eq!(fut.wait(), Err(EditorError::QueueClosed));
        assert!(handle.is_closed());
        assert_eq!(handle.call(|n| *n), Err(EditorError::QueueClosed));
    }
}
