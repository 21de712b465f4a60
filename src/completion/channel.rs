//! Single-resolution completion channel
//!
//! # Invariants
//! - Settles at most once; later `resolve`/`reject` calls are ignored.
//! - One observer slot per outcome kind; registering again replaces it.
//! - The outcome is delivered at most once, to exactly one consumer.
//! - Delivery to observers is always scheduled, never inline.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use super::schedule::schedule;
use crate::error::{RecordError, RecordResult};

type ValueObserver<T> = Box<dyn FnOnce(T) + Send>;
type ErrorObserver = Box<dyn FnOnce(RecordError) + Send>;

struct Shared<T> {
    settled: bool,
    delivered: bool,
    outcome: Option<RecordResult<T>>,
    on_value: Option<ValueObserver<T>>,
    on_error: Option<ErrorObserver>,
    wakers: Vec<Waker>,
}

enum Delivery<T> {
    Value(ValueObserver<T>, T),
    Error(ErrorObserver, RecordError),
}

impl<T: Send + 'static> Delivery<T> {
    fn dispatch(self) {
        match self {
            Delivery::Value(observer, value) => schedule(move || observer(value)),
            Delivery::Error(observer, err) => schedule(move || observer(err)),
        }
    }
}

impl<T> Shared<T> {
    /// Hand the outcome to its matching observer, if both are present.
    fn take_delivery(&mut self) -> Option<Delivery<T>> {
        if !self.settled || self.delivered {
            return None;
        }
        let ready = match &self.outcome {
            Some(Ok(_)) => self.on_value.is_some(),
            Some(Err(_)) => self.on_error.is_some(),
            None => false,
        };
        if !ready {
            return None;
        }

        self.delivered = true;
        let on_value = self.on_value.take();
        let on_error = self.on_error.take();
        match (self.outcome.take(), on_value, on_error) {
            (Some(Ok(value)), Some(observer), _) => Some(Delivery::Value(observer, value)),
            (Some(Err(err)), _, Some(observer)) => Some(Delivery::Error(observer, err)),
            _ => None,
        }
    }
}

/// Single-resolution future delivering an outcome to one consumer.
///
/// Handles are cheap to clone and share one state. The outcome goes to the
/// matching registered observer, or to whoever awaits the completion, exactly
/// once. An outcome nobody asks for is dropped with the last handle.
pub struct Completion<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.lock();
        f.debug_struct("Completion")
            .field("settled", &shared.settled)
            .field("delivered", &shared.delivered)
            .finish()
    }
}

impl<T: Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true once `resolve` or `reject` took effect
    pub fn is_settled(&self) -> bool {
        self.lock().settled
    }

    /// Returns true once the outcome was handed to a consumer
    pub fn is_delivered(&self) -> bool {
        self.lock().delivered
    }
}

impl<T: Send + 'static> Completion<T> {
    /// An unsettled completion
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                settled: false,
                delivered: false,
                outcome: None,
                on_value: None,
                on_error: None,
                wakers: Vec::new(),
            })),
        }
    }

    /// A completion already settled with `outcome`
    pub fn settled(outcome: RecordResult<T>) -> Self {
        let completion = Self::new();
        completion.settle(outcome);
        completion
    }

    /// Settle with a value. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns false if already settled.
    pub fn reject(&self, err: RecordError) -> bool {
        self.settle(Err(err))
    }

    /// Settle with `outcome`; the first call wins.
    pub fn settle(&self, outcome: RecordResult<T>) -> bool {
        let (delivery, wakers) = {
            let mut shared = self.lock();
            if shared.settled {
                return false;
            }
            shared.settled = true;
            shared.outcome = Some(outcome);
            (shared.take_delivery(), std::mem::take(&mut shared.wakers))
        };

        if let Some(delivery) = delivery {
            delivery.dispatch();
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Register the success observer, replacing any previous one.
    pub fn on_value<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        let delivery = {
            let mut shared = self.lock();
            shared.on_value = Some(Box::new(observer));
            shared.take_delivery()
        };
        if let Some(delivery) = delivery {
            delivery.dispatch();
        }
        self
    }

    /// Register the error observer, replacing any previous one.
    pub fn on_error<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(RecordError) + Send + 'static,
    {
        let delivery = {
            let mut shared = self.lock();
            shared.on_error = Some(Box::new(observer));
            shared.take_delivery()
        };
        if let Some(delivery) = delivery {
            delivery.dispatch();
        }
        self
    }
}

impl<T> Future for Completion<T> {
    type Output = RecordResult<T>;

    /// Awaiting consumes the outcome unless an observer or another awaiter
    /// already took it, in which case it resolves to
    /// [`RecordError::AlreadyDelivered`].
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.lock();
        if shared.delivered {
            return Poll::Ready(Err(RecordError::AlreadyDelivered));
        }
        if shared.settled {
            shared.delivered = true;
            shared.on_value = None;
            shared.on_error = None;
            return Poll::Ready(shared.outcome.take().unwrap_or(Err(RecordError::AlreadyDelivered)));
        }
        // Every pending awaiter is woken; the first to poll takes the outcome
        if !shared.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            shared.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_first_settle_wins() {
        let completion = Completion::new();
        assert!(completion.resolve(1));
        assert!(!completion.reject(RecordError::WorkerStopped));
        assert!(!completion.resolve(2));
        assert_eq!(completion.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_observer_registered_before_settle() {
        let completion = Completion::new();
        let (tx, rx) = oneshot::channel();
        completion.on_value(move |v: i32| {
            let _ = tx.send(v);
        });

        completion.resolve(5);
        assert_eq!(rx.await.unwrap(), 5);
        assert!(completion.is_delivered());
    }

    #[tokio::test]
    async fn test_late_registration_is_not_inline() {
        let completion = Completion::settled(Ok("done"));
        let called = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        let flag = Arc::clone(&called);
        completion.on_value(move |_| {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        });

        assert!(!called.load(Ordering::SeqCst));
        rx.await.unwrap();
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let completion = Completion::new();
        let first = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = Arc::clone(&first);
        completion.on_value(move |_: ()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        completion.on_value(move |_| {
            let _ = tx.send(());
        });

        completion.resolve(());
        rx.await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_waits_for_error_observer() {
        let completion: Completion<i32> = Completion::new();
        let value_called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&value_called);
        completion.on_value(move |_| flag.store(true, Ordering::SeqCst));

        completion.reject(RecordError::validation_failed("v"));
        assert!(!completion.is_delivered());

        let (tx, rx) = oneshot::channel();
        completion.on_error(move |err| {
            let _ = tx.send(err.to_string());
        });
        assert_eq!(rx.await.unwrap(), "v failed validation");
        assert!(!value_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_await_after_delivery() {
        let completion = Completion::new();
        let (tx, rx) = oneshot::channel();
        completion.on_value(move |v: u8| {
            let _ = tx.send(v);
        });
        completion.resolve(3);
        assert_eq!(rx.await.unwrap(), 3);

        let err = completion.clone().await.unwrap_err();
        assert!(matches!(err, RecordError::AlreadyDelivered));
    }

    #[tokio::test]
    async fn test_concurrent_awaiters_all_wake() {
        let completion = Completion::new();
        let first = tokio::spawn(completion.clone());
        let second = tokio::spawn(completion.clone());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        completion.resolve(7);
        let timeout = std::time::Duration::from_secs(5);
        let first = tokio::time::timeout(timeout, first).await.unwrap().unwrap();
        let second = tokio::time::timeout(timeout, second).await.unwrap().unwrap();

        let mut outcomes = [first, second];
        outcomes.sort_by_key(|outcome| outcome.is_err());
        assert_eq!(outcomes[0].as_ref().ok(), Some(&7));
        assert!(matches!(outcomes[1], Err(RecordError::AlreadyDelivered)));
    }

    #[tokio::test]
    async fn test_await_before_settle() {
        let completion: Completion<i32> = Completion::new();
        let settler = completion.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            settler.reject(RecordError::WorkerStopped);
        });
        assert!(matches!(completion.await, Err(RecordError::WorkerStopped)));
    }
}
