//! Single-writer actors.
//!
//! An [`Actor`] owns a piece of state and a bounded inbox of closures. One
//! tokio task drains the inbox and runs each closure against the state, so
//! every mutation is serialized and observed in submission order. Callers
//! either wait for a typed reply ([`Actor::execute`]) or enqueue and move on
//! ([`Actor::fire`]).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

/// Inbox capacity. Submitting to a full inbox waits for a free slot.
pub const INBOX_CAPACITY: usize = 100;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActorError {
    #[error("actor {0} is no longer running")]
    Closed(String),
}

pub struct Actor<S> {
    name: Arc<str>,
    tx: mpsc::Sender<Job<S>>,
}

impl<S> Clone for Actor<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<S: Send + 'static> Actor<S> {
    /// Start the worker task. Must be called inside a tokio runtime.
    pub fn spawn(name: impl Into<String>, state: S) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, mut rx) = mpsc::channel::<Job<S>>(INBOX_CAPACITY);

        let worker_name = name.clone();
        tokio::spawn(async move {
            let mut state = state;
            while let Some(job) = rx.recv().await {
                // A panicking closure must not take the account down with it.
                if catch_unwind(AssertUnwindSafe(|| job(&mut state))).is_err() {
                    tracing::error!("actor {} job panicked", worker_name);
                }
            }
            tracing::debug!("actor {} stopped", worker_name);
        });

        tracing::debug!("actor {} started", name);
        Self { name, tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` on the actor and wait for its result.
    pub async fn execute<T, F>(&self, f: F) -> Result<T, ActorError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Box::new(move |state: &mut S| {
                let _ = reply_tx.send(f(state));
            }))
            .await
            .map_err(|_| self.closed())?;
        reply_rx.await.map_err(|_| self.closed())
    }

    /// Enqueue `f` without waiting for it to run.
    pub async fn fire<F>(&self, f: F) -> Result<(), ActorError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx.send(Box::new(f)).await.map_err(|_| self.closed())
    }

    /// Like [`Actor::execute`], but gives up waiting after `timeout`.
    ///
    /// The closure is not cancelled: once enqueued it still runs to
    /// completion, only its result is dropped.
    pub async fn execute_with_timeout<T, F>(&self, timeout: Duration, f: F) -> Option<T>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(timeout, self.execute(f)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!("{}", e);
                None
            }
            Err(_) => {
                tracing::warn!("actor {} timed out after {:?}", self.name, timeout);
                None
            }
        }
    }

    /// Blocking variant for threads outside the runtime.
    pub fn execute_blocking<T, F>(&self, f: F) -> Result<T, ActorError>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send(Box::new(move |state: &mut S| {
                let _ = reply_tx.send(f(state));
            }))
            .map_err(|_| self.closed())?;
        reply_rx.blocking_recv().map_err(|_| self.closed())
    }

    fn closed(&self) -> ActorError {
        ActorError::Closed(self.name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_returns_closure_result() {
        let actor = Actor::spawn("counter", 0u64);
        let v = actor
            .execute(|n| {
                *n += 5;
                *n
            })
            .await
            .unwrap();
        assert_eq!(v, 5);
    }

    #[tokio::test]
    async fn fire_is_ordered_before_later_execute() {
        let actor = Actor::spawn("log", Vec::<u32>::new());
        for i in 0..50 {
            actor.fire(move |v| v.push(i)).await.unwrap();
        }
        let seen = actor.execute(|v| v.clone()).await.unwrap();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let actor = Actor::spawn("counter", 0u64);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let a = actor.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    a.fire(|n| *n += 1).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(actor.execute(|n| *n).await.unwrap(), 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timeout_returns_none_but_job_still_runs() {
        let actor = Actor::spawn("slow", 0u32);
        let got = actor
            .execute_with_timeout(Duration::from_millis(10), |n| {
                std::thread::sleep(Duration::from_millis(100));
                *n = 7;
                *n
            })
            .await;
        assert_eq!(got, None);
        assert_eq!(actor.execute(|n| *n).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_actor() {
        let actor = Actor::spawn("fragile", 1u32);
        let res = actor.execute(|_| -> u32 { panic!("boom") }).await;
        assert_eq!(res, Err(ActorError::Closed("fragile".to_string())));
        assert_eq!(actor.execute(|n| *n).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn execute_blocking_from_plain_thread() {
        let actor = Actor::spawn("blocking", String::from("a"));
        let a = actor.clone();
        let out = tokio::task::spawn_blocking(move || {
            a.execute_blocking(|s| {
                s.push('b');
                s.clone()
            })
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(out, "ab");
    }
}
