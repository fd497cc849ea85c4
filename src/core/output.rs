//! Asynchronously-resolved values produced by the provisioning engine.
//!
//! The external engine hands back values (stack exports, created users) that
//! only become known once it converges. [`Output<T>`] wraps such a value as a
//! shared, lazily-polled future so that any number of continuations can be
//! attached with [`Output::map`] / [`Output::and_then`] without dedicating a
//! thread to each lookup. Every clone observes the same single resolution.
//!
//! [`promise`] creates a single-assignment cell backed by a oneshot channel.
//! Export sources and tests use it to resolve a value after the fact:
//!
//! ```rust,no_run
//! use stackbind_cli::core::promise;
//!
//! # async fn example() -> Result<(), stackbind_cli::core::BindError> {
//! let (cell, uri) = promise::<String>("mongo-uri");
//! let with_db = uri.map(|uri| format!("{uri}/billing"));
//!
//! cell.resolve("mongodb+srv://cluster0.example.net".to_string());
//! assert_eq!(with_db.await?, "mongodb+srv://cluster0.example.net/billing");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};

use super::error::BindError;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, BindError>>>;

/// A value that resolves asynchronously, possibly to an error.
pub struct Output<T>
where
    T: Clone,
{
    inner: SharedResult<T>,
}

impl<T> Clone for Output<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Output<T>
where
    T: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.inner.peek().is_some() {
            "resolved"
        } else {
            "pending"
        };
        f.debug_struct("Output").field("state", &state).finish()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a future as an output.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, BindError>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// An output that is already known.
    pub fn ready(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// An output that has already failed.
    pub fn failed(error: BindError) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// Transform the resolved value.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::new(async move { inner.await.map(f) })
    }

    /// Transform the resolved value with a fallible function.
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, BindError> + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::new(async move { inner.await.and_then(f) })
    }

    /// Chain an asynchronous computation after this output resolves.
    pub fn and_then<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, BindError>> + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::new(async move {
            let value = inner.await?;
            f(value).await
        })
    }

    /// Combine two outputs into a pair that resolves once both have.
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.inner.clone();
        let right = other.inner.clone();
        Output::new(async move { future::try_join(left, right).await })
    }

    /// Collect many outputs into one; fails with the first error.
    pub fn all(outputs: impl IntoIterator<Item = Output<T>>) -> Output<Vec<T>> {
        let futures: Vec<_> = outputs.into_iter().map(|output| output.inner).collect();
        Output::new(future::try_join_all(futures))
    }

    /// Drop the value, keeping only completion and failure.
    pub fn unit(&self) -> Output<()> {
        self.map(|_| ())
    }

    /// Wait for the value.
    pub async fn get(&self) -> Result<T, BindError> {
        self.inner.clone().await
    }

    /// The resolution if it has already happened.
    pub fn peek(&self) -> Option<Result<T, BindError>> {
        self.inner.peek().cloned()
    }
}

impl<T> IntoFuture for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Result<T, BindError>;
    type IntoFuture = SharedResult<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

/// Write half of a single-assignment cell created by [`promise`].
#[derive(Debug)]
pub struct Promise<T> {
    sender: oneshot::Sender<Result<T, BindError>>,
}

impl<T> Promise<T> {
    /// Resolve the paired output with a value.
    pub fn resolve(self, value: T) {
        // The receiver may already be gone if every reader was dropped.
        let _ = self.sender.send(Ok(value));
    }

    /// Resolve the paired output with an error.
    pub fn reject(self, error: BindError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Create a single-assignment cell and the output that observes it.
///
/// Dropping the [`Promise`] without resolving it fails the output with
/// [`BindError::Abandoned`].
pub fn promise<T>(name: impl Into<String>) -> (Promise<T>, Output<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let name = name.into();
    let output = Output::new(async move {
        match receiver.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(BindError::Abandoned {
                name,
            }),
        }
    });
    (
        Promise {
            sender,
        },
        output,
    )
}
