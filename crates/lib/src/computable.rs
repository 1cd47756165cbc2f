//! Memoized asynchronous values.
//!
//! A [`Computable`] is a handle to a single, lazily evaluated outcome. Cloning
//! the handle shares the outcome: however many dependents await it, the
//! underlying work runs exactly once and every dependent observes the same
//! success value or the same [`Error`].
//!
//! Identity matters. The resolution engine guarantees "resolve at most once" by
//! handing out the *same* `Computable` for the same request, not merely an equal
//! one; [`Computable::ptr_eq`] exposes that identity.
//!
//! The engine is single-threaded and cooperative: computations are
//! `LocalBoxFuture`s and make progress only when some dependent polls them.
//!
//! With `futures::FutureExt` in scope, method syntax picks its by-value `map`
//! and `then` over the ones defined here; call them as
//! `Computable::map(&value, ..)` in that case.
//!
//! # Example
//!
//! ```
//! use fabr_lib::computable::Computable;
//!
//! # futures::executor::block_on(async {
//! let base = Computable::resolve(20);
//! let doubled = base.map(|n| Ok(n * 2));
//! let joined = Computable::for_all([doubled.clone(), doubled]);
//! assert_eq!(joined.await.unwrap(), vec![40, 40]);
//! # });
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::error::{Error, Result};

/// A shared, memoized asynchronous outcome.
#[must_use = "a Computable does nothing unless awaited"]
pub struct Computable<T> {
  inner: Shared<LocalBoxFuture<'static, Result<T>>>,
}

impl<T: Clone + 'static> Computable<T> {
  /// Wrap a future. The future is not polled until the computable is awaited.
  pub fn from_future<F>(future: F) -> Self
  where
    F: Future<Output = Result<T>> + 'static,
  {
    Self {
      inner: future.boxed_local().shared(),
    }
  }

  /// Build a computable from a callback-based producer.
  ///
  /// The producer runs immediately and receives a [`Completer`] which it (or
  /// whatever it hands the completer to) uses to settle the outcome later.
  pub fn from_fn<F>(producer: F) -> Self
  where
    F: FnOnce(Completer<T>),
  {
    let (sender, receiver) = oneshot::channel();
    producer(Completer { sender });
    Self::from_future(async move {
      receiver
        .await
        .unwrap_or_else(|_| Err(Error::Internal("computation dropped before completing".to_string())))
    })
  }

  /// An already-resolved computable.
  pub fn resolve(value: T) -> Self {
    Self::from_future(future::ready(Ok(value)))
  }

  /// An already-failed computable.
  pub fn reject(error: Error) -> Self {
    Self::from_future(future::ready(Err(error)))
  }

  /// Chain a synchronous continuation.
  pub fn map<U, F>(&self, f: F) -> Computable<U>
  where
    U: Clone + 'static,
    F: FnOnce(T) -> Result<U> + 'static,
  {
    let source = self.clone();
    Computable::from_future(async move { f(source.await?) })
  }

  /// Chain a continuation whose result is itself asynchronous.
  ///
  /// Whatever the continuation returns (another `Computable`, an `async`
  /// block, a ready future) is awaited in turn, so the result is flat.
  pub fn then<U, F, R>(&self, f: F) -> Computable<U>
  where
    U: Clone + 'static,
    F: FnOnce(T) -> R + 'static,
    R: IntoFuture<Output = Result<U>>,
    R::IntoFuture: 'static,
  {
    let source = self.clone();
    Computable::from_future(async move {
      let value = source.await?;
      f(value).into_future().await
    })
  }

  /// Join a sequence of computables.
  ///
  /// Succeeds with every value in input order, or fails with the first
  /// failure encountered.
  pub fn for_all<I>(items: I) -> Computable<Vec<T>>
  where
    I: IntoIterator<Item = Computable<T>>,
  {
    let items: Vec<_> = items.into_iter().collect();
    if items.is_empty() {
      return Computable::resolve(Vec::new());
    }
    Computable::from_future(future::try_join_all(items))
  }

  /// Whether both handles share the same underlying computation.
  pub fn ptr_eq(&self, other: &Self) -> bool {
    self.inner.ptr_eq(&other.inner)
  }

  /// The outcome, if the computation has already settled.
  pub fn peek(&self) -> Option<&Result<T>> {
    self.inner.peek()
  }

  /// Whether the computation has settled.
  pub fn is_settled(&self) -> bool {
    self.peek().is_some()
  }
}

impl<T: Clone + 'static> Clone for Computable<T> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<T: Clone + 'static> Future for Computable<T> {
  type Output = Result<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.get_mut().inner.poll_unpin(cx)
  }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computable<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.peek() {
      Some(outcome) => f.debug_tuple("Computable").field(outcome).finish(),
      None => f.write_str("Computable(<pending>)"),
    }
  }
}

/// Settles a computable created with [`Computable::from_fn`].
///
/// Dropping the completer without calling either method fails the computable
/// with [`Error::Internal`].
pub struct Completer<T> {
  sender: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
  /// Settle with a value.
  pub fn resolve(self, value: T) {
    // The receiving side only disappears if every handle was dropped.
    let _ = self.sender.send(Ok(value));
  }

  /// Settle with a failure.
  pub fn reject(self, error: Error) {
    let _ = self.sender.send(Err(error));
  }
}
