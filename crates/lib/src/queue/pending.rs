//! Handles for operations whose transaction has not finished yet.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use super::QueueError;
use super::op::Output;
use crate::Result;

/// The eventual result of one captured operation.
///
/// Resolves once the transaction the operation belongs to has committed, or
/// with [`QueueError::TransactionAborted`] if it rolled back. Dropping a
/// `Pending` does not cancel the operation.
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<Output>>,
    decode: fn(Output) -> Result<T>,
}

impl<T> Pending<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Output>>, decode: fn(Output) -> Result<T>) -> Self {
        Self { rx, decode }
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(output))) => Poll::Ready((this.decode)(output)),
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(e)),
            // The sender was dropped without replying: the transaction never ran.
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::TransactionAborted.into())),
        }
    }
}

pub(crate) fn unit(output: Output) -> Result<()> {
    match output {
        Output::Done => Ok(()),
        _ => Err(QueueError::UnexpectedOutput { operation: "write" }.into()),
    }
}

pub(crate) fn value<V: DeserializeOwned>(output: Output) -> Result<Option<V>> {
    match output {
        Output::Value(raw) => Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?),
        _ => Err(QueueError::UnexpectedOutput { operation: "load" }.into()),
    }
}

pub(crate) fn entries<V: DeserializeOwned>(output: Output) -> Result<Vec<(String, V)>> {
    match output {
        Output::Entries(rows) => rows
            .into_iter()
            .map(|(key, raw)| Ok((key, serde_json::from_str(&raw)?)))
            .collect(),
        _ => Err(QueueError::UnexpectedOutput {
            operation: "load_all",
        }
        .into()),
    }
}

pub(crate) fn keys(output: Output) -> Result<Vec<String>> {
    match output {
        Output::Keys(keys) => Ok(keys),
        _ => Err(QueueError::UnexpectedOutput { operation: "list" }.into()),
    }
}
