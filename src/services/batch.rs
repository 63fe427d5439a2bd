use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub ok: usize,
    pub fail: usize,
}

/// Per-item results of a fan-out, in input order.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub results: Vec<Result<T>>,
}

impl<T> BatchOutcome<T> {
    pub fn tally(&self) -> Tally {
        let ok = self.results.iter().filter(|r| r.is_ok()).count();
        Tally {
            ok,
            fail: self.results.len() - ok,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Run `op` over every item with at most `limit` in flight. A failing item
/// never cancels its siblings.
pub async fn fan_out<I, T, F, Fut>(
    items: impl IntoIterator<Item = I>,
    limit: usize,
    op: F,
) -> BatchOutcome<T>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let results = stream::iter(items)
        .map(op)
        .buffered(limit.max(1))
        .collect()
        .await;

    BatchOutcome { results }
}
