//! Shared types and paging infrastructure for the YouTube API client.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// One page of results plus the continuation token for the next page, if any.
pub type Page<T> = (VecDeque<T>, Option<String>);

type PendingPage<'a, F, T> = Pin<Box<dyn Future<Output = eyre::Result<(F, Page<T>)>> + 'a + Send>>;

/// A stream over a paginated YouTube list endpoint.
///
/// Items are yielded one at a time in the order the pages returned them. The next page is only
/// requested once the current one is drained, and only if the previous response carried a
/// non-empty `nextPageToken`. A failed page request ends the stream after yielding its error.
pub struct PagedStream<'a, T, F> {
    buffered: VecDeque<T>,
    in_flight: Option<PendingPage<'a, F, T>>,
    exhausted: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Creates a stream whose first request is made with no page token.
    pub fn new<Fut>(fetch_page: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
    {
        Self {
            buffered: VecDeque::new(),
            in_flight: Some(Box::pin(async move {
                let page = fetch_page(None).await?;
                Ok((fetch_page, page))
            })),
            exhausted: false,
        }
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            if self.exhausted {
                return Poll::Ready(None);
            }
            let Some(in_flight) = self.in_flight.as_mut() else {
                self.exhausted = true;
                return Poll::Ready(None);
            };

            match in_flight.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    self.in_flight = None;
                    self.exhausted = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok((fetch_page, (items, next_token)))) => {
                    self.buffered.extend(items);
                    // the API has been seen to send "" rather than omitting the field
                    match next_token.filter(|token| !token.is_empty()) {
                        Some(token) => {
                            self.in_flight = Some(Box::pin(async move {
                                let page = fetch_page(Some(token)).await?;
                                Ok((fetch_page, page))
                            }));
                        }
                        None => {
                            self.in_flight = None;
                            self.exhausted = true;
                        }
                    }
                }
            }
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}
