//! Stream throttling utilities

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during an interval, only the latest is emitted.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Create a new throttled stream
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // Don't burst after a slow consumer
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.done {
            return Poll::Ready(this.pending.take());
        }

        loop {
            ready!(this.interval.poll_tick(cx));

            // Drain everything available, keeping only the latest
            loop {
                match this.stream.as_mut().poll_next(cx) {
                    Poll::Ready(Some(item)) => *this.pending = Some(item),
                    Poll::Ready(None) => {
                        *this.done = true;
                        return Poll::Ready(this.pending.take());
                    }
                    Poll::Pending => break,
                }
            }

            if let Some(item) = this.pending.take() {
                return Poll::Ready(Some(item));
            }
            // Nothing arrived this interval; wait for the next tick
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::watch;
    use tokio_stream::wrappers::WatchStream;

    #[tokio::test]
    async fn keeps_only_the_latest_item_per_interval() {
        let items = futures::stream::iter(1..=5).throttle(Duration::from_millis(10));
        let out: Vec<i32> = items.collect().await;
        assert_eq!(out, vec![5]);
    }

    #[tokio::test]
    async fn idle_intervals_do_not_end_the_stream() {
        let (tx, rx) = watch::channel(0u32);
        let mut throttled = WatchStream::from_changes(rx).throttle(Duration::from_millis(5));

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.send_replace(7);
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.send_replace(9);
        });

        assert_eq!(throttled.next().await, Some(7));
        assert_eq!(throttled.next().await, Some(9));
        producer.await.unwrap();
        assert_eq!(throttled.next().await, None);
    }
}
