//! Per-consumer multipart delivery
//!
//! Turns a subscriber handle into a lazy, infinite byte stream. Each chunk
//! waits for the pacing deadline, then for a frame fresher than the last
//! one delivered, and is then serialized as one multipart part.
//!
//! The stream ends only when its subscriber is unsubscribed. Dropping the
//! stream (the HTTP layer does so when the client disconnects) drops the
//! handle, which unsubscribes.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;

use crate::broadcast::SubscriberHandle;
use crate::pacing::Pacer;

use super::part::MultipartEncoder;

struct Delivery {
    handle: SubscriberHandle,
    pacer: Pacer,
    encoder: Arc<MultipartEncoder>,
    wait_timeout: Duration,
    delivered: u64,
}

impl Delivery {
    async fn next_chunk(&mut self) -> Option<Bytes> {
        tokio::select! {
            _ = self.pacer.tick() => {}
            _ = self.handle.cancelled() => return None,
        }

        loop {
            match self.handle.wait_for_next(self.wait_timeout).await {
                Ok(Some(frame)) => {
                    self.delivered += 1;
                    tracing::trace!(
                        subscriber = %self.handle.id(),
                        version = frame.version(),
                        size = frame.len(),
                        "Delivering frame"
                    );
                    return Some(self.encoder.encode_frame(&frame));
                }
                // Liveness fallback: re-check without advancing the pacer
                Ok(None) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        tracing::debug!(
            subscriber = %self.handle.id(),
            delivered = self.delivered,
            "Multipart stream closed"
        );
    }
}

/// Build the multipart byte stream for one subscriber
///
/// The stream never yields an error; a cycle with nothing fresh to send
/// simply withholds the next chunk.
pub fn multipart_stream(
    handle: SubscriberHandle,
    pacer: Pacer,
    encoder: Arc<MultipartEncoder>,
    wait_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    tracing::debug!(
        subscriber = %handle.id(),
        rate = %pacer.rate(),
        "Multipart stream opened"
    );

    let delivery = Delivery {
        handle,
        pacer,
        encoder,
        wait_timeout,
        delivered: 0,
    };

    futures::stream::unfold(delivery, |mut delivery| async move {
        let chunk = delivery.next_chunk().await?;
        Some((Ok(chunk), delivery))
    })
}
