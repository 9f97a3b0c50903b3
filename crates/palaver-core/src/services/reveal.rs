use std::time::Duration;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// Incremental text delivered to the exchange engine.
pub type RevealStream = BoxStream<'static, String>;

/// Disclose an already known text one character at a time.
///
/// Each item is a single-character delta, preceded by a pause of `delay`.
/// Once `cancel` fires the stream ends without yielding further characters,
/// so a consumer always holds a prefix of `full_text`.
pub fn reveal_stream(full_text: String, delay: Duration, cancel: CancellationToken) -> RevealStream {
    Box::pin(async_stream::stream! {
        for ch in full_text.chars() {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if cancel.is_cancelled() {
                break;
            }
            yield ch.to_string();
        }
    })
}
