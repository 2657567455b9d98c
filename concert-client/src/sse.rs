use std::pin::Pin;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};

use concert_shared::Notification;

use crate::error::{ServiceError, ServiceResult};

struct Frames<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
}

impl<S> Frames<S> {
    /// Pops the next complete frame (terminated by a blank line) off the buffer.
    fn next_frame(&mut self) -> Option<String> {
        let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
        Some(String::from_utf8_lossy(&frame[..end]).into_owned())
    }
}

/// Decodes one SSE frame. Comment-only frames (keep-alives) yield `None`.
fn decode_frame(frame: &str) -> Option<ServiceResult<Notification>> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() {
        return None;
    }

    Some(serde_json::from_str(&data.join("\n")).map_err(|e| ServiceError::Decode(e.to_string())))
}

/// Turns a raw `text/event-stream` body into a stream of notifications.
pub(crate) fn notifications<S, B>(body: S) -> BoxStream<'static, ServiceResult<Notification>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]>,
{
    let frames = Frames {
        inner: Box::pin(body),
        buffer: Vec::new(),
    };

    stream::unfold(frames, |mut frames| async move {
        loop {
            if let Some(frame) = frames.next_frame() {
                match decode_frame(&frame) {
                    Some(item) => return Some((item, frames)),
                    None => continue,
                }
            }

            match frames.inner.next().await {
                Some(Ok(chunk)) => frames
                    .buffer
                    .extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r')),
                Some(Err(e)) => return Some((Err(ServiceError::Communication(e)), frames)),
                None => return None,
            }
        }
    })
    .boxed()
}
