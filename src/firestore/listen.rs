use super::models::ListenResponse;
use crate::documents::StoreError;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Streams `ListenResponse` messages out of a chunked HTTP response body.
///
/// The body is a JSON array delivered incrementally; messages are cut out of
/// the buffer one object at a time.
pub struct ListenStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: BytesMut,
}

impl ListenStream {
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
        }
    }

    /// Reads the body of a listen response chunk by chunk.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let chunks = stream::unfold(response, |mut resp| async move {
            match resp.chunk().await {
                Ok(Some(bytes)) => Some((Ok(bytes), resp)),
                Ok(None) => None,
                Err(e) => Some((Err(e), resp)),
            }
        });
        Self::new(Box::pin(chunks.fuse()))
    }
}

impl Stream for ListenStream {
    type Item = Result<ListenResponse, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some((start, end)) = find_object_bounds(&self.buffer) {
                let bytes = self.buffer.split_to(end);
                return Poll::Ready(Some(
                    serde_json::from_slice::<ListenResponse>(&bytes[start..])
                        .map_err(StoreError::SerializationError),
                ));
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(StoreError::RequestError(e))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.iter().all(|b| is_separator(*b)) {
                        self.buffer.clear();
                        return Poll::Ready(Some(Err(StoreError::ApiError(
                            "Stream ended with incomplete JSON".into(),
                        ))));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Whitespace and the punctuation of the enclosing array.
fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b',' | b'[' | b']')
}

/// Finds the first complete JSON object in the buffer, skipping separators
/// in front of it. Returns the object's start and end offsets.
fn find_object_bounds(buf: &[u8]) -> Option<(usize, usize)> {
    let start = buf.iter().position(|b| !is_separator(*b))?;
    if buf[start] != b'{' {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in buf.iter().enumerate().skip(start) {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((start, i + 1));
                }
            }
            _ => {}
        }
    }

    None
}
