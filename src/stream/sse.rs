//! Incremental `text/event-stream` decoding.

use std::collections::VecDeque;

use futures_util::stream::{self, Stream, StreamExt};

use super::feed::FeedStream;
use crate::error::Error;

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Line-oriented SSE decoder that tolerates chunk boundaries anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment, e.g. ": keepalive"
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}

/// Turn a raw byte stream into a stream of SSE `data` payloads.
///
/// The first body error is yielded as [`Error::Transport`] and ends the stream.
pub fn sse_payloads<S, B, E>(body: S) -> FeedStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (
        Box::pin(body),
        SseDecoder::new(),
        VecDeque::<String>::new(),
        false,
    );
    stream::unfold(
        state,
        |(mut body, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(data) = ready.pop_front() {
                    return Some((Ok(data), (body, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(decoder.push(chunk.as_ref()).into_iter().map(|f| f.data));
                    }
                    Some(Err(e)) => {
                        done = true;
                        let err = Error::Transport(format!("event stream body: {e}"));
                        return Some((Err(err), (body, decoder, ready, done)));
                    }
                    None => return None,
                }
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"id: 7\nevent: run_st").is_empty());
        assert!(decoder.push(b"art\ndata: {\"seq\":").is_empty());
        let frames = decoder.push(b"7}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("run_start".to_string()),
                data: "{\"seq\":7}".to_string(),
                id: Some("7".to_string()),
            }]
        );
    }

    #[test]
    fn ignores_keepalive_comments() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b": keepalive\n\n").is_empty());
        assert!(decoder.push(b"\n\n").is_empty());
    }

    #[test]
    fn joins_multiline_data_and_handles_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\r\ndata:b\r\n\r\ndata: c\n\n");
        let data: Vec<_> = frames.into_iter().map(|f| f.data).collect();
        assert_eq!(data, vec!["a\nb".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn payload_stream_ends_after_body_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(b"data: one\n\ndata: tw".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"o\n\n".to_vec()),
        ];
        let mut payloads = sse_payloads(stream::iter(chunks));

        assert_eq!(payloads.next().await.unwrap().unwrap(), "one");
        assert!(matches!(
            payloads.next().await,
            Some(Err(Error::Transport(_)))
        ));
        assert!(payloads.next().await.is_none());
    }
}
