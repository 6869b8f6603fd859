use std::{collections::VecDeque, io, pin::Pin, time::Duration};

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::ACCEPT;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use super::EventSource;
use crate::{
    env::ApiSettings,
    errors::{ReplayError, ReplayResult},
};

/// Longest accepted line, and the most `data:` bytes one event may carry.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

enum Line {
    Eof,
    Complete,
    /// Consumed up to its newline, content discarded.
    Oversized,
}

/// `text/event-stream` 프레이밍 디코더.
///
/// Yields the joined `data:` payload of each event. Other fields and comment
/// lines are skipped. A partial event left at EOF is still dispatched.
///
/// Lines are read as raw bytes. An event whose data is not UTF-8, or which
/// exceeds the byte limit, comes out as [`ReplayError::MalformedFrame`] and
/// decoding carries on with the next event. Only reader errors are fatal.
pub struct SseDecoder<R> {
    reader: R,
    line: Vec<u8>,
    max_frame_bytes: usize,
}

impl<R: AsyncBufRead + Unpin> SseDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_BYTES)
    }

    pub fn with_limit(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            line: Vec::new(),
            max_frame_bytes,
        }
    }

    /// `None` once the reader is exhausted.
    pub async fn next_event(&mut self) -> Option<ReplayResult<String>> {
        let mut data: Option<Vec<u8>> = None;
        let mut oversized = false;

        loop {
            match self.read_line().await {
                Ok(Line::Eof) => return finish_event(data, oversized, self.max_frame_bytes),
                Ok(Line::Oversized) => {
                    oversized = true;
                    data = None;
                    continue;
                }
                Ok(Line::Complete) => {}
                Err(e) => return Some(Err(e.into())),
            }

            let line = trim_line_end(&self.line);
            if line.is_empty() {
                if data.is_some() || oversized {
                    return finish_event(data, oversized, self.max_frame_bytes);
                }
                continue;
            }
            if line[0] == b':' {
                continue;
            }

            let (field, value) = match line.iter().position(|b| *b == b':') {
                Some(i) => {
                    let value = &line[i + 1..];
                    (&line[..i], value.strip_prefix(b" ").unwrap_or(value))
                }
                None => (line, &[][..]),
            };

            // event / id / retry 는 사용하지 않음
            if field != b"data" || oversized {
                continue;
            }
            match data.as_mut() {
                Some(buf) => {
                    buf.push(b'\n');
                    buf.extend_from_slice(value);
                }
                None => data = Some(value.to_vec()),
            }
            if data.as_ref().map_or(0, Vec::len) > self.max_frame_bytes {
                oversized = true;
                data = None;
            }
        }
    }

    /// Reads up to and including the next `\n` into `self.line`, never
    /// buffering more than the byte limit.
    async fn read_line(&mut self) -> io::Result<Line> {
        self.line.clear();
        let mut consumed = false;
        let mut oversized = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let (chunk, done) = match available.iter().position(|b| *b == b'\n') {
                Some(i) => (&available[..=i], true),
                None => (available, false),
            };
            let used = chunk.len();
            if !oversized {
                if self.line.len() + used > self.max_frame_bytes {
                    oversized = true;
                    self.line.clear();
                } else {
                    self.line.extend_from_slice(chunk);
                }
            }
            self.reader.consume(used);
            consumed = true;
            if done {
                break;
            }
        }

        Ok(match (consumed, oversized) {
            (false, _) => Line::Eof,
            (true, true) => Line::Oversized,
            (true, false) => Line::Complete,
        })
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn finish_event(
    data: Option<Vec<u8>>,
    oversized: bool,
    limit: usize,
) -> Option<ReplayResult<String>> {
    if oversized {
        return Some(Err(ReplayError::malformed_frame(format!(
            "event exceeds {} bytes",
            limit
        ))));
    }
    let data = data?;
    Some(String::from_utf8(data).map_err(|e| {
        ReplayError::malformed_frame(format!("event data is not valid UTF-8: {}", e.utf8_error()))
    }))
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for SseDecoder<R> {
    async fn next_frame(&mut self) -> Option<ReplayResult<String>> {
        self.next_event().await
    }
}

type BoxedReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Live feed from `GET /api/matches/{id}/events/stream`.
pub struct SseEventSource {
    decoder: SseDecoder<BoxedReader>,
}

impl SseEventSource {
    /// Opens the stream. No request timeout is applied; the feed is long-lived.
    pub async fn connect(
        http: &reqwest::Client,
        api: &ApiSettings,
        match_id: &str,
    ) -> ReplayResult<Self> {
        let url = api.url(&format!("/api/matches/{}/events/stream", match_id));
        info!("Connecting to event stream {}", url);

        let resp = http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let body = resp
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let reader: BoxedReader = Box::pin(StreamReader::new(body));

        Ok(Self {
            decoder: SseDecoder::new(reader),
        })
    }
}

#[async_trait]
impl EventSource for SseEventSource {
    async fn next_frame(&mut self) -> Option<ReplayResult<String>> {
        self.decoder.next_frame().await
    }
}

/// Recorded events from `GET /api/matches/{id}/events`, replayed in order.
#[derive(Debug, Default)]
pub struct HistoryEventSource {
    frames: VecDeque<String>,
}

impl HistoryEventSource {
    pub async fn fetch(
        http: &reqwest::Client,
        api: &ApiSettings,
        match_id: &str,
    ) -> ReplayResult<Self> {
        let url = api.url(&format!("/api/matches/{}/events", match_id));
        let events: Vec<JsonValue> = http
            .get(&url)
            .timeout(Duration::from_secs(api.request_timeout_seconds))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Fetched {} recorded events for match {}", events.len(), match_id);
        Ok(Self::from_frames(events.into_iter().map(|e| e.to_string())))
    }

    pub fn from_frames<I, T>(frames: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            frames: frames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl EventSource for HistoryEventSource {
    async fn next_frame(&mut self) -> Option<ReplayResult<String>> {
        self.frames.pop_front().map(Ok)
    }
}
