use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    errors::{ReplayError, ReplayResult},
    metrics,
    protocol::{decode_frame, ReplayEvent},
};

pub mod sse;

pub use sse::{HistoryEventSource, SseDecoder, SseEventSource};

/// Raw frame producer behind a [`StreamConnection`].
#[async_trait]
pub trait EventSource: Send {
    /// Next raw frame text. `None` means the producer ended cleanly.
    /// [`ReplayError::MalformedFrame`] drops one frame; any other error ends
    /// the stream.
    async fn next_frame(&mut self) -> Option<ReplayResult<String>>;
}

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for Box<S> {
    async fn next_frame(&mut self) -> Option<ReplayResult<String>> {
        (**self).next_frame().await
    }
}

/// Frames pushed through a tokio channel. Ends when every sender is dropped.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    pub fn channel(buffer: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_frame(&mut self) -> Option<ReplayResult<String>> {
        self.rx.recv().await.map(Ok)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StreamTermination {
    /// Producer closed the feed.
    Completed,
    TransportError(String),
    ClosedByViewer,
}

impl StreamTermination {
    pub fn label(&self) -> &'static str {
        match self {
            StreamTermination::Completed => "completed",
            StreamTermination::TransportError(_) => "transport_error",
            StreamTermination::ClosedByViewer => "closed_by_viewer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(ReplayEvent),
    Terminated(StreamTermination),
}

/// Lifecycle owner of the one-directional event feed.
///
/// Frames come out in producer order. Undecodable frames are dropped and the
/// feed keeps going. Once terminated, the source is never polled again and
/// every later call reports the same termination.
pub struct StreamConnection<S> {
    source: S,
    match_id: String,
    terminated: Option<StreamTermination>,
    frames_received: u64,
    frames_dropped: u64,
}

impl<S: EventSource> StreamConnection<S> {
    pub fn new(match_id: impl Into<String>, source: S) -> Self {
        let match_id = match_id.into();
        info!("Event stream opened for match {}", match_id);
        Self {
            source,
            match_id,
            terminated: None,
            frames_received: 0,
            frames_dropped: 0,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn termination(&self) -> Option<&StreamTermination> {
        self.terminated.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_some()
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub async fn next_event(&mut self) -> StreamItem {
        loop {
            if let Some(termination) = &self.terminated {
                return StreamItem::Terminated(termination.clone());
            }

            let frame = match self.source.next_frame().await {
                Some(Ok(frame)) => Ok(frame),
                // 프레임 하나만 버리고 계속 진행
                Some(Err(e @ ReplayError::MalformedFrame { .. })) => Err(e),
                Some(Err(e)) => {
                    return StreamItem::Terminated(
                        self.terminate(StreamTermination::TransportError(e.to_string())),
                    )
                }
                None => return StreamItem::Terminated(self.terminate(StreamTermination::Completed)),
            };

            self.frames_received += 1;
            metrics::FRAMES_RECEIVED_TOTAL.inc();

            match frame.and_then(|text| decode_frame(&text)) {
                Ok(event) => {
                    debug!(
                        "[{}] frame #{} decoded as {}",
                        self.match_id,
                        self.frames_received,
                        event.payload.type_name()
                    );
                    return StreamItem::Event(event);
                }
                Err(e) => {
                    self.frames_dropped += 1;
                    metrics::FRAMES_DROPPED_TOTAL.inc();
                    warn!("[{}] dropping frame #{}: {}", self.match_id, self.frames_received, e);
                }
            }
        }
    }

    /// Viewer-initiated close. No-op when already terminated.
    pub fn close(&mut self) -> StreamTermination {
        match &self.terminated {
            Some(termination) => termination.clone(),
            None => self.terminate(StreamTermination::ClosedByViewer),
        }
    }

    fn terminate(&mut self, termination: StreamTermination) -> StreamTermination {
        metrics::STREAM_TERMINATIONS_TOTAL
            .with_label_values(&[termination.label()])
            .inc();
        match &termination {
            StreamTermination::TransportError(reason) => warn!(
                "Event stream for match {} failed after {} frames: {}",
                self.match_id, self.frames_received, reason
            ),
            other => info!(
                "Event stream for match {} terminated ({}) after {} frames, {} dropped",
                self.match_id,
                other.label(),
                self.frames_received,
                self.frames_dropped
            ),
        }
        self.terminated = Some(termination.clone());
        termination
    }
}
