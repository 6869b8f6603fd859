use std::io;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::env::Settings;

pub mod bootstrap;
pub mod dispatcher;
pub mod env;
pub mod errors;
pub mod event_log;
pub mod metrics;
pub mod observer;
pub mod protocol;
pub mod session;
pub mod state;
pub mod stream;

pub use bootstrap::{BootstrapReport, Bootstrapper, HttpMetadataProvider, MetadataProvider, RosterStatus};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use errors::{ReplayError, ReplayResult};
pub use event_log::{EventLog, LogEntry, LogKind};
pub use observer::{ChannelObserver, JsonLinesObserver, ReplayObserver, ReplayUpdate, TracingObserver};
pub use protocol::{decode_frame, EventPayload, ReplayEvent};
pub use session::{MatchReplaySession, SessionPhase};
pub use state::{CombatantState, CombatantView, MatchContext, MatchStateStore, MatchStatus};
pub use stream::{
    ChannelEventSource, EventSource, HistoryEventSource, SseEventSource, StreamConnection,
    StreamItem, StreamTermination,
};

pub struct LoggerManager {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

impl LoggerManager {
    pub fn setup(settings: &Settings) -> Self {
        // 1. 파일 로거 설정
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            &settings.logging.directory,
            &settings.logging.filename,
        );
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        // 2. 로그 레벨 필터 (RUST_LOG 우선, 없으면 설정값)
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

        // 3. 콘솔 레이어는 stderr 로 보냄 (stdout 은 --json 출력 전용)
        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .pretty();

        // 4. 파일 레이어
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(
            "Logger ready: console + file ({}/{})",
            settings.logging.directory,
            settings.logging.filename
        );

        Self { _guard: guard }
    }
}
