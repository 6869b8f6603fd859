use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    bootstrap::{BootstrapReport, Bootstrapper, MetadataProvider, RosterStatus},
    dispatcher::{DispatchOutcome, EventDispatcher},
    env::ReplaySettings,
    errors::ReplayResult,
    event_log::EventLog,
    observer::ReplayObserver,
    protocol::ReplayEvent,
    state::{CombatantView, MatchContext, MatchStateStore},
    stream::{EventSource, StreamConnection, StreamItem, StreamTermination},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Seeded, stream not consumed yet.
    Bootstrapped,
    Streaming,
    Closed(StreamTermination),
}

/// One viewer's replay: owns the store, the dispatcher and the event log.
///
/// Frames are applied strictly one at a time on the caller's task, so the
/// store needs no locking.
pub struct MatchReplaySession {
    id: Uuid,
    store: MatchStateStore,
    dispatcher: EventDispatcher,
    log: EventLog,
    roster_a: RosterStatus,
    roster_b: RosterStatus,
    phase: SessionPhase,
}

impl MatchReplaySession {
    pub fn from_report(report: BootstrapReport, settings: &ReplaySettings) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            store: report.store,
            dispatcher: EventDispatcher::new(),
            log: EventLog::new(settings.log_capacity),
            roster_a: report.roster_a,
            roster_b: report.roster_b,
            phase: SessionPhase::Bootstrapped,
        };
        info!(
            "Replay session {} ready for match {} ({} combatants)",
            session.id,
            session.store.context().match_id,
            session.store.len()
        );
        session
    }

    /// Bootstraps and notifies `observer` before any frame is consumed.
    pub async fn bootstrap<P, O>(
        bootstrapper: &Bootstrapper<P>,
        match_id: &str,
        settings: &ReplaySettings,
        observer: &mut O,
    ) -> ReplayResult<Self>
    where
        P: MetadataProvider,
        O: ReplayObserver + ?Sized,
    {
        let report = bootstrapper.bootstrap(match_id).await?;
        observer.on_bootstrap(&report);
        Ok(Self::from_report(report, settings))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &MatchStateStore {
        &self.store
    }

    pub fn context(&self) -> &MatchContext {
        self.store.context()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.phase, SessionPhase::Closed(_))
    }

    pub fn roster_a(&self) -> &RosterStatus {
        &self.roster_a
    }

    pub fn roster_b(&self) -> &RosterStatus {
        &self.roster_b
    }

    pub fn combat_started(&self) -> bool {
        self.dispatcher.combat_started()
    }

    pub fn snapshot(&self) -> Vec<CombatantView> {
        self.store.snapshot()
    }

    /// Applies one already-decoded event. Ignored once the session is closed.
    pub fn apply<O: ReplayObserver + ?Sized>(
        &mut self,
        event: ReplayEvent,
        observer: &mut O,
    ) -> Option<DispatchOutcome> {
        if self.is_closed() {
            warn!("Session {} is closed; event dropped", self.id);
            return None;
        }
        if self.phase == SessionPhase::Bootstrapped {
            self.phase = SessionPhase::Streaming;
        }

        let outcome = self.dispatcher.dispatch(&mut self.store, &mut self.log, event);
        for update in &outcome.updates {
            observer.on_update(update);
        }
        observer.on_log(&outcome.log);
        if let Some(context) = &outcome.completed {
            observer.on_match_completed(context);
        }
        Some(outcome)
    }

    /// Drains `conn` until it terminates.
    pub async fn run<S, O>(
        &mut self,
        conn: &mut StreamConnection<S>,
        observer: &mut O,
    ) -> StreamTermination
    where
        S: EventSource,
        O: ReplayObserver + ?Sized,
    {
        if let SessionPhase::Closed(termination) = &self.phase {
            return termination.clone();
        }

        loop {
            match conn.next_event().await {
                StreamItem::Event(event) => {
                    self.apply(event, observer);
                }
                StreamItem::Terminated(termination) => return self.finish(termination, observer),
            }
        }
    }

    /// Same as [`run`](Self::run), but a cancelled `token` closes the stream
    /// as if the viewer left.
    pub async fn run_until_cancelled<S, O>(
        &mut self,
        conn: &mut StreamConnection<S>,
        observer: &mut O,
        token: CancellationToken,
    ) -> StreamTermination
    where
        S: EventSource,
        O: ReplayObserver + ?Sized,
    {
        if let SessionPhase::Closed(termination) = &self.phase {
            return termination.clone();
        }

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    info!("Session {} cancelled by viewer", self.id);
                    return self.close(conn, observer);
                }
                item = conn.next_event() => match item {
                    StreamItem::Event(event) => {
                        self.apply(event, observer);
                    }
                    StreamItem::Terminated(termination) => {
                        return self.finish(termination, observer);
                    }
                },
            }
        }
    }

    /// Viewer-initiated close. Returns the existing termination if already closed.
    pub fn close<S, O>(
        &mut self,
        conn: &mut StreamConnection<S>,
        observer: &mut O,
    ) -> StreamTermination
    where
        S: EventSource,
        O: ReplayObserver + ?Sized,
    {
        if let SessionPhase::Closed(termination) = &self.phase {
            return termination.clone();
        }
        let termination = conn.close();
        self.finish(termination, observer)
    }

    fn finish<O: ReplayObserver + ?Sized>(
        &mut self,
        termination: StreamTermination,
        observer: &mut O,
    ) -> StreamTermination {
        let ctx = self.store.context();
        if !ctx.is_completed() {
            // 종료 이벤트 없이 끊긴 경우: 마지막 상태 유지
            warn!(
                "Session {} stream ended before MATCH_END ({})",
                self.id,
                termination.label()
            );
        }
        info!(
            "Session {} closed: {} log entries, combat started: {}",
            self.id,
            self.log.total_appended(),
            self.dispatcher.combat_started()
        );

        self.phase = SessionPhase::Closed(termination.clone());
        observer.on_stream_terminated(&termination);
        termination
    }
}
