use std::io::Write;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::{
    bootstrap::{BootstrapReport, RosterStatus},
    event_log::{LogEntry, LogKind},
    state::{CombatantView, MatchContext},
    stream::StreamTermination,
};

/// Rendering collaborator. Every method defaults to doing nothing.
pub trait ReplayObserver {
    fn on_bootstrap(&mut self, _report: &BootstrapReport) {}

    fn on_update(&mut self, _update: &CombatantView) {}

    fn on_log(&mut self, _entry: &LogEntry) {}

    fn on_match_completed(&mut self, _context: &MatchContext) {}

    fn on_stream_terminated(&mut self, _termination: &StreamTermination) {}
}

impl<O: ReplayObserver + ?Sized> ReplayObserver for &mut O {
    fn on_bootstrap(&mut self, report: &BootstrapReport) {
        (**self).on_bootstrap(report)
    }

    fn on_update(&mut self, update: &CombatantView) {
        (**self).on_update(update)
    }

    fn on_log(&mut self, entry: &LogEntry) {
        (**self).on_log(entry)
    }

    fn on_match_completed(&mut self, context: &MatchContext) {
        (**self).on_match_completed(context)
    }

    fn on_stream_terminated(&mut self, termination: &StreamTermination) {
        (**self).on_stream_terminated(termination)
    }
}

/// Everything an observer can be told, as one serializable message.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum ReplayUpdate {
    Bootstrapped {
        context: MatchContext,
        combatants: Vec<CombatantView>,
        roster_a: RosterStatus,
        roster_b: RosterStatus,
    },
    Combatant(CombatantView),
    Log(LogEntry),
    MatchCompleted(MatchContext),
    StreamTerminated(StreamTermination),
}

impl ReplayUpdate {
    pub fn bootstrapped(report: &BootstrapReport) -> Self {
        ReplayUpdate::Bootstrapped {
            context: report.store.context().clone(),
            combatants: report.store.snapshot(),
            roster_a: report.roster_a.clone(),
            roster_b: report.roster_b.clone(),
        }
    }
}

/// Writes every update through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ReplayObserver for TracingObserver {
    fn on_bootstrap(&mut self, report: &BootstrapReport) {
        let ctx = report.store.context();
        info!(
            "{} vs {} (round {}, {} combatants)",
            ctx.team_a_name,
            ctx.team_b_name,
            ctx.round_no,
            report.store.len()
        );
        for (team_id, members) in report.store.combatants_by_team() {
            let names: Vec<&str> = members.iter().map(|c| c.display_name()).collect();
            info!("  {}: {:?}", ctx.team_name(&team_id).unwrap_or(&team_id), names);
        }

        if report.is_degraded() {
            let sides = [
                (&ctx.team_a_name, &report.roster_a),
                (&ctx.team_b_name, &report.roster_b),
            ];
            for (side, status) in sides {
                if let RosterStatus::Unavailable { reason } = status {
                    warn!("{}: roster hidden/failed ({})", side, reason);
                }
            }
        }
    }

    fn on_update(&mut self, update: &CombatantView) {
        info!(
            "{} {}/{}{}",
            update.display_name,
            update.current_health,
            update.max_health,
            if update.knocked_out { " [KO]" } else { "" }
        );
    }

    fn on_log(&mut self, entry: &LogEntry) {
        match entry.kind {
            LogKind::Milestone => info!("{}", entry.message),
            LogKind::Damage => warn!("{}", entry.message),
            LogKind::Info => info!("  {}", entry.message),
        }
    }

    fn on_match_completed(&mut self, context: &MatchContext) {
        match context.winner_team_id.as_deref() {
            Some(winner) => info!(
                "Match {} over. Winner: {}",
                context.match_id,
                context.winner_name().unwrap_or(winner)
            ),
            None => info!("Match {} over. Draw", context.match_id),
        }
    }

    fn on_stream_terminated(&mut self, termination: &StreamTermination) {
        info!("Stream terminated: {:?}", termination);
    }
}

/// Prints each update as one JSON document per line.
pub struct JsonLinesObserver<W: Write> {
    out: W,
}

impl JsonLinesObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, update: ReplayUpdate) {
        let written = serde_json::to_string(&update)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{}", line));
        if let Err(e) = written {
            warn!("Failed to write replay update: {}", e);
        }
    }
}

impl<W: Write> ReplayObserver for JsonLinesObserver<W> {
    fn on_bootstrap(&mut self, report: &BootstrapReport) {
        self.emit(ReplayUpdate::bootstrapped(report));
    }

    fn on_update(&mut self, update: &CombatantView) {
        self.emit(ReplayUpdate::Combatant(update.clone()));
    }

    fn on_log(&mut self, entry: &LogEntry) {
        self.emit(ReplayUpdate::Log(entry.clone()));
    }

    fn on_match_completed(&mut self, context: &MatchContext) {
        self.emit(ReplayUpdate::MatchCompleted(context.clone()));
    }

    fn on_stream_terminated(&mut self, termination: &StreamTermination) {
        self.emit(ReplayUpdate::StreamTerminated(termination.clone()));
    }
}

/// Forwards updates to another task. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ReplayUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ReplayUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReplayUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, update: ReplayUpdate) {
        let _ = self.tx.send(update);
    }
}

impl ReplayObserver for ChannelObserver {
    fn on_bootstrap(&mut self, report: &BootstrapReport) {
        self.send(ReplayUpdate::bootstrapped(report));
    }

    fn on_update(&mut self, update: &CombatantView) {
        self.send(ReplayUpdate::Combatant(update.clone()));
    }

    fn on_log(&mut self, entry: &LogEntry) {
        self.send(ReplayUpdate::Log(entry.clone()));
    }

    fn on_match_completed(&mut self, context: &MatchContext) {
        self.send(ReplayUpdate::MatchCompleted(context.clone()));
    }

    fn on_stream_terminated(&mut self, termination: &StreamTermination) {
        self.send(ReplayUpdate::StreamTerminated(termination.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines_one_document_per_update() {
        let mut observer = JsonLinesObserver::new(Vec::new());
        observer.on_log(&LogEntry {
            seq: 0,
            kind: LogKind::Milestone,
            message: "start".to_string(),
        });
        observer.on_stream_terminated(&StreamTermination::TransportError("reset".to_string()));

        let text = String::from_utf8(observer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["update"], "log");
        assert_eq!(lines[0]["message"], "start");
        assert_eq!(lines[1]["update"], "stream_terminated");
        assert_eq!(lines[1]["reason"], "transport_error");
        assert_eq!(lines[1]["detail"], "reset");
    }
}
