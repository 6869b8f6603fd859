use tracing::{debug, info, warn};

use crate::{
    event_log::{EventLog, LogEntry, LogKind},
    metrics,
    protocol::{EventPayload, ReplayEvent},
    state::{split_entity_id, CombatantView, MatchContext, MatchStateStore},
};

/// Result of applying one event.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub log: LogEntry,
    /// Combatants mutated by this event, in mutation order.
    pub updates: Vec<CombatantView>,
    /// Final match context when this event completed the match.
    pub completed: Option<MatchContext>,
    /// False when the event referenced a combatant the store does not know.
    pub resolved: bool,
}

/// Interprets events one at a time against the store.
///
/// Holds no session state besides the "combat has started" UI signal; the
/// store and the log are passed in by the owning session.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    combat_started: bool,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn combat_started(&self) -> bool {
        self.combat_started
    }

    pub fn dispatch(
        &mut self,
        store: &mut MatchStateStore,
        log: &mut EventLog,
        event: ReplayEvent,
    ) -> DispatchOutcome {
        let ReplayEvent {
            description,
            payload,
            ..
        } = event;

        if payload.is_combat() && !self.combat_started {
            self.combat_started = true;
            info!("First combat event observed; replay is live");
        }

        let mut updates = Vec::new();
        let mut completed = None;
        let mut resolved = true;

        let (kind, message) = match payload {
            EventPayload::MatchStart => (
                LogKind::Milestone,
                description.unwrap_or_else(|| "====== MATCH START ======".to_string()),
            ),
            EventPayload::RoundStart { round } => {
                if let Some(round) = round {
                    store.set_current_round(round);
                }
                (
                    LogKind::Milestone,
                    description.unwrap_or_else(|| round_message(round, "Start")),
                )
            }
            EventPayload::RoundEnd { round } => (
                LogKind::Milestone,
                description.unwrap_or_else(|| round_message(round, "End")),
            ),
            EventPayload::AttackPerformed {
                actor_id,
                target_id,
                damage,
            } => {
                if damage < 0 {
                    warn!("Negative damage {} treated as 0", damage);
                }
                let damage = damage.max(0);

                match target_id.as_deref() {
                    Some(target) if store.contains(target) => {
                        store.apply_delta(target, -damage);
                        if let Some(c) = store.get(target) {
                            updates.push(c.view());
                        }
                    }
                    _ => {
                        resolved = false;
                        unresolved("ATTACK_PERFORMED", target_id.as_deref());
                    }
                }

                let message = description.unwrap_or_else(|| {
                    format!(
                        "{} hits {} for {}",
                        display(&*store, actor_id.as_deref()),
                        display(&*store, target_id.as_deref()),
                        damage
                    )
                });
                (LogKind::Info, message)
            }
            EventPayload::HeroKnockedOut { target_id, .. } => {
                match target_id.as_deref() {
                    Some(target) if store.contains(target) => {
                        store.set_exact(target, 0);
                        if store.mark_knocked_out(target) == Some(false) {
                            debug!("{} was already knocked out", target);
                        }
                        if let Some(c) = store.get(target) {
                            updates.push(c.view());
                        }
                    }
                    _ => {
                        resolved = false;
                        unresolved("HERO_KNOCKED_OUT", target_id.as_deref());
                    }
                }

                let message = description.unwrap_or_else(|| {
                    format!("{} is KO!", display(&*store, target_id.as_deref()))
                });
                (LogKind::Damage, message)
            }
            EventPayload::MatchEnd { winner_team_id } => {
                if store.complete(winner_team_id) {
                    let ctx = store.context().clone();
                    info!(
                        "Match {} completed, winner: {}",
                        ctx.match_id,
                        ctx.winner_name()
                            .or(ctx.winner_team_id.as_deref())
                            .unwrap_or("draw")
                    );
                    completed = Some(ctx);
                } else {
                    warn!("Duplicate MATCH_END ignored; match already completed");
                }

                let message = description.unwrap_or_else(|| "Match Ended!".to_string());
                (LogKind::Milestone, message)
            }
            EventPayload::Other { event_type } => {
                debug!("Unrecognized event type {} forwarded to log", event_type);
                (
                    LogKind::Info,
                    description.unwrap_or_else(|| event_type.clone()),
                )
            }
        };

        let log = log.push(kind, message);

        DispatchOutcome {
            log,
            updates,
            completed,
            resolved,
        }
    }
}

fn round_message(round: Option<i64>, phase: &str) -> String {
    match round {
        Some(round) => format!("--- Round {} {} ---", round, phase),
        None => format!("--- Round {} ---", phase),
    }
}

fn unresolved(event_type: &str, entity_id: Option<&str>) {
    metrics::UNRESOLVED_REFERENCES_TOTAL.inc();
    match entity_id.and_then(split_entity_id) {
        Some((team_id, hero_id)) => warn!(
            "{} references hero {} of team {} which was never seeded; mutation skipped",
            event_type, hero_id, team_id
        ),
        None => warn!(
            "{} references unknown combatant {:?}; mutation skipped",
            event_type, entity_id
        ),
    }
}

fn display<'a>(store: &'a MatchStateStore, entity_id: Option<&'a str>) -> &'a str {
    match entity_id {
        Some(id) => store.get(id).map(|c| c.display_name()).unwrap_or(id),
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_frame;
    use crate::state::{CombatantState, MatchStatus};

    fn fixture() -> (MatchStateStore, EventLog, EventDispatcher) {
        let mut store = MatchStateStore::new(MatchContext::new("m1", "T1", "T2", 1));
        store.insert(CombatantState::new("T1", "H1", "Hulk", None, 120));
        store.insert(CombatantState::new("T2", "H2", "Thor", None, 100));
        (store, EventLog::new(64), EventDispatcher::new())
    }

    fn apply(
        d: &mut EventDispatcher,
        store: &mut MatchStateStore,
        log: &mut EventLog,
        frame: &str,
    ) -> DispatchOutcome {
        d.dispatch(store, log, decode_frame(frame).unwrap())
    }

    #[test]
    fn test_attack_then_ko_scenario() {
        let (mut store, mut log, mut d) = fixture();

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","description":"Thor hits Hulk","actorId":"T2_H2","targetId":"T1_H1","value":50}"#,
        );
        assert_eq!(out.updates[0].current_health, 70);
        assert!(d.combat_started());

        apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","description":"Thor hits Hulk","actorId":"T2_H2","targetId":"T1_H1","value":90}"#,
        );
        let hulk = store.get("T1_H1").unwrap();
        assert_eq!(hulk.current_health(), 0);
        assert!(!hulk.knocked_out());

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"HERO_KNOCKED_OUT","description":"Hulk is KO!","targetId":"T1_H1"}"#,
        );
        assert_eq!(out.log.kind, LogKind::Damage);
        assert!(out.updates[0].knocked_out);
        assert!(store.get("T1_H1").unwrap().knocked_out());
    }

    #[test]
    fn test_knock_out_twice_equals_once() {
        let (mut store, mut log, mut d) = fixture();
        let ko = r#"{"type":"HERO_KNOCKED_OUT","description":"Thor is KO!","targetId":"T2_H2"}"#;

        apply(&mut d, &mut store, &mut log, ko);
        let once = store.get("T2_H2").unwrap().clone();
        apply(&mut d, &mut store, &mut log, ko);
        assert_eq!(store.get("T2_H2").unwrap(), &once);

        apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","description":"late hit","targetId":"T2_H2","value":5}"#,
        );
        assert!(store.get("T2_H2").unwrap().knocked_out());
    }

    #[test]
    fn test_unresolved_target_is_logged_without_mutation() {
        let (mut store, mut log, mut d) = fixture();
        let before = store.snapshot();

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","description":"Ghost strikes","targetId":"T3_H1","value":10}"#,
        );

        assert!(!out.resolved);
        assert!(out.updates.is_empty());
        assert_eq!(out.log.message, "Ghost strikes");
        assert_eq!(store.snapshot(), before);
        assert!(store.get("T3_H1").is_none());
    }

    #[test]
    fn test_negative_damage_does_not_heal() {
        let (mut store, mut log, mut d) = fixture();
        apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","targetId":"T2_H2","value":30}"#,
        );
        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"ATTACK_PERFORMED","targetId":"T2_H2","value":-30}"#,
        );
        assert_eq!(out.updates[0].current_health, 70);
    }

    #[test]
    fn test_match_end_completes_once() {
        let (mut store, mut log, mut d) = fixture();

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"MATCH_END","description":"Winner: T1","value":"T1"}"#,
        );
        let ctx = out.completed.unwrap();
        assert_eq!(ctx.status, MatchStatus::Completed);
        assert_eq!(ctx.winner_team_id.as_deref(), Some("T1"));

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"MATCH_END","value":"T2"}"#,
        );
        assert!(out.completed.is_none());
        assert_eq!(store.context().winner_team_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_round_and_unknown_events_only_log() {
        let (mut store, mut log, mut d) = fixture();
        let before = store.snapshot();

        let out = apply(&mut d, &mut store, &mut log, r#"{"type":"ROUND_START","value":2}"#);
        assert_eq!(out.log.message, "--- Round 2 Start ---");
        assert_eq!(store.context().current_round, Some(2));

        let out = apply(
            &mut d,
            &mut store,
            &mut log,
            r#"{"type":"CROWD_CHEERS","description":"The crowd goes wild"}"#,
        );
        assert_eq!(out.log.kind, LogKind::Info);
        assert_eq!(out.log.message, "The crowd goes wild");
        assert!(!d.combat_started());
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.context().status, MatchStatus::Pending);
    }
}
