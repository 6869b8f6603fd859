use std::collections::HashMap;

use tracing::{debug, warn};

use super::{CombatantState, CombatantView, MatchContext, MatchStatus};

/// Canonical table of combatant state plus the match context.
///
/// Entries only come from the bootstrap seeding pass; every mutation afterwards
/// goes through the dispatcher and is a no-op for ids the store does not know.
#[derive(Debug, Clone)]
pub struct MatchStateStore {
    context: MatchContext,
    combatants: HashMap<String, CombatantState>,
    /// Seeding order, used for stable enumeration.
    order: Vec<String>,
}

impl MatchStateStore {
    pub fn new(context: MatchContext) -> Self {
        Self {
            context,
            combatants: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Seeds a combatant. Returns false when the entity id is already present.
    pub(crate) fn insert(&mut self, combatant: CombatantState) -> bool {
        let id = combatant.entity_id().to_string();
        if self.combatants.contains_key(&id) {
            warn!("Duplicate combatant {} ignored during seeding", id);
            return false;
        }
        self.order.push(id.clone());
        self.combatants.insert(id, combatant);
        true
    }

    pub fn get(&self, entity_id: &str) -> Option<&CombatantState> {
        self.combatants.get(entity_id)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.combatants.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn context(&self) -> &MatchContext {
        &self.context
    }

    /// Adds `delta` to the current health, clamped to `[0, maxHealth]`.
    /// Returns the resulting health, or `None` when the entity is absent.
    pub fn apply_delta(&mut self, entity_id: &str, delta: i64) -> Option<i64> {
        let combatant = self.combatants.get_mut(entity_id)?;
        let next = combatant.current_health().saturating_add(delta);
        let result = combatant.set_health(next);
        debug!(
            "apply_delta {} {:+} -> {}/{}",
            entity_id,
            delta,
            result,
            combatant.max_health()
        );
        Some(result)
    }

    /// Absolute health set, clamped to `[0, maxHealth]`.
    pub fn set_exact(&mut self, entity_id: &str, value: i64) -> Option<i64> {
        let combatant = self.combatants.get_mut(entity_id)?;
        Some(combatant.set_health(value))
    }

    /// Sets the sticky knocked-out flag. Returns `Some(true)` if the flag was newly set.
    pub fn mark_knocked_out(&mut self, entity_id: &str) -> Option<bool> {
        let combatant = self.combatants.get_mut(entity_id)?;
        let newly = !combatant.knocked_out();
        combatant.knock_out();
        Some(newly)
    }

    pub fn set_current_round(&mut self, round: i64) {
        self.context.current_round = Some(round);
    }

    /// PENDING/RUNNING -> COMPLETED, once. Returns false if the match was already completed.
    pub fn complete(&mut self, winner_team_id: Option<String>) -> bool {
        if self.context.status == MatchStatus::Completed {
            return false;
        }
        self.context.status = MatchStatus::Completed;
        self.context.winner_team_id = winner_team_id;
        true
    }

    /// Read-only enumeration grouped by team: team A, team B, then any other team
    /// in seeding order. Teams without combatants still appear with an empty list
    /// when they are one of the two match sides.
    pub fn combatants_by_team(&self) -> Vec<(String, Vec<&CombatantState>)> {
        let mut groups: Vec<(String, Vec<&CombatantState>)> = vec![
            (self.context.team_a_id.clone(), Vec::new()),
            (self.context.team_b_id.clone(), Vec::new()),
        ];

        for id in &self.order {
            let Some(combatant) = self.combatants.get(id) else {
                continue;
            };
            match groups
                .iter_mut()
                .find(|(team, _)| team == combatant.team_id())
            {
                Some((_, members)) => members.push(combatant),
                None => groups.push((combatant.team_id().to_string(), vec![combatant])),
            }
        }

        groups
    }

    pub fn team(&self, team_id: &str) -> Vec<&CombatantState> {
        self.order
            .iter()
            .filter_map(|id| self.combatants.get(id))
            .filter(|c| c.team_id() == team_id)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<CombatantView> {
        self.order
            .iter()
            .filter_map(|id| self.combatants.get(id))
            .map(CombatantState::view)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> MatchStateStore {
        let mut store = MatchStateStore::new(MatchContext::new("m1", "T1", "T2", 1));
        store.insert(CombatantState::new("T1", "H1", "Hulk", None, 120));
        store.insert(CombatantState::new("T2", "H9", "Thor", None, 90));
        store
    }

    #[test]
    fn test_apply_delta_clamps_to_bounds() {
        let mut store = seeded_store();

        assert_eq!(store.apply_delta("T1_H1", -50), Some(70));
        assert_eq!(store.apply_delta("T1_H1", -500), Some(0));
        assert_eq!(store.apply_delta("T1_H1", 1_000), Some(120));
        assert_eq!(store.apply_delta("T1_H1", i64::MIN), Some(0));
    }

    #[test]
    fn test_cumulative_damage_never_leaves_bounds() {
        let mut store = seeded_store();
        for damage in [7, 33, 0, 120, 1, 64, 999] {
            let hp = store.apply_delta("T2_H9", -damage).unwrap();
            assert!((0..=90).contains(&hp));
        }
        assert_eq!(store.get("T2_H9").unwrap().current_health(), 0);
    }

    #[test]
    fn test_mutations_on_absent_entity_are_noops() {
        let mut store = seeded_store();
        assert_eq!(store.apply_delta("T3_H1", -10), None);
        assert_eq!(store.set_exact("T3_H1", 0), None);
        assert_eq!(store.mark_knocked_out("T3_H1"), None);
        assert_eq!(store.len(), 2);
        assert!(!store.contains("T3_H1"));
    }

    #[test]
    fn test_knock_out_is_sticky_and_idempotent() {
        let mut store = seeded_store();
        assert_eq!(store.mark_knocked_out("T1_H1"), Some(true));
        assert_eq!(store.mark_knocked_out("T1_H1"), Some(false));
        store.apply_delta("T1_H1", 30);
        assert!(store.get("T1_H1").unwrap().knocked_out());
    }

    #[test]
    fn test_duplicate_seed_is_rejected() {
        let mut store = seeded_store();
        assert!(!store.insert(CombatantState::new("T1", "H1", "Other", None, 10)));
        assert_eq!(store.get("T1_H1").unwrap().display_name(), "Hulk");
    }

    #[test]
    fn test_complete_transitions_once() {
        let mut store = seeded_store();
        assert!(store.complete(Some("T1".to_string())));
        assert!(!store.complete(Some("T2".to_string())));
        assert_eq!(store.context().status, MatchStatus::Completed);
        assert_eq!(store.context().winner_team_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_grouping_keeps_empty_side() {
        let mut store = MatchStateStore::new(MatchContext::new("m1", "T1", "T2", 1));
        store.insert(CombatantState::new("T1", "H1", "Hulk", None, 120));
        store.insert(CombatantState::new("T1", "H2", "Widow", None, 60));

        let groups = store.combatants_by_team();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "T1");
        assert_eq!(
            groups[0].1.iter().map(|c| c.hero_id()).collect::<Vec<_>>(),
            vec!["H1", "H2"]
        );
        assert_eq!(groups[1].0, "T2");
        assert!(groups[1].1.is_empty());
    }
}
