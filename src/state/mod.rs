use serde::{Deserialize, Serialize};

pub mod store;

pub use store::MatchStateStore;

/// `"{teamId}_{heroId}"` 형태의 복합 식별자 생성
pub fn entity_id(team_id: &str, hero_id: &str) -> String {
    format!("{}_{}", team_id, hero_id)
}

/// Splits a composite entity id on the first `_` into `(teamId, heroId)`.
pub fn split_entity_id(entity_id: &str) -> Option<(&str, &str)> {
    match entity_id.split_once('_') {
        Some((team, hero)) if !team.is_empty() && !hero.is_empty() => Some((team, hero)),
        _ => None,
    }
}

/// One hero instance fielded by one team in the replayed match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantState {
    entity_id: String,
    team_id: String,
    hero_id: String,
    display_name: String,
    image_ref: Option<String>,
    max_health: i64,
    current_health: i64,
    knocked_out: bool,
}

impl CombatantState {
    /// Seeds a combatant at full health. A non-positive `max_health` is raised to 1
    /// so the health bounds stay meaningful.
    pub fn new(
        team_id: impl Into<String>,
        hero_id: impl Into<String>,
        display_name: impl Into<String>,
        image_ref: Option<String>,
        max_health: i64,
    ) -> Self {
        let team_id = team_id.into();
        let hero_id = hero_id.into();
        let max_health = max_health.max(1);
        Self {
            entity_id: entity_id(&team_id, &hero_id),
            team_id,
            hero_id,
            display_name: display_name.into(),
            image_ref,
            max_health,
            current_health: max_health,
            knocked_out: false,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn hero_id(&self) -> &str {
        &self.hero_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn max_health(&self) -> i64 {
        self.max_health
    }

    pub fn current_health(&self) -> i64 {
        self.current_health
    }

    pub fn knocked_out(&self) -> bool {
        self.knocked_out
    }

    /// `currentHealth / maxHealth`, clamped to `[0, 1]`.
    pub fn health_fraction(&self) -> f64 {
        if self.max_health <= 0 {
            return 0.0;
        }
        (self.current_health as f64 / self.max_health as f64).clamp(0.0, 1.0)
    }

    pub fn view(&self) -> CombatantView {
        CombatantView {
            entity_id: self.entity_id.clone(),
            team_id: self.team_id.clone(),
            display_name: self.display_name.clone(),
            current_health: self.current_health,
            max_health: self.max_health,
            knocked_out: self.knocked_out,
            health_fraction: self.health_fraction(),
        }
    }

    pub(crate) fn set_health(&mut self, value: i64) -> i64 {
        self.current_health = value.clamp(0, self.max_health);
        self.current_health
    }

    pub(crate) fn knock_out(&mut self) {
        self.knocked_out = true;
    }
}

/// 렌더링 협력자에게 넘기는 값 (entityId, currentHealth, maxHealth, knockedOut)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatantView {
    pub entity_id: String,
    pub team_id: String,
    pub display_name: String,
    pub current_health: i64,
    pub max_health: i64,
    pub knocked_out: bool,
    pub health_fraction: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Running,
    Completed,
}

/// Match-level status of the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchContext {
    pub match_id: String,
    pub team_a_id: String,
    pub team_b_id: String,
    pub team_a_name: String,
    pub team_b_name: String,
    pub round_no: i64,
    pub current_round: Option<i64>,
    pub status: MatchStatus,
    /// Status string returned by the match lookup at bootstrap; display only.
    pub reported_status: Option<String>,
    pub winner_team_id: Option<String>,
}

impl MatchContext {
    pub fn new(
        match_id: impl Into<String>,
        team_a_id: impl Into<String>,
        team_b_id: impl Into<String>,
        round_no: i64,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            team_a_id: team_a_id.into(),
            team_b_id: team_b_id.into(),
            team_a_name: "Unknown Team A".to_string(),
            team_b_name: "Unknown Team B".to_string(),
            round_no,
            current_round: None,
            status: MatchStatus::Pending,
            reported_status: None,
            winner_team_id: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn team_name(&self, team_id: &str) -> Option<&str> {
        if team_id == self.team_a_id {
            Some(&self.team_a_name)
        } else if team_id == self.team_b_id {
            Some(&self.team_b_name)
        } else {
            None
        }
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner_team_id
            .as_deref()
            .and_then(|winner| self.team_name(winner))
    }
}
