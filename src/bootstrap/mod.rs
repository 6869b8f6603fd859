use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    env::ReplaySettings,
    errors::{ReplayError, ReplayResult},
    metrics,
    state::{CombatantState, MatchContext, MatchStateStore},
};

pub mod http;

pub use http::HttpMetadataProvider;

// --- Collaborator contracts ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroInfo {
    pub hero_id: String,
    pub name: String,
    pub durability: Option<i64>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub match_id: String,
    pub team_a_id: String,
    pub team_b_id: String,
    pub round_no: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamInfo {
    pub team_id: String,
    pub name: String,
}

/// Read-only metadata the viewer needs before the stream opens.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// 전체 히어로 카탈로그
    async fn hero_catalog(&self) -> ReplayResult<Vec<HeroInfo>>;

    async fn match_info(&self, match_id: &str) -> ReplayResult<MatchInfo>;

    /// 팀 이름 조회용 디렉토리
    async fn teams(&self) -> ReplayResult<Vec<TeamInfo>>;

    /// Ordered hero ids a team committed for a round.
    async fn roster(&self, round_no: i64, team_id: &str) -> ReplayResult<Vec<String>>;
}

// --- Bootstrap result ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RosterStatus {
    Loaded { count: usize },
    /// Roster hidden or fetch failed; that side has no combatants.
    Unavailable { reason: String },
}

impl RosterStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, RosterStatus::Loaded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub store: MatchStateStore,
    pub roster_a: RosterStatus,
    pub roster_b: RosterStatus,
}

impl BootstrapReport {
    pub fn is_degraded(&self) -> bool {
        !self.roster_a.is_loaded() || !self.roster_b.is_loaded()
    }
}

/// One-shot loader that seeds the state store for a match.
pub struct Bootstrapper<P> {
    provider: P,
    settings: ReplaySettings,
}

impl<P: MetadataProvider> Bootstrapper<P> {
    pub fn new(provider: P, settings: ReplaySettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetches catalog, match and team directory concurrently, then both rosters
    /// concurrently, and seeds the store.
    ///
    /// Only a failed match lookup aborts. Every other failure degrades.
    pub async fn bootstrap(&self, match_id: &str) -> ReplayResult<BootstrapReport> {
        info!("Bootstrapping match {}", match_id);

        // 1. 카탈로그 / 매치 / 팀 디렉토리 동시 조회
        let (catalog, match_info, teams) = tokio::join!(
            self.provider.hero_catalog(),
            self.provider.match_info(match_id),
            self.provider.teams(),
        );

        let match_info = match_info
            .map_err(|e| ReplayError::bootstrap_failed(match_id, format!("match lookup: {}", e)))?;

        let catalog: HashMap<String, HeroInfo> = match catalog {
            Ok(heroes) => heroes.into_iter().map(|h| (h.hero_id.clone(), h)).collect(),
            Err(e) => {
                warn!("Hero catalog unavailable, using fallback names and health: {}", e);
                HashMap::new()
            }
        };

        let round_no = match match_info.round_no {
            Some(round) if round > 0 => round,
            _ => 1,
        };

        let mut context = MatchContext::new(
            match_info.match_id.clone(),
            match_info.team_a_id.clone(),
            match_info.team_b_id.clone(),
            round_no,
        );
        context.reported_status = match_info.status.clone();

        match teams {
            Ok(teams) => {
                for team in teams {
                    if team.team_id == context.team_a_id {
                        context.team_a_name = team.name;
                    } else if team.team_id == context.team_b_id {
                        context.team_b_name = team.name;
                    }
                }
            }
            Err(e) => warn!("Team directory unavailable, using fallback names: {}", e),
        }

        // 2. 양 팀 로스터 동시 조회
        let (roster_a, roster_b) = tokio::join!(
            self.provider.roster(round_no, &context.team_a_id),
            self.provider.roster(round_no, &context.team_b_id),
        );

        let team_a_id = context.team_a_id.clone();
        let team_b_id = context.team_b_id.clone();
        let mut store = MatchStateStore::new(context);

        let roster_a = self.seed_side(&mut store, &team_a_id, roster_a, &catalog);
        let roster_b = self.seed_side(&mut store, &team_b_id, roster_b, &catalog);

        info!(
            "Bootstrap complete for match {}: {} combatants (A: {:?}, B: {:?})",
            match_id,
            store.len(),
            roster_a,
            roster_b
        );

        Ok(BootstrapReport {
            store,
            roster_a,
            roster_b,
        })
    }

    fn seed_side(
        &self,
        store: &mut MatchStateStore,
        team_id: &str,
        roster: ReplayResult<Vec<String>>,
        catalog: &HashMap<String, HeroInfo>,
    ) -> RosterStatus {
        let hero_ids = match roster {
            Ok(ids) => ids,
            Err(e) => {
                metrics::ROSTER_FETCH_FAILURES_TOTAL.inc();
                warn!("Failed to load roster for team {}: {}", team_id, e);
                return RosterStatus::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let mut count = 0;
        for hero_id in hero_ids {
            if store.insert(self.combatant(team_id, &hero_id, catalog.get(&hero_id))) {
                count += 1;
            }
        }
        RosterStatus::Loaded { count }
    }

    fn combatant(&self, team_id: &str, hero_id: &str, hero: Option<&HeroInfo>) -> CombatantState {
        let fallback = self.settings.default_max_health;
        match hero {
            Some(hero) => CombatantState::new(
                team_id,
                hero_id,
                hero.name.clone(),
                hero.image_ref.clone(),
                hero.durability.filter(|d| *d > 0).unwrap_or(fallback),
            ),
            None => {
                warn!("Hero {} missing from catalog", hero_id);
                CombatantState::new(team_id, hero_id, hero_id, None, fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        fail_catalog: bool,
        fail_team_b: bool,
    }

    #[async_trait]
    impl MetadataProvider for FixedProvider {
        async fn hero_catalog(&self) -> ReplayResult<Vec<HeroInfo>> {
            if self.fail_catalog {
                return Err(ReplayError::internal_error("catalog down"));
            }
            Ok(vec![HeroInfo {
                hero_id: "1".to_string(),
                name: "A-Bomb".to_string(),
                durability: Some(80),
                image_ref: Some("a-bomb.jpg".to_string()),
            }])
        }

        async fn match_info(&self, match_id: &str) -> ReplayResult<MatchInfo> {
            Ok(MatchInfo {
                match_id: match_id.to_string(),
                team_a_id: "TA".to_string(),
                team_b_id: "TB".to_string(),
                round_no: None,
                status: Some("IN_PROGRESS".to_string()),
            })
        }

        async fn teams(&self) -> ReplayResult<Vec<TeamInfo>> {
            Ok(vec![TeamInfo {
                team_id: "TA".to_string(),
                name: "Alphas".to_string(),
            }])
        }

        async fn roster(&self, round_no: i64, team_id: &str) -> ReplayResult<Vec<String>> {
            assert_eq!(round_no, 1);
            if team_id == "TB" && self.fail_team_b {
                return Err(ReplayError::internal_error("submission hidden"));
            }
            Ok(vec!["1".to_string(), "2".to_string(), "1".to_string()])
        }
    }

    fn bootstrap(provider: FixedProvider) -> BootstrapReport {
        let bootstrapper = Bootstrapper::new(provider, ReplaySettings::default());
        tokio_test::block_on(bootstrapper.bootstrap("m-1")).unwrap()
    }

    #[test]
    fn test_seeds_both_sides_with_fallbacks() {
        let report = bootstrap(FixedProvider {
            fail_catalog: false,
            fail_team_b: false,
        });
        let store = &report.store;

        assert!(!report.is_degraded());
        assert_eq!(report.roster_a, RosterStatus::Loaded { count: 2 });
        assert_eq!(store.len(), 4);

        let bomb = store.get("TA_1").unwrap();
        assert_eq!(bomb.display_name(), "A-Bomb");
        assert_eq!(bomb.max_health(), 80);
        assert_eq!(bomb.image_ref(), Some("a-bomb.jpg"));

        let unknown = store.get("TB_2").unwrap();
        assert_eq!(unknown.display_name(), "2");
        assert_eq!(unknown.max_health(), crate::env::DEFAULT_MAX_HEALTH);

        assert_eq!(store.context().team_a_name, "Alphas");
        assert_eq!(store.context().team_b_name, "Unknown Team B");
        assert_eq!(store.context().round_no, 1);
        assert_eq!(store.context().reported_status.as_deref(), Some("IN_PROGRESS"));
    }

    #[test]
    fn test_failed_roster_degrades_one_side() {
        let report = bootstrap(FixedProvider {
            fail_catalog: true,
            fail_team_b: true,
        });

        assert!(report.is_degraded());
        assert!(report.roster_a.is_loaded());
        assert!(matches!(report.roster_b, RosterStatus::Unavailable { .. }));
        assert!(report.store.team("TB").is_empty());
        assert_eq!(report.store.team("TA").len(), 2);
        assert_eq!(report.store.get("TA_1").unwrap().display_name(), "1");
    }
}
