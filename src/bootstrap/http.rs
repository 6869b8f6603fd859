use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{HeroInfo, MatchInfo, MetadataProvider, TeamInfo};
use crate::{
    env::ApiSettings,
    errors::{ReplayError, ReplayResult},
};

/// [`MetadataProvider`] backed by the battle service REST API.
#[derive(Debug, Clone)]
pub struct HttpMetadataProvider {
    http: reqwest::Client,
    api: ApiSettings,
}

impl HttpMetadataProvider {
    pub fn new(api: ApiSettings) -> Self {
        Self::with_client(reqwest::Client::new(), api)
    }

    pub fn with_client(http: reqwest::Client, api: ApiSettings) -> Self {
        Self { http, api }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.http
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ReplayResult<T> {
        let url = self.api.url(path);
        debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(self.api.request_timeout_seconds))
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn hero_catalog(&self) -> ReplayResult<Vec<HeroInfo>> {
        let heroes: Vec<HeroWire> = self.get_json("/api/teams/heroes").await?;
        Ok(heroes.into_iter().map(HeroInfo::from).collect())
    }

    async fn match_info(&self, match_id: &str) -> ReplayResult<MatchInfo> {
        let wire: MatchWire = self.get_json(&format!("/api/matches/{}", match_id)).await?;
        let (team_a_id, team_b_id) = match (wire.team_a, wire.team_b) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(ReplayError::bootstrap_failed(
                    match_id,
                    "match record has no team assignment",
                ))
            }
        };

        Ok(MatchInfo {
            match_id: wire.match_id.unwrap_or_else(|| match_id.to_string()),
            team_a_id,
            team_b_id,
            round_no: wire.round_no,
            status: wire.status,
        })
    }

    async fn teams(&self) -> ReplayResult<Vec<TeamInfo>> {
        let teams: Vec<TeamWire> = self.get_json("/api/teams").await?;
        Ok(teams
            .into_iter()
            .map(|t| TeamInfo {
                team_id: t.team_id,
                name: t.name,
            })
            .collect())
    }

    async fn roster(&self, round_no: i64, team_id: &str) -> ReplayResult<Vec<String>> {
        let path = format!("/api/rounds/{}/submission?teamId={}", round_no, team_id);
        let submission: SubmissionWire = self.get_json(&path).await?;
        Ok(submission.hero_ids)
    }
}

// --- Wire DTOs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HeroWire {
    #[serde(deserialize_with = "flexible_id")]
    id: String,
    name: String,
    #[serde(default)]
    powerstats: Option<PowerStatsWire>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    images: Option<ImagesWire>,
}

#[derive(Deserialize, Debug, Default)]
struct PowerStatsWire {
    #[serde(default)]
    durability: Option<i64>,
}

#[derive(Deserialize, Debug, Default)]
struct ImagesWire {
    #[serde(default)]
    xs: Option<String>,
    #[serde(default)]
    sm: Option<String>,
    #[serde(default)]
    md: Option<String>,
    #[serde(default)]
    lg: Option<String>,
}

impl From<HeroWire> for HeroInfo {
    fn from(wire: HeroWire) -> Self {
        // imageUrl 우선, 없으면 md > sm > lg > xs
        let image_ref = wire.image_url.filter(|u| !u.is_empty()).or_else(|| {
            wire.images.and_then(|i| {
                [i.md, i.sm, i.lg, i.xs]
                    .into_iter()
                    .flatten()
                    .find(|u| !u.is_empty())
            })
        });

        HeroInfo {
            hero_id: wire.id,
            name: wire.name,
            durability: wire.powerstats.and_then(|p| p.durability),
            image_ref,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MatchWire {
    #[serde(default, deserialize_with = "optional_flexible_id")]
    match_id: Option<String>,
    #[serde(default, deserialize_with = "optional_flexible_id")]
    team_a: Option<String>,
    #[serde(default, deserialize_with = "optional_flexible_id")]
    team_b: Option<String>,
    #[serde(default)]
    round_no: Option<i64>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TeamWire {
    #[serde(deserialize_with = "flexible_id")]
    team_id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SubmissionWire {
    #[serde(default, deserialize_with = "flexible_id_list")]
    hero_ids: Vec<String>,
}

fn id_string(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ids arrive as numbers (hero ids) or strings (UUID team ids).
fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    id_string(value.clone())
        .ok_or_else(|| serde::de::Error::custom(format!("expected string or number id, got {}", value)))
}

fn optional_flexible_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.and_then(id_string))
}

fn flexible_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Option::<Vec<JsonValue>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values.into_iter().filter_map(id_string).collect())
}
