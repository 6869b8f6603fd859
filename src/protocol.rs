use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::{ReplayError, ReplayResult};

// --- Wire Format (producer -> viewer) ---

/// Raw inbound frame as emitted by the battle engine.
///
/// `value` stays untyped here; each event kind decides what it accepts.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

// --- Decoded Events ---

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEvent {
    pub description: Option<String>,
    pub timestamp: Option<i64>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// 매치 시작 (마일스톤 전용)
    MatchStart,
    RoundStart { round: Option<i64> },
    RoundEnd { round: Option<i64> },
    AttackPerformed {
        actor_id: Option<String>,
        target_id: Option<String>,
        damage: i64,
    },
    HeroKnockedOut {
        actor_id: Option<String>,
        target_id: Option<String>,
    },
    MatchEnd { winner_team_id: Option<String> },
    /// Any type this viewer does not know; forwarded to the log only.
    Other { event_type: String },
}

impl EventPayload {
    pub fn type_name(&self) -> &str {
        match self {
            EventPayload::MatchStart => "MATCH_START",
            EventPayload::RoundStart { .. } => "ROUND_START",
            EventPayload::RoundEnd { .. } => "ROUND_END",
            EventPayload::AttackPerformed { .. } => "ATTACK_PERFORMED",
            EventPayload::HeroKnockedOut { .. } => "HERO_KNOCKED_OUT",
            EventPayload::MatchEnd { .. } => "MATCH_END",
            EventPayload::Other { event_type } => event_type,
        }
    }

    /// ATTACK_PERFORMED / HERO_KNOCKED_OUT
    pub fn is_combat(&self) -> bool {
        matches!(
            self,
            EventPayload::AttackPerformed { .. } | EventPayload::HeroKnockedOut { .. }
        )
    }
}

const WINNER_PREFIX: &str = "Winner:";

/// Parses one frame of text into a [`ReplayEvent`].
///
/// Unknown tags decode to [`EventPayload::Other`]. A known tag whose payload
/// cannot be interpreted (e.g. non-numeric damage) is a malformed frame.
pub fn decode_frame(text: &str) -> ReplayResult<ReplayEvent> {
    let frame: EventFrame = serde_json::from_str(text.trim())
        .map_err(|e| ReplayError::malformed_frame(format!("invalid JSON frame: {}", e)))?;
    decode_event(frame)
}

pub fn decode_event(frame: EventFrame) -> ReplayResult<ReplayEvent> {
    let event_type = frame.event_type.trim();
    if event_type.is_empty() {
        return Err(ReplayError::malformed_frame("frame has an empty type"));
    }

    let description = frame
        .description
        .filter(|d| !d.trim().is_empty());
    let actor_id = non_empty(frame.actor_id);
    let target_id = non_empty(frame.target_id);

    let payload = match event_type {
        "MATCH_START" => EventPayload::MatchStart,
        // TURN_START은 엔진이 실제로 보내는 이름
        "ROUND_START" | "TURN_START" => EventPayload::RoundStart {
            round: frame.value.as_ref().and_then(integer_value),
        },
        "ROUND_END" | "TURN_END" => EventPayload::RoundEnd {
            round: frame.value.as_ref().and_then(integer_value),
        },
        "ATTACK_PERFORMED" | "HIT" | "CRITICAL_HIT" => {
            // value 가 없으면 0 (설명만 있는 공격)
            let damage = match frame.value.as_ref() {
                None | Some(JsonValue::Null) => Some(0),
                Some(value) => integer_value(value),
            }
            .ok_or_else(|| {
                ReplayError::malformed_frame(format!(
                    "{} with a non-numeric damage value: {:?}",
                    event_type, frame.value
                ))
            })?;
            EventPayload::AttackPerformed {
                actor_id,
                target_id,
                damage,
            }
        }
        "HERO_KNOCKED_OUT" | "KO" => EventPayload::HeroKnockedOut {
            actor_id,
            target_id,
        },
        "MATCH_END" => EventPayload::MatchEnd {
            winner_team_id: winner_from_value(frame.value.as_ref())
                .or_else(|| description.as_deref().and_then(winner_from_description)),
        },
        other => EventPayload::Other {
            event_type: other.to_string(),
        },
    };

    Ok(ReplayEvent {
        description,
        timestamp: frame.timestamp,
        payload,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// number|string -> i64. Floats are rounded; numeric strings are parsed.
fn integer_value(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn winner_from_value(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        // 엔진은 승자가 없을 때 value=0 을 보냄
        JsonValue::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

fn winner_from_description(description: &str) -> Option<String> {
    let rest = description.trim().strip_prefix(WINNER_PREFIX)?.trim();
    if rest.is_empty() || rest.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_attack_with_numeric_and_string_damage() {
        let ev = decode_frame(
            r#"{"type":"ATTACK_PERFORMED","description":"Hulk smashes Thor","actorId":"T1_H1","targetId":"T2_H9","value":50}"#,
        )
        .unwrap();
        assert_eq!(
            ev.payload,
            EventPayload::AttackPerformed {
                actor_id: Some("T1_H1".to_string()),
                target_id: Some("T2_H9".to_string()),
                damage: 50,
            }
        );
        assert_eq!(ev.description.as_deref(), Some("Hulk smashes Thor"));

        let ev = decode_frame(r#"{"type":"HIT","targetId":"T2_H9","value":"12"}"#).unwrap();
        assert!(matches!(
            ev.payload,
            EventPayload::AttackPerformed { damage: 12, .. }
        ));
    }

    #[test]
    fn test_attack_without_value_deals_no_damage() {
        for frame in [
            r#"{"type":"ATTACK_PERFORMED","description":"Thor misses","targetId":"T2_H9"}"#,
            r#"{"type":"HIT","description":"Thor misses","targetId":"T2_H9","value":null}"#,
        ] {
            let ev = decode_frame(frame).unwrap();
            assert!(matches!(
                ev.payload,
                EventPayload::AttackPerformed { damage: 0, .. }
            ));
            assert_eq!(ev.description.as_deref(), Some("Thor misses"));
        }
    }

    #[test]
    fn test_critical_hit_is_an_attack() {
        let ev = decode_frame(
            r#"{"type":"CRITICAL_HIT","actorId":"T1_H1","targetId":"T2_H9","value":75.4}"#,
        )
        .unwrap();
        assert_eq!(ev.payload.type_name(), "ATTACK_PERFORMED");
        assert!(ev.payload.is_combat());
        assert!(matches!(
            ev.payload,
            EventPayload::AttackPerformed { damage: 75, .. }
        ));
    }

    #[test]
    fn test_attack_with_non_numeric_damage_is_malformed() {
        let err = decode_frame(r#"{"type":"ATTACK_PERFORMED","targetId":"T2_H9","value":"lots"}"#)
            .unwrap_err();
        assert!(matches!(err, ReplayError::MalformedFrame { .. }));
    }

    #[test]
    fn test_garbage_and_missing_type_are_malformed() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"description":"no type"}"#).is_err());
        assert!(decode_frame(r#"{"type":"  "}"#).is_err());
    }

    #[test]
    fn test_unknown_type_becomes_other() {
        let ev = decode_frame(
            r#"{"type":"SHIELD_RAISED","description":"Cap raises his shield","value":{"x":1}}"#,
        )
        .unwrap();
        assert_eq!(
            ev.payload,
            EventPayload::Other {
                event_type: "SHIELD_RAISED".to_string()
            }
        );
        assert_eq!(ev.payload.type_name(), "SHIELD_RAISED");
    }

    #[test]
    fn test_round_events_tolerate_missing_index() {
        let ev = decode_frame(r#"{"type":"ROUND_START","value":3}"#).unwrap();
        assert_eq!(ev.payload, EventPayload::RoundStart { round: Some(3) });

        let ev = decode_frame(r#"{"type":"ROUND_END"}"#).unwrap();
        assert_eq!(ev.payload, EventPayload::RoundEnd { round: None });
    }

    #[test]
    fn test_match_end_winner_resolution() {
        let ev = decode_frame(r#"{"type":"MATCH_END","value":"T1"}"#).unwrap();
        assert_eq!(
            ev.payload,
            EventPayload::MatchEnd {
                winner_team_id: Some("T1".to_string())
            }
        );

        let ev = decode_frame(
            r#"{"type":"MATCH_END","description":"Winner: 7c9e6679-7425-40de-944b-e07fc1f90ae7","value":0}"#,
        )
        .unwrap();
        assert_eq!(
            ev.payload,
            EventPayload::MatchEnd {
                winner_team_id: Some("7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string())
            }
        );

        let ev = decode_frame(
            r#"{"type":"MATCH_END","description":"Draw - Max turns reached","value":0}"#,
        )
        .unwrap();
        assert_eq!(ev.payload, EventPayload::MatchEnd { winner_team_id: None });
    }

    #[test]
    fn test_null_ids_and_timestamp() {
        let ev = decode_frame(
            r#"{"type":"MATCH_START","timestamp":4,"description":"Match started","actorId":null,"targetId":null,"value":0}"#,
        )
        .unwrap();
        assert_eq!(ev.payload, EventPayload::MatchStart);
        assert_eq!(ev.timestamp, Some(4));
    }
}
