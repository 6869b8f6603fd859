use lazy_static::lazy_static;
use prometheus::{opts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    // register_... 매크로는 기본 레지스트리에 자동으로 등록하므로,
    // 여기서는 Opts만 생성하고 register_custom_metrics 에서 수동으로 등록합니다.

    /// Frames read from the event feed, parsed or not.
    pub static ref FRAMES_RECEIVED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("replay_frames_received_total", "Total event frames received from the stream")).unwrap();

    /// Frames dropped because they could not be decoded.
    pub static ref FRAMES_DROPPED_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("replay_frames_dropped_total", "Total malformed event frames dropped")).unwrap();

    pub static ref UNRESOLVED_REFERENCES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("replay_unresolved_references_total", "Events referencing a combatant absent from the store")).unwrap();

    pub static ref ROSTER_FETCH_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("replay_roster_fetch_failures_total", "Roster fetches that degraded a side to empty")).unwrap();

    pub static ref STREAM_TERMINATIONS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("replay_stream_terminations_total", "Event stream terminations by reason"),
            &["reason"],
        )
        .unwrap();
}

pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(FRAMES_RECEIVED_TOTAL.clone()))?;
    registry.register(Box::new(FRAMES_DROPPED_TOTAL.clone()))?;
    registry.register(Box::new(UNRESOLVED_REFERENCES_TOTAL.clone()))?;
    registry.register(Box::new(ROSTER_FETCH_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(STREAM_TERMINATIONS_TOTAL.clone()))?;
    Ok(())
}

/// Text exposition of everything registered in `registry`.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    use prometheus::{Encoder, TextEncoder};

    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_are_exposed() {
        let registry = Registry::new();
        register_custom_metrics(&registry).unwrap();
        FRAMES_RECEIVED_TOTAL.inc();
        STREAM_TERMINATIONS_TOTAL.with_label_values(&["completed"]).inc();

        let text = encode_metrics(&registry).unwrap();
        assert!(text.contains("replay_frames_received_total"));
        assert!(text.contains("replay_stream_terminations_total{reason=\"completed\"}"));
    }
}
