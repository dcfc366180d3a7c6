use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

pub const TIMING_TARGET: &str = "poetry.timing";

/// Wraps one gateway call with `llm_request`/`llm_response` timing records.
pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    let metadata_text = metadata
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "{}".to_string());
    info!(
        target: "poetry.timing",
        "event=llm_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339(),
        metadata_text
    );

    let result = call().await;
    let (status, detail) = match &result {
        Ok(_) => ("success", String::new()),
        Err(err) => ("error", err.to_string()),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: "poetry.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} detail={:?} metadata={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        status,
        detail,
        metadata_text
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timing_passes_results_through() {
        let ok: Result<u32, String> =
            log_llm_timing("fake", "m", "poem", None, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = log_llm_timing(
            "fake",
            "m",
            "poem",
            Some(serde_json::json!({"turn": 1})),
            || async { Err("boom".to_string()) },
        )
        .await;
        assert_eq!(err, Err("boom".to_string()));
    }
}
