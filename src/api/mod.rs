//! Fan-out ops endpoint.
//!
//! `POST /dispatch` plays the host query-execution layer's role for smoke
//! tests and operational checks: it submits one parameter set to every
//! listed shard through the dispatcher and returns the raw per-shard
//! outcomes. No merging or ranking happens here.

use crate::health::AppState;
use crate::request::{ShardParams, ShardRequest};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug, Deserialize)]
pub struct DispatchBody {
    /// Ordered `[key, value]` pairs applied to every shard
    pub params: Vec<(String, String)>,
    /// Shards to fan out to
    pub shards: Vec<ShardTarget>,
}

#[derive(Debug, Deserialize)]
pub struct ShardTarget {
    pub shard: String,
    pub endpoint: String,
}

/// Raw outcome for one shard, unmerged
#[derive(Debug, Serialize)]
pub struct ShardOutcome {
    pub shard: String,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/dispatch", post(dispatch_handler))
        .with_state(state)
}

async fn dispatch_handler(
    State(state): State<AppState>,
    Json(body): Json<DispatchBody>,
) -> impl IntoResponse {
    let params: ShardParams = body.params.into_iter().collect();

    let mut pending = Vec::with_capacity(body.shards.len());
    for target in body.shards {
        let (tx, rx) = oneshot::channel();
        let request = ShardRequest::new(target.shard.clone(), target.endpoint, params.clone(), tx);
        state.dispatcher.submit(request);
        pending.push((target.shard, rx));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (shard, rx) in pending {
        let outcome = match rx.await {
            Ok(Ok(response)) => ShardOutcome {
                shard,
                status: Some(response.status),
                body: Some(String::from_utf8_lossy(&response.body).into_owned()),
                error: None,
            },
            Ok(Err(e)) => ShardOutcome {
                shard,
                status: None,
                body: None,
                error: Some(e.to_string()),
            },
            Err(_) => ShardOutcome {
                shard,
                status: None,
                body: None,
                error: Some("reply channel dropped".to_string()),
            },
        };
        outcomes.push(outcome);
    }

    Json(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_body_accepts_ordered_pairs() {
        let body: DispatchBody = serde_json::from_str(
            r#"{
                "params": [["q", "foo"], ["fq", "type:doc"]],
                "shards": [
                    {"shard": "shard1", "endpoint": "http://shard1:8983/select"},
                    {"shard": "shard2", "endpoint": "http://shard2:8983/select"}
                ]
            }"#,
        )
        .expect("deserialize");

        assert_eq!(body.params[0].0, "q");
        assert_eq!(body.shards.len(), 2);
    }

    #[test]
    fn outcome_serializes_error_and_success_shapes() {
        let ok = ShardOutcome {
            shard: "shard1".to_string(),
            status: Some(200),
            body: Some("{}".to_string()),
            error: None,
        };
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"status\":200"));

        let failed = ShardOutcome {
            shard: "shard2".to_string(),
            status: None,
            body: None,
            error: Some("shard request to shard2 failed".to_string()),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"status\":null"));
        assert!(json.contains("failed"));
    }
}
