//! Dispatcher forwarding behavior across threads.
//!
//! Validates that concurrent fan-out produces exactly one transport
//! submission per shard with shard-appropriate parameters, and that the
//! rewrite fallback never drops a request.

use meridian_dispatch::dispatch::ShardRequestDispatcher;
use meridian_dispatch::error::DispatchError;
use meridian_dispatch::request::{ShardParams, ShardRequest, ShardResponse};
use meridian_dispatch::transport::Transport;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Transport double that records every submission and answers immediately.
#[derive(Default)]
struct RecordingTransport {
    submitted: Mutex<Vec<(String, ShardParams)>>,
}

impl Transport for RecordingTransport {
    fn submit(&self, request: ShardRequest) {
        self.submitted
            .lock()
            .unwrap()
            .push((request.shard.clone(), request.params.clone()));
        let _ = request.reply.send(Ok(ShardResponse {
            shard: request.shard,
            status: 200,
            body: b"{}".to_vec(),
        }));
    }

    fn close_idle_older_than(&self, _max_idle: Duration) -> Result<usize, DispatchError> {
        Ok(0)
    }
}

fn endpoint_for(shard: &str) -> String {
    format!("http://{shard}.internal:8983/select")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_forward_exactly_once_per_shard() {
    const SHARDS: usize = 8;

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(ShardRequestDispatcher::new(
        transport.clone() as Arc<dyn Transport>
    ));

    let mut handles = Vec::with_capacity(SHARDS);
    for i in 0..SHARDS {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            let shard = format!("shard{i}");
            let mut params = ShardParams::from_pairs([("q", "foo")]);
            // A scoped override for this shard and one for a different shard:
            // only the former may survive the rewrite.
            params.append(format!("shard.{shard}.fq"), format!("zone:{i}"));
            params.append("shard.other.fq", "zone:none");

            let (tx, rx) = oneshot::channel();
            dispatcher.submit(ShardRequest::new(&shard, endpoint_for(&shard), params, tx));
            rx.await.expect("reply must arrive").expect("submit ok");
            shard
        }));
    }

    for handle in handles {
        handle.await.expect("task");
    }

    let submitted = transport.submitted.lock().unwrap();
    assert_eq!(submitted.len(), SHARDS, "exactly one forward per shard");

    for i in 0..SHARDS {
        let shard = format!("shard{i}");
        let (_, params) = submitted
            .iter()
            .find(|(s, _)| *s == shard)
            .unwrap_or_else(|| panic!("no forward recorded for {shard}"));

        assert_eq!(params.get("q"), Some("foo"));
        assert_eq!(
            params.get("fq"),
            Some(format!("zone:{i}").as_str()),
            "{shard} must receive its own scoped override"
        );
        assert!(
            params.iter().all(|(k, _)| !k.starts_with("shard.")),
            "scoped keys must not reach the transport"
        );
    }
}

#[tokio::test]
async fn plain_params_are_forwarded_with_content_unchanged() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = ShardRequestDispatcher::new(transport.clone() as Arc<dyn Transport>);

    let params = ShardParams::from_pairs([("fq", "type:doc"), ("q", "foo")]);
    let (tx, rx) = oneshot::channel();
    dispatcher.submit(ShardRequest::new(
        "shard3",
        endpoint_for("shard3"),
        params.clone(),
        tx,
    ));
    rx.await.expect("reply").expect("ok");

    let submitted = transport.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, "shard3");
    assert_eq!(submitted[0].1, params);
}

#[tokio::test]
async fn rewrite_failure_forwards_original_instead_of_dropping() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = ShardRequestDispatcher::new(transport.clone() as Arc<dyn Transport>);

    // `shard.broken` has no `<name>.<key>` structure, so the rewrite fails.
    let params = ShardParams::from_pairs([("q", "foo"), ("shard.broken", "x")]);
    let (tx, rx) = oneshot::channel();
    dispatcher.submit(ShardRequest::new(
        "shard3",
        endpoint_for("shard3"),
        params.clone(),
        tx,
    ));

    let reply = rx.await.expect("request must not be dropped");
    assert!(reply.is_ok());

    let submitted = transport.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1, "still exactly one forward");
    assert_eq!(
        submitted[0].1, params,
        "the original parameter set goes out verbatim"
    );
}
