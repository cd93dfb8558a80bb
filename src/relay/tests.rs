use super::*;
use crate::provider::{ChatMessage, ScriptStep, ScriptedClient};
use std::time::Instant;

const WAIT: Duration = Duration::from_secs(2);

fn start(client: ScriptedClient) -> ActiveRelay {
    ActiveRelay::start(7, Arc::new(client), vec![ChatMessage::user("hi")])
}

/// Receive events one at a time, the way the render loop does, until the outcome.
fn collect_events(relay: &ActiveRelay) -> (Vec<String>, RelayOutcome) {
    let listener = relay.listener();
    let mut chunks = Vec::new();
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        match listener.recv_timeout(Duration::from_millis(50)) {
            Some(RelayEvent {
                kind: RelayEventKind::Chunk(text),
                relay_id,
            }) => {
                assert_eq!(relay_id, 7);
                chunks.push(text);
            }
            Some(RelayEvent {
                kind: RelayEventKind::Done(outcome),
                ..
            }) => {
                chunks.extend(relay.drain_pending());
                return (chunks, outcome);
            }
            None => {}
        }
    }
    panic!("relay did not finish in time");
}

#[test]
fn chunks_arrive_in_order_before_completion() {
    let relay = start(ScriptedClient::chunks(["Hel", "lo, ", "world"]));
    let (chunks, outcome) = collect_events(&relay);
    assert_eq!(chunks, vec!["Hel", "lo, ", "world"]);
    assert_eq!(outcome, RelayOutcome::Completed);
    relay.finish();
}

#[test]
fn more_chunks_than_capacity_are_all_delivered() {
    let expected: Vec<String> = (0..CHUNK_CHANNEL_CAPACITY * 3)
        .map(|i| format!("{i},"))
        .collect();
    let relay = start(ScriptedClient::chunks(expected.clone()));
    let (chunks, outcome) = collect_events(&relay);
    assert_eq!(chunks, expected);
    assert_eq!(outcome, RelayOutcome::Completed);
    relay.finish();
}

#[test]
fn upstream_failure_is_reported_once_after_prior_chunks() {
    let relay = start(ScriptedClient::new(vec![
        ScriptStep::Chunk("partial".into()),
        ScriptStep::Fail("connection reset".into()),
        ScriptStep::Chunk("never sent".into()),
    ]));
    let (chunks, outcome) = collect_events(&relay);
    assert_eq!(chunks, vec!["partial"]);
    assert_eq!(outcome, RelayOutcome::Failed("connection reset".into()));

    // The outcome slot is drained and the worker is gone: nothing else arrives.
    let listener = relay.listener();
    assert!(listener.done().try_recv().is_err());
    relay.finish();
}

#[test]
fn completion_is_observed_after_queued_chunks() {
    let relay = start(ScriptedClient::chunks(["a", "b", "c"]));
    // Wait for the worker to finish without consuming anything.
    let listener = relay.listener();
    let outcome = listener
        .done()
        .recv_timeout(WAIT)
        .expect("outcome should be queued");
    assert_eq!(outcome, RelayOutcome::Completed);
    assert_eq!(relay.drain_pending(), vec!["a", "b", "c"]);
    relay.finish();
}

#[test]
fn cancellation_reports_cancelled() {
    let relay = start(ScriptedClient::new(vec![
        ScriptStep::Chunk("before".into()),
        ScriptStep::WaitForCancel,
        ScriptStep::Chunk("after".into()),
    ]));
    let listener = relay.listener();
    let first = listener.recv_timeout(WAIT).expect("first chunk");
    assert_eq!(first.kind, RelayEventKind::Chunk("before".into()));

    relay.cancel();
    assert!(relay.is_cancelled());
    let (rest, outcome) = collect_events(&relay);
    assert!(rest.is_empty());
    assert_eq!(outcome, RelayOutcome::Cancelled);
    relay.finish();
}

#[test]
fn abandoned_relay_does_not_block_worker() {
    // Far more chunks than the channel holds, and nobody reading them.
    let chunks: Vec<String> = (0..CHUNK_CHANNEL_CAPACITY * 4).map(|i| i.to_string()).collect();
    let client = Arc::new(ScriptedClient::chunks(chunks));
    let relay = ActiveRelay::start(3, client.clone(), vec![ChatMessage::user("hi")]);
    relay.abandon();

    // The worker holds the only other reference; it drops once the thread exits.
    let deadline = Instant::now() + WAIT;
    while Arc::strong_count(&client) > 1 {
        assert!(Instant::now() < deadline, "relay worker leaked");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn idle_listener_never_fires() {
    let listener = RelayListener::idle();
    assert!(listener.recv_timeout(Duration::from_millis(10)).is_none());
}

#[test]
fn disconnected_chunks_without_outcome_become_failure() {
    let (chunk_tx, chunk_rx) = bounded::<String>(1);
    let (done_tx, done_rx) = bounded::<RelayOutcome>(1);
    drop(chunk_tx);
    drop(done_tx);
    let listener = RelayListener {
        relay_id: 9,
        chunks: chunk_rx,
        done: done_rx,
    };
    let event = listener.chunk_event(Err(RecvError));
    assert_eq!(event.relay_id, 9);
    assert!(matches!(
        event.kind,
        RelayEventKind::Done(RelayOutcome::Failed(ref msg)) if msg.contains("disconnected")
    ));
}
