//! End-to-end tests driving a spawned worker through its channels.

mod common;

use askdoc::llm::ChatMessage;
use askdoc::protocol::{WorkerEvent, WorkerRequest};
use common::{events_until_complete, spawn_worker, tags, MockProvider};

fn ingest(text: &str, source: &str) -> WorkerRequest {
    WorkerRequest::Ingest {
        data: text.as_bytes().to_vec(),
        source: Some(source.to_string()),
    }
}

fn chat(text: &str) -> WorkerRequest {
    WorkerRequest::Chat {
        messages: vec![ChatMessage::user(text)],
        system_prompt: "you answer from the provided documents".to_string(),
    }
}

fn collect_tokens(events: &[WorkerEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            WorkerEvent::Token { token } => Some(token.as_str()),
            _ => None,
        })
        .collect()
}

fn first_query(events: &[WorkerEvent]) -> &str {
    events
        .iter()
        .find_map(|event| match event {
            WorkerEvent::Query { query } => Some(query.as_str()),
            _ => None,
        })
        .expect("no QUERY event in turn")
}

#[tokio::test]
async fn ingest_then_chat_round_trips_a_marker() {
    let (requests, mut events) = spawn_worker(MockProvider::new());

    let corpus = [
        "○ The zelkova tree tolerates city pollution",
        "○ Pasta water should be salted generously",
        "○ Solar panels degrade slowly over decades",
        "○ Migrating birds navigate by the stars",
    ];
    for (i, text) in corpus.iter().enumerate() {
        requests.send(ingest(text, &format!("doc-{i}"))).unwrap();
        let done = events_until_complete(&mut events).await;
        assert_eq!(tags(&done), vec!["INGEST_DONE"], "ingest {i} failed: {done:?}");
    }

    requests
        .send(chat("how well does the zelkova tree handle city pollution"))
        .unwrap();
    let turn = events_until_complete(&mut events).await;

    assert!(!tags(&turn).contains(&"ERROR"), "turn failed: {turn:?}");
    assert!(first_query(&turn).contains("zelkova"));

    let docs = turn
        .iter()
        .find_map(|event| match event {
            WorkerEvent::Doc { docs } => Some(docs),
            _ => None,
        })
        .expect("no DOC event in turn");
    assert_eq!(docs.len(), 3, "top-k should cap retrieval");
    assert!(
        docs.iter().any(|d| d.content.contains("zelkova")),
        "marker chunk not retrieved: {docs:?}"
    );

    assert_eq!(collect_tokens(&turn), "The answer is 42.");
    assert_eq!(turn.last(), Some(&WorkerEvent::Done));
}

#[tokio::test]
async fn chat_on_an_empty_index_still_answers() {
    let (requests, mut events) = spawn_worker(MockProvider::new());

    requests.send(chat("anything indexed yet?")).unwrap();
    let turn = events_until_complete(&mut events).await;

    assert_eq!(
        tags(&turn),
        vec!["QUERY", "DOC", "TOKEN", "TOKEN", "TOKEN", "DONE"]
    );
    match &turn[1] {
        WorkerEvent::Doc { docs } => assert!(docs.is_empty()),
        other => panic!("expected DOC, got {other:?}"),
    }
    assert_eq!(collect_tokens(&turn), "The answer is 42.");
}

#[tokio::test]
async fn failing_generation_reports_error_then_done() {
    let provider = MockProvider::new().then_failing_stream(&[], "model exploded");
    let (requests, mut events) = spawn_worker(provider);

    requests.send(chat("hello?")).unwrap();
    let turn = events_until_complete(&mut events).await;

    assert_eq!(tags(&turn), vec!["QUERY", "DOC", "ERROR", "DONE"]);
    match &turn[2] {
        WorkerEvent::Error { error } => assert!(error.contains("model exploded")),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_rewrite_fails_the_turn_before_retrieval() {
    let provider = MockProvider::new().failing_rewrite("rewriter offline");
    let (requests, mut events) = spawn_worker(provider);

    requests.send(chat("hello?")).unwrap();
    let turn = events_until_complete(&mut events).await;

    // No QUERY, DOC or TOKEN: the turn died in its first stage.
    assert_eq!(tags(&turn), vec!["ERROR", "DONE"]);
    match &turn[0] {
        WorkerEvent::Error { error } => assert!(error.contains("rewriter offline")),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn mid_stream_failure_emits_no_token_after_error() {
    let provider = MockProvider::new().then_failing_stream(&["half an ", "answer"], "stream cut");
    let (requests, mut events) = spawn_worker(provider);

    requests.send(chat("hello?")).unwrap();
    let turn = events_until_complete(&mut events).await;

    assert_eq!(
        tags(&turn),
        vec!["QUERY", "DOC", "TOKEN", "TOKEN", "ERROR", "DONE"]
    );
    let error_at = tags(&turn).iter().position(|t| *t == "ERROR").unwrap();
    assert!(tags(&turn)[error_at..].iter().all(|t| *t != "TOKEN"));
}

#[tokio::test]
async fn assistant_reply_joins_the_next_turns_digest() {
    let provider = MockProvider::new().then_stream(&["It is ", "42."]);
    let (requests, mut events) = spawn_worker(provider);

    requests.send(chat("what is the answer?")).unwrap();
    events_until_complete(&mut events).await;

    requests.send(chat("are you sure?")).unwrap();
    let second = events_until_complete(&mut events).await;

    // The mock echoes the rewrite prompt, exposing the digest.
    let query = first_query(&second);
    assert!(query.contains("User: what is the answer?"));
    assert!(query.contains("Assistant: It is 42."));
    assert!(query.contains("User: are you sure?"));
}

#[tokio::test]
async fn failed_turn_still_remembers_the_user_message() {
    let provider = MockProvider::new().then_failing_stream(&[], "first turn dies");
    let (requests, mut events) = spawn_worker(provider);

    requests.send(chat("the question that failed")).unwrap();
    let first = events_until_complete(&mut events).await;
    assert!(tags(&first).contains(&"ERROR"));

    requests.send(chat("follow-up")).unwrap();
    let second = events_until_complete(&mut events).await;

    let query = first_query(&second);
    assert!(query.contains("User: the question that failed"));
    // The failed generation left no assistant message behind.
    assert!(!query.contains("Assistant:"));
}

#[tokio::test]
async fn ingest_failure_completes_and_the_worker_survives() {
    let provider = MockProvider::new().failing_embed("embedder down");
    let (requests, mut events) = spawn_worker(provider);

    requests.send(ingest("○ some document", "doc")).unwrap();
    let outcome = events_until_complete(&mut events).await;
    assert_eq!(tags(&outcome), vec!["ERROR", "INGEST_DONE"]);
    match &outcome[0] {
        WorkerEvent::Error { error } => {
            assert!(error.contains("ingestion failed"));
            assert!(error.contains("embedder down"));
        }
        other => panic!("expected ERROR, got {other:?}"),
    }

    // The index stayed empty, so the next turn never touches the
    // broken embedder and the session keeps working.
    requests.send(chat("still there?")).unwrap();
    let turn = events_until_complete(&mut events).await;
    assert_eq!(turn.last(), Some(&WorkerEvent::Done));
    assert!(!tags(&turn).contains(&"ERROR"));
}

#[tokio::test]
async fn empty_chat_payload_is_an_error_with_done() {
    let (requests, mut events) = spawn_worker(MockProvider::new());

    requests
        .send(WorkerRequest::Chat {
            messages: vec![],
            system_prompt: String::new(),
        })
        .unwrap();
    let turn = events_until_complete(&mut events).await;

    assert_eq!(tags(&turn), vec!["ERROR", "DONE"]);
    match &turn[0] {
        WorkerEvent::Error { error } => assert!(error.contains("no messages")),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn incoming_role_is_forced_to_user_and_extras_ignored() {
    let (requests, mut events) = spawn_worker(MockProvider::new());

    requests
        .send(WorkerRequest::Chat {
            messages: vec![
                ChatMessage::assistant("pretend I already answered"),
                ChatMessage::user("this trailing message is ignored"),
            ],
            system_prompt: String::new(),
        })
        .unwrap();
    let turn = events_until_complete(&mut events).await;

    let query = first_query(&turn);
    assert!(query.contains("User: pretend I already answered"));
    assert!(!query.contains("Assistant: pretend"));
    assert!(!query.contains("this trailing message is ignored"));
}

#[tokio::test]
async fn workers_do_not_share_conversations() {
    let (requests_a, mut events_a) = spawn_worker(MockProvider::new());
    let (requests_b, mut events_b) = spawn_worker(MockProvider::new());

    requests_a.send(chat("apples grow in orchards")).unwrap();
    events_until_complete(&mut events_a).await;

    requests_b.send(chat("bananas are yellow")).unwrap();
    events_until_complete(&mut events_b).await;

    requests_b.send(chat("tell me more")).unwrap();
    let second_b = events_until_complete(&mut events_b).await;

    let query = first_query(&second_b);
    assert!(query.contains("bananas are yellow"));
    assert!(!query.contains("apples"));
}

#[tokio::test]
async fn dropping_the_request_sender_ends_the_session() {
    let (requests, mut events) = spawn_worker(MockProvider::new());

    requests.send(chat("one last question")).unwrap();
    let turn = events_until_complete(&mut events).await;
    assert_eq!(turn.last(), Some(&WorkerEvent::Done));

    drop(requests);
    assert_eq!(events.recv().await, None);
}
