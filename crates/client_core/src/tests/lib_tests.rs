use std::sync::Arc;

use super::*;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use shared::{
    domain::{CalendarKind, Entry},
    error::ApiError,
    mutation::MutationError,
    protocol::CalendarsPayload,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreMode {
    Echo,
    UppercaseNames,
    Failing,
    Malformed,
}

#[derive(Clone)]
struct ServerState {
    calendars: Arc<Mutex<CalendarList>>,
    mode: Arc<Mutex<StoreMode>>,
    posts: Arc<Mutex<u32>>,
}

impl ServerState {
    fn new(calendars: CalendarList) -> Self {
        Self {
            calendars: Arc::new(Mutex::new(calendars)),
            mode: Arc::new(Mutex::new(StoreMode::Echo)),
            posts: Arc::new(Mutex::new(0)),
        }
    }

    async fn set_mode(&self, mode: StoreMode) {
        *self.mode.lock().await = mode;
    }
}

async fn handle_get(State(state): State<ServerState>) -> Response {
    match *state.mode.lock().await {
        StoreMode::Failing => failure(),
        StoreMode::Malformed => Json(serde_json::json!({ "entries": [] })).into_response(),
        _ => Json(CalendarsPayload::new(state.calendars.lock().await.clone())).into_response(),
    }
}

async fn handle_post(
    State(state): State<ServerState>,
    Json(req): Json<CalendarsPayload>,
) -> Response {
    *state.posts.lock().await += 1;
    let stored: CalendarList = match *state.mode.lock().await {
        StoreMode::Failing => return failure(),
        StoreMode::Malformed => return (StatusCode::OK, "not json").into_response(),
        StoreMode::Echo => req.calendars,
        StoreMode::UppercaseNames => req
            .calendars
            .into_iter()
            .map(|entry| Entry {
                name: entry.name.to_uppercase(),
                ..entry
            })
            .collect(),
    };
    *state.calendars.lock().await = stored.clone();
    Json(CalendarsPayload::new(stored)).into_response()
}

fn failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::internal("disk full")),
    )
        .into_response()
}

async fn spawn_list_store(initial: CalendarList) -> (String, ServerState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::new(initial);
    let app = Router::new()
        .route("/calendars", get(handle_get).post(handle_post))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn named(name: &str) -> Entry {
    Entry::new(name, CalendarKind::Other("local".into()))
}

fn list_of(names: &[&str]) -> CalendarList {
    names.iter().map(|name| named(name)).collect()
}

fn names(list: &CalendarList) -> Vec<&str> {
    list.iter().map(|entry| entry.name.as_str()).collect()
}

#[tokio::test]
async fn pull_replaces_snapshot_and_notifies_view() {
    let (server_url, _state) = spawn_list_store(list_of(&["A", "B"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    let mut events = client.subscribe_events();

    let pulled = client.pull().await.expect("pull");

    assert_eq!(names(&pulled), ["A", "B"]);
    assert_eq!(client.snapshot().await, pulled);
    assert_eq!(
        events.recv().await.expect("event"),
        ClientEvent::ListUpdated(pulled)
    );
}

#[tokio::test]
async fn push_adopts_the_list_the_store_returned() {
    let (server_url, state) = spawn_list_store(CalendarList::default()).await;
    state.set_mode(StoreMode::UppercaseNames).await;
    let client = ListStoreClient::connect(&server_url).expect("client");

    let proposed = list_of(&["work", "home"]);
    let stored = client.push(&proposed).await.expect("push");

    assert_eq!(names(&stored), ["WORK", "HOME"]);
    assert_eq!(client.snapshot().await, stored);
    assert_ne!(client.snapshot().await, proposed);
}

#[tokio::test]
async fn failed_push_keeps_last_synced_snapshot() {
    let (server_url, state) = spawn_list_store(list_of(&["A", "B"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    let synced = client.pull().await.expect("pull");
    let mut events = client.subscribe_events();

    state.set_mode(StoreMode::Failing).await;
    let err = client
        .apply(&ListIntent::Remove { index: 0 })
        .await
        .expect_err("push should fail");

    assert!(err.is_transport());
    match err {
        ListStoreError::Status { status, message } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "disk full");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.snapshot().await, synced);
    assert!(matches!(
        events.recv().await.expect("event"),
        ClientEvent::Error(_)
    ));
}

#[tokio::test]
async fn malformed_responses_count_as_transport_errors() {
    let (server_url, state) = spawn_list_store(list_of(&["A"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    let synced = client.pull().await.expect("pull");

    state.set_mode(StoreMode::Malformed).await;
    let pull_err = client.pull().await.expect_err("missing calendars field");
    assert!(matches!(pull_err, ListStoreError::MalformedResponse(_)));
    assert!(pull_err.is_transport());

    let push_err = client.push(&list_of(&["B"])).await.expect_err("not json");
    assert!(push_err.is_transport());
    assert_eq!(client.snapshot().await, synced);
}

#[tokio::test]
async fn unreachable_store_leaves_snapshot_empty() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = ListStoreClient::connect(&format!("http://{addr}")).expect("client");
    let err = client.pull().await.expect_err("connection refused");
    assert!(matches!(err, ListStoreError::Transport(_)));
    assert!(client.snapshot().await.is_empty());
}

#[tokio::test]
async fn out_of_range_intent_never_reaches_the_store() {
    let (server_url, state) = spawn_list_store(list_of(&["A"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    client.pull().await.expect("pull");

    let err = client
        .apply(&ListIntent::Rename {
            index: 4,
            name: "Z".into(),
        })
        .await
        .expect_err("out of range");

    assert!(matches!(
        err,
        ListStoreError::Mutation(MutationError::IndexOutOfRange { index: 4, len: 1 })
    ));
    assert!(!err.is_transport());
    assert_eq!(*state.posts.lock().await, 0);
}

#[tokio::test]
async fn intents_round_trip_through_the_store() {
    let (server_url, state) = spawn_list_store(list_of(&["A", "B", "C"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    client.pull().await.expect("pull");

    let steps = [
        (ListIntent::MoveDown { index: 0 }, vec!["B", "A", "C"]),
        (
            ListIntent::Rename {
                index: 2,
                name: "Z".into(),
            },
            vec!["B", "A", "Z"],
        ),
        (ListIntent::Remove { index: 1 }, vec!["B", "Z"]),
        (ListIntent::Add { entry: named("D") }, vec!["B", "Z", "D"]),
    ];
    for (intent, expected) in steps {
        let stored = client.apply(&intent).await.expect(intent.name());
        assert_eq!(names(&stored), expected);
    }

    assert_eq!(names(&*state.calendars.lock().await), ["B", "Z", "D"]);
    assert_eq!(*state.posts.lock().await, 4);
}

#[tokio::test]
async fn stale_index_applies_to_the_freshly_pulled_list() {
    let (server_url, state) = spawn_list_store(list_of(&["A", "B", "C"])).await;
    let client = ListStoreClient::connect(&server_url).expect("client");
    client.pull().await.expect("pull");

    // The row showing "B" was picked while the list still read A,B,C.
    let picked = 1;
    *state.calendars.lock().await = list_of(&["X", "A", "B", "C"]);
    client.pull().await.expect("second pull");

    let stored = client
        .apply(&ListIntent::Remove { index: picked })
        .await
        .expect("remove");

    assert_eq!(names(&stored), ["X", "B", "C"]);
    assert_eq!(names(&*state.calendars.lock().await), ["X", "B", "C"]);
    assert_eq!(*state.posts.lock().await, 1);
}

#[tokio::test]
async fn pushing_a_pulled_list_leaves_the_store_unchanged() {
    let initial = vec![
        Entry::ics("Work", "https://example.com/work.ics"),
        named("Home"),
    ]
    .into();
    let (server_url, state) = spawn_list_store(initial).await;
    let client = ListStoreClient::connect(&server_url).expect("client");

    let pulled = client.pull().await.expect("pull");
    let pushed = client.push(&pulled).await.expect("push");

    assert_eq!(pushed, pulled);
    assert_eq!(*state.calendars.lock().await, pulled);
}

#[test]
fn calendars_url_keeps_server_path_prefix() {
    let store = HttpListStore::new("http://localhost:5001/app").expect("store");
    assert_eq!(
        store.calendars_url().as_str(),
        "http://localhost:5001/app/calendars"
    );

    let root = HttpListStore::new("http://localhost:5001").expect("store");
    assert_eq!(root.calendars_url().as_str(), "http://localhost:5001/calendars");
}

#[test]
fn rejects_unparseable_server_url() {
    assert!(matches!(
        HttpListStore::new("not a url"),
        Err(ListStoreError::InvalidServerUrl(_))
    ));
}
