//! Integration tests against an in-process fake backend.
//!
//! Each test spins up an Axum server on a random port that speaks the chore
//! REST surface plus a minimal Socket.IO endpoint, then drives the real
//! `HttpApi`, `Synchronizer`, `PushListener`, and `App` against it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

use chore_board::api::{ChoreApi, HttpApi};
use chore_board::app::App;
use chore_board::config::ClientConfig;
use chore_board::error::ApiError;
use chore_board::model::{Cleaner, CleanerId, Created, Task, TaskId, User, Weekday};
use chore_board::push::{PushListener, PushState, push_url};
use chore_board::render::Renderer;
use chore_board::sync::Synchronizer;
use chore_board::view::Views;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const ADMIN_PASSWORD: &str = "1234";

// ── Fake backend ─────────────────────────────────────────────────────────

struct StoredTask {
    id: TaskId,
    cleaner_id: CleanerId,
    day: Weekday,
    task: String,
    completed: bool,
}

#[derive(Default)]
struct Db {
    cleaners: Vec<Cleaner>,
    tasks: Vec<StoredTask>,
    next_cleaner: CleanerId,
    next_task: TaskId,
}

#[derive(Clone)]
struct Backend {
    db: Arc<Mutex<Db>>,
    updates: broadcast::Sender<()>,
    origin: String,
    fail_puts: Arc<AtomicBool>,
    drop_first_socket: Arc<AtomicBool>,
    sockets: Arc<AtomicUsize>,
    pongs: Arc<AtomicUsize>,
}

impl Backend {
    fn emit(&self) {
        let _ = self.updates.send(());
    }
}

#[derive(Deserialize)]
struct IdQuery {
    id: i64,
}

#[derive(Deserialize)]
struct TaskQuery {
    cleaner_id: Option<CleanerId>,
}

async fn ip(State(b): State<Backend>) -> Json<Value> {
    Json(json!({ "ip": b.origin }))
}

async fn authenticate(State(b): State<Backend>, Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == ADMIN_PASSWORD {
        return (
            StatusCode::OK,
            Json(json!({"message": "Authentication successful (Admin mode)", "is_admin": true, "cleaner_id": null})),
        );
    }
    let name = body["name"].as_str().unwrap_or_default();
    let db = b.db.lock().unwrap();
    match db.cleaners.iter().find(|c| c.name == name) {
        Some(c) => (
            StatusCode::OK,
            Json(json!({"message": "Authentication successful", "is_admin": false, "cleaner_id": c.id})),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid name"})),
        ),
    }
}

async fn list_cleaners(State(b): State<Backend>) -> Json<Vec<Cleaner>> {
    Json(b.db.lock().unwrap().cleaners.clone())
}

async fn add_cleaner(State(b): State<Backend>, Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    {
        let mut db = b.db.lock().unwrap();
        if db.cleaners.iter().any(|c| c.name == name) {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "duplicate key value violates unique constraint"})),
            );
        }
        db.next_cleaner += 1;
        let id = db.next_cleaner;
        db.cleaners.push(Cleaner { id, name });
    }
    b.emit();
    (
        StatusCode::CREATED,
        Json(json!({"message": "Cleaner added successfully"})),
    )
}

async fn remove_cleaner(State(b): State<Backend>, Query(q): Query<IdQuery>) -> impl IntoResponse {
    {
        let mut db = b.db.lock().unwrap();
        db.tasks.retain(|t| t.cleaner_id != q.id);
        db.cleaners.retain(|c| c.id != q.id);
    }
    b.emit();
    Json(json!({"message": "Cleaner deleted successfully"}))
}

async fn list_tasks(State(b): State<Backend>, Query(q): Query<TaskQuery>) -> Json<Vec<Task>> {
    let db = b.db.lock().unwrap();
    let tasks = db
        .tasks
        .iter()
        .filter(|t| q.cleaner_id.is_none_or(|id| id == t.cleaner_id))
        .filter_map(|t| {
            let cleaner = db.cleaners.iter().find(|c| c.id == t.cleaner_id)?;
            Some(Task {
                id: t.id,
                cleaner: cleaner.name.clone(),
                day: t.day,
                task: t.task.clone(),
                completed: t.completed,
            })
        })
        .collect();
    Json(tasks)
}

#[derive(Deserialize)]
struct NewTaskBody {
    cleaner_id: CleanerId,
    day: Weekday,
    task: String,
}

async fn add_task(State(b): State<Backend>, Json(body): Json<NewTaskBody>) -> impl IntoResponse {
    {
        let mut db = b.db.lock().unwrap();
        db.next_task += 1;
        let id = db.next_task;
        db.tasks.push(StoredTask {
            id,
            cleaner_id: body.cleaner_id,
            day: body.day,
            task: body.task,
            completed: false,
        });
    }
    b.emit();
    (
        StatusCode::CREATED,
        Json(json!({"message": "Task added successfully"})),
    )
}

async fn remove_task(State(b): State<Backend>, Query(q): Query<IdQuery>) -> impl IntoResponse {
    b.db.lock().unwrap().tasks.retain(|t| t.id != q.id);
    b.emit();
    Json(json!({"message": "Task deleted successfully"}))
}

#[derive(Deserialize)]
struct CompletionBody {
    id: TaskId,
    completed: bool,
}

async fn update_task(State(b): State<Backend>, Json(body): Json<CompletionBody>) -> impl IntoResponse {
    if b.fail_puts.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database is locked"})),
        );
    }
    for t in b.db.lock().unwrap().tasks.iter_mut().filter(|t| t.id == body.id) {
        t.completed = body.completed;
    }
    b.emit();
    (
        StatusCode::OK,
        Json(json!({"message": "Task updated successfully"})),
    )
}

async fn socket_io(ws: WebSocketUpgrade, State(b): State<Backend>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, b))
}

async fn send_text(socket: &mut WebSocket, text: &str) -> bool {
    socket.send(Message::Text(text.to_string().into())).await.is_ok()
}

/// Minimal Socket.IO server: open, namespace connect, one ping, then
/// `update` events for every backend mutation.
async fn serve_socket(mut socket: WebSocket, b: Backend) {
    let n = b.sockets.fetch_add(1, Ordering::SeqCst);
    let open = r#"0{"sid":"fake","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if !send_text(&mut socket, open).await {
        return;
    }
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(t))) if t.as_str() == "40" => break,
            Some(Ok(_)) => continue,
            _ => return,
        }
    }

    // Subscribe before acknowledging so no update is lost once connected.
    let mut rx = b.updates.subscribe();
    if !send_text(&mut socket, r#"40{"sid":"ns-fake"}"#).await {
        return;
    }
    if n == 0 && b.drop_first_socket.load(Ordering::SeqCst) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    if !send_text(&mut socket, "2").await {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => match result {
                Ok(()) => {
                    if !send_text(&mut socket, r#"42["update"]"#).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(t))) if t.as_str() == "3" => {
                    b.pongs.fetch_add(1, Ordering::SeqCst);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }
}

/// Start the fake backend on a random port, seeded with an "Admin" cleaner.
async fn start_backend() -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (updates, _) = broadcast::channel(64);
    let backend = Backend {
        db: Arc::new(Mutex::new(Db::default())),
        updates,
        origin: format!("http://127.0.0.1:{port}"),
        fail_puts: Arc::new(AtomicBool::new(false)),
        drop_first_socket: Arc::new(AtomicBool::new(false)),
        sockets: Arc::new(AtomicUsize::new(0)),
        pongs: Arc::new(AtomicUsize::new(0)),
    };
    {
        let mut db = backend.db.lock().unwrap();
        db.next_cleaner = 1;
        db.cleaners.push(Cleaner {
            id: 1,
            name: "Admin".into(),
        });
    }

    let app = Router::new()
        .route("/api/ip", get(ip))
        .route("/api/authenticate", post(authenticate))
        .route(
            "/api/cleaners",
            get(list_cleaners).post(add_cleaner).delete(remove_cleaner),
        )
        .route(
            "/api/tasks",
            get(list_tasks)
                .post(add_task)
                .delete(remove_task)
                .put(update_task),
        )
        .route("/socket.io/", get(socket_io))
        .with_state(backend.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    backend
}

// ── Client helpers ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingRenderer {
    renders: Mutex<Vec<Views>>,
    alerts: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl Renderer for RecordingRenderer {
    fn render(&self, views: &Views) {
        self.renders.lock().unwrap().push(views.clone());
    }
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

fn http_api(backend: &Backend) -> Arc<HttpApi> {
    Arc::new(HttpApi::new(&backend.origin, Duration::from_secs(2)).unwrap())
}

fn admin_password() -> SecretString {
    SecretString::from(ADMIN_PASSWORD)
}

/// Poll `check` until it returns true.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    while !check().await {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn test_config(backend: &Backend) -> ClientConfig {
    ClientConfig {
        origin: backend.origin.clone(),
        push_enabled: false,
        ..ClientConfig::default()
    }
}

// ── REST client ──────────────────────────────────────────────────────────

#[tokio::test]
async fn http_api_covers_rest_surface() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let api = http_api(&backend);

        assert_eq!(api.resolve_base_url().await.unwrap(), backend.origin);

        let admin = api.authenticate("", &admin_password()).await.unwrap();
        assert!(admin.is_admin);
        assert_eq!(admin.cleaner_id, None);

        let created = api.add_cleaner("Ana").await.unwrap();
        assert_eq!(
            created,
            Created::Acknowledged {
                message: "Cleaner added successfully".into()
            }
        );
        let cleaners = api.list_cleaners().await.unwrap();
        let names: Vec<_> = cleaners.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Admin", "Ana"]);

        api.add_task(2, Weekday::Monday, "Vacuum").await.unwrap();
        api.add_task(1, Weekday::Friday, "Inspect").await.unwrap();

        let all = api.list_tasks(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let scoped = api.list_tasks(Some(2)).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].cleaner, "Ana");
        assert_eq!(scoped[0].day, Weekday::Monday);
        assert!(!scoped[0].completed);

        api.set_task_completed(scoped[0].id, true).await.unwrap();
        assert!(api.list_tasks(Some(2)).await.unwrap()[0].completed);

        api.remove_task(scoped[0].id).await.unwrap();
        assert!(api.list_tasks(Some(2)).await.unwrap().is_empty());

        let ana = api.authenticate("Ana", &SecretString::from("x")).await.unwrap();
        assert_eq!(ana, User::cleaner("Ana", 2));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn http_api_surfaces_backend_error_message() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let api = http_api(&backend);

        let err = api
            .authenticate("Nobody", &SecretString::from("wrong"))
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid name");
            }
            other => panic!("expected status error, got {other:?}"),
        }

        api.add_cleaner("Ana").await.unwrap();
        let dup = api.add_cleaner("Ana").await.unwrap_err();
        assert_eq!(dup.status(), Some(500));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn http_api_reports_transport_failure() {
    timeout(TEST_TIMEOUT, async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let api = HttpApi::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(1)).unwrap();
        let err = api.list_cleaners().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }), "got {err:?}");
    })
    .await
    .expect("test timed out");
}

// ── Synchronizer over HTTP ───────────────────────────────────────────────

#[tokio::test]
async fn remove_cleaner_cascades_to_tasks() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let api = http_api(&backend);
        let renderer = Arc::new(RecordingRenderer::default());
        let sync = Synchronizer::new(api.clone(), renderer.clone());
        sync.login("", &admin_password()).await.unwrap();

        sync.add_cleaner("Ana").await.unwrap();
        sync.add_cleaner("Ben").await.unwrap();
        sync.add_task(3, Weekday::Tuesday, "Dishes").await.unwrap();
        sync.add_task(2, Weekday::Monday, "Vacuum").await.unwrap();
        assert_eq!(sync.tasks().await.len(), 2);

        sync.remove_cleaner(3).await.unwrap();

        let tasks = api.list_tasks(None).await.unwrap();
        assert!(tasks.iter().all(|t| t.cleaner != "Ben"));
        assert_eq!(sync.tasks().await.len(), 1);
        assert_eq!(sync.views().await.unwrap().grid.rows.len(), 2);
        assert_eq!(
            renderer.notices.lock().unwrap().as_slice(),
            ["Cleaner and tasks deleted successfully."]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_toggle_keeps_previous_views() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let api = http_api(&backend);
        let renderer = Arc::new(RecordingRenderer::default());
        let sync = Synchronizer::new(api, renderer.clone());
        sync.login("", &admin_password()).await.unwrap();
        sync.add_task(1, Weekday::Sunday, "Trash").await.unwrap();

        let before = sync.views().await;
        let refreshes = sync.refresh_count().await;
        backend.fail_puts.store(true, Ordering::SeqCst);

        let task_id = sync.tasks().await[0].id;
        assert!(sync.set_task_completed(task_id, true).await.is_err());

        assert_eq!(sync.refresh_count().await, refreshes);
        assert_eq!(sync.views().await, before);
        assert_eq!(
            renderer.alerts.lock().unwrap().as_slice(),
            ["Failed to update task status. Please try again."]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_admin_sees_only_own_row() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let api = http_api(&backend);
        for name in ["Ana", "Ben", "Cleo"] {
            api.add_cleaner(name).await.unwrap();
        }
        api.add_task(2, Weekday::Monday, "Vacuum").await.unwrap();
        api.add_task(3, Weekday::Monday, "Mop").await.unwrap();

        let sync = Synchronizer::new(api, Arc::new(RecordingRenderer::default()));
        sync.login("Ben", &SecretString::from("x")).await.unwrap();
        sync.resync().await;

        let views = sync.views().await.unwrap();
        assert_eq!(views.grid.rows.len(), 1);
        let row = views.grid.row_for("Ben").unwrap();
        assert_eq!(row.cell(Weekday::Monday)[0].description, "Mop");
        assert_eq!(sync.tasks().await.len(), 1);
    })
    .await
    .expect("test timed out");
}

// ── Push listener ────────────────────────────────────────────────────────

#[tokio::test]
async fn push_update_triggers_refresh() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let sync = Synchronizer::new(http_api(&backend), Arc::new(RecordingRenderer::default()));
        sync.login("", &admin_password()).await.unwrap();

        let url = push_url(&backend.origin, "/socket.io/").unwrap();
        let mut push = PushListener::new(
            url,
            Arc::clone(&sync),
            Duration::from_millis(50),
            Duration::from_millis(200),
        )
        .spawn();
        push.wait_for(PushState::Connected).await;
        assert_eq!(push.state(), PushState::Connected);

        // Mutate through a different client; only the push can tell `sync`.
        http_api(&backend).add_cleaner("Dana").await.unwrap();

        eventually(|| {
            let sync = Arc::clone(&sync);
            async move { sync.cleaners().await.iter().any(|c| c.name == "Dana") }
        })
        .await;
        assert!(sync.refresh_count().await >= 1);

        // The server's ping was answered.
        eventually(|| {
            let pongs = Arc::clone(&backend.pongs);
            async move { pongs.load(Ordering::SeqCst) >= 1 }
        })
        .await;

        push.shutdown().await;
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn push_listener_reconnects_after_drop() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        backend.drop_first_socket.store(true, Ordering::SeqCst);
        let sync = Synchronizer::new(http_api(&backend), Arc::new(RecordingRenderer::default()));
        sync.begin_session(User::admin("boss")).await;

        let url = push_url(&backend.origin, "/socket.io/").unwrap();
        let push = PushListener::new(
            url,
            Arc::clone(&sync),
            Duration::from_millis(50),
            Duration::from_millis(200),
        )
        .spawn();

        // The first session is acknowledged and then dropped; the second one
        // resyncs to pick up anything missed in between.
        eventually(|| {
            let sync = Arc::clone(&sync);
            async move { sync.refresh_count().await >= 1 }
        })
        .await;
        assert_eq!(backend.sockets.load(Ordering::SeqCst), 2);
        assert_eq!(push.state(), PushState::Connected);

        push.shutdown().await;
    })
    .await
    .expect("test timed out");
}

// ── App ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn app_runs_scripted_admin_session() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let renderer = Arc::new(RecordingRenderer::default());
        let app = App::new(test_config(&backend), renderer.clone()).unwrap();

        app.resolve_base_url().await;
        assert_eq!(app.base_url(), backend.origin);

        app.login("", &admin_password()).await.unwrap();
        app.synchronizer().resync().await;

        let script = "add-cleaner Ana\n\
                      add-task 2 monday Vacuum\n\
                      rm-task 1\n\
                      no\n\
                      done 1\n\
                      bogus\n\
                      quit\n\
                      add-cleaner Never\n";
        let mut lines = BufReader::new(script.as_bytes()).lines();
        app.run(&mut lines).await.unwrap();

        let sync = app.synchronizer();
        let tasks = sync.tasks().await;
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].completed);
        assert!(sync.cleaners().await.iter().all(|c| c.name != "Never"));

        let views = sync.views().await.unwrap();
        let cell = views.grid.row_for("Ana").unwrap().cell(Weekday::Monday);
        assert_eq!(cell[0].description, "Vacuum");
        assert!(renderer.alerts.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn app_blocks_admin_commands_for_cleaners() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        http_api(&backend).add_cleaner("Ana").await.unwrap();

        let renderer = Arc::new(RecordingRenderer::default());
        let app = App::new(test_config(&backend), renderer.clone()).unwrap();
        app.login("Ana", &SecretString::from("x")).await.unwrap();

        let mut lines = BufReader::new("add-cleaner Eve\nquit\n".as_bytes()).lines();
        app.run(&mut lines).await.unwrap();

        assert_eq!(
            renderer.alerts.lock().unwrap().as_slice(),
            ["add-cleaner requires an admin session"]
        );
        assert_eq!(http_api(&backend).list_cleaners().await.unwrap().len(), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn app_rejects_unknown_login() {
    timeout(TEST_TIMEOUT, async {
        let backend = start_backend().await;
        let app = App::new(test_config(&backend), Arc::new(RecordingRenderer::default())).unwrap();
        let err = app
            .login("Ghost", &SecretString::from("nope"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Authentication rejected for Ghost"));
        assert!(!app.synchronizer().session().await.is_active());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn app_alerts_when_base_url_unresolvable() {
    timeout(TEST_TIMEOUT, async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let origin = format!("http://127.0.0.1:{port}");
        let renderer = Arc::new(RecordingRenderer::default());
        let config = ClientConfig {
            origin: origin.clone(),
            push_enabled: false,
            connect_timeout: Duration::from_secs(1),
            ..ClientConfig::default()
        };
        let app = App::new(config, renderer.clone()).unwrap();
        app.resolve_base_url().await;

        assert_eq!(app.base_url(), origin);
        assert_eq!(
            renderer.alerts.lock().unwrap().as_slice(),
            ["Failed to initialize the application. Please try again."]
        );
    })
    .await
    .expect("test timed out");
}
