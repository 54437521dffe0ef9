use std::{
    sync::Mutex as StdMutex,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use shared::domain::{EntityId, TaskStatus};
use tokio::sync::{oneshot, Mutex};

use super::*;
use crate::{
    layer::ContentPhase,
    layer_manager::HOME_LAYER,
    surface::{HeadlessSurface, SurfaceOp},
};

/// Serves fixed fragments; paths listed in `gated` wait for a release signal.
#[derive(Default)]
struct FakeServer {
    fragments: HashMap<String, String>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    snapshots: HashMap<CatalogKind, serde_json::Value>,
}

impl FakeServer {
    fn with_fragment(mut self, path: &str, html: &str) -> Self {
        self.fragments.insert(path.to_string(), html.to_string());
        self
    }

    fn with_snapshot(mut self, kind: CatalogKind, snapshot: serde_json::Value) -> Self {
        self.snapshots.insert(kind, snapshot);
        self
    }

    async fn gate(&self, path: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(path.to_string(), rx);
        tx
    }
}

#[async_trait]
impl ContentFetcher for FakeServer {
    async fn fetch_fragment(&self, path: &str) -> Result<String> {
        let gate = self.gates.lock().await.remove(path);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.fragments
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("404 Not Found: {path}"))
    }
}

#[async_trait]
impl CatalogSource for FakeServer {
    async fn fetch_snapshot(&self, kind: CatalogKind) -> Result<Vec<CatalogRecord>> {
        let snapshot = self
            .snapshots
            .get(&kind)
            .cloned()
            .ok_or_else(|| anyhow!("no snapshot for {kind}"))?;
        Ok(shared::protocol::parse_catalog_snapshot(kind, snapshot)?)
    }
}

#[async_trait]
impl SettingsSync for FakeServer {
    async fn update_settings(&self, settings: &SettingsMap) -> Result<SettingsMap> {
        let mut merged = settings.clone();
        merged.insert("minimum_score".into(), "0.5".into());
        Ok(merged)
    }
}

fn setup(server: FakeServer) -> (Application, HeadlessSurface, Arc<FakeServer>) {
    let surface = HeadlessSurface::new().with_prerendered(HOME_LAYER, "<h1>home</h1>");
    let layers = LayerManager::new(Box::new(surface.clone()));
    let server = Arc::new(server);
    let mut app = Application::new_with_dependencies(
        layers,
        ServerEventRouter::standard(),
        server.clone(),
        server.clone(),
        server.clone(),
    );
    app.open_layer(&LayerOptions::adopt(HOME_LAYER), None)
        .expect("home layer");
    (app, surface, server)
}

fn capture(app: &mut Application, event: &str) -> Arc<StdMutex<Vec<AppEvent>>> {
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    app.on(event, move |payload: &AppEvent| {
        sink.lock().expect("seen").push(payload.clone());
        Ok(())
    });
    seen
}

fn push(app: &Application, event: &str, data: &str) {
    app.inbox()
        .send(AppMessage::Push(PushMessage::new(event, data)))
        .expect("inbox open");
}

async fn step(app: &mut Application) {
    tokio::time::timeout(Duration::from_secs(5), app.step())
        .await
        .expect("message in time");
}

#[tokio::test]
async fn opened_layer_receives_its_fragment() {
    let (mut app, surface, _) =
        setup(FakeServer::default().with_fragment("/add_sample", "<form/>"));

    let id = app
        .open_and_show(&LayerOptions::remote("add-sample", "/add_sample"), None)
        .expect("open");
    step(&mut app).await;

    assert_eq!(app.layers().get_showing_layer().expect("showing").id(), &id);
    assert_eq!(
        surface.mounted(&id).expect("mounted").html.as_deref(),
        Some("<form/>")
    );
}

#[tokio::test]
async fn templated_layer_uses_params() {
    let (mut app, surface, _) = setup(
        FakeServer::default().with_fragment("/view_database_search_results/7", "<table/>"),
    );
    let params: LayerParams = [("hypothesis_sample_match_id".to_string(), "7".to_string())]
        .into_iter()
        .collect();

    let id = app
        .open_and_show(
            &LayerOptions::templated(
                "view-database-search-results",
                "/view_database_search_results/{hypothesis_sample_match_id}",
            ),
            Some(params),
        )
        .expect("open");
    app.set_context("hypothesis_sample_match_id", "7");
    step(&mut app).await;

    assert_eq!(id, LayerId::from("view-database-search-results-1"));
    assert_eq!(
        surface.mounted(&id).expect("mounted").html.as_deref(),
        Some("<table/>")
    );
    assert_eq!(
        app.context().get("hypothesis_sample_match_id").map(String::as_str),
        Some("7")
    );
}

#[tokio::test]
async fn failed_fetch_leaves_blank_layer() {
    let (mut app, surface, _) = setup(FakeServer::default());

    let id = app
        .open_layer(&LayerOptions::remote("missing", "/missing"), None)
        .expect("open");
    step(&mut app).await;

    let layer = app.layers().get(&id).expect("still registered");
    assert!(matches!(layer.phase(), ContentPhase::Failed(reason) if reason.contains("404")));
    assert_eq!(surface.mounted(&id).expect("mounted").html, None);
}

#[tokio::test]
async fn late_fragment_for_disposed_layer_is_ignored() {
    let server = FakeServer::default().with_fragment("/add_sample", "<form/>");
    let (mut app, surface, server) = setup(server);
    let release = server.gate("/add_sample").await;

    let id = app
        .open_and_show(&LayerOptions::remote("add-sample", "/add_sample"), None)
        .expect("open");
    let removed = app.close_current_layer(None).expect("close");
    assert_eq!(removed, Some(id.clone()));

    release.send(()).expect("release fetch");
    step(&mut app).await;

    assert!(app.layers().get(&id).is_none());
    assert!(surface.mounted(&id).is_none());
    assert!(!surface.journal().contains(&SurfaceOp::Content(id)));
    assert_eq!(
        app.layers().get_showing_layer().expect("showing").id(),
        &LayerId::from(HOME_LAYER)
    );
}

#[tokio::test]
async fn push_events_drive_the_task_list() {
    let (mut app, _, _) = setup(FakeServer::default());
    let renders = capture(&mut app, RENDER_TASKS);

    push(&app, "task-queued", r#"{"id": "t1", "name": "X"}"#);
    push(&app, "task-start", r#"{"id": "t1"}"#);
    push(&app, "task-complete", r#"{"id": "t1"}"#);
    push(&app, "task-start", r#"{"id": "t2"}"#);
    assert_eq!(app.drain_pending(), 4);

    assert_eq!(app.tasks().len(), 2);
    assert_eq!(
        app.tasks().get(&TaskId::from("t1")).expect("t1").status,
        TaskStatus::Finished
    );
    assert_eq!(
        app.tasks().get(&TaskId::from("t2")).expect("t2").status,
        TaskStatus::Running
    );
    let renders = renders.lock().expect("renders");
    assert_eq!(renders.len(), 4);
    let AppEvent::TasksChanged(last) = renders.last().expect("last") else {
        panic!("unexpected payload");
    };
    assert_eq!(last.len(), 2);
}

#[tokio::test]
async fn dismissing_a_finished_task_removes_only_that_task() {
    let (mut app, _, _) = setup(FakeServer::default());
    push(&app, "task-complete", r#"{"id": "a", "name": "A"}"#);
    push(&app, "task-complete", r#"{"id": "b", "name": "B"}"#);
    push(&app, "task-start", r#"{"id": "c", "name": "C"}"#);
    app.drain_pending();
    let renders = capture(&mut app, RENDER_TASKS);

    let dismissed = app.dismiss_task(&TaskId::from("a")).expect("dismiss");
    let refused = app.dismiss_task(&TaskId::from("c"));

    assert_eq!(dismissed.name, "A");
    assert!(matches!(refused, Err(TaskError::NotFinished { .. })));
    let ids: Vec<&str> = app.tasks().iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
    let renders = renders.lock().expect("renders");
    assert_eq!(renders.len(), 1);
    assert!(matches!(&renders[0], AppEvent::TasksChanged(tasks) if tasks.len() == 2));
}

#[tokio::test]
async fn catalog_push_events_render_sorted_lists() {
    let (mut app, _, _) = setup(FakeServer::default());
    let renders = capture(&mut app, CatalogKind::Samples.render_event());

    push(&app, "new-sample", r#"{"id": "s2", "name": "zeta", "sample_type": "MS1"}"#);
    push(&app, "new-sample", r#"{"id": "s1", "name": "alpha", "sample_type": "MS1"}"#);
    push(&app, "new-sample", r#"{"id": "s1", "name": "alpha", "sample_type": "MS2"}"#);
    app.drain_pending();

    assert_eq!(app.catalog().len(CatalogKind::Samples), 2);
    let renders = renders.lock().expect("renders");
    let AppEvent::CatalogChanged { kind, records } = renders.last().expect("render") else {
        panic!("unexpected payload");
    };
    assert_eq!(*kind, CatalogKind::Samples);
    let names: Vec<&str> = records.iter().filter_map(|r| r.name()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(records[0].field("sample_type"), Some(&json!("MS2")));
}

#[tokio::test]
async fn update_events_become_notifications() {
    let (mut app, _, _) = setup(FakeServer::default());
    let notes = capture(&mut app, NOTIFY);

    push(&app, "update", r#""Initialized""#);
    push(&app, "update", "{broken");
    app.drain_pending();

    assert_eq!(
        *notes.lock().expect("notes"),
        vec![AppEvent::Notification("Initialized".into())]
    );
    assert!(app.tasks().is_empty());
}

#[tokio::test]
async fn bootstrap_seeds_all_catalogs() {
    let server = FakeServer::default()
        .with_snapshot(
            CatalogKind::Hypotheses,
            json!({"1": {"id": 1, "name": "Naive Glycan Hypothesis"}}),
        )
        .with_snapshot(
            CatalogKind::Samples,
            json!({"run-a": {"name": "run-a", "sample_type": "MS1"}}),
        )
        .with_snapshot(
            CatalogKind::HypothesisSampleMatches,
            json!({"3": {"id": 3, "name": "match"}}),
        );
    let (mut app, _, _) = setup(server);
    let hypotheses = capture(&mut app, CatalogKind::Hypotheses.render_event());

    app.bootstrap_catalog();
    for _ in 0..3 {
        step(&mut app).await;
    }

    assert_eq!(app.catalog().len(CatalogKind::Hypotheses), 1);
    assert!(app
        .catalog()
        .get(CatalogKind::Samples, &EntityId::from("run-a"))
        .is_some());
    assert_eq!(app.catalog().len(CatalogKind::HypothesisSampleMatches), 1);
    assert_eq!(hypotheses.lock().expect("renders").len(), 1);
}

#[tokio::test]
async fn failed_bootstrap_leaves_catalog_empty() {
    let (mut app, _, _) = setup(FakeServer::default());

    app.bootstrap_catalog();
    for _ in 0..3 {
        step(&mut app).await;
    }

    for kind in CatalogKind::ALL {
        assert!(app.catalog().is_empty(kind));
    }
}

#[tokio::test]
async fn settings_sync_replaces_local_copy() {
    let (mut app, _, _) = setup(FakeServer::default());
    app.set_setting("theme", "dark");

    app.sync_settings();
    step(&mut app).await;

    assert_eq!(app.settings().get("theme").map(String::as_str), Some("dark"));
    assert_eq!(
        app.settings().get("minimum_score").map(String::as_str),
        Some("0.5")
    );
}

#[tokio::test]
async fn run_until_processes_messages_until_shutdown() {
    let (mut app, _, _) = setup(FakeServer::default());
    push(&app, "task-queued", r#"{"id": "t1", "name": "X"}"#);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let inbox = app.inbox();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = inbox.send(AppMessage::Push(PushMessage::new(
            "task-complete",
            r#"{"id": "t1"}"#,
        )));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = stop_tx.send(());
    });
    tokio::time::timeout(
        Duration::from_secs(5),
        app.run_until(async {
            let _ = stop_rx.await;
        }),
    )
    .await
    .expect("loop stops");

    assert_eq!(
        app.tasks().get(&TaskId::from("t1")).expect("task").status,
        TaskStatus::Finished
    );
}

#[tokio::test]
async fn application_without_server_still_switches_layers() {
    let surface = HeadlessSurface::new().with_prerendered(HOME_LAYER, "home");
    let mut app = Application::new(
        LayerManager::new(Box::new(surface.clone())),
        ServerEventRouter::standard(),
    );
    app.open_layer(&LayerOptions::adopt(HOME_LAYER), None)
        .expect("home");
    let id = app
        .open_and_show(&LayerOptions::remote("add-sample", "/add_sample"), None)
        .expect("open");
    step(&mut app).await;

    assert!(matches!(
        app.layers().get(&id).expect("layer").phase(),
        ContentPhase::Failed(_)
    ));
    assert_eq!(surface.visible_ids(), vec![id]);
}
