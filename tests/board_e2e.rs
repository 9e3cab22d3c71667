//! End-to-end: the real router on an ephemeral port, driven through the
//! reqwest client and the board manager.

use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use kanban::board::api::AppState;
use kanban::board::auth::StaticTokens;
use kanban::board::db::{BoardDb, DbHandle};
use kanban::board::server;
use kanban::client::manager::{LOAD_FAILED_NOTICE, MOVE_FAILED_NOTICE};
use kanban::client::{BoardApi, BoardManager, HttpBoardApi, LoadState, Move, MoveOutcome};
use kanban::config::ClientConfig;
use kanban::errors::{AuthError, BoardError};
use predicates::prelude::*;
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let state = Arc::new(AppState {
        db: DbHandle::new(BoardDb::new_in_memory().unwrap()),
        identity: Arc::new(StaticTokens::new([
            ("token-a", "user-a"),
            ("token-b", "user-b"),
        ])),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(
        listener,
        server::build_router(state),
        std::future::pending(),
    ));
    format!("http://{}", addr)
}

fn client(url: &str, token: Option<&str>) -> HttpBoardApi {
    HttpBoardApi::new(ClientConfig::new(url, token.map(str::to_string)))
}

struct Seeded {
    project_id: i64,
    list_a: i64,
    list_b: i64,
    tasks: Vec<i64>,
}

/// A=[T1,T2,T3], B=[]
async fn seed(api: &HttpBoardApi) -> Seeded {
    let project = api.create_project("Launch").await.unwrap();
    let list_a = api.create_list(project.id, "A").await.unwrap();
    let list_b = api.create_list(project.id, "B").await.unwrap();
    let mut tasks = Vec::new();
    for name in ["T1", "T2", "T3"] {
        tasks.push(api.create_task(project.id, list_a.id, name).await.unwrap().id);
    }
    Seeded {
        project_id: project.id,
        list_a: list_a.id,
        list_b: list_b.id,
        tasks,
    }
}

fn task_names(manager: &BoardManager<HttpBoardApi>, list_id: i64) -> Vec<String> {
    manager
        .snapshot()
        .unwrap()
        .list(list_id)
        .unwrap()
        .tasks
        .iter()
        .map(|t| t.name.clone())
        .collect()
}

#[tokio::test]
async fn test_cross_list_move_persists() {
    let url = spawn_server().await;
    let seeded = seed(&client(&url, Some("token-a"))).await;

    let manager = BoardManager::new(client(&url, Some("token-a")));
    manager.load_project(seeded.project_id).await.unwrap();

    let pending = manager
        .apply_move(Move {
            task_id: seeded.tasks[1],
            source_list_id: seeded.list_a,
            dest_list_id: seeded.list_b,
            dest_index: 0,
        })
        .unwrap()
        .unwrap();
    match pending.outcome().await.unwrap() {
        MoveOutcome::Confirmed(task) => {
            assert_eq!(task.list_id, seeded.list_b);
            assert_eq!(task.position, 0);
        }
        other => panic!("expected Confirmed, got {:?}", other),
    }
    assert_eq!(task_names(&manager, seeded.list_a), vec!["T1", "T3"]);
    assert_eq!(task_names(&manager, seeded.list_b), vec!["T2"]);

    // A fresh client sees the same arrangement.
    let fresh = BoardManager::new(client(&url, Some("token-a")));
    fresh.load_project(seeded.project_id).await.unwrap();
    assert_eq!(task_names(&fresh, seeded.list_a), vec!["T1", "T3"]);
    assert_eq!(task_names(&fresh, seeded.list_b), vec!["T2"]);
}

#[tokio::test]
async fn test_same_list_reorder_survives_reload() {
    let url = spawn_server().await;
    let seeded = seed(&client(&url, Some("token-a"))).await;

    let manager = BoardManager::new(client(&url, Some("token-a")));
    manager.load_project(seeded.project_id).await.unwrap();
    let pending = manager
        .apply_move(Move {
            task_id: seeded.tasks[2],
            source_list_id: seeded.list_a,
            dest_list_id: seeded.list_a,
            dest_index: 0,
        })
        .unwrap()
        .unwrap();
    assert!(matches!(
        pending.outcome().await.unwrap(),
        MoveOutcome::Confirmed(_)
    ));
    assert_eq!(task_names(&manager, seeded.list_a), vec!["T3", "T1", "T2"]);

    // T3 and T1 both hold position 0 now; the stable sort keeps store order.
    manager.load_project(seeded.project_id).await.unwrap();
    assert_eq!(task_names(&manager, seeded.list_a), vec!["T1", "T3", "T2"]);
}

#[tokio::test]
async fn test_failed_move_is_rolled_back() {
    let url = spawn_server().await;
    let api = client(&url, Some("token-a"));
    let seeded = seed(&api).await;

    let manager = BoardManager::new(client(&url, Some("token-a")));
    manager.load_project(seeded.project_id).await.unwrap();
    let before = manager.snapshot().unwrap();

    // Deleted behind the manager's back: the server will refuse the move.
    api.delete_task(seeded.tasks[0]).await.unwrap();

    let pending = manager
        .apply_move(Move {
            task_id: seeded.tasks[0],
            source_list_id: seeded.list_a,
            dest_list_id: seeded.list_b,
            dest_index: 0,
        })
        .unwrap()
        .unwrap();
    assert!(matches!(
        pending.outcome().await.unwrap(),
        MoveOutcome::RolledBack(BoardError::NotFoundOrForbidden)
    ));
    assert_eq!(manager.snapshot().unwrap(), before);
    assert_eq!(manager.take_notices(), vec![MOVE_FAILED_NOTICE.to_string()]);
}

#[tokio::test]
async fn test_other_users_cannot_see_or_move() {
    let url = spawn_server().await;
    let seeded = seed(&client(&url, Some("token-a"))).await;

    let intruder = BoardManager::new(client(&url, Some("token-b")));
    assert!(matches!(
        intruder.load_project(seeded.project_id).await,
        Err(BoardError::NotFoundOrForbidden)
    ));
    assert_eq!(
        intruder.load_state(),
        LoadState::Failed(LOAD_FAILED_NOTICE.to_string())
    );

    let api_b = client(&url, Some("token-b"));
    assert!(matches!(
        api_b
            .update_task_position(seeded.tasks[0], seeded.list_b, 0)
            .await,
        Err(BoardError::NotFoundOrForbidden)
    ));
    assert!(api_b.list_projects().await.unwrap().is_empty());

    let board = client(&url, Some("token-a"))
        .get_project(seeded.project_id)
        .await
        .unwrap();
    assert_eq!(board.list(seeded.list_a).unwrap().tasks.len(), 3);
}

#[tokio::test]
async fn test_auth_failures_map_to_auth_errors() {
    let url = spawn_server().await;
    assert!(matches!(
        client(&url, None).list_projects().await,
        Err(BoardError::Auth(AuthError::MissingToken))
    ));
    assert!(matches!(
        client(&url, Some("forged")).list_projects().await,
        Err(BoardError::Auth(AuthError::InvalidToken))
    ));
}

#[tokio::test]
async fn test_delete_keeps_gap_and_order() {
    let url = spawn_server().await;
    let seeded = seed(&client(&url, Some("token-a"))).await;

    let manager = BoardManager::new(client(&url, Some("token-a")));
    manager.load_project(seeded.project_id).await.unwrap();
    manager.delete_task(seeded.tasks[0]).await.unwrap();
    assert_eq!(task_names(&manager, seeded.list_a), vec!["T2", "T3"]);

    manager.load_project(seeded.project_id).await.unwrap();
    let board = manager.snapshot().unwrap();
    let positions: Vec<i32> = board
        .list(seeded.list_a)
        .unwrap()
        .tasks
        .iter()
        .map(|t| t.position)
        .collect();
    assert_eq!(positions, vec![1, 2]);

    let t4 = manager.create_task(seeded.list_a, "T4").await.unwrap();
    assert_eq!(t4.position, 3);
    assert_eq!(task_names(&manager, seeded.list_a), vec!["T2", "T3", "T4"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_show_and_move_against_live_server() {
    let url = spawn_server().await;
    let seeded = seed(&client(&url, Some("token-a"))).await;

    let show_url = url.clone();
    let project = seeded.project_id.to_string();
    tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("kanban")
            .args(["show", &project, "--url", &show_url, "--token", "token-a"])
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .stdout(predicate::str::contains("Launch"))
            .stdout(predicate::str::contains("T2"));
    })
    .await
    .unwrap();

    let args = [
        "move".to_string(),
        seeded.tasks[1].to_string(),
        "--project".to_string(),
        seeded.project_id.to_string(),
        "--from".to_string(),
        seeded.list_a.to_string(),
        "--to".to_string(),
        seeded.list_b.to_string(),
        "--index".to_string(),
        "0".to_string(),
        "--url".to_string(),
        url.clone(),
        "--token".to_string(),
        "token-a".to_string(),
    ];
    tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("kanban")
            .args(&args)
            .env_remove("RUST_LOG")
            .assert()
            .success()
            .stdout(predicate::str::contains("Moved"));
    })
    .await
    .unwrap();

    let board = client(&url, Some("token-a"))
        .get_project(seeded.project_id)
        .await
        .unwrap();
    let moved: Vec<i64> = board
        .list(seeded.list_b)
        .unwrap()
        .tasks
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(moved, vec![seeded.tasks[1]]);
}
