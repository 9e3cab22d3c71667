//! Board state manager: owns the local board, applies moves optimistically
//! and reconciles them with the server.
//!
//! A move changes local state immediately and returns a [`PendingMove`].
//! Persistence runs on a spawned task. Requests for one task are chained, so
//! the server sees them in the order they were made. When the latest move of
//! a task fails (and the board has not been reloaded since), the task goes
//! back to the last placement the server is known to hold and
//! [`MOVE_FAILED_NOTICE`] is recorded. Failures of older moves leave the
//! board alone; the latest move decides.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::api::BoardApi;
use super::state::{AppliedMove, BoardState, Move, Placement};
use crate::board::models::{List, Project, ProjectBoard, Task};
use crate::errors::BoardError;

pub const MOVE_FAILED_NOTICE: &str = "Failed to update task position";
pub const LOAD_FAILED_NOTICE: &str = "Failed to fetch project details.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Ready,
    /// Holds the user-facing message.
    Failed(String),
}

/// How a move's persistence ended.
#[derive(Debug)]
pub enum MoveOutcome {
    /// Stored. Carries the server's record of the task.
    Confirmed(Task),
    /// Not stored; the local board was put back.
    RolledBack(BoardError),
    /// Not stored, but a newer move or a reload already replaced the
    /// placement, so nothing was undone.
    Superseded(BoardError),
}

/// A move whose persistence is still in flight.
pub struct PendingMove {
    pub task_id: i64,
    pub applied: AppliedMove,
    handle: JoinHandle<MoveOutcome>,
}

impl PendingMove {
    pub async fn outcome(self) -> Result<MoveOutcome, BoardError> {
        self.handle
            .await
            .map_err(|e| BoardError::Network(format!("move task aborted: {}", e)))
    }
}

/// Where the server holds a task, as far as this client knows.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    placement: Placement,
    position: i32,
}

/// Moves of one task that have not all settled yet.
struct MoveLane {
    /// Sequence number of the most recent move.
    latest: u64,
    /// Last placement the server accepted. `None` after a reload until the
    /// next move records one.
    confirmed: Option<Anchor>,
    /// Resolves once the most recent move has been reconciled.
    tail: oneshot::Receiver<()>,
}

struct Inner {
    board: Option<BoardState>,
    load_state: LoadState,
    /// Bumped on every load; outcomes from an older generation are stale.
    generation: u64,
    lanes: HashMap<i64, MoveLane>,
    next_seq: u64,
    notices: Vec<String>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BoardManager<A: BoardApi> {
    api: Arc<A>,
    inner: Arc<Mutex<Inner>>,
}

impl<A: BoardApi> Clone for BoardManager<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: BoardApi> BoardManager<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            inner: Arc::new(Mutex::new(Inner {
                board: None,
                load_state: LoadState::Idle,
                generation: 0,
                lanes: HashMap::new(),
                next_seq: 0,
                notices: Vec::new(),
            })),
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Option<ProjectBoard> {
        lock(&self.inner).board.as_ref().map(|s| s.board().clone())
    }

    pub fn load_state(&self) -> LoadState {
        lock(&self.inner).load_state.clone()
    }

    /// Drain user-visible notices recorded since the last call.
    pub fn take_notices(&self) -> Vec<String> {
        std::mem::take(&mut lock(&self.inner).notices)
    }

    fn loaded_project_id(&self) -> Result<i64, BoardError> {
        lock(&self.inner)
            .board
            .as_ref()
            .map(BoardState::project_id)
            .ok_or_else(|| BoardError::Validation("no project loaded".to_string()))
    }

    // ── Dashboard ─────────────────────────────────────────────────────

    pub async fn list_projects(&self) -> Result<Vec<Project>, BoardError> {
        self.api.list_projects().await
    }

    pub async fn create_project(&self, name: &str) -> Result<Project, BoardError> {
        self.api.create_project(name).await
    }

    /// Delete a project. The local board is cleared if it was showing it.
    pub async fn delete_project(&self, project_id: i64) -> Result<(), BoardError> {
        self.api.delete_project(project_id).await?;
        let mut inner = lock(&self.inner);
        if inner.board.as_ref().map(BoardState::project_id) == Some(project_id) {
            inner.board = None;
            inner.load_state = LoadState::Idle;
            inner.generation += 1;
        }
        Ok(())
    }

    // ── Board ─────────────────────────────────────────────────────────

    /// Fetch a project and replace the local board with it, sorted.
    pub async fn load_project(&self, project_id: i64) -> Result<(), BoardError> {
        let result = self.api.get_project(project_id).await;
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        for lane in inner.lanes.values_mut() {
            lane.confirmed = None;
        }
        match result {
            Ok(board) => {
                inner.board = Some(BoardState::from_fetched(board));
                inner.load_state = LoadState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(project_id, error = %e, "failed to load project");
                inner.board = None;
                inner.load_state = LoadState::Failed(LOAD_FAILED_NOTICE.to_string());
                Err(e)
            }
        }
    }

    /// Move a task locally and start persisting it. `Ok(None)` means the
    /// move changed nothing and no request was sent.
    pub fn apply_move(&self, mv: Move) -> Result<Option<PendingMove>, BoardError> {
        let (done, done_rx) = oneshot::channel();
        let (applied, seq, generation, previous) = {
            let mut guard = lock(&self.inner);
            let inner = &mut *guard;
            let state = inner
                .board
                .as_mut()
                .ok_or_else(|| BoardError::Validation("no project loaded".to_string()))?;
            let Some(applied) = state.apply_move(&mv)? else {
                return Ok(None);
            };
            inner.next_seq += 1;
            let seq = inner.next_seq;
            let source = Anchor {
                placement: applied.from,
                position: applied.previous_position,
            };
            let previous = match inner.lanes.get_mut(&mv.task_id) {
                Some(lane) => {
                    lane.latest = seq;
                    if lane.confirmed.is_none() {
                        lane.confirmed = Some(source);
                    }
                    Some(std::mem::replace(&mut lane.tail, done_rx))
                }
                None => {
                    inner.lanes.insert(
                        mv.task_id,
                        MoveLane {
                            latest: seq,
                            confirmed: Some(source),
                            tail: done_rx,
                        },
                    );
                    None
                }
            };
            (applied, seq, inner.generation, previous)
        };
        debug!(
            task_id = mv.task_id,
            from = applied.from.list_id,
            to = applied.to.list_id,
            index = applied.to.index,
            seq,
            "task moved locally"
        );

        let api = Arc::clone(&self.api);
        let shared = Arc::clone(&self.inner);
        let request = applied.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                // Err only means the earlier move's task went away.
                let _ = previous.await;
            }
            let result = api
                .update_task_position(request.task_id, request.to.list_id, request.position)
                .await;
            let outcome = reconcile(&shared, &request, seq, generation, result);
            let _ = done.send(());
            outcome
        });

        Ok(Some(PendingMove {
            task_id: mv.task_id,
            applied,
            handle,
        }))
    }

    pub async fn create_list(&self, name: &str) -> Result<List, BoardError> {
        let project_id = self.loaded_project_id()?;
        let list = self.api.create_list(project_id, name).await?;
        let mut inner = lock(&self.inner);
        if let Some(state) = inner.board.as_mut().filter(|s| s.project_id() == project_id) {
            state.push_list(list.clone());
        }
        Ok(list)
    }

    pub async fn create_task(&self, list_id: i64, name: &str) -> Result<Task, BoardError> {
        let project_id = self.loaded_project_id()?;
        let task = self.api.create_task(project_id, list_id, name).await?;
        let mut inner = lock(&self.inner);
        if let Some(state) = inner.board.as_mut().filter(|s| s.project_id() == project_id) {
            state.push_task(task.clone());
        }
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<(), BoardError> {
        self.api.delete_task(task_id).await?;
        let mut inner = lock(&self.inner);
        if let Some(state) = inner.board.as_mut() {
            state.remove_task(task_id);
        }
        inner.lanes.remove(&task_id);
        Ok(())
    }
}

/// Fold a persistence result back into local state.
fn reconcile(
    shared: &Mutex<Inner>,
    applied: &AppliedMove,
    seq: u64,
    generation: u64,
    result: Result<Task, BoardError>,
) -> MoveOutcome {
    let mut guard = lock(shared);
    let inner = &mut *guard;
    let same_board = inner.generation == generation;
    let task_id = applied.task_id;
    let latest = inner
        .lanes
        .get(&task_id)
        .is_some_and(|lane| lane.latest == seq);

    match result {
        Ok(task) => {
            if latest {
                inner.lanes.remove(&task_id);
                if same_board {
                    if let Some(state) = inner.board.as_mut() {
                        state.refresh_task(&task);
                    }
                }
            } else if let Some(lane) = inner.lanes.get_mut(&task_id) {
                lane.confirmed = Some(Anchor {
                    placement: applied.to,
                    position: task.position,
                });
            }
            debug!(task_id, seq, "move confirmed");
            MoveOutcome::Confirmed(task)
        }
        Err(e) if latest => {
            let anchor = inner.lanes.remove(&task_id).and_then(|lane| lane.confirmed);
            match (same_board, anchor, inner.board.as_mut()) {
                (true, Some(anchor), Some(state)) => {
                    warn!(task_id, seq, error = %e, "failed to persist move, rolling back");
                    state.place(task_id, anchor.placement, anchor.position);
                    inner.notices.push(MOVE_FAILED_NOTICE.to_string());
                    MoveOutcome::RolledBack(e)
                }
                _ => {
                    warn!(task_id, seq, error = %e, "failed to persist move after reload");
                    MoveOutcome::Superseded(e)
                }
            }
        }
        Err(e) => {
            warn!(task_id, seq, error = %e, "failed to persist superseded move");
            MoveOutcome::Superseded(e)
        }
    }
}
