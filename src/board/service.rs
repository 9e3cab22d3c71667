//! Position reconciliation service.
//!
//! Every mutation is authorized against the ownership chain resolved by
//! the store (task → list → project → owner) and fails closed: a missing
//! resource and a foreign one both yield `BoardError::NotFoundOrForbidden`,
//! and nothing is written.
//!
//! Positions are plain integers. New children are appended at `max + 1`;
//! moves write the client-supplied destination index verbatim and never
//! re-rank siblings.

use tracing::{debug, info, warn};

use super::db::BoardDb;
use super::models::{List, Project, ProjectBoard, Task};
use crate::errors::BoardError;

/// Parent collection a new child is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// Lists are positioned among the project's lists.
    Project(i64),
    /// Tasks are positioned among the list's tasks.
    List(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    List(List),
    Task(Task),
}

impl TryFrom<Child> for List {
    type Error = BoardError;

    fn try_from(child: Child) -> Result<Self, Self::Error> {
        match child {
            Child::List(list) => Ok(list),
            Child::Task(task) => {
                Err(anyhow::anyhow!("created task {} where a list was expected", task.id).into())
            }
        }
    }
}

impl TryFrom<Child> for Task {
    type Error = BoardError;

    fn try_from(child: Child) -> Result<Self, Self::Error> {
        match child {
            Child::Task(task) => Ok(task),
            Child::List(list) => {
                Err(anyhow::anyhow!("created list {} where a task was expected", list.id).into())
            }
        }
    }
}

/// Position for a new child given the current maximum among its siblings.
pub fn next_position(max: Option<i32>) -> Result<i32, BoardError> {
    match max {
        None => Ok(0),
        Some(m) => m.checked_add(1).ok_or_else(|| {
            BoardError::Validation("no position left after the last sibling".to_string())
        }),
    }
}

fn require_name(name: Option<&str>) -> Result<String, BoardError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(BoardError::missing("name")),
    }
}

fn require_owner(owner: Option<String>, requester: &str) -> Result<(), BoardError> {
    match owner {
        Some(owner) if owner == requester => Ok(()),
        _ => Err(BoardError::NotFoundOrForbidden),
    }
}

// ── Projects ──────────────────────────────────────────────────────────

pub fn create_project(
    db: &BoardDb,
    requester: &str,
    name: Option<&str>,
) -> Result<Project, BoardError> {
    let name = require_name(name)?;
    let project = db.create_project(requester, &name)?;
    info!(project_id = project.id, "project created");
    Ok(project)
}

pub fn list_projects(db: &BoardDb, requester: &str) -> Result<Vec<Project>, BoardError> {
    Ok(db.list_projects(requester)?)
}

pub fn rename_project(
    db: &BoardDb,
    requester: &str,
    project_id: i64,
    name: Option<&str>,
) -> Result<Project, BoardError> {
    let name = require_name(name)?;
    require_owner(db.project_owner(project_id)?, requester)?;
    Ok(db.rename_project(project_id, &name)?)
}

pub fn delete_project(db: &BoardDb, requester: &str, project_id: i64) -> Result<(), BoardError> {
    require_owner(db.project_owner(project_id)?, requester)?;
    db.delete_project(project_id)?;
    info!(project_id, "project deleted");
    Ok(())
}

/// The full nested board, in store order. Callers sort by `position`.
pub fn get_board(
    db: &BoardDb,
    requester: &str,
    project_id: i64,
) -> Result<ProjectBoard, BoardError> {
    require_owner(db.project_owner(project_id)?, requester)?;
    db.get_board(project_id)?
        .ok_or(BoardError::NotFoundOrForbidden)
}

// ── Creation ──────────────────────────────────────────────────────────

/// Append a new list or task under `parent` after verifying the parent
/// chain belongs to `requester`.
pub fn create_under_parent(
    db: &BoardDb,
    requester: &str,
    parent: Parent,
    name: Option<&str>,
) -> Result<Child, BoardError> {
    let name = require_name(name)?;
    match parent {
        Parent::Project(project_id) => append_list(db, requester, project_id, &name).map(Child::List),
        Parent::List(list_id) => append_task(db, requester, list_id, &name).map(Child::Task),
    }
}

fn append_list(
    db: &BoardDb,
    requester: &str,
    project_id: i64,
    name: &str,
) -> Result<List, BoardError> {
    require_owner(db.project_owner(project_id)?, requester)?;
    let position = next_position(db.max_list_position(project_id)?)?;
    let list = db.insert_list(project_id, name, position)?;
    info!(list_id = list.id, project_id, position, "list created");
    Ok(list)
}

fn append_task(db: &BoardDb, requester: &str, list_id: i64, name: &str) -> Result<Task, BoardError> {
    require_owner(db.list_owner(list_id)?.map(|(_, owner)| owner), requester)?;
    let position = next_position(db.max_task_position(list_id)?)?;
    let task = db.insert_task(list_id, name, position)?;
    info!(task_id = task.id, list_id, position, "task created");
    Ok(task)
}

pub fn create_list(
    db: &BoardDb,
    requester: &str,
    project_id: i64,
    name: Option<&str>,
) -> Result<List, BoardError> {
    create_under_parent(db, requester, Parent::Project(project_id), name)?.try_into()
}

/// Create a task in `list_id`, which must belong to `project_id`.
pub fn create_task(
    db: &BoardDb,
    requester: &str,
    project_id: i64,
    list_id: i64,
    name: Option<&str>,
) -> Result<Task, BoardError> {
    require_name(name)?;
    match db.list_owner(list_id)? {
        Some((owning_project, _)) if owning_project == project_id => {}
        _ => return Err(BoardError::NotFoundOrForbidden),
    }
    create_under_parent(db, requester, Parent::List(list_id), name)?.try_into()
}

// ── Tasks ─────────────────────────────────────────────────────────────

/// Persist a task's new list and position.
///
/// Both the task and the destination list must resolve to `requester`.
/// The write touches only the moved row; calling this twice with the same
/// arguments leaves the same stored state as calling it once.
pub fn move_task(
    db: &BoardDb,
    requester: &str,
    task_id: i64,
    dest_list_id: i64,
    dest_position: i32,
) -> Result<Task, BoardError> {
    if let Err(e) = require_owner(db.task_owner(task_id)?, requester) {
        warn!(task_id, "move denied: task not found or not owned");
        return Err(e);
    }
    if let Err(e) = require_owner(db.list_owner(dest_list_id)?.map(|(_, o)| o), requester) {
        warn!(task_id, dest_list_id, "move denied: destination not found or not owned");
        return Err(e);
    }
    if dest_position < 0 {
        return Err(BoardError::Validation(
            "position must not be negative".to_string(),
        ));
    }

    let task = db.update_task_placement(task_id, dest_list_id, dest_position)?;
    debug!(task_id, dest_list_id, dest_position, "task moved");
    Ok(task)
}

pub fn delete_task(db: &BoardDb, requester: &str, task_id: i64) -> Result<(), BoardError> {
    require_owner(db.task_owner(task_id)?, requester)?;
    db.delete_task(task_id)?;
    info!(task_id, "task deleted");
    Ok(())
}
