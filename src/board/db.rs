use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use crate::errors::BoardError;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, BoardError>
    where
        F: FnOnce(&BoardDb) -> Result<R, BoardError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            // Writes are single statements; a poisoned lock still guards a
            // consistent connection.
            let guard = db.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("recovering poisoned DB lock");
                poisoned.into_inner()
            });
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// The ordered store: projects, lists, and tasks with parent-scoped
/// integer positions. Queries return rows in id order; callers sort by
/// `position`. No uniqueness or contiguity of positions is enforced.
pub struct BoardDb {
    conn: Connection,
}

const PROJECT_COLUMNS: &str = "id, name, user_id, created_at";
const LIST_COLUMNS: &str = "id, name, project_id, position, created_at";
const TASK_COLUMNS: &str = "id, name, list_id, position, created_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: row.get(0)?,
        name: row.get(1)?,
        project_id: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        list_id: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and create the schema.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.create_schema().context("Failed to create schema")?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);
                CREATE INDEX IF NOT EXISTS idx_lists_project ON lists(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_list ON tasks(list_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Projects ──────────────────────────────────────────────────────

    pub fn create_project(&self, user_id: &str, name: &str) -> Result<Project> {
        self.conn
            .execute(
                "INSERT INTO projects (name, user_id) VALUES (?1, ?2)",
                params![name, user_id],
            )
            .context("Failed to insert project")?;
        let id = self.conn.last_insert_rowid();
        self.get_project(id)?
            .context("Project not found after insert")
    }

    pub fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = ?1 ORDER BY id"
            ))
            .context("Failed to prepare list_projects")?;
        let rows = stmt
            .query_map(params![user_id], project_from_row)
            .context("Failed to query projects")?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row.context("Failed to read project row")?);
        }
        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()
            .context("Failed to query project")
    }

    pub fn rename_project(&self, id: i64, name: &str) -> Result<Project> {
        self.conn
            .execute(
                "UPDATE projects SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to rename project")?;
        self.get_project(id)?
            .context("Project not found after rename")
    }

    /// Delete a project; lists and tasks go with it via `ON DELETE CASCADE`.
    pub fn delete_project(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])
            .context("Failed to delete project")?;
        Ok(count > 0)
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub fn get_list(&self, id: i64) -> Result<Option<List>> {
        self.conn
            .query_row(
                &format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?1"),
                params![id],
                list_from_row,
            )
            .optional()
            .context("Failed to query list")
    }

    pub fn lists_for_project(&self, project_id: i64) -> Result<Vec<List>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {LIST_COLUMNS} FROM lists WHERE project_id = ?1 ORDER BY id"
            ))
            .context("Failed to prepare lists_for_project")?;
        let rows = stmt
            .query_map(params![project_id], list_from_row)
            .context("Failed to query lists")?;
        let mut lists = Vec::new();
        for row in rows {
            lists.push(row.context("Failed to read list row")?);
        }
        Ok(lists)
    }

    /// Highest list position in a project, `None` when it has no lists.
    pub fn max_list_position(&self, project_id: i64) -> Result<Option<i32>> {
        self.conn
            .query_row(
                "SELECT MAX(position) FROM lists WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .context("Failed to get max list position")
    }

    pub fn insert_list(&self, project_id: i64, name: &str, position: i32) -> Result<List> {
        self.conn
            .execute(
                "INSERT INTO lists (name, project_id, position) VALUES (?1, ?2, ?3)",
                params![name, project_id, position],
            )
            .context("Failed to insert list")?;
        let id = self.conn.last_insert_rowid();
        self.get_list(id)?.context("List not found after insert")
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        self.conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()
            .context("Failed to query task")
    }

    pub fn tasks_for_list(&self, list_id: i64) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE list_id = ?1 ORDER BY id"
            ))
            .context("Failed to prepare tasks_for_list")?;
        let rows = stmt
            .query_map(params![list_id], task_from_row)
            .context("Failed to query tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("Failed to read task row")?);
        }
        Ok(tasks)
    }

    /// Highest task position in a list, `None` when the list is empty.
    pub fn max_task_position(&self, list_id: i64) -> Result<Option<i32>> {
        self.conn
            .query_row(
                "SELECT MAX(position) FROM tasks WHERE list_id = ?1",
                params![list_id],
                |row| row.get(0),
            )
            .context("Failed to get max task position")
    }

    pub fn insert_task(&self, list_id: i64, name: &str, position: i32) -> Result<Task> {
        self.conn
            .execute(
                "INSERT INTO tasks (name, list_id, position) VALUES (?1, ?2, ?3)",
                params![name, list_id, position],
            )
            .context("Failed to insert task")?;
        let id = self.conn.last_insert_rowid();
        self.get_task(id)?.context("Task not found after insert")
    }

    /// Single-row write of a task's parent list and position. Siblings are
    /// left untouched.
    pub fn update_task_placement(&self, id: i64, list_id: i64, position: i32) -> Result<Task> {
        self.conn
            .execute(
                "UPDATE tasks SET list_id = ?1, position = ?2 WHERE id = ?3",
                params![list_id, position, id],
            )
            .context("Failed to update task placement")?;
        self.get_task(id)?.context("Task not found after move")
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }

    // ── Ownership chain ───────────────────────────────────────────────
    //
    // These joins are the only place ownership is resolved; the service
    // authorizes every mutation through them.

    pub fn project_owner(&self, project_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT user_id FROM projects WHERE id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to resolve project owner")
    }

    /// Resolve list → project → owner. Returns `(project_id, user_id)`.
    pub fn list_owner(&self, list_id: i64) -> Result<Option<(i64, String)>> {
        self.conn
            .query_row(
                "SELECT p.id, p.user_id
                 FROM lists l JOIN projects p ON p.id = l.project_id
                 WHERE l.id = ?1",
                params![list_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to resolve list owner")
    }

    /// Resolve task → list → project → owner.
    pub fn task_owner(&self, task_id: i64) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT p.user_id
                 FROM tasks t
                 JOIN lists l ON l.id = t.list_id
                 JOIN projects p ON p.id = l.project_id
                 WHERE t.id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to resolve task owner")
    }

    // ── Board view ────────────────────────────────────────────────────

    /// Project with nested lists and tasks, in store (id) order.
    pub fn get_board(&self, project_id: i64) -> Result<Option<ProjectBoard>> {
        let project = match self.get_project(project_id)? {
            Some(p) => p,
            None => return Ok(None),
        };

        let mut lists = Vec::new();
        for list in self.lists_for_project(project_id)? {
            let tasks = self.tasks_for_list(list.id)?;
            lists.push(ListWithTasks { list, tasks });
        }

        Ok(Some(ProjectBoard { project, lists }))
    }
}
