use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
}

/// A column on a project's board.
///
/// `position` ranks the list among its sibling lists; values are assigned
/// as `max + 1` on creation and are never renumbered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub position: i32,
    pub created_at: String,
}

/// A card inside a list. Sorting a list's tasks by `position` ascending
/// gives display order; gaps and duplicates are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub list_id: i64,
    pub position: i32,
    pub created_at: String,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListWithTasks {
    #[serde(flatten)]
    pub list: List,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A project with its nested lists and tasks, as returned by
/// `GET /api/projects/{id}`. The store makes no ordering promise here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectBoard {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub lists: Vec<ListWithTasks>,
}

impl ProjectBoard {
    pub fn task_count(&self) -> usize {
        self.lists.iter().map(|l| l.tasks.len()).sum()
    }

    pub fn list(&self, list_id: i64) -> Option<&ListWithTasks> {
        self.lists.iter().find(|l| l.list.id == list_id)
    }
}

// Request payloads. Fields are optional so that a missing field surfaces as
// a 400 validation error instead of a body rejection.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: Option<String>,
}

impl NameRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveTaskRequest {
    pub list_id: Option<i64>,
    pub position: Option<i32>,
}
