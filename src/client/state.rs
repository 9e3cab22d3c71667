//! Local copy of one project's board, kept in display order.
//!
//! Order here is array order. A task's cached `position` is whatever was
//! last sent to or received from the server; siblings are never renumbered.

use crate::board::models::{List, ListWithTasks, ProjectBoard, Task};
use crate::errors::BoardError;

/// A drag-and-drop request: take `task_id` out of `source_list_id` and
/// insert it at `dest_index` among the destination list's remaining tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub task_id: i64,
    pub source_list_id: i64,
    pub dest_list_id: i64,
    pub dest_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub list_id: i64,
    pub index: usize,
}

/// What [`BoardState::apply_move`] did, with enough detail to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMove {
    pub task_id: i64,
    pub from: Placement,
    pub to: Placement,
    /// Cached `position` before the move.
    pub previous_position: i32,
    /// Position sent to the server: the effective destination index.
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    board: ProjectBoard,
}

impl BoardState {
    /// Take a freshly fetched board and sort lists and tasks by `position`.
    /// Ties keep the order the server returned them in.
    pub fn from_fetched(mut board: ProjectBoard) -> Self {
        board.lists.sort_by_key(|l| l.list.position);
        for list in &mut board.lists {
            list.tasks.sort_by_key(|t| t.position);
        }
        Self { board }
    }

    pub fn board(&self) -> &ProjectBoard {
        &self.board
    }

    pub fn into_board(self) -> ProjectBoard {
        self.board
    }

    pub fn project_id(&self) -> i64 {
        self.board.project.id
    }

    pub fn task_count(&self) -> usize {
        self.board.task_count()
    }

    /// Task ids of a list in display order.
    pub fn task_ids(&self, list_id: i64) -> Option<Vec<i64>> {
        self.board
            .list(list_id)
            .map(|l| l.tasks.iter().map(|t| t.id).collect())
    }

    pub fn locate(&self, task_id: i64) -> Option<Placement> {
        self.board.lists.iter().find_map(|l| {
            l.tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| Placement {
                    list_id: l.list.id,
                    index,
                })
        })
    }

    fn list_index(&self, list_id: i64) -> Result<usize, BoardError> {
        self.board
            .lists
            .iter()
            .position(|l| l.list.id == list_id)
            .ok_or_else(|| BoardError::Validation(format!("unknown list {}", list_id)))
    }

    /// Rearrange locally. Returns `Ok(None)` when the move would leave the
    /// board unchanged. Nothing is touched on error.
    pub fn apply_move(&mut self, mv: &Move) -> Result<Option<AppliedMove>, BoardError> {
        let src = self.list_index(mv.source_list_id)?;
        let dst = self.list_index(mv.dest_list_id)?;
        let from_index = self.board.lists[src]
            .tasks
            .iter()
            .position(|t| t.id == mv.task_id)
            .ok_or_else(|| {
                BoardError::Validation(format!(
                    "task {} is not in list {}",
                    mv.task_id, mv.source_list_id
                ))
            })?;

        let dest_len = if src == dst {
            self.board.lists[dst].tasks.len() - 1
        } else {
            self.board.lists[dst].tasks.len()
        };
        let to_index = mv.dest_index.min(dest_len);
        if src == dst && to_index == from_index {
            return Ok(None);
        }
        let position = i32::try_from(to_index)
            .map_err(|_| BoardError::Validation("destination index out of range".to_string()))?;

        let mut task = self.board.lists[src].tasks.remove(from_index);
        let previous_position = task.position;
        task.list_id = mv.dest_list_id;
        task.position = position;
        self.board.lists[dst].tasks.insert(to_index, task);

        Ok(Some(AppliedMove {
            task_id: mv.task_id,
            from: Placement {
                list_id: mv.source_list_id,
                index: from_index,
            },
            to: Placement {
                list_id: mv.dest_list_id,
                index: to_index,
            },
            previous_position,
            position,
        }))
    }

    /// Put a task at `placement` (index clamped to the list's length) with
    /// the given cached `position`, wherever it currently is. Returns false
    /// when the task or the target list is gone.
    pub fn place(&mut self, task_id: i64, placement: Placement, position: i32) -> bool {
        let Ok(dst) = self.list_index(placement.list_id) else {
            return false;
        };
        let Some(current) = self.locate(task_id) else {
            return false;
        };
        let Ok(cur) = self.list_index(current.list_id) else {
            return false;
        };

        let mut task = self.board.lists[cur].tasks.remove(current.index);
        task.list_id = placement.list_id;
        task.position = position;
        let tasks = &mut self.board.lists[dst].tasks;
        let index = placement.index.min(tasks.len());
        tasks.insert(index, task);
        true
    }

    pub fn push_list(&mut self, list: List) {
        self.board.lists.push(ListWithTasks {
            list,
            tasks: Vec::new(),
        });
    }

    /// Append a new task to its list. Returns false if the list is unknown.
    pub fn push_task(&mut self, task: Task) -> bool {
        match self
            .board
            .lists
            .iter_mut()
            .find(|l| l.list.id == task.list_id)
        {
            Some(list) => {
                list.tasks.push(task);
                true
            }
            None => false,
        }
    }

    pub fn remove_task(&mut self, task_id: i64) -> Option<Task> {
        let placement = self.locate(task_id)?;
        let idx = self.list_index(placement.list_id).ok()?;
        Some(self.board.lists[idx].tasks.remove(placement.index))
    }

    /// Overwrite the cached record of a task with the server's copy,
    /// keeping its place in the array.
    pub fn refresh_task(&mut self, task: &Task) {
        if let Some(cached) = self
            .board
            .lists
            .iter_mut()
            .flat_map(|l| l.tasks.iter_mut())
            .find(|t| t.id == task.id)
        {
            *cached = task.clone();
        }
    }
}
