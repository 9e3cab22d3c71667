//! Client commands: `kanban projects`, `kanban show`, `kanban move`.

use anyhow::{Result, bail};
use kanban::board::models::ProjectBoard;
use kanban::client::manager::LOAD_FAILED_NOTICE;
use kanban::client::{BoardManager, HttpBoardApi, Move, MoveOutcome};
use kanban::config::ClientConfig;

fn manager(config: ClientConfig) -> BoardManager<HttpBoardApi> {
    BoardManager::new(HttpBoardApi::new(config))
}

async fn load(manager: &BoardManager<HttpBoardApi>, project_id: i64) -> Result<ProjectBoard> {
    if let Err(e) = manager.load_project(project_id).await {
        eprintln!("{} {}", console::style("Error:").red().bold(), LOAD_FAILED_NOTICE);
        return Err(e.into());
    }
    match manager.snapshot() {
        Some(board) => Ok(board),
        None => bail!(LOAD_FAILED_NOTICE),
    }
}

fn print_board(board: &ProjectBoard) {
    println!(
        "{} {}",
        console::style(&board.project.name).bold().cyan(),
        console::style(format!("#{}", board.project.id)).dim()
    );
    for list in &board.lists {
        println!();
        println!(
            "  {} {}",
            console::style(&list.list.name).bold(),
            console::style(format!("#{} ({} tasks)", list.list.id, list.tasks.len())).dim()
        );
        if list.tasks.is_empty() {
            println!("    {}", console::style("(empty)").dim());
        }
        for (index, task) in list.tasks.iter().enumerate() {
            println!(
                "    {:>2}. {} {}",
                index,
                task.name,
                console::style(format!("#{}", task.id)).dim()
            );
        }
    }
}

pub async fn cmd_projects(config: ClientConfig) -> Result<()> {
    let projects = manager(config).list_projects().await?;
    if projects.is_empty() {
        println!("{}", console::style("No projects yet.").dim());
        return Ok(());
    }
    for project in projects {
        println!(
            "{:>5}  {}  {}",
            project.id,
            project.name,
            console::style(&project.created_at).dim()
        );
    }
    Ok(())
}

pub async fn cmd_show(config: ClientConfig, project_id: i64) -> Result<()> {
    let manager = manager(config);
    let board = load(&manager, project_id).await?;
    print_board(&board);
    Ok(())
}

pub async fn cmd_move(
    config: ClientConfig,
    project_id: i64,
    task_id: i64,
    source_list_id: i64,
    dest_list_id: i64,
    dest_index: usize,
) -> Result<()> {
    let manager = manager(config);
    load(&manager, project_id).await?;

    let pending = manager.apply_move(Move {
        task_id,
        source_list_id,
        dest_list_id,
        dest_index,
    })?;
    let Some(pending) = pending else {
        println!("{}", console::style("Task is already there.").dim());
        return Ok(());
    };

    match pending.outcome().await? {
        MoveOutcome::Confirmed(task) => {
            println!(
                "{} task #{} to list #{} at position {}",
                console::style("Moved").green(),
                task.id,
                task.list_id,
                task.position
            );
        }
        MoveOutcome::RolledBack(e) | MoveOutcome::Superseded(e) => {
            for notice in manager.take_notices() {
                eprintln!("{} {}", console::style("Error:").red().bold(), notice);
            }
            return Err(e.into());
        }
    }

    if let Some(board) = manager.snapshot() {
        println!();
        print_board(&board);
    }
    Ok(())
}
