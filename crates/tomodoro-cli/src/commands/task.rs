//! Task management commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;

use tomodoro_core::{Database, NewTask, Priority, TaskUpdate};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Urgent => Priority::Urgent,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a new task
    Add {
        /// Task content
        content: String,
        /// Priority
        #[arg(long, value_enum, default_value = "medium")]
        priority: PriorityArg,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Estimated pomodoros
        #[arg(long, default_value = "1")]
        estimated_pomodoros: u32,
    },
    /// List tasks, most pressing first
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Show a task
    Get {
        /// Task ID
        id: i64,
    },
    /// Mark a task completed
    Done {
        /// Task ID
        id: i64,
    },
    /// Update a task
    Update {
        /// Task ID
        id: i64,
        /// New content
        #[arg(long)]
        content: Option<String>,
        /// New priority
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// New due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// New estimated pomodoros
        #[arg(long)]
        estimated_pomodoros: Option<u32>,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },
}

fn parse_due(due: Option<String>) -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error>> {
    match due {
        Some(s) => {
            let parsed = DateTime::parse_from_rfc3339(&s)
                .map_err(|e| format!("invalid due date '{s}': {e}"))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            content,
            priority,
            due,
            estimated_pomodoros,
        } => {
            let id = db.add_task(&NewTask {
                content,
                priority: priority.into(),
                due_date: parse_due(due)?,
                estimated_pomodoros,
            })?;
            let task = db.get_task(id)?.ok_or("task vanished after insert")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { all } => {
            let tasks = db.list_tasks(all)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Get { id } => match db.get_task(id)? {
            Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
            None => return Err(format!("no task with id {id}").into()),
        },
        TaskAction::Done { id } => {
            if !db.complete_task(id)? {
                return Err(format!("no task with id {id}").into());
            }
            let task = db.get_task(id)?.ok_or("task vanished after update")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Update {
            id,
            content,
            priority,
            due,
            estimated_pomodoros,
        } => {
            let update = TaskUpdate {
                content,
                priority: priority.map(Into::into),
                due_date: parse_due(due)?,
                estimated_pomodoros,
                completed: None,
            };
            if !db.update_task(id, &update)? {
                return Err(format!("no task with id {id} (or nothing to update)").into());
            }
            let task = db.get_task(id)?.ok_or("task vanished after update")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Delete { id } => {
            if !db.delete_task(id)? {
                return Err(format!("no task with id {id}").into());
            }
            println!("{{\"deleted\": {id}}}");
        }
    }
    Ok(())
}
