use crate::context::{require_remote, GlobalArgs};
use crate::output::{print_json, print_table};
use autonomy_core::tasks::TaskFilter;

pub fn run(
    args: &GlobalArgs,
    assignee: Option<&str>,
    team: Option<&str>,
    limit: usize,
    pinned: bool,
) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let tm = remote.task_manager(&args.root)?;
    let filter = TaskFilter {
        assignee: assignee.map(str::to_string),
        team: team.map(str::to_string),
    };

    let tasks = tm.list_tasks(&filter, limit, pinned)?;

    if args.json {
        return print_json(&tasks);
    }

    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|issue| {
            vec![
                format!("#{}", issue.number),
                issue.title.clone(),
                issue.labels.join(", "),
                issue.assignee.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["ISSUE", "TITLE", "LABELS", "ASSIGNEE"], rows);
    Ok(())
}
