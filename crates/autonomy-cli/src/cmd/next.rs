use crate::context::{require_remote, GlobalArgs};
use crate::output::print_json;
use autonomy_core::tasks::TaskFilter;

pub fn run(
    args: &GlobalArgs,
    assignee: Option<&str>,
    team: Option<&str>,
    explain: bool,
) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let tm = remote.task_manager(&args.root)?;
    let filter = TaskFilter {
        assignee: assignee.map(str::to_string),
        team: team.map(str::to_string),
    };

    if explain {
        match tm.explain_next_task(&filter)? {
            Some((issue, breakdown)) => {
                if args.json {
                    print_json(&serde_json::json!({ "issue": issue, "breakdown": breakdown }))?;
                } else {
                    println!("#{} {}", issue.number, issue.title);
                    println!("score: {}", breakdown.total);
                    for (factor, value) in &breakdown.factors {
                        println!("  {factor}: {value}");
                    }
                }
            }
            None => print_none(args)?,
        }
        return Ok(());
    }

    match tm.get_next_task(&filter)? {
        Some(issue) => {
            if args.json {
                print_json(&issue)?;
            } else {
                println!("#{} {}", issue.number, issue.title);
                if !issue.labels.is_empty() {
                    println!("labels: {}", issue.labels.join(", "));
                }
            }
        }
        None => print_none(args)?,
    }
    Ok(())
}

fn print_none(args: &GlobalArgs) -> anyhow::Result<()> {
    if args.json {
        print_json(&serde_json::json!({ "issue": null }))?;
    } else {
        println!("No tasks found.");
    }
    Ok(())
}
