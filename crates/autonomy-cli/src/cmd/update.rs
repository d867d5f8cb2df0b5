use crate::context::{require_remote, GlobalArgs};
use crate::output::print_json;
use anyhow::bail;

pub fn run(
    args: &GlobalArgs,
    number: u64,
    status: Option<&str>,
    done: bool,
    notes: Option<&str>,
) -> anyhow::Result<()> {
    if status.is_none() && !done && notes.is_none() {
        bail!("nothing to update: pass --status, --done, or --notes");
    }

    let remote = require_remote(args)?;
    let tm = remote.task_manager(&args.root)?;
    let success = tm.update_task(number, status, done, notes)?;

    if args.json {
        print_json(&serde_json::json!({ "issue": number, "success": success }))?;
    } else if success {
        println!("Updated #{number}");
    }

    if !success {
        bail!("one or more updates failed for issue #{number}");
    }
    Ok(())
}
