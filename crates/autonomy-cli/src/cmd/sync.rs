use crate::context::{require_remote, GlobalArgs};
use crate::output::print_json;

pub fn run(args: &GlobalArgs) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    match remote.scheduler.run_now()? {
        Some(summary) => {
            if args.json {
                print_json(&summary)?;
            } else {
                println!(
                    "hierarchy sync: {} linked, {} orphans",
                    summary.created.len(),
                    summary.orphans.len()
                );
                for number in &summary.orphans {
                    println!("  orphaned: #{number}");
                }
            }
        }
        None => println!("sync skipped: cooldown active"),
    }
    Ok(())
}
