use crate::context::{require_remote, GlobalArgs};
use crate::output::print_json;
use autonomy_core::backlog::{BacklogDoctor, DoctorOptions};
use autonomy_core::github::IssueStore;
use std::sync::Arc;

pub fn run(
    args: &GlobalArgs,
    stale_days: Option<i64>,
    checklist_limit: Option<usize>,
    no_stale: bool,
    no_duplicates: bool,
    no_oversized: bool,
) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let opts = DoctorOptions {
        stale_days: stale_days.unwrap_or(remote.config.stale_days),
        checklist_limit: checklist_limit.unwrap_or(remote.config.checklist_limit),
        duplicate_threshold: remote.config.duplicate_threshold,
        check_stale: !no_stale,
        check_duplicates: !no_duplicates,
        check_oversized: !no_oversized,
    };

    let doctor = BacklogDoctor::new(remote.store.clone() as Arc<dyn IssueStore>);
    let report = doctor.run(&opts)?;

    if args.json {
        return print_json(&report);
    }

    println!(
        "backlog doctor: {} stale, {} duplicate pairs, {} oversized",
        report.stale.len(),
        report.duplicates.len(),
        report.oversized.len()
    );
    for n in &report.stale {
        println!("  stale: #{n}");
    }
    for (a, b) in &report.duplicates {
        println!("  duplicates: #{a} <-> #{b}");
    }
    for n in &report.oversized {
        println!("  oversized: #{n}");
    }
    Ok(())
}
