use crate::context::{local_audit, require_remote, GlobalArgs};
use crate::output::{print_json, print_table};
use anyhow::bail;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum AuditSubcommand {
    /// List recent audit entries
    Log {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Aggregate counts over a trailing window
    Stats {
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// Undo a logged operation by entry hash or diff hash
    Undo { hash: String },
    /// Undo the most recent eligible operation
    UndoLast,
    /// Stage the current undo window on a shadow branch and open a PR
    ShadowPr {
        #[arg(long, default_value = "main")]
        base: String,
    },
    /// Post a diff hash as a comment on a pull request
    Embed { pr: u64, diff_hash: String },
}

pub fn run(args: &GlobalArgs, subcmd: AuditSubcommand) -> anyhow::Result<()> {
    match subcmd {
        AuditSubcommand::Log { limit } => log(args, limit),
        AuditSubcommand::Stats { days } => stats(args, days),
        AuditSubcommand::Undo { hash } => undo(args, &hash),
        AuditSubcommand::UndoLast => undo_last(args),
        AuditSubcommand::ShadowPr { base } => shadow_pr(args, &base),
        AuditSubcommand::Embed { pr, diff_hash } => embed(args, pr, &diff_hash),
    }
}

fn log(args: &GlobalArgs, limit: usize) -> anyhow::Result<()> {
    let logger = local_audit(args)?;
    let entries = logger.iter_logs();
    let tail: Vec<_> = entries
        .iter()
        .rev()
        .take(limit)
        .rev()
        .cloned()
        .collect();

    if args.json {
        return print_json(&tail);
    }

    if tail.is_empty() {
        println!("No audit entries.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tail
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.hash.clone(),
                e.diff_hash.clone(),
                e.operation.clone(),
            ]
        })
        .collect();
    print_table(&["TIME (UTC)", "HASH", "DIFF", "OPERATION"], rows);
    Ok(())
}

fn stats(args: &GlobalArgs, days: i64) -> anyhow::Result<()> {
    let logger = local_audit(args)?;
    let mutations = logger.count_mutations(days);
    let undos = logger.count_undo_operations(days);

    if args.json {
        return print_json(&serde_json::json!({
            "days": days,
            "mutations": mutations,
            "undo_operations": undos,
        }));
    }
    println!("last {days} days: {mutations} mutations, {undos} undo operations");
    Ok(())
}

fn undo(args: &GlobalArgs, hash: &str) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let undo = remote.undo_manager();
    if !undo.undo(hash)? {
        bail!("no eligible audit entry matches '{hash}' (window: {})", remote.config.commit_window);
    }
    if args.json {
        print_json(&serde_json::json!({ "undone": hash }))?;
    } else {
        println!("Undid {hash}");
    }
    Ok(())
}

fn undo_last(args: &GlobalArgs) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let undo = remote.undo_manager();
    match undo.undo_last()? {
        Some(hash) => {
            if args.json {
                print_json(&serde_json::json!({ "undone": hash }))?;
            } else {
                println!("Undid {hash}");
            }
            Ok(())
        }
        None => bail!("nothing to undo"),
    }
}

fn shadow_pr(args: &GlobalArgs, base: &str) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let undo = remote.undo_manager();
    let window = undo.window();
    if window.is_empty() {
        bail!("audit window is empty; nothing to stage");
    }
    match undo.create_shadow_branch_pr(&window, base)? {
        Some(pr) => {
            if args.json {
                print_json(&serde_json::json!({ "pr": pr }))?;
            } else {
                println!("Opened review PR #{pr}");
            }
            Ok(())
        }
        None => bail!("shadow branch staging failed"),
    }
}

fn embed(args: &GlobalArgs, pr: u64, diff_hash: &str) -> anyhow::Result<()> {
    let remote = require_remote(args)?;
    let undo = remote.undo_manager();
    if !undo.embed_diff_hash(pr, diff_hash)? {
        bail!("failed to comment on PR #{pr}");
    }
    if args.json {
        print_json(&serde_json::json!({ "pr": pr, "diff_hash": diff_hash }))?;
    } else {
        println!("Embedded {diff_hash} on PR #{pr}");
    }
    Ok(())
}
