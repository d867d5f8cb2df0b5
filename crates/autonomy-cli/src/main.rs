mod cmd;
mod context;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{audit::AuditSubcommand, board::BoardSubcommand};
use context::GlobalArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autonomy",
    about = "GitHub-issue workflow automation — rank tasks, audit every mutation, undo within a window, keep hierarchies synced",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root holding .autonomy/ (default: auto-detect)
    #[arg(long, global = true, env = "AUTONOMY_ROOT")]
    root: Option<PathBuf>,

    /// Repository owner
    #[arg(long, global = true, env = "GITHUB_OWNER")]
    owner: Option<String>,

    /// Repository name
    #[arg(long, global = true, env = "GITHUB_REPO")]
    repo: Option<String>,

    /// GitHub token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the .autonomy/ state directory
    Init,

    /// Show the highest-priority unblocked task
    Next {
        /// Only tasks assigned to this login
        #[arg(long)]
        assignee: Option<String>,
        /// Only tasks with a matching team:<name> label
        #[arg(long)]
        team: Option<String>,
        /// Include the per-factor score breakdown
        #[arg(long)]
        explain: bool,
    },

    /// List open tasks in ranked order
    List {
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Show only pinned tasks
        #[arg(long)]
        pinned: bool,
    },

    /// Update a task: status label, closure, note
    Update {
        number: u64,
        /// Status label to add (e.g. in-development, approved)
        #[arg(long)]
        status: Option<String>,
        /// Close the issue and roll subtasks over
        #[arg(long)]
        done: bool,
        /// Comment to attach
        #[arg(long)]
        notes: Option<String>,
    },

    /// Pin an issue (excluded from automatic dispatch)
    Pin { number: u64 },

    /// Remove a pin
    Unpin { number: u64 },

    /// Inspect the audit log and undo operations
    Audit {
        #[command(subcommand)]
        subcommand: AuditSubcommand,
    },

    /// Rebuild the issue hierarchy and flag orphans
    Sync,

    /// Run backlog hygiene checks (stale, duplicates, oversized)
    Doctor {
        #[arg(long)]
        stale_days: Option<i64>,
        #[arg(long)]
        checklist_limit: Option<usize>,
        #[arg(long)]
        no_stale: bool,
        #[arg(long)]
        no_duplicates: bool,
        #[arg(long)]
        no_oversized: bool,
    },

    /// Inspect the cached project-board field mapping
    Board {
        #[command(subcommand)]
        subcommand: BoardSubcommand,
    },

    /// Run the HTTP API and webhook listener
    Serve {
        #[arg(long, default_value = "8321")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let args = GlobalArgs {
        root: root::resolve_root(cli.root.as_deref()),
        owner: cli.owner,
        repo: cli.repo,
        token: cli.token,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Init => cmd::init::run(&args),
        Commands::Next {
            assignee,
            team,
            explain,
        } => cmd::next::run(&args, assignee.as_deref(), team.as_deref(), explain),
        Commands::List {
            assignee,
            team,
            limit,
            pinned,
        } => cmd::list::run(&args, assignee.as_deref(), team.as_deref(), limit, pinned),
        Commands::Update {
            number,
            status,
            done,
            notes,
        } => cmd::update::run(&args, number, status.as_deref(), done, notes.as_deref()),
        Commands::Pin { number } => cmd::pin::run(&args, number, true),
        Commands::Unpin { number } => cmd::pin::run(&args, number, false),
        Commands::Audit { subcommand } => cmd::audit::run(&args, subcommand),
        Commands::Sync => cmd::sync::run(&args),
        Commands::Doctor {
            stale_days,
            checklist_limit,
            no_stale,
            no_duplicates,
            no_oversized,
        } => cmd::doctor::run(
            &args,
            stale_days,
            checklist_limit,
            no_stale,
            no_duplicates,
            no_oversized,
        ),
        Commands::Board { subcommand } => cmd::board::run(&args, subcommand),
        Commands::Serve { port } => cmd::serve::run(&args, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
