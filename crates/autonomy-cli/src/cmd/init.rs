use crate::context::GlobalArgs;
use autonomy_core::config::WorkflowConfig;
use autonomy_core::{io, paths};

pub fn run(args: &GlobalArgs) -> anyhow::Result<()> {
    let root = &args.root;
    io::ensure_dir(&paths::autonomy_dir(root))?;

    let config_yaml = serde_yaml::to_string(&WorkflowConfig::default())?;
    let wrote_config = io::write_if_missing(&paths::config_path(root), config_yaml.as_bytes())?;
    io::write_if_missing(&paths::audit_log_path(root), b"")?;
    io::write_if_missing(&paths::pinned_path(root), b"{}\n")?;
    io::write_if_missing(&paths::field_cache_path(root), b"{}\n")?;

    if wrote_config {
        println!("Initialized {}", paths::autonomy_dir(root).display());
    } else {
        println!(
            "Already initialized at {}",
            paths::autonomy_dir(root).display()
        );
    }
    Ok(())
}
