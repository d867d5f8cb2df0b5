use crate::context::GlobalArgs;
use crate::output::print_json;
use anyhow::bail;
use autonomy_core::paths;
use autonomy_core::pinned::PinnedItemsStore;

/// Pin/unpin works purely against local state; no token needed.
pub fn run(args: &GlobalArgs, number: u64, pin: bool) -> anyhow::Result<()> {
    paths::require_initialized(&args.root)?;
    let project = args.project_key()?;
    let store = PinnedItemsStore::new(paths::pinned_path(&args.root));

    if pin {
        store.pin(&project, number)?;
        if args.json {
            print_json(&serde_json::json!({ "issue": number, "pinned": true }))?;
        } else {
            println!("Pinned #{number}");
        }
        return Ok(());
    }

    let removed = store.unpin(&project, number)?;
    if !removed {
        bail!("issue #{number} was not pinned");
    }
    if args.json {
        print_json(&serde_json::json!({ "issue": number, "pinned": false }))?;
    } else {
        println!("Unpinned #{number}");
    }
    Ok(())
}
