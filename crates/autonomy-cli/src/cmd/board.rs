use crate::context::GlobalArgs;
use crate::output::{print_json, print_table};
use autonomy_core::board::FieldCache;
use autonomy_core::paths;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum BoardSubcommand {
    /// Show cached board field identifiers
    Fields,
    /// Record a field identifier (escape hatch when the transport cannot)
    SetField { name: String, id: String },
}

pub fn run(args: &GlobalArgs, subcmd: BoardSubcommand) -> anyhow::Result<()> {
    paths::require_initialized(&args.root)?;
    let cache = FieldCache::new(paths::field_cache_path(&args.root));

    match subcmd {
        BoardSubcommand::Fields => {
            let map = cache.load();
            if args.json {
                return print_json(&serde_json::json!({
                    "fields": map,
                    "missing": cache.missing_fields(),
                }));
            }
            let rows: Vec<Vec<String>> = map
                .iter()
                .map(|(name, id)| vec![name.clone(), id.clone()])
                .collect();
            print_table(&["FIELD", "ID"], rows);
            let missing = cache.missing_fields();
            if !missing.is_empty() {
                println!("missing: {}", missing.join(", "));
            }
            Ok(())
        }
        BoardSubcommand::SetField { name, id } => {
            cache.set(&name, &id)?;
            if args.json {
                print_json(&serde_json::json!({ "field": name, "id": id }))?;
            } else {
                println!("Cached field '{name}'");
            }
            Ok(())
        }
    }
}
