use aide::providers::registry::{BackendFamily, ModelRegistry};
use anyhow::Result;
use console::style;
use strum::IntoEnumIterator;

pub fn execute() -> Result<()> {
    let models = ModelRegistry::builtin().list();

    for family in BackendFamily::iter() {
        println!("{}", style(family).bold().cyan());
        for (id, info) in models.iter().filter(|(_, info)| info.backend_family == family) {
            let mut flags = Vec::new();
            if info.supports_tools {
                flags.push("tools");
            }
            if info.supports_vision {
                flags.push("vision");
            }

            println!(
                "  {} {}",
                style(id).bold().green(),
                style(format!("({})", info.display_name)).dim(),
            );
            println!(
                "      {}  max tokens {}  {}",
                info.backend_model_id,
                info.max_tokens,
                flags.join(", ")
            );
        }
    }
    Ok(())
}
