use colored::Colorize;
use serde_json::{json, Map, Value};

use crate::cli::ConfigCommands;
use crate::config::{CliConfig, CONFIG_KEYS};
use crate::error::{CliError, Result};

/// Print `value` as JSON, or the human line otherwise
fn report(json_output: bool, value: Value, human: impl FnOnce()) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        human();
    }
    Ok(())
}

fn shown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

pub fn handle_config(command: ConfigCommands, json_output: bool) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = CliConfig::config_file_path()?;
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists, pass --force to replace it",
                    path.display()
                )));
            }
            CliConfig::default().save_to(&path)?;

            report(json_output, json!({ "success": true, "path": path }), || {
                println!("{} Wrote {}", "✓".green(), path.display());
                println!(
                    "  Point it at an issuer with `ghostpass config set default_server <host>`"
                );
            })
        }

        ConfigCommands::Set { key, value } => {
            let mut config = CliConfig::load()?;
            config.set(&key, &value)?;
            config.save()?;

            let now = config.get(&key)?;
            report(
                json_output,
                json!({ "success": true, "key": key, "value": now }),
                || println!("{} {key} = {}", "✓".green(), shown(&now)),
            )
        }

        ConfigCommands::Get { key: Some(key) } => {
            let value = CliConfig::load()?.get(&key)?;
            report(json_output, json!({ key.as_str(): value }), || {
                println!("{key} = {}", shown(&value))
            })
        }

        ConfigCommands::Get { key: None } => {
            let config = CliConfig::load()?;
            let mut values = Vec::with_capacity(CONFIG_KEYS.len());
            for key in CONFIG_KEYS {
                values.push((*key, config.get(key)?));
            }

            let map: Map<String, Value> = values
                .iter()
                .map(|(key, value)| (key.to_string(), json!(value)))
                .collect();
            report(json_output, Value::Object(map), || {
                println!("{}", "Configuration:".bright_cyan());
                for (key, value) in &values {
                    println!("  {key}: {}", shown(value));
                }
            })
        }

        ConfigCommands::Path => {
            let path = CliConfig::config_file_path()?;
            report(json_output, json!({ "config_path": path }), || {
                println!("{}", path.display())
            })
        }
    }
}
