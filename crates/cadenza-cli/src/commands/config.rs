use anyhow::Result;
use cadenza_etl::{config, Config};
use std::path::Path;

/// Write the example config file to `path` (or the default location).
pub fn init_config(path: Option<&Path>) -> Result<()> {
    let target = path.map_or_else(config::config_file_path, Path::to_path_buf);

    if config::write_example_config(&target)? {
        println!("✓ Created config file: {}", target.display());
        println!("\nEdit it to set the credentials and the input/output roots.");
    } else {
        println!("Config file already exists: {}", target.display());
    }

    Ok(())
}

fn or_unset(value: Option<&Path>) -> String {
    value.map_or_else(|| "<not set>".to_string(), |p| p.display().to_string())
}

/// Show the current effective configuration.
pub fn show_config(config: &Config, path: Option<&Path>) {
    let config_path = path.map_or_else(config::config_file_path, Path::to_path_buf);

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    let secret = |value: Option<&String>| if value.is_some() { "<set>" } else { "<not set>" };

    println!("Settings:");
    println!("  aws_access_key_id: {}", secret(config.aws_access_key_id.as_ref()));
    println!("  aws_secret_access_key: {}", secret(config.aws_secret_access_key.as_ref()));
    println!("  input_data: {}", or_unset(config.input_data.as_deref()));
    println!("  output_data: {}", or_unset(config.output_data.as_deref()));
    println!("  catalog_dir: {}", config.catalog_dir);
    println!("  events_dir: {}", config.events_dir);
    println!("  on_malformed: {:?}", config.on_malformed);
    println!("  user_granularity: {:?}", config.user_granularity);
    println!("  duration_tolerance_secs: {}", config.duration_tolerance_secs);
    println!("  state_path: {}", config.state_path.display());

    println!("\nPriority: ENV vars (CADENZA_*) > Config file > Defaults");
}
