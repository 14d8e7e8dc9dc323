use sitetables::{OutputFormat, SiteTablesConfig};

pub fn run(config: &SiteTablesConfig, output_format: OutputFormat) {
    match output_format {
        OutputFormat::Json | OutputFormat::JsonLine => match serde_json::to_string(config) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(config) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        _ => println!("{}", config.summary()),
    }
}
