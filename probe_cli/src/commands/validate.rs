use crate::ui;
use anyhow::Result;
use colored::Colorize;
use probe_scheduler::discover_config;
use std::path::PathBuf;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    ui::print_header("Validating Config");

    match discover_config(config_path.as_deref()).await {
        Ok((path, config)) => {
            println!("File: {}", path.display());
            ui::print_success("Config is valid!");

            println!("\nResolved Settings:");
            println!("  Listen address: {}", config.listen_addr()?);
            println!("  Scrape interval: {:?}", config.scrape_interval());
            println!("  Request timeout: {:?}", config.request_timeout());
            println!("  URLs: {}", config.urls.len());

            for (i, url) in config.urls.iter().enumerate() {
                println!("    {}: {}", i + 1, url);
            }

            if config.request_timeout() >= config.scrape_interval() {
                println!(
                    "\n{}",
                    "⚠ Warning: request timeout is not shorter than the scrape interval".yellow()
                );
            }

            Ok(())
        }
        Err(e) => {
            ui::print_error("Config is invalid!");
            println!("\nError: {}", e);
            Err(e.into())
        }
    }
}
