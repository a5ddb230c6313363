// Terminal output helpers
use colored::Colorize;
use probe_core::{Phase, ProbeResult};
use std::time::Duration;

pub fn print_header(text: &str) {
    println!("\n{}", text.bold().cyan());
    println!("{}", "=".repeat(text.len()).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

pub fn print_result(result: &ProbeResult) {
    if result.succeeded {
        let status = result.status.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "\n{} {} {}",
            "OK".green().bold(),
            result.url.cyan(),
            format!("({})", status).dimmed()
        );
    } else {
        println!("\n{} {}", "FAIL".red().bold(), result.url.cyan());
        if let Some(detail) = &result.error_detail {
            println!("  {}", detail.red());
        }
    }

    for phase in [Phase::Dns, Phase::Connect, Phase::Tls] {
        let value = match result.phases.get(phase) {
            Some(d) => format_duration(d),
            None => "-".dimmed().to_string(),
        };
        println!("  {:<6} {}", phase.label(), value);
    }
    println!("  {:<6} {}", "total", format_duration(result.total_duration).bold());
}

fn format_duration(d: Duration) -> String {
    format!("{:.3} ms", d.as_secs_f64() * 1000.0)
}
