//! Terminal output formatting.

use beacon_core::ServerConfig;
use beacon_web::routes::broadcast::BroadcastResponse;
use beacon_web::routes::status::StatusResponse;
use colored::Colorize;

/// Print the startup banner for `beacon serve`.
pub fn print_banner(config: &ServerConfig) {
    let addr = config.bind_addr();

    println!();
    println!("  {} {}", "Beacon".cyan().bold(), "WebSocket Server".bold());
    println!();
    println!("  {}     http://{}", "Client".green(), addr);
    println!("  {}     http://{}/status", "Status".green(), addr);
    println!("  {}  ws://{}/ws", "WebSocket".green(), addr);
    println!();
    println!(
        "  {}",
        format!(
            "Notifications every {}s, drain timeout {}s, shutdown timeout {}s",
            config.notification_interval_secs,
            config.drain_timeout_secs,
            config.shutdown_timeout_secs
        )
        .dimmed()
    );
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();
}

/// Print the response of `GET /status`.
pub fn print_status(url: &str, status: &StatusResponse) {
    let state = if status.status == "running" {
        status.status.green()
    } else {
        status.status.yellow()
    };
    println!("{}: {}", "Server".bold(), url);
    println!("{}: {}", "Status".bold(), state);
    println!("{}: {}", "Connections".bold(), status.connections);
    println!("{}: {}", "Timestamp".bold(), status.timestamp.dimmed());
}

/// Print the response of `POST /broadcast`.
pub fn print_broadcast(response: &BroadcastResponse) {
    println!(
        "{} {} {}",
        "✓".green(),
        format!("\"{}\"", response.message).cyan(),
        format!("sent to {} client(s)", response.recipients).dimmed()
    );
}
