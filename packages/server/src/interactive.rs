//! Interactive mode for the server.
//!
//! Prompts for bind address, port and horizon refresh period before
//! starting the server.

use dialoguer::{Confirm, Input};

use crate::DEFAULT_REFRESH_SECS;

/// Runs the server in interactive mode, prompting for configuration.
///
/// Sets `BIND_ADDR`, `PORT` and `POPULATION_HORIZON_REFRESH_SECS` from
/// the answers and delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Population Trend Server");
    println!();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default("127.0.0.1".to_string())
        .interact_text()
        .unwrap_or_else(|_| "127.0.0.1".to_string());

    let port_str: String = Input::new()
        .with_prompt("Port")
        .default("8080".to_string())
        .interact_text()
        .unwrap_or_else(|_| "8080".to_string());

    let refresh_str: String = Input::new()
        .with_prompt("Horizon check interval in seconds (0 disables)")
        .default(DEFAULT_REFRESH_SECS.to_string())
        .interact_text()
        .unwrap_or_else(|_| DEFAULT_REFRESH_SECS.to_string());

    // SAFETY: no other threads read the environment yet; the server reads
    // these once during startup.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port_str);
        std::env::set_var("POPULATION_HORIZON_REFRESH_SECS", &refresh_str);
    }

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port_str}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
