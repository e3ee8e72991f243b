use std::sync::Arc;

use chore_board::app::{App, prompt};
use chore_board::config::ClientConfig;
use chore_board::render::TerminalRenderer;
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the rendered board
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("🧹 Chore Board v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Origin: {}", config.origin);

    let app = App::new(config.clone(), Arc::new(TerminalRenderer::new()))?;

    if config.resolve_ip {
        app.resolve_base_url().await;
    }
    eprintln!("   API: {}/api", app.base_url());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // ── Login ───────────────────────────────────────────────────────────
    let name = match config.user.clone() {
        Some(name) => name,
        None => prompt(&mut lines, "Name").await?,
    };
    let password = match config.password.clone() {
        Some(password) => password,
        None => SecretString::from(prompt(&mut lines, "Password").await?),
    };

    let user = match app.login(&name, &password).await {
        Ok(user) => user,
        Err(_) => {
            eprintln!("Invalid credentials. Please try again.");
            std::process::exit(1);
        }
    };
    eprintln!(
        "   Logged in as {} ({})",
        user.name,
        if user.is_admin { "admin" } else { "cleaner" }
    );

    // ── Push + first render ─────────────────────────────────────────────
    let push = app.start_push()?;
    app.synchronizer().resync().await;
    eprintln!("   Type 'help' for commands.\n");

    app.run(&mut lines).await?;

    if let Some(push) = push {
        push.shutdown().await;
    }
    Ok(())
}
