mod api;
mod auth;
mod chat;
mod config;
mod core;
mod forms;
mod store;
mod tasks;
mod traits;
mod types;
mod utils;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod testing;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Handle CLI arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(first) = args.first() {
        match first.as_str() {
            "--version" | "-V" => {
                println!("ticktask {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("ticktask {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: ticktask [COMMAND] [ARGS]\n");
                println!("Commands:");
                println!("  login <email> <password>          Log in (dev-mode auth)");
                println!("  signup <email> <name> <password> <confirm>");
                println!("                                    Sign up and log in");
                println!("  logout                            Clear the stored session");
                println!("  whoami                            Show the current user");
                println!("  tasks [--status S] [--priority P] [--search Q] [--sort K]");
                println!("                                    List tasks (the default command)");
                println!("  add <title> [--description D] [--priority P] [--tags T]");
                println!("      [--due YYYY-MM-DD] [--recur R]  Create a task");
                println!("  show <id>                         Show one task in full");
                println!("  edit <id> [--title T] [--description D] [--priority P]");
                println!("      [--tags T] [--due YYYY-MM-DD] [--recur R]  Update a task");
                println!("  toggle <id>                       Flip a task's completion flag");
                println!("  rm <id>                           Delete a task");
                println!("  chat <message>                    Ask the assistant");
                println!("  history                           Show the stored conversation");
                println!("\nOptions:");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                return Ok(());
            }
            _ => {}
        }
    }

    let config_path = PathBuf::from("config.toml");
    let config = config::AppConfig::load(&config_path)?;

    // Run async
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(crate::core::run(config, &args))
}
