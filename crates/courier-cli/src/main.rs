//! Courier CLI - relay server and interactive messaging client

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use courier_app::{ClientConfig, Messenger, RelayClient};
use courier_core::Identity;
use courier_relay::{RegistrationPolicy, RelayConfig, RelayServer};

/// Courier - end-to-end encrypted store-and-forward messaging
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Listen address
        #[arg(long, env = "COURIER_BIND", default_value = "0.0.0.0:65432")]
        bind: SocketAddr,

        /// Connections served at once; extra clients wait
        #[arg(long, env = "COURIER_MAX_CONNECTIONS", default_value_t = 256)]
        max_connections: usize,

        /// Close connections idle for this many seconds
        #[arg(long, env = "COURIER_READ_TIMEOUT_SECS")]
        read_timeout_secs: Option<u64>,

        /// Largest accepted request document in bytes
        #[arg(long, env = "COURIER_MAX_REQUEST_SIZE", default_value_t = 1024 * 1024)]
        max_request_size: usize,

        /// Only accept registrations carrying a valid proof of key possession
        #[arg(long, env = "COURIER_REQUIRE_PROOF")]
        require_proof: bool,
    },

    /// Register and chat interactively
    Chat {
        /// Your user id
        user_id: String,

        /// Relay address
        #[arg(long, env = "COURIER_SERVER", default_value = "127.0.0.1:65432")]
        server: SocketAddr,

        /// PKCS#8 PEM private key; created on first use
        #[arg(long, env = "COURIER_KEY_FILE")]
        key_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        Commands::Chat { .. } => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    match cli.command {
        Commands::Serve {
            bind,
            max_connections,
            read_timeout_secs,
            max_request_size,
            require_proof,
        } => {
            let config = RelayConfig {
                bind_addr: bind,
                max_connections,
                read_timeout: read_timeout_secs.map(Duration::from_secs),
                max_request_size,
                registration: if require_proof {
                    RegistrationPolicy::ProofOfPossession
                } else {
                    RegistrationPolicy::Open
                },
            };
            cmd_serve(config).await?
        }
        Commands::Chat {
            user_id,
            server,
            key_file,
        } => cmd_chat(&user_id, server, key_file.as_deref()).await?,
    }

    Ok(())
}

async fn cmd_serve(config: RelayConfig) -> Result<()> {
    let server = RelayServer::bind(config.clone())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    server.run().await?;
    Ok(())
}

async fn cmd_chat(user_id: &str, server: SocketAddr, key_file: Option<&Path>) -> Result<()> {
    let identity = load_or_generate(user_id, key_file)?;
    let relay = RelayClient::new(ClientConfig {
        server_addr: server,
        ..ClientConfig::default()
    });
    let messenger = Messenger::new(identity, relay);

    let confirmation = messenger
        .register()
        .await
        .context("Failed to register public key")?;
    println!("{}", confirmation);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(action) = prompt(&mut input, "\nChoose an action (send, check, exit): ").await?
        else {
            break;
        };
        match action.trim().to_lowercase().as_str() {
            "send" => {
                let Some(recipient) = prompt(&mut input, "Enter recipient ID: ").await? else {
                    break;
                };
                let Some(message) = prompt(&mut input, "Enter your message: ").await? else {
                    break;
                };
                match messenger.send(recipient.trim(), &message).await {
                    Ok(confirmation) => println!("{}", confirmation),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "check" => cmd_check(&messenger).await,
            "exit" => break,
            _ => println!("Invalid action. Please choose 'send', 'check', or 'exit'."),
        }
    }

    Ok(())
}

async fn cmd_check(messenger: &Messenger) {
    let deliveries = match messenger.check().await {
        Ok(deliveries) => deliveries,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };

    if deliveries.is_empty() {
        println!("No new messages.");
        return;
    }
    for delivery in deliveries {
        match delivery.outcome {
            Ok(text) => {
                println!("\n--- Decrypted Message from {} ---", delivery.sender_id);
                println!("{}", text);
                println!("---------------------------------------");
            }
            Err(rejection) => {
                println!(
                    "Message from {} rejected: {}",
                    delivery.sender_id, rejection
                );
            }
        }
    }
}

/// Print `text` and read one line; `None` at end of input
async fn prompt(input: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    io::stdout().flush()?;
    Ok(input.next_line().await?)
}

fn load_or_generate(user_id: &str, key_file: Option<&Path>) -> Result<Identity> {
    let Some(path) = key_file else {
        return Identity::generate(user_id).context("Failed to generate identity");
    };

    if path.exists() {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Identity::from_pkcs8_pem(user_id, &pem)
            .with_context(|| format!("Invalid private key in {}", path.display()));
    }

    let identity = Identity::generate(user_id).context("Failed to generate identity")?;
    let pem = identity.to_pkcs8_pem()?;
    std::fs::write(path, pem.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("New identity saved to {}", path.display());
    Ok(identity)
}
