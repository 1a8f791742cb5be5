//! Line Chat Client - Entry Point
//!
//! Connects to the server, asks for a nickname and relays the terminal.

use clap::Parser;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use line_chat::{ChatClient, ClientArgs, JoinOutcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never mix with chat output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = ClientArgs::parse();
    let mut client = ChatClient::connect(&args.server_addr()).await?;

    let mut stdout = io::stdout();
    let mut input = BufReader::new(io::stdin()).lines();

    stdout.write_all(b"Enter your nickname: ").await?;
    stdout.flush().await?;
    let nickname = input.next_line().await?.unwrap_or_default();

    match client.join(&nickname).await? {
        JoinOutcome::Rejected(line) => {
            println!("{}", line);
            return Ok(());
        }
        JoinOutcome::Welcome(line) => println!("{}", line),
    }

    client.run(input, stdout).await?;
    Ok(())
}
