use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the lbproxy operator API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a rate limit override for a client IP
    Set {
        ip: String,
        max_tokens: i64,
        refill_rate: i64,
    },
    /// Show the limit in effect for a client IP
    Get { ip: String },
    /// Remove the override for a client IP
    Delete { ip: String },
    /// List backend liveness and connections
    Backends,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Set {
            ip,
            max_tokens,
            refill_rate,
        } => {
            client
                .post(format!("{}/api/ratelimit/config", base))
                .json(&json!({
                    "ip": ip,
                    "max_tokens": max_tokens,
                    "refill_rate": refill_rate,
                }))
                .send()
                .await?
        }
        Commands::Get { ip } => {
            client
                .get(format!("{}/api/ratelimit/config/{}", base, ip))
                .send()
                .await?
        }
        Commands::Delete { ip } => {
            client
                .delete(format!("{}/api/ratelimit/config/{}", base, ip))
                .send()
                .await?
        }
        Commands::Backends => client.get(format!("{}/api/backends", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
