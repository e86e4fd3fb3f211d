use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Query a running health-engine responder", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Responder path to query.
    #[arg(short, long, default_value = "/health-check")]
    path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show aggregate health and per-check state
    Status {
        /// Aggregate to query: ready or alive
        #[arg(short = 't', long = "type", default_value = "ready")]
        check_type: String,

        /// Only report these checks (repeatable)
        #[arg(short, long)]
        name: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status { check_type, name } => {
            let mut query = vec![("type", check_type)];
            query.extend(name.into_iter().map(|n| ("name", n)));

            let res = client
                .get(format!("{}{}", cli.url.trim_end_matches('/'), cli.path))
                .query(&query)
                .send()
                .await?;
            let healthy = print_response(res).await?;
            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Print the response body; returns whether the responder reported healthy.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }

    if status.is_success() {
        Ok(true)
    } else {
        eprintln!("Responder returned status {status}");
        Ok(false)
    }
}
