use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List backends with health and circuit state
    Backends,
    /// Add a backend to the rotation
    AddBackend { address: String },
    /// Remove a backend from the rotation
    RemoveBackend { address: String },
    /// Show response cache size
    Cache,
    /// Drop every cached response
    PurgeCache,
    /// Show circuit breaker state
    Circuit,
    /// Force the circuit breaker closed
    ResetCircuit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/admin/status", None),
        Commands::Backends => (Method::GET, "/admin/backends", None),
        Commands::AddBackend { address } => (
            Method::POST,
            "/admin/backends",
            Some(serde_json::json!({ "address": address })),
        ),
        Commands::RemoveBackend { address } => (
            Method::DELETE,
            "/admin/backends",
            Some(serde_json::json!({ "address": address })),
        ),
        Commands::Cache => (Method::GET, "/admin/cache", None),
        Commands::PurgeCache => (Method::DELETE, "/admin/cache", None),
        Commands::Circuit => (Method::GET, "/admin/circuit", None),
        Commands::ResetCircuit => (Method::POST, "/admin/circuit/reset", None),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
