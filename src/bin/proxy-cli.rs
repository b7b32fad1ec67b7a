use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for mesh-proxy", long_about = None)]
struct Cli {
    #[arg(short, long, env = "MESH_PROXY_ADMIN_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key, if the API requires one.
    #[arg(short, long, env = "MESH_PROXY_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy status
    Status,
    /// List services
    List,
    /// Show one service
    Get { name: String },
    /// Add a service
    Add {
        name: String,
        backend: String,
        /// Path prefix routed to the backend (repeatable)
        #[arg(short, long = "path")]
        paths: Vec<String>,
        #[arg(long)]
        strip_prefix: bool,
        /// Enable health checks against this path
        #[arg(long)]
        health_path: Option<String>,
        #[arg(long)]
        health_interval_ms: Option<u64>,
        #[arg(long)]
        skip_verify: bool,
    },
    /// Remove a service
    Remove { name: String },
    /// Show health of every service
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/api/status", base)).send().await?,
        Commands::List => client.get(format!("{}/api/services", base)).send().await?,
        Commands::Get { name } => {
            client
                .get(format!("{}/api/services/{}", base, name))
                .send()
                .await?
        }
        Commands::Add {
            name,
            backend,
            paths,
            strip_prefix,
            health_path,
            health_interval_ms,
            skip_verify,
        } => {
            let body = json!({
                "name": name,
                "backend": backend,
                "paths": paths,
                "stripPrefix": strip_prefix,
                "healthCheck": {
                    "enabled": health_path.is_some(),
                    "path": health_path.unwrap_or_default(),
                    "intervalMs": health_interval_ms,
                },
                "tls": {
                    "enabled": backend.starts_with("https://"),
                    "skipVerify": skip_verify,
                },
            });
            client
                .post(format!("{}/api/services", base))
                .json(&body)
                .send()
                .await?
        }
        Commands::Remove { name } => {
            client
                .delete(format!("{}/api/services/{}", base, name))
                .send()
                .await?
        }
        Commands::Health => client.get(format!("{}/api/health", base)).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
