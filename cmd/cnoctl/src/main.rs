use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pkg_constants::api::{DEFAULT_SERVER_URL, ENVIRONMENTS_PATH};
use pkg_types::environment::Environment;
use pkg_types::limit_range::LimitRange;
use pkg_types::namespace::Namespace;
use pkg_types::quota::ResourceQuota;
use pkg_types::rbac::RoleBinding;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::info;

#[derive(Parser)]
#[command(name = "cnoctl", about = "CLI tool for managing Environments")]
struct Cli {
    /// Operator API endpoint
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Bearer token for the operator API
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update an Environment from a YAML file
    Apply {
        #[arg(short = 'f', long)]
        file: String,
    },
    /// List Environments, or show one with its derived resources
    Get { name: Option<String> },
    /// Delete an Environment; its derived resources are collected
    Delete { name: String },
}

struct Client {
    http: reqwest::Client,
    server: String,
    token: Option<String>,
}

impl Client {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<Option<T>> {
        info!("GET {}", path);
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(checked(resp).await?.json().await?))
    }
}

/// Turn a non-success response into an error carrying the server's message.
async fn checked(resp: Response) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    match body["error"].as_str() {
        Some(message) => bail!("server returned {}: {}", status, message),
        None => bail!("server returned {}", status),
    }
}

fn environment_path(name: &str) -> String {
    format!("{}/{}", ENVIRONMENTS_PATH, name)
}

async fn apply(client: &Client, file: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("read {}", file))?;
    let mut env: Environment =
        serde_yaml::from_str(&content).with_context(|| format!("parse {}", file))?;
    let name = env.metadata.name.clone();
    let path = environment_path(&name);

    match client.get::<Environment>(&path).await? {
        None => {
            let resp = client
                .request(reqwest::Method::POST, ENVIRONMENTS_PATH)
                .json(&env)
                .send()
                .await?;
            checked(resp).await?;
            println!("environment/{} created", name);
        }
        Some(current) => {
            env.metadata.resource_version = current.metadata.resource_version;
            let resp = client
                .request(reqwest::Method::PUT, &path)
                .json(&env)
                .send()
                .await?;
            let updated: Environment = checked(resp).await?.json().await?;
            if updated.metadata.resource_version == current.metadata.resource_version {
                println!("environment/{} unchanged", name);
            } else {
                println!("environment/{} configured", name);
            }
        }
    }
    Ok(())
}

async fn list(client: &Client) -> anyhow::Result<()> {
    let envs: Vec<Environment> = client.get(ENVIRONMENTS_PATH).await?.unwrap_or_default();

    println!(
        "{:<24} {:<20} {:<6} {:<6} {:<8} {}",
        "NAME", "NAMESPACE", "PROD", "USERS", "STATUS", "CREATED"
    );
    for env in &envs {
        println!(
            "{:<24} {:<20} {:<6} {:<6} {:<8} {}",
            env.metadata.name,
            env.spec.name,
            env.spec.is_prod,
            env.spec.users.len(),
            env.status
                .environment_status
                .map_or_else(|| "-".to_string(), |p| p.to_string()),
            env.metadata
                .creation_timestamp
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
        );
    }
    if envs.is_empty() {
        println!("(no environments)");
    }
    Ok(())
}

async fn describe(client: &Client, name: &str) -> anyhow::Result<()> {
    let Some(env) = client.get::<Environment>(&environment_path(name)).await? else {
        bail!("environment '{}' not found", name);
    };
    print!("{}", serde_yaml::to_string(&env)?);
    if let Some(message) = &env.status.message {
        println!("# last error: {}", message);
    }

    let ns = &env.spec.name;
    println!();
    match client
        .get::<Namespace>(&format!("/api/v1/namespaces/{}", ns))
        .await?
    {
        Some(_) => println!("Namespace:      {}", ns),
        None => println!("Namespace:      {} (missing)", ns),
    }

    let quotas: Vec<ResourceQuota> = client
        .get(&format!("/api/v1/namespaces/{}/resourcequotas", ns))
        .await?
        .unwrap_or_default();
    for quota in &quotas {
        println!("ResourceQuota:  {}", quota.metadata.name);
        for (resource, quantity) in &quota.spec.hard {
            println!("  {:<28} {}", resource, quantity);
        }
    }

    let limit_ranges: Vec<LimitRange> = client
        .get(&format!("/api/v1/namespaces/{}/limitranges", ns))
        .await?
        .unwrap_or_default();
    for lr in &limit_ranges {
        println!("LimitRange:     {}", lr.metadata.name);
    }

    let bindings: Vec<RoleBinding> = client
        .get(&format!("/api/v1/namespaces/{}/rolebindings", ns))
        .await?
        .unwrap_or_default();
    for binding in &bindings {
        let subjects: Vec<&str> = binding.subjects.iter().map(|s| s.name.as_str()).collect();
        println!(
            "RoleBinding:    {} -> {} [{}]",
            binding.metadata.name,
            binding.role_ref.name,
            subjects.join(", ")
        );
    }
    Ok(())
}

async fn delete(client: &Client, name: &str) -> anyhow::Result<()> {
    let resp = client
        .request(reqwest::Method::DELETE, &environment_path(name))
        .send()
        .await?;
    checked(resp).await?;
    println!("environment/{} deleted", name);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let client = Client {
        http: reqwest::Client::builder().build()?,
        server: cli.server,
        token: cli.token,
    };

    match &cli.command {
        Commands::Apply { file } => apply(&client, file).await,
        Commands::Get { name: None } => list(&client).await,
        Commands::Get { name: Some(name) } => describe(&client, name).await,
        Commands::Delete { name } => delete(&client, name).await,
    }
}
