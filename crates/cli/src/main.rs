use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mooring_codec::{rule_key, synthetic_service_id, Codec};
use mooring_core::{CodecConfig, Direction, ResourceId};
use serde_json::{json, Value};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mooringctl", version, about = "Expand and compact ingress rule state")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Json)]
    output: Output,

    /// Kubernetes namespace
    #[arg(long = "ns", global = true, env = "MOORING_NS")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Json, Yaml }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn a stored ingress document into its client view
    Expand {
        /// Ingress id (namespace:name); defaults to the document's own identity
        #[arg(long = "id")]
        id: Option<String>,
        /// JSON or YAML document; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Turn a client-view ingress document into its storage form
    Compact {
        /// Ingress id (namespace:name); defaults to the document's own identity
        #[arg(long = "id")]
        id: Option<String>,
        /// JSON or YAML document; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Print the state key and generated service id for one rule slot
    Key {
        #[arg(long = "name")]
        name: String,
        #[arg(long = "host", default_value = "")]
        host: String,
        #[arg(long = "path", default_value = "/")]
        path: String,
        #[arg(long = "port", default_value = "")]
        port: String,
    },
    /// Fetch a live Ingress and print its client view
    Show {
        name: String,
    },
    /// List live Ingresses as client views
    Ls,
}

fn init_tracing() {
    let env = std::env::var("MOORING_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MOORING_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MOORING_METRICS_ADDR; expected host:port");
        }
    }
}

/// Read JSON, falling back to YAML, from a file or stdin.
fn read_doc(file: Option<&Path>) -> Result<Value> {
    let text = match file {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("reading stdin")?;
            s
        }
    };
    if let Ok(v) = serde_json::from_str::<Value>(&text) {
        return Ok(v);
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(&text).context("document is neither JSON nor YAML")?;
    serde_json::to_value(yaml).context("converting YAML to JSON")
}

/// Explicit `--id`, else the document's `id`, else `namespaceId:name` (or `--ns` + name).
fn resolve_id(doc: &Value, explicit: Option<String>, ns: Option<&str>) -> Result<String> {
    if let Some(id) = explicit {
        return Ok(id);
    }
    let field = |k: &str| doc.get(k).and_then(|v| v.as_str()).filter(|s| !s.is_empty());
    if let Some(id) = field("id") {
        return Ok(id.to_string());
    }
    let name = field("name").ok_or_else(|| anyhow!("cannot tell ingress identity; pass --id"))?;
    let namespace = field("namespaceId").or(ns).unwrap_or("");
    Ok(ResourceId::new(namespace, name).to_string())
}

fn print(output: Output, v: &Value) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(v)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(v)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let codec = Codec::new(CodecConfig::from_env());
    let ns = cli.namespace.as_deref();

    match cli.command {
        Commands::Expand { id, file } => {
            let mut doc = read_doc(file.as_deref())?;
            let id = resolve_id(&doc, id, ns)?;
            info!(id = %id, "expand invoked");
            codec.transform(&id, &mut doc, Direction::ToClient);
            print(cli.output, &doc)?;
        }
        Commands::Compact { id, file } => {
            let mut doc = read_doc(file.as_deref())?;
            let id = resolve_id(&doc, id, ns)?;
            info!(id = %id, "compact invoked");
            codec.transform(&id, &mut doc, Direction::ToStorage);
            print(cli.output, &doc)?;
        }
        Commands::Key { name, host, path, port } => {
            let rid = ResourceId::new(ns.unwrap_or(""), name);
            let key = rule_key(&rid, &host, &path, &port);
            let service_id = synthetic_service_id(&codec.config().id_prefix, &key)?;
            print(cli.output, &json!({ "key": key, "serviceId": service_id }))?;
        }
        Commands::Show { name } => {
            let ns = ns.unwrap_or("default");
            info!(ns = %ns, name = %name, "show invoked");
            let client = mooring_kubehub::get_kube_client().await?;
            let ing = mooring_kubehub::fetch_ingress(client, ns, &name).await?;
            let mut doc = mooring_kubehub::ingress_to_doc(&ing);
            let id = resolve_id(&doc, None, Some(ns))?;
            codec.transform(&id, &mut doc, Direction::ToClient);
            print(cli.output, &doc)?;
        }
        Commands::Ls => {
            info!(ns = ?ns, "ls invoked");
            let client = mooring_kubehub::get_kube_client().await?;
            let mut out = Vec::new();
            for ing in mooring_kubehub::list_ingresses(client, ns).await? {
                let mut doc = mooring_kubehub::ingress_to_doc(&ing);
                match resolve_id(&doc, None, ns) {
                    Ok(id) => {
                        codec.transform(&id, &mut doc, Direction::ToClient);
                        out.push(doc);
                    }
                    Err(e) => error!(error = %e, "skipping ingress without identity"),
                }
            }
            print(cli.output, &Value::Array(out))?;
        }
    }

    Ok(())
}
