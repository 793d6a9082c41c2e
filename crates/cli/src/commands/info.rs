//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{order_endpoints, CoreConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    dispatcher: DispatcherInfo,
    worker_pool: WorkerPoolInfo,
    request_log: RequestLogInfo,
    /// Active node URLs in dispatch order
    endpoint_order: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<NodeInfo>,
}

#[derive(Serialize)]
struct DispatcherInfo {
    timeout_ms: u64,
    retry_base_interval_ms: u64,
    max_attempts: u32,
}

#[derive(Serialize)]
struct WorkerPoolInfo {
    workers: usize,
    queue_capacity: usize,
    task_timeout_ms: u64,
    submit_grace_ms: u64,
}

#[derive(Serialize)]
struct RequestLogInfo {
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    workers: usize,
    queue_capacity: usize,
    max_attempts: u32,
    backoff_base_ms: u64,
}

#[derive(Serialize)]
struct NodeInfo {
    name: String,
    chain: String,
    network: String,
    url: String,
    priority: i32,
    is_active: bool,
    max_requests: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, args);
    }

    Ok(())
}

fn build_config_info(config: &CoreConfig, args: &InfoArgs) -> ConfigInfo {
    let nodes = if args.nodes {
        config
            .nodes
            .iter()
            .map(|n| NodeInfo {
                name: n.name.clone(),
                chain: n.chain.as_str().to_string(),
                network: n.network.clone(),
                url: n.url.clone(),
                priority: n.priority,
                is_active: n.is_active,
                max_requests: n.max_requests,
            })
            .collect()
    } else {
        Vec::new()
    };

    let log = &config.request_log;

    ConfigInfo {
        version: format!("{:?}", config.version),
        dispatcher: DispatcherInfo {
            timeout_ms: config.dispatcher.timeout_ms,
            retry_base_interval_ms: config.dispatcher.retry_base_interval_ms,
            max_attempts: config.dispatcher.max_attempts,
        },
        worker_pool: WorkerPoolInfo {
            workers: config.worker_pool.workers,
            queue_capacity: config.worker_pool.queue_capacity,
            task_timeout_ms: config.worker_pool.task_timeout_ms,
            submit_grace_ms: config.worker_pool.submit_grace_ms,
        },
        request_log: RequestLogInfo {
            store: format!("{:?}", log.store),
            path: log.path.as_ref().map(|p| p.display().to_string()),
            workers: log.workers,
            queue_capacity: log.queue_capacity,
            max_attempts: log.max_attempts,
            backoff_base_ms: log.backoff_base_ms,
        },
        endpoint_order: order_endpoints(&config.nodes),
        nodes,
    }
}

fn print_config_info(config: &CoreConfig, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  IronNode Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let dispatcher = &config.dispatcher;
    println!("🔀 Dispatcher");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Timeout: {}ms", dispatcher.timeout_ms);
    println!("   ├─ Retry base interval: {}ms", dispatcher.retry_base_interval_ms);
    println!("   └─ Max attempts: {}", dispatcher.max_attempts);

    let pool = &config.worker_pool;
    println!("\n⚙️  Worker Pool");
    println!("   ├─ Workers: {}", pool.workers);
    println!("   ├─ Queue capacity: {}", pool.queue_capacity);
    println!("   ├─ Task timeout: {}ms", pool.task_timeout_ms);
    println!("   └─ Submit grace: {}ms", pool.submit_grace_ms);

    let log = &config.request_log;
    println!("\n📝 Request Log");
    match &log.path {
        Some(path) => println!("   ├─ Store: {:?} ({})", log.store, path.display()),
        None => println!("   ├─ Store: {:?}", log.store),
    }
    println!("   ├─ Workers: {}", log.workers);
    println!("   ├─ Queue capacity: {}", log.queue_capacity);
    println!(
        "   └─ Retries: {} attempts, {}ms linear backoff",
        log.max_attempts, log.backoff_base_ms
    );

    let order = order_endpoints(&config.nodes);
    println!(
        "\n🌐 Nodes ({} configured, {} active)",
        config.nodes.len(),
        order.len()
    );
    if args.nodes {
        for (i, node) in config.nodes.iter().enumerate() {
            let is_last = i == config.nodes.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let state = if node.is_active { "active" } else { "inactive" };
            println!(
                "   {} {} [{} {}] {} (priority {}, {})",
                prefix,
                node.name,
                node.chain.as_str(),
                node.network,
                node.url,
                node.priority,
                state
            );
        }
    } else {
        for (i, url) in order.iter().enumerate() {
            let prefix = if i == order.len() - 1 { "└─" } else { "├─" };
            println!("   {} {}", prefix, url);
        }
    }

    println!();
}
