// src/bin/shortener_cli.rs

use prettytable::{row, Table};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::time;
use tracing::{info, warn};

use url_shortener::admission::AdmissionPolicy;
use url_shortener::allocator::base62;
use url_shortener::logging;
use url_shortener::{LinkService, LinkSnapshot, ShortenerConfig, ShortenerError};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "shortener_cli",
    about = "A CLI for exercising the link registry and admission control"
)]
struct Opt {
    /// JSON configuration file; SHORTENER_* environment variables are used otherwise
    #[structopt(short, long)]
    config: Option<String>,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Create a link, resolve it, clear the registry and resolve again
    Demo {
        /// Destination to shorten
        #[structopt(default_value = "https://example.com")]
        long_url: String,
    },

    /// Simulate a client hitting the admission controller
    Simulate {
        /// Client identifier to rate limit
        #[structopt(short, long, default_value = "127.0.0.1")]
        key: String,

        /// Simulation mode
        #[structopt(long, possible_values = &["burst", "steady"], default_value = "burst")]
        simulation: String,

        /// Number of requests to simulate
        #[structopt(short = "n", long, default_value = "20")]
        num_requests: usize,

        /// Time between requests in milliseconds (steady mode)
        #[structopt(short = "t", long, default_value = "100")]
        request_interval_ms: u64,
    },

    /// Interactive session against an in-memory registry
    Repl {
        /// Client identifier used for admission checks on create
        #[structopt(long, default_value = "repl")]
        client: String,
    },
}

type Service = LinkService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let opt = Opt::from_args();

    let directive = if opt.disable_logs {
        "shortener_cli=error,url_shortener=error".to_string()
    } else {
        let level = match opt.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("shortener_cli={},url_shortener={}", level, level)
    };
    logging::init_with_default(&directive);

    let config = match &opt.config {
        Some(path) => ShortenerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => ShortenerConfig::from_env()?,
    };
    info!(
        cache_capacity = config.cache.capacity,
        burst = config.admission.capacity,
        refill_rate = config.admission.refill_rate,
        "Configuration loaded"
    );

    let service = Arc::new(LinkService::from_config(&config)?);
    let reclaimer = config
        .reclamation
        .enabled
        .then(|| service.spawn_reclaimer(config.reclamation.interval));

    let outcome = match opt.command {
        Command::Demo { long_url } => run_demo(&service, &long_url).await,
        Command::Simulate {
            key,
            simulation,
            num_requests,
            request_interval_ms,
        } => {
            let interval = match simulation.as_str() {
                "burst" => None,
                _ => Some(Duration::from_millis(request_interval_ms)),
            };
            simulate(&service, &key, num_requests, interval).await
        }
        Command::Repl { client } => run_repl(&service, &client).await,
    };

    if let Some(handle) = reclaimer {
        handle.abort();
    }
    outcome
}

async fn run_demo(service: &Service, long_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let created = service.create_link(long_url, None, 0).await?;
    println!(
        "Created {} -> {} (id {})",
        created.short_url,
        created.record.long_url,
        base62::decode(&created.code).unwrap_or_default()
    );
    service
        .create_link("https://www.rust-lang.org", Some("rust"), 0)
        .await?;
    service
        .create_link("https://example.com/flash-sale", Some("flash"), 1)
        .await?;

    for _ in 0..3 {
        let target = service.resolve_link(&created.code).await?;
        println!("Resolved {} -> {}", created.code, target);
    }
    service.resolve_link("rust").await?;

    print_links(&service.list_links().await?);
    print_summary(service).await?;

    time::sleep(Duration::from_millis(1100)).await;
    match service.resolve_link("flash").await {
        Err(ShortenerError::NotFound(code)) => println!("'{}' expired as expected", code),
        other => warn!("Expected 'flash' to have expired, got {:?}", other),
    }

    service.clear_all().await?;
    match service.resolve_link(&created.code).await {
        Err(err) => println!("After clear: {}", err),
        Ok(target) => warn!("Link survived clear: {}", target),
    }

    Ok(())
}

// Simulate requests from one client, back to back or at a fixed interval
async fn simulate(
    service: &Service,
    key: &str,
    num_requests: usize,
    interval: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Simulating {} requests for client: {}", num_requests, key);

    let mut allowed_count = 0;
    let mut denied_count = 0;
    let start_time = Instant::now();

    for i in 0..num_requests {
        let request_time = Instant::now();
        let status = service.admission().check(key).await;

        if status.allowed {
            allowed_count += 1;
            info!(
                "Request {}: ALLOWED (remaining: {:.2})",
                i + 1,
                status.remaining
            );
        } else {
            denied_count += 1;
            warn!(
                "Request {}: DENIED (retry after: {:?})",
                i + 1,
                status.retry_after
            );
        }

        if let Some(interval) = interval {
            let elapsed = request_time.elapsed();
            if elapsed < interval {
                time::sleep(interval - elapsed).await;
            }
        }
    }

    println!("\nSimulation Results:");
    println!("-------------------");
    println!("Total requests: {}", num_requests);
    println!("Allowed: {}", allowed_count);
    println!("Denied: {}", denied_count);
    println!("Time elapsed: {:?}", start_time.elapsed());

    Ok(())
}

async fn run_repl(service: &Service, client: &str) -> Result<(), Box<dyn std::error::Error>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            // second interrupt while blocked on input: give up immediately
            if interrupted.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            println!("\nInterrupted; press Enter for the session summary");
        })?;
    }

    println!("Commands: create <url> [alias] [ttl], resolve <code>, delete <code>, list, stats, top [n], clear, quit");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] | ["q"] => break,
            ["create", url, rest @ ..] => {
                if !service.check_admission(client).await {
                    println!("Rate limit exceeded. Try again shortly.");
                    continue;
                }
                let alias = rest.first().copied().filter(|alias| *alias != "-");
                let ttl = match rest.get(1).map(|raw| raw.parse::<u64>()) {
                    Some(Ok(ttl)) => ttl,
                    Some(Err(_)) => {
                        println!("ttl must be a whole number of seconds");
                        continue;
                    }
                    None => 0,
                };
                match service.create_link(url, alias, ttl).await {
                    Ok(created) => println!("{}", created.short_url),
                    Err(err) => println!("{}", err),
                }
            }
            ["resolve", code] => match service.resolve_link(code).await {
                Ok(target) => println!("{}", target),
                Err(err) => println!("{}", err),
            },
            ["delete", code] => {
                if service.delete_link(code).await? {
                    println!("deleted");
                } else {
                    println!("{}", ShortenerError::NotFound(code.to_string()));
                }
            }
            ["list"] => print_links(&service.list_links().await?),
            ["stats"] => print_summary(service).await?,
            ["top", rest @ ..] => {
                let limit = rest.first().and_then(|n| n.parse().ok()).unwrap_or(10);
                let mut table = Table::new();
                table.add_row(row!["Code", "Clicks", "Long URL"]);
                for record in service.top_links(limit).await? {
                    table.add_row(row![record.code, record.clicks, record.long_url]);
                }
                table.printstd();
            }
            ["clear"] => {
                service.clear_all().await?;
                println!("cleared");
            }
            _ => println!("unrecognised command: {}", line.trim()),
        }
    }

    println!("\nSession Results:");
    println!("----------------");
    print_summary(service).await?;
    Ok(())
}

fn print_links(links: &[LinkSnapshot]) {
    let mut table = Table::new();
    table.add_row(row!["Code", "Long URL", "Clicks", "Created", "Expires", "Expired"]);
    for link in links {
        let record = &link.record;
        table.add_row(row![
            record.code,
            record.long_url,
            record.clicks,
            record.created_at.to_rfc3339(),
            record
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
            link.expired
        ]);
    }
    table.printstd();
}

async fn print_summary(service: &Service) -> Result<(), Box<dyn std::error::Error>> {
    let summary = service.get_summary().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
