// src/bin/shortener_bench.rs

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use structopt::StructOpt;
use tokio::sync::{Barrier, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use url_shortener::config::{CacheConfig, TokenBucketConfig};
use url_shortener::logging;
use url_shortener::{LinkService, ShortenerConfig, ShortenerError};

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "shortener_bench",
    about = "A benchmarking tool for the link registry, cache and admission control"
)]
struct Opt {
    /// Number of concurrent clients to simulate
    #[structopt(short = "u", long, default_value = "10")]
    num_users: usize,

    /// Links created by each client before resolving
    #[structopt(short = "l", long, default_value = "100")]
    links_per_user: usize,

    /// Resolves issued by each client
    #[structopt(short = "r", long, default_value = "1000")]
    resolves_per_user: usize,

    /// Share of resolves aimed at the hottest 10% of codes
    #[structopt(long, default_value = "0.8")]
    hot_ratio: f64,

    /// Recency cache capacity
    #[structopt(long, default_value = "100")]
    cache_capacity: usize,

    /// Admission burst per client; large by default so creates are not throttled
    #[structopt(long, default_value = "1000000")]
    burst: u64,

    /// Number of iterations to run
    #[structopt(short, long, default_value = "3")]
    iterations: usize,

    /// Maximum concurrency level
    #[structopt(short = "c", long, default_value = "100")]
    concurrency: usize,

    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Disable logs
    #[structopt(long)]
    disable_logs: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    created: usize,
    throttled: usize,
    resolved: usize,
    missing: usize,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.created += other.created;
        self.throttled += other.throttled;
        self.resolved += other.resolved;
        self.missing += other.missing;
    }

    fn operations(&self) -> usize {
        self.created + self.throttled + self.resolved + self.missing
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let opt = Opt::from_args();

    let directive = if opt.disable_logs {
        "shortener_bench=error,url_shortener=error".to_string()
    } else {
        let level = match opt.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("shortener_bench={},url_shortener={}", level, level)
    };
    logging::init_with_default(&directive);

    let config = ShortenerConfig {
        cache: CacheConfig {
            capacity: opt.cache_capacity,
        },
        admission: TokenBucketConfig {
            capacity: opt.burst,
            ..TokenBucketConfig::default()
        },
        ..ShortenerConfig::default()
    };

    info!(
        users = opt.num_users,
        links_per_user = opt.links_per_user,
        resolves_per_user = opt.resolves_per_user,
        cache_capacity = opt.cache_capacity,
        "Starting benchmark"
    );

    println!("\nRunning benchmark: link service (memory)");
    println!("========================================");

    let mut total_duration = Duration::from_secs(0);
    let mut total = Tally::default();

    for iteration in 0..opt.iterations {
        // fresh registry per iteration
        let service = Arc::new(LinkService::from_config(&config)?);
        let (tally, elapsed) = run_iteration(Arc::clone(&service), &opt).await;

        total_duration += elapsed;
        total.merge(tally);

        let summary = service.get_summary().await?;
        println!(
            "Iteration {}: {:?}, {} created, {} throttled, {} resolved, {} missing, {:.2} ops/sec, top code {:?} ({} clicks)",
            iteration + 1,
            elapsed,
            tally.created,
            tally.throttled,
            tally.resolved,
            tally.missing,
            tally.operations() as f64 / elapsed.as_secs_f64(),
            summary.top_code,
            summary.top_clicks
        );
    }

    let iterations = opt.iterations.max(1);
    println!("\nBenchmark Results:");
    println!("  Total Operations:   {}", total.operations());
    println!("  Links Created:      {}", total.created);
    println!("  Creates Throttled:  {}", total.throttled);
    println!("  Resolves:           {}", total.resolved);
    println!("  Resolve Misses:     {}", total.missing);
    println!("  Avg. Duration:      {:?}", total_duration / iterations as u32);
    println!(
        "  Avg. Throughput:    {:.2} operations/second",
        total.operations() as f64 / total_duration.as_secs_f64()
    );

    Ok(())
}

async fn run_iteration(service: Arc<LinkService>, opt: &Opt) -> (Tally, Duration) {
    let operations = (opt.num_users * (opt.links_per_user + opt.resolves_per_user)) as u64;
    let progress = ProgressBar::new(operations);
    if opt.disable_logs {
        progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")
    {
        progress.set_style(style);
    }

    let start_time = Instant::now();

    // Create a barrier to start all tasks at once
    let barrier = Arc::new(Barrier::new(opt.num_users));
    let concurrency_semaphore = Arc::new(Semaphore::new(opt.concurrency));
    let mut handles = Vec::with_capacity(opt.num_users);

    for user_id in 0..opt.num_users {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let semaphore = Arc::clone(&concurrency_semaphore);
        let progress = progress.clone();
        let client = format!("10.0.0.{}", user_id);
        let links_per_user = opt.links_per_user;
        let resolves_per_user = opt.resolves_per_user;
        let hot_ratio = opt.hot_ratio;
        let disable_logs = opt.disable_logs;

        handles.push(tokio::spawn(async move {
            barrier.wait().await;

            let mut tally = Tally::default();
            let mut codes = Vec::with_capacity(links_per_user);

            for _ in 0..links_per_user {
                let Ok(_permit) = semaphore.acquire().await else {
                    break;
                };
                if !service.check_admission(&client).await {
                    tally.throttled += 1;
                } else {
                    let long_url = format!("https://example.com/{}", Uuid::new_v4());
                    match service.create_link(&long_url, None, 0).await {
                        Ok(created) => {
                            tally.created += 1;
                            codes.push(created.code);
                        }
                        Err(err) => {
                            if !disable_logs {
                                warn!("Create failed: {}", err);
                            }
                        }
                    }
                }
                progress.inc(1);
            }

            for _ in 0..resolves_per_user {
                let Ok(_permit) = semaphore.acquire().await else {
                    break;
                };
                let code = pick_code(&codes, hot_ratio);
                match code {
                    Some(code) => match service.resolve_link(code).await {
                        Ok(_) => tally.resolved += 1,
                        Err(ShortenerError::NotFound(_)) => tally.missing += 1,
                        Err(err) => {
                            if !disable_logs {
                                warn!("Resolve failed: {}", err);
                            }
                        }
                    },
                    None => tally.missing += 1,
                }
                progress.inc(1);
            }

            tally
        }));
    }

    let mut tally = Tally::default();
    for result in futures::future::join_all(handles).await {
        match result {
            Ok(user_tally) => tally.merge(user_tally),
            Err(err) => warn!("Benchmark task failed: {}", err),
        }
    }
    progress.finish_and_clear();

    (tally, start_time.elapsed())
}

/// Skewed pick: `hot_ratio` of picks land in the first tenth of `codes`
fn pick_code(codes: &[String], hot_ratio: f64) -> Option<&str> {
    if codes.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    let hot = (codes.len() / 10).max(1);
    let index = if rng.random_bool(hot_ratio.clamp(0.0, 1.0)) {
        rng.random_range(0..hot)
    } else {
        rng.random_range(0..codes.len())
    };
    codes.get(index).map(String::as_str)
}
