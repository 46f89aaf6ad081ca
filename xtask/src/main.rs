//! Load generator for the chat routes: `cargo run -p xtask -- --requests 40`.

use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use rand::{seq::SliceRandom, thread_rng, Rng};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const QUESTIONS: &[&str] = &[
    "What is Rust?",
    "Explain ownership in one sentence.",
    "Name three uses of a hash map.",
    "What does HTTP 502 mean?",
    "Why do language models hallucinate?",
    "Summarize what LangChain does.",
];

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    base_url: String,
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Total requests across all workers.
    #[arg(long, default_value_t = 40)]
    requests: usize,
    #[arg(long, value_enum, default_value_t = Target::Both)]
    target: Target,
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    Basic,
    Template,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Route {
    Basic,
    Template,
}

impl Route {
    fn path(self) -> &'static str {
        match self {
            Route::Basic => "/basic-chat/",
            Route::Template => "/basic-chat/prompt-template",
        }
    }

    fn pick(target: Target) -> Self {
        match target {
            Target::Basic => Route::Basic,
            Target::Template => Route::Template,
            Target::Both if thread_rng().gen_bool(0.5) => Route::Basic,
            Target::Both => Route::Template,
        }
    }
}

enum Outcome {
    Ok(Duration),
    Status(StatusCode),
    Transport,
}

struct RouteStats {
    latency_ms: Histogram<u64>,
    failures: BTreeMap<String, usize>,
}

impl RouteStats {
    fn new() -> anyhow::Result<Self> {
        Ok(Self { latency_ms: Histogram::new(3)?, failures: BTreeMap::new() })
    }

    fn record(&mut self, outcome: Outcome) {
        let key = match outcome {
            Outcome::Ok(d) => {
                self.latency_ms.record(d.as_millis() as u64).ok();
                return;
            }
            Outcome::Status(s) => s.as_u16().to_string(),
            Outcome::Transport => "transport".to_string(),
        };
        *self.failures.entry(key).or_default() += 1;
    }

    fn report(&self, route: Route) {
        let h = &self.latency_ms;
        let failed: usize = self.failures.values().sum();
        println!("{}", route.path());
        println!("  ok: {}  failed: {}", h.len(), failed);
        if !h.is_empty() {
            println!(
                "  p50: {} ms  p95: {} ms  p99: {} ms  max: {} ms",
                h.value_at_quantile(0.50),
                h.value_at_quantile(0.95),
                h.value_at_quantile(0.99),
                h.max()
            );
        }
        for (status, n) in &self.failures {
            println!("  {status}: {n}");
        }
    }
}

async fn hit(client: &Client, base: &str, route: Route) -> Outcome {
    let url = format!("{base}{}", route.path());
    let req = match route {
        Route::Basic => client.post(&url),
        Route::Template => {
            let q = QUESTIONS.choose(&mut thread_rng()).copied().unwrap_or("What is Rust?");
            client.post(&url).json(&serde_json::json!({ "question": q }))
        }
    };
    let t0 = Instant::now();
    match req.send().await {
        Ok(r) if r.status().is_success() => Outcome::Ok(t0.elapsed()),
        Ok(r) => Outcome::Status(r.status()),
        Err(_) => Outcome::Transport,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let base = args.base_url.trim_end_matches('/').to_string();
    let workers = args.concurrency.max(1);
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    let start = Instant::now();
    let mut tasks = Vec::with_capacity(workers);
    for w in 0..workers {
        // spread the remainder over the first workers
        let n = args.requests / workers + usize::from(w < args.requests % workers);
        let client = client.clone();
        let base = base.clone();
        let target = args.target;
        tasks.push(tokio::spawn(async move {
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                let route = Route::pick(target);
                out.push((route, hit(&client, &base, route).await));
            }
            out
        }));
    }

    let mut stats: BTreeMap<Route, RouteStats> = BTreeMap::new();
    for t in tasks {
        for (route, outcome) in t.await? {
            match stats.get_mut(&route) {
                Some(s) => s.record(outcome),
                None => {
                    let mut s = RouteStats::new()?;
                    s.record(outcome);
                    stats.insert(route, s);
                }
            }
        }
    }

    println!("ran {} reqs against {} in {:?}", args.requests, base, start.elapsed());
    for (route, s) in &stats {
        s.report(*route);
    }
    Ok(())
}
