use bugcache::api::{HttpTransport, MockTransport, Transport};
use bugcache::cache::SuppressReason;
use bugcache::clock::SystemClock;
use bugcache::config::{Config, Verb};
use bugcache::logging;
use bugcache::store::entities::bugs::{self, BugSelectors, Bugs};
use bugcache::store::entities::users::{self, Users};
use bugcache::store::{FetchDecision, QueryOptions, Store};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use color_eyre::Result;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resource {
  Bugs,
  Users,
}

#[derive(Parser, Debug)]
#[command(name = "bugcache")]
#[command(about = "Load entity collections through a TTL-gated request dispatcher")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/bugcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache TTL in minutes for this run, overriding the configured default
  #[arg(long)]
  ttl: Option<i64>,

  /// Resource to load
  #[arg(short, long, value_enum, default_value_t = Resource::Bugs)]
  resource: Resource,

  /// Seconds after start at which to request the resource (repeatable)
  #[arg(long = "at", default_values_t = [0u64, 2, 61])]
  schedule: Vec<u64>,

  /// Serve canned responses instead of calling the API
  #[arg(long)]
  offline: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  let config = Arc::new(Config::load(args.config.as_deref())?);

  let transport: Arc<dyn Transport> = if args.offline {
    Arc::new(offline_transport(&config)?)
  } else {
    Arc::new(HttpTransport::new(&config.api)?)
  };

  let mut store = Store::new(Arc::clone(&config), transport, Arc::new(SystemClock));
  let options = QueryOptions {
    ttl_minutes: args.ttl,
  };

  let mut schedule = args.schedule.clone();
  schedule.sort_unstable();

  let started = Instant::now();
  for at in schedule {
    let deadline = started + Duration::from_secs(at);

    // Apply request outcomes while waiting for the next tick
    loop {
      tokio::select! {
        _ = tokio::time::sleep_until(deadline) => break,
        applied = store.step() => {
          if !applied? {
            break;
          }
        }
      }
    }

    let decision = match args.resource {
      Resource::Bugs => store.get_with_cache::<Bugs>(options)?,
      Resource::Users => store.get_with_cache::<Users>(options)?,
    };
    match decision {
      FetchDecision::Dispatched => info!(at, "request dispatched"),
      FetchDecision::Suppressed(SuppressReason::Fresh) => info!(at, "served from cache"),
      FetchDecision::Suppressed(SuppressReason::InFlight) => info!(at, "request already in flight"),
    }
  }

  store.settle().await?;
  print_summary(&store, args.resource);

  Ok(())
}

fn offline_transport(config: &Config) -> Result<MockTransport> {
  let mock = MockTransport::new().with_latency(Duration::from_millis(200));

  mock.respond(
    config.route(bugs::RESOURCE, Verb::Get)?,
    Ok(json!([
      {"id": 1, "description": "Bug 1", "resolved": false, "user": 1},
      {"id": 2, "description": "Bug 2", "resolved": true, "user": 2},
      {"id": 3, "description": "Bug 3", "resolved": false},
    ])),
  );
  mock.respond(
    config.route(users::RESOURCE, Verb::Get)?,
    Ok(json!([
      {"id": 1, "name": "User 1"},
      {"id": 2, "name": "User 2"},
    ])),
  );

  Ok(mock)
}

fn format_timestamp(at: Option<i64>) -> String {
  at.and_then(DateTime::<Utc>::from_timestamp_millis)
    .map(|dt| dt.to_rfc3339())
    .unwrap_or_else(|| "never".to_string())
}

fn print_summary(store: &Store, resource: Resource) {
  let state = store.state();

  match resource {
    Resource::Bugs => {
      let mut selectors = BugSelectors::new();
      println!(
        "bugs: {} loaded, {} unresolved, {} resolved, last fetch {}",
        state.bugs.items.len(),
        bugs::unresolved_bugs(state).len(),
        selectors.resolved(state).len(),
        format_timestamp(state.bugs.last_fetch),
      );
      if let Some(error) = &state.bugs.last_error {
        println!("last error: {}", error);
      }
    }
    Resource::Users => {
      println!(
        "users: {} loaded, last fetch {}",
        state.users.items.len(),
        format_timestamp(state.users.last_fetch),
      );
      if let Some(error) = &state.users.last_error {
        println!("last error: {}", error);
      }
    }
  }

  println!("actions: {}", store.history().join(" -> "));
}
