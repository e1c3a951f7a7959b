//! WebWarden CLI
//!
//! ```bash
//! webwarden decide --user alice --domain https://www.example.com/page page.txt
//! webwarden classify --model-dir models/website-classifier page.txt
//! webwarden allow --user alice --category Education --expires-in-days 30
//! webwarden blocked --user alice
//! webwarden unblock --user alice --domain example.com
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use webwarden_ai::{
    InferencePort, LabelSpace, OnnxClassifier, RemoteClassifier, TokenCounter, WordCounter,
};
use webwarden_core::{AllowedCategory, BlockedDomainEntry, registrable_domain};
use webwarden_engine::{EngineConfig, PolicyEngine};
use webwarden_store::{CategoryDirectory, DomainLedger, DuckStore, LedgerMatch};

mod display;

#[derive(Parser)]
#[command(name = "webwarden", version, about = "Per-user website blocking by content category")]
struct Cli {
    /// DuckDB file holding the block ledger and allow-lists
    #[arg(long, env = "WEBWARDEN_DB", default_value = "webwarden.duckdb", global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether a page is blocked for a user, recording new blocks
    Decide {
        #[arg(long)]
        user: String,
        /// Domain or full URL of the page
        #[arg(long)]
        domain: String,
        #[command(flatten)]
        input: TextInput,
        #[command(flatten)]
        model: ModelArgs,
        #[command(flatten)]
        policy: PolicyArgs,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify text with the model only; the ledger is not consulted
    Classify {
        #[command(flatten)]
        input: TextInput,
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long)]
        json: bool,
    },
    /// Allow a category for a user
    Allow {
        #[arg(long)]
        user: String,
        #[arg(long)]
        category: String,
        /// Grant lapses after this many days
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// Withdraw a category grant
    Revoke {
        #[arg(long)]
        user: String,
        #[arg(long)]
        category: String,
    },
    /// List a user's blocked domains, newest first
    Blocked {
        #[arg(long)]
        user: String,
    },
    /// Block a domain for a user by hand
    Block {
        #[arg(long)]
        user: String,
        #[arg(long)]
        domain: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Remove a domain from a user's ledger
    Unblock {
        #[arg(long)]
        user: String,
        #[arg(long)]
        domain: String,
    },
}

#[derive(Args)]
struct TextInput {
    /// File with the page text; reads stdin when omitted
    file: Option<PathBuf>,
    /// Page text given inline
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
}

#[derive(Args)]
struct ModelArgs {
    /// ONNX model directory (model.onnx, tokenizer.json, labels)
    #[arg(long, env = "WEBWARDEN_MODEL_DIR")]
    model_dir: Option<PathBuf>,
    /// Base URL of a model server exposing POST /predict
    #[arg(long, env = "WEBWARDEN_MODEL_URL")]
    model_url: Option<String>,
    /// Label file for the model server (JSON array or config.json with id2label)
    #[arg(long, env = "WEBWARDEN_LABELS")]
    labels: Option<PathBuf>,
    /// Per-chunk inference deadline in seconds
    #[arg(long, env = "WEBWARDEN_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
    #[arg(long, default_value_t = 400)]
    max_tokens: usize,
    /// Chunk inferences in flight per request
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[derive(Args)]
struct PolicyArgs {
    /// Match ledger entries by exact domain instead of containment
    #[arg(long)]
    exact: bool,
    /// Domains never classified or blocked; search result pages mix every category
    #[arg(
        long = "exempt",
        value_delimiter = ',',
        default_values = ["google.com", "yahoo.com", "bing.com", "duckduckgo.com"]
    )]
    exempt: Vec<String>,
}

/// Inference port, its token counter, and the labels it emits.
struct Backend {
    inference: Arc<dyn InferencePort>,
    tokens: Arc<dyn TokenCounter>,
    labels: LabelSpace,
}

impl ModelArgs {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_tokens_per_chunk: self.max_tokens,
            max_concurrent_chunks: self.concurrency,
            inference_timeout: self.timeout(),
            ..Default::default()
        }
    }

    fn load(&self) -> anyhow::Result<Backend> {
        if let Some(dir) = &self.model_dir {
            let classifier = Arc::new(
                OnnxClassifier::load(dir)
                    .with_context(|| format!("loading model from {}", dir.display()))?,
            );
            let labels = classifier.labels().clone();
            return Ok(Backend {
                inference: classifier.clone(),
                tokens: classifier,
                labels,
            });
        }

        if let Some(url) = &self.model_url {
            let path = self
                .labels
                .as_deref()
                .context("--labels is required with --model-url")?;
            let labels = LabelSpace::from_file(path)
                .with_context(|| format!("reading labels from {}", path.display()))?;
            let client = RemoteClassifier::new(url.clone(), self.timeout())?;
            info!(url = %url, labels = labels.len(), "using model server");
            // The server's vocabulary is unknown here; count whitespace words.
            return Ok(Backend {
                inference: Arc::new(client),
                tokens: Arc::new(WordCounter),
                labels,
            });
        }

        anyhow::bail!("no model configured: pass --model-dir or --model-url")
    }
}

impl TextInput {
    fn read(&self) -> anyhow::Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display())),
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("reading stdin")?;
                Ok(text)
            }
        }
    }
}

fn open_store(path: &Path) -> anyhow::Result<Arc<DuckStore>> {
    let store = DuckStore::open_persistent(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

/// Record an allow-list grant. Categories are created only by classification,
/// so the category table is left untouched.
async fn grant_category(
    store: &dyn CategoryDirectory,
    user: &str,
    category: &str,
    expires_in_days: Option<i64>,
    now: DateTime<Utc>,
) -> anyhow::Result<AllowedCategory> {
    let category = category.trim();
    anyhow::ensure!(!category.is_empty(), "category name is empty");
    let grant = AllowedCategory {
        user_id: user.to_string(),
        category: category.to_string(),
        created_at: now,
        expires_at: expires_in_days.map(|days| now + chrono::Duration::days(days)),
    };
    store.allow(&grant).await?;
    Ok(grant)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Decide {
            user,
            domain,
            input,
            model,
            policy,
            json,
        } => {
            let text = input.read()?;
            let backend = model.load()?;
            let config = EngineConfig {
                ledger_match: if policy.exact {
                    LedgerMatch::Exact
                } else {
                    LedgerMatch::Containment
                },
                ..model.engine_config()
            }
            .with_exempt_domains(&policy.exempt)?;

            let store = open_store(&cli.db)?;
            let engine = PolicyEngine::new(
                backend.inference,
                backend.tokens,
                backend.labels,
                store.clone(),
                store,
            )
            .with_config(config);

            match engine.decide(&user, &domain, &text).await {
                Ok(result) if json => println!("{}", serde_json::to_string_pretty(&result)?),
                Ok(result) => display::print_decision(&result),
                Err(e) => {
                    let status = e.status_code();
                    if json {
                        let body = serde_json::json!({ "error": e.code(), "message": e.to_string() });
                        println!("{}", serde_json::to_string_pretty(&body)?);
                    }
                    return Err(anyhow::Error::new(e)
                        .context(format!("decision for {domain} failed with status {status}")));
                }
            }
        }
        Command::Classify { input, model, json } => {
            let text = input.read()?;
            let backend = model.load()?;
            // Classification never touches the ledger; an in-memory store suffices.
            let store = Arc::new(webwarden_store::MemoryStore::new());
            let engine = PolicyEngine::new(
                backend.inference,
                backend.tokens,
                backend.labels,
                store.clone(),
                store,
            )
            .with_config(model.engine_config());

            let decision = engine.classify(&text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                display::print_classification(&decision);
            }
        }
        Command::Allow {
            user,
            category,
            expires_in_days,
        } => {
            let store = open_store(&cli.db)?;
            let grant =
                grant_category(store.as_ref(), &user, &category, expires_in_days, Utc::now())
                    .await?;
            match grant.expires_at {
                Some(at) => println!("allowed {} for {user} until {at}", grant.category),
                None => println!("allowed {} for {user}", grant.category),
            }
        }
        Command::Revoke { user, category } => {
            let store = open_store(&cli.db)?;
            if store.revoke(&user, &category).await? {
                println!("revoked {category} for {user}");
            } else {
                println!("{user} had no grant for {category}");
            }
        }
        Command::Blocked { user } => {
            let store = open_store(&cli.db)?;
            let entries = store.list(&user).await?;
            display::print_ledger(&entries)?;
        }
        Command::Block {
            user,
            domain,
            notes,
        } => {
            let domain = registrable_domain(&domain)?;
            let store = open_store(&cli.db)?;
            let entry = BlockedDomainEntry::manual(&user, &domain, &notes, Utc::now());
            if store.insert(&entry).await? {
                println!("blocked {domain} for {user}");
            } else {
                println!("{domain} was already blocked for {user}");
            }
        }
        Command::Unblock { user, domain } => {
            let domain = registrable_domain(&domain)?;
            let store = open_store(&cli.db)?;
            if store.remove(&user, &domain).await? {
                println!("unblocked {domain} for {user}");
            } else {
                println!("{domain} was not blocked for {user}");
            }
        }
    }

    Ok(())
}
