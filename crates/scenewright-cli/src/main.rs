use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use scenewright::{
    ElementRef, FsObjectStorage, Interpreter, MemoryObjectStorage, MemoryPlaceholderCache,
    ObjectStorage, OrgContext, PlaceholderResolver, Progress, ResolveOptions, ResolverConfig,
    SceneIndex,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn an AI reply into a canonical change set (JSON on stdout)
    Interpret {
        /// Reply to read; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Append the elements rendered from a dynamic block
        #[arg(long)]
        expand_dynamic: bool,

        /// JSON array of `{id?, name}` describing the live scene
        #[arg(long, value_name = "FILE")]
        scene: Option<PathBuf>,
    },
    /// Replace GENERATE, LOGO and PEXELS placeholders with URLs
    Resolve {
        /// Text to resolve; stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Organization the generated images belong to
        #[arg(long, default_value = "")]
        org: String,

        /// User requesting the generation
        #[arg(long, default_value = "")]
        user: String,

        /// Store generated images under this directory instead of in memory
        #[arg(long, value_name = "DIR")]
        storage_dir: Option<PathBuf>,

        /// Generate all prompts at once (disables progress output)
        #[arg(long)]
        parallel: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_logging(level: LogLevel, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.to_string().parse()?)
        .from_env_lossy();

    // Logs go to stderr; stdout carries the result.
    let subscriber_builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber_builder.json().init(),
        LogFormat::Pretty => subscriber_builder.pretty().init(),
    }
    Ok(())
}

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

async fn load_scene(path: &Path) -> Result<SceneIndex> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading scene {}", path.display()))?;
    let entries: Vec<ElementRef> = serde_json::from_str(&raw)
        .with_context(|| format!("scene {} must be a JSON array of {{id?, name}}", path.display()))?;
    Ok(entries.into_iter().collect())
}

async fn interpret(file: Option<PathBuf>, expand_dynamic: bool, scene: Option<PathBuf>) -> Result<()> {
    let text = read_input(file.as_deref()).await?;
    let mut interpreter = Interpreter::new();
    if let Some(path) = scene {
        let scene = load_scene(&path).await?;
        info!(elements = scene.len(), "Loaded scene");
        interpreter = interpreter.with_scene(scene);
    }

    let Some(mut change_set) = interpreter.interpret(&text) else {
        info!("No payload found in reply; no change");
        return Ok(());
    };
    if expand_dynamic {
        change_set = interpreter.expand(&change_set);
    }
    info!(
        change_type = change_set.change_type.as_str(),
        elements = change_set.elements.len(),
        animations = change_set.animations.len(),
        "Interpreted reply"
    );
    println!("{}", serde_json::to_string_pretty(&change_set)?);
    Ok(())
}

async fn resolve(
    file: Option<PathBuf>,
    org: String,
    user: String,
    storage_dir: Option<PathBuf>,
    parallel: bool,
) -> Result<()> {
    let text = read_input(file.as_deref()).await?;

    let storage: Arc<dyn ObjectStorage> = match storage_dir {
        Some(dir) => {
            info!("Storage: {:?}", dir);
            Arc::new(FsObjectStorage::new(dir))
        }
        None => Arc::new(MemoryObjectStorage::default()),
    };
    let resolver = PlaceholderResolver::new(
        ResolverConfig::from_env(),
        storage,
        Arc::new(MemoryPlaceholderCache::new()),
    );
    match resolver.generator_name() {
        Some(name) => info!("Image provider: {}", name),
        None => warn!("No image provider credential set; GENERATE placeholders use the fallback image"),
    }

    let interpreter = Interpreter::new().with_resolver(resolver);
    let ctx = OrgContext::new(org, user);
    let sink = |p: &Progress| info!(current = p.current, total = p.total, "{}", p.message);
    let options = if parallel {
        ResolveOptions::parallel()
    } else {
        ResolveOptions::with_progress(&sink)
    };

    let resolved = interpreter.resolve_text(&text, &ctx, options).await;
    print!("{resolved}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format)?;

    match cli.command {
        Command::Interpret {
            file,
            expand_dynamic,
            scene,
        } => interpret(file, expand_dynamic, scene).await,
        Command::Resolve {
            file,
            org,
            user,
            storage_dir,
            parallel,
        } => resolve(file, org, user, storage_dir, parallel).await,
    }
}
