use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rendition_worker::config::WorkerConfig;
use rendition_worker::events::MemoryEventSink;
use rendition_worker::logging::{self, LogFormat, LoggingOptions};
use rendition_worker::metrics::TracingMetricsSink;
use rendition_worker::postprocess::ImagePostProcessor;
use rendition_worker::storage::DefaultStorage;
use rendition_worker::transform::{ImageBatchTransform, ImageTransform};
use rendition_worker::{RenditionOrchestrator, WorkRequest};
use tracing::{error, info, warn};

/// Exit code when the working directory could not be removed.
const EXIT_ENVIRONMENT_CORRUPTED: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "rendition-worker", version, about = "Generate renditions of one source asset")]
struct Args {
    /// Work request JSON file. Reads stdin when omitted.
    #[arg(value_name = "REQUEST")]
    request: Option<PathBuf>,

    /// Invoke the transform once for all renditions.
    #[arg(long)]
    batch: bool,

    /// Console log format (text or json).
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Base working directory.
    #[arg(long, env = "RENDITION_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Skip post-processing and upload the transform's output as-is.
    #[arg(long)]
    no_post_process: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let mut config = WorkerConfig::from_env().context("loading configuration")?;
    if let Some(format) = &args.log_format {
        config.log_format = format.parse::<LogFormat>()?;
    }
    if let Some(dir) = args.work_dir.clone() {
        config.work_dir = dir;
    }

    let _guard = logging::init_logging(&LoggingOptions {
        format: config.log_format,
        log_dir: config.log_dir.clone(),
        ansi: std::io::stderr().is_terminal(),
    })?;
    if let Some(dir) = &config.log_dir {
        match logging::cleanup_old_logs(dir, logging::LOG_RETENTION_DAYS).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Removed old log files"),
            Err(e) => warn!(error = %e, "Log cleanup failed"),
        }
    }

    let request = read_request(args.request.as_deref())?;
    let storage = DefaultStorage::with_timeout(config.http_timeout)?;
    let events = Arc::new(MemoryEventSink::new());

    let mut builder = RenditionOrchestrator::builder(request)
        .config(config)
        .storage(Arc::new(storage))
        .event_sink(events.clone())
        .metrics_sink(Arc::new(TracingMetricsSink));
    if !args.no_post_process {
        builder = builder.post_processor(Arc::new(ImagePostProcessor::default()));
    }

    let outcome = if args.batch {
        builder.process_all_at_once(Arc::new(ImageBatchTransform)).await
    } else {
        builder.process_one_at_a_time(Arc::new(ImageTransform)).await
    };

    let (result, code) = match outcome {
        Ok(result) => (result, 0),
        Err(failure) => {
            let code = if failure.is_environment_corrupted() {
                EXIT_ENVIRONMENT_CORRUPTED
            } else {
                1
            };
            error!(error = %failure.error, "Activation failed");
            (*failure.result, code)
        }
    };

    let output = serde_json::json!({
        "result": result,
        "events": events.events(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(code)
}

fn read_request(path: Option<&std::path::Path>) -> anyhow::Result<WorkRequest> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing work request")
}
