//! 命令行入口
//!
//! 读取一份 HTML 快照，对其中的行执行一次完整处理，输出处理后的文档。

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use row_translator::env::{core::LogLevel, EnvVar};
use row_translator::parsers::{html_to_dom, serialize_document};
use row_translator::translation::{
    ConfigManager, GoogleGtxOracle, Orchestrator, TranslationConfig, TranslationResult,
    TranslationService,
};

#[derive(Parser, Debug)]
#[command(name = "row-translator")]
#[command(version, about = "Translate short CJK labels inside token list rows", long_about = None)]
struct Args {
    /// Input HTML file ("-" reads stdin)
    #[arg(value_name = "HTML")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Target language code (e.g. en, zh-TW)
    #[arg(short = 't', long)]
    target_lang: Option<String>,

    /// Mark fragments with a prefix instead of calling the translation API
    #[arg(long)]
    test_mode: bool,

    /// Maximum number of concurrent translation requests
    #[arg(short = 'c', long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Translation API endpoint
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Request timeout in seconds (0 disables the timeout)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Page URL, matched against the configured site pattern
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Config file path (default: search the standard locations)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Document charset
    #[arg(short = 'e', long, default_value = "utf-8")]
    encoding: String,

    /// Print a summary to stderr when done
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let level = LogLevel::get().unwrap_or_else(|e| {
        eprintln!("Warning: {}", e);
        "info".to_string()
    });
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> TranslationResult<TranslationConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigManager::from_file(path)?.into_config(),
        None => ConfigManager::new()?.into_config(),
    };

    if let Some(lang) = &args.target_lang {
        config.target_lang = lang.clone();
    }
    if let Some(max) = args.max_concurrent {
        config.max_concurrent_requests = max;
    }
    if let Some(api_url) = &args.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if args.test_mode {
        config.test_mode = true;
    }

    config.validate()?;
    Ok(config)
}

fn read_input(input: &str) -> io::Result<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(input)
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let data = read_input(&args.input)?;
    let dom = html_to_dom(&data, &args.encoding)?;

    let oracle = Arc::new(GoogleGtxOracle::from_config(&config)?);
    let service = TranslationService::new(oracle, &config);
    let mut orchestrator = Orchestrator::new(dom, service, config)?;
    if let Some(url) = &args.url {
        orchestrator = orchestrator.with_document_url(url);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    let summary = local.block_on(&runtime, orchestrator.reconcile_all_once());

    if args.verbose {
        let stats = orchestrator.engine().service().stats().snapshot();
        eprintln!(
            "rows: {}, translated: {}, unchanged: {}, failed: {}, requests: {}, cache hits: {}",
            summary.rows,
            summary.fragments_translated,
            summary.fragments_unchanged,
            summary.fragment_failures + summary.row_failures,
            stats.requests_issued,
            stats.cache_hits,
        );
    }

    let html = serialize_document(orchestrator.dom(), &args.encoding)?;
    match &args.output {
        Some(path) => fs::write(path, html)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&html)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
