//! Binary entry: env loading, logging setup, CLI dispatch, exit codes.
//!
//! Exit codes: 0 full success, 2 fatal (fetch/auth/config/report-write),
//! 3 partial (the run completed but degraded somewhere).

mod cli;

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{AnalyzeArgs, Cli, Command, IndexArgs, ReviewArgs, SummarizeArgs};
use llm_service::LlmService;
use platform_client::GitHubClient;
use repo_indexer::{IndexOptions, index_branch};
use resilience::{RetryPolicy, deadline_token};
use review_pipeline::analyzers::architecture::RuleSet;
use review_pipeline::{
    PipelineDeps, Report, RunConfig, run_phases, run_review, synthetic_bundle,
};
use vector_index::{EmbeddingClient, VectorStore};

const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.resolve() else {
        error!("nothing to do: pass a subcommand or --repo/--pr");
        return ExitCode::from(EXIT_FATAL);
    };

    let code = match command {
        Command::Review(args) => cmd_review(args).await,
        Command::Index(args) => cmd_index(args).await,
        Command::Analyze(args) => cmd_analyze(args).await,
        Command::Summarize(args) => cmd_summarize(args).await,
    };
    ExitCode::from(code)
}

async fn cmd_review(args: ReviewArgs) -> u8 {
    let mut cfg = match RunConfig::from_env(args.token, args.llm_key, args.enterprise) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return EXIT_FATAL;
        }
    };
    cfg.post_comments = args.post;

    match run_review(&cfg, &args.repo, args.pr).await {
        Ok(outcome) => {
            println!("{}", outcome.report.render_markdown());
            outcome.status.exit_code() as u8
        }
        Err(e) => {
            error!("review failed: {e}");
            EXIT_FATAL
        }
    }
}

async fn cmd_index(args: IndexArgs) -> u8 {
    let cfg = match RunConfig::from_env(args.token, args.llm_key, None) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            return EXIT_FATAL;
        }
    };

    let cancel = deadline_token(None);
    let client = match GitHubClient::new(
        cfg.platform_base.clone(),
        cfg.platform_token.clone(),
        RetryPolicy::default(),
        cancel.clone(),
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return EXIT_FATAL;
        }
    };

    let llm = cfg.llm.clone().and_then(|c| match LlmService::new(c) {
        Ok(s) => Some(s),
        Err(e) => {
            error!("llm unavailable for embeddings ({e}); using the hash fallback");
            None
        }
    });
    let embedder = EmbeddingClient::from_service(llm);

    let mut store = match VectorStore::open_write(&cfg.vector_store_path) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot open vector store: {e}");
            return EXIT_FATAL;
        }
    };

    match index_branch(
        &client,
        &args.repo,
        &args.branch,
        &embedder,
        &mut store,
        &cancel,
        &IndexOptions::default(),
    )
    .await
    {
        Ok(summary) => {
            info!(
                "indexed {} symbols from {} files ({} skipped)",
                summary.symbols_indexed, summary.files_indexed, summary.files_skipped
            );
            0
        }
        Err(e) => {
            error!("index failed: {e}");
            EXIT_FATAL
        }
    }
}

async fn cmd_analyze(args: AnalyzeArgs) -> u8 {
    let files = match collect_local_files(&args.file) {
        Ok(map) if !map.is_empty() => map,
        Ok(_) => {
            error!("no supported source files under {}", args.file.display());
            return EXIT_FATAL;
        }
        Err(e) => {
            error!("cannot read {}: {e}", args.file.display());
            return EXIT_FATAL;
        }
    };

    let repo_label = args.repo.unwrap_or_else(|| "local/analysis".to_string());
    let (bundle, contents) = synthetic_bundle(&repo_label, &files);

    let cfg = RunConfig::offline();
    let store = VectorStore::open_read(&cfg.vector_store_path);
    let deps = PipelineDeps {
        llm: None,
        embedder: EmbeddingClient::from_service(None),
        store: if store.is_empty() { None } else { Some(store) },
        rules: RuleSet::default(),
        similarity_threshold: cfg.similarity_threshold,
        cancel: deadline_token(None),
    };

    let report = run_phases(bundle, contents, None, deps, Vec::new()).await;
    println!("{}", report.render_markdown());
    if let Err(e) = report.save(&cfg.report_path) {
        error!("cannot write report: {e}");
        return EXIT_FATAL;
    }
    0
}

async fn cmd_summarize(args: SummarizeArgs) -> u8 {
    // A cached report needs no credentials at all.
    let report_path = llm_service::opt_env("REPORT_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("./report.json"));

    let cached = if args.force {
        None
    } else {
        Report::load(&report_path)
            .ok()
            .filter(|r| r.repository == args.repo && r.pr_number == args.pr)
    };

    let report = match cached {
        Some(r) => {
            info!("using cached report from {}", report_path.display());
            r
        }
        None => {
            let cfg = match RunConfig::from_env(args.token, args.llm_key, None) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("{e}");
                    return EXIT_FATAL;
                }
            };
            match run_review(&cfg, &args.repo, args.pr).await {
                Ok(outcome) => outcome.report,
                Err(e) => {
                    error!("summarize failed: {e}");
                    return EXIT_FATAL;
                }
            }
        }
    };

    let markdown = report.render_markdown();
    let summary_path = report_path.with_file_name("pr-summary.md");
    if let Err(e) = std::fs::write(&summary_path, &markdown) {
        error!("cannot write {}: {e}", summary_path.display());
        return EXIT_FATAL;
    }
    info!("summary written to {}", summary_path.display());
    println!("{markdown}");
    0
}

/// Collects supported source files from a path (file or directory walk).
fn collect_local_files(root: &std::path::Path) -> std::io::Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    if root.is_file() {
        let text = std::fs::read_to_string(root)?;
        out.insert(root.display().to_string(), text);
        return Ok(out);
    }
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().display().to_string();
        if !code_symbols::Language::supports_path(&path) {
            continue;
        }
        match std::fs::read_to_string(entry.path()) {
            Ok(text) => {
                out.insert(path, text);
            }
            Err(e) => {
                tracing::warn!("skipping unreadable file {path}: {e}");
            }
        }
    }
    Ok(out)
}
