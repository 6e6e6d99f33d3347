//! Phase orchestration.
//!
//! Strictly sequential: 0 (fetch/parse), 0.1 (index snapshot), 0.2
//! (deterministic analyzers), 1 (LLM review per file), 6 (architecture
//! rules), 7 (normalization), 8 (summary), 9 (recommendations), final
//! (serialize + optional post). Only phase 0 and the report write are
//! fatal; every other failure is logged, recorded under `runDiagnostics`
//! and survived. Cancellation aborts the current phase and skips the rest;
//! the partially built report is still serialized with `cancelled=true`.

use std::collections::BTreeMap;

use chrono::Utc;
use llm_service::LlmService;
use platform_client::{FileStatus, GitHubClient, PrBundle, PrId};
use resilience::{CancellationToken, RetryPolicy, deadline_token};
use tracing::{debug, info, warn};
use vector_index::{EmbeddingClient, VectorStore};

use crate::analyzers::{architecture, breaking, duplicates, heuristics};
use crate::analyzers::architecture::RuleSet;
use crate::cache;
use crate::config::RunConfig;
use crate::context::{AnalysisContext, BaselineSource};
use crate::errors::{PipelineError, PipelineResult};
use crate::fallback;
use crate::findings::{Category, Finding};
use crate::llm_review::{LlmFileError, LlmReviewer};
use crate::normalize::{MergeBackend, normalize};
use crate::publish;
use crate::report::{
    Diagnostic, DiagnosticKind, DuplicateSummary, Report, SeverityCounts,
};
use crate::summary::{SummaryInputs, generate_recommendations, generate_summary};

/// Final run status mapped to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every phase completed without fallback.
    Success,
    /// The run completed but at least one unit degraded or was skipped.
    Partial,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Partial => 3,
        }
    }
}

/// Report plus the exit status the caller should surface.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub status: RunStatus,
}

/// Everything `run_phases` needs besides the PR data itself.
///
/// Tests construct this with a hash embedder, a temp-dir store and no LLM.
pub struct PipelineDeps {
    pub llm: Option<LlmService>,
    pub embedder: EmbeddingClient,
    /// Read snapshot; `None` disables cross-repo analysis.
    pub store: Option<VectorStore>,
    pub rules: RuleSet,
    pub similarity_threshold: f32,
    pub cancel: CancellationToken,
}

/// Full remote run: fetch, phases, serialize, optionally post.
pub async fn run_review(cfg: &RunConfig, repo: &str, pr_number: u64) -> PipelineResult<RunOutcome> {
    if !repo.contains('/') {
        return Err(PipelineError::Validation(format!(
            "repo must be owner/name, got {repo}"
        )));
    }
    let cancel = deadline_token(cfg.run_deadline);
    let client = GitHubClient::new(
        cfg.platform_base.clone(),
        cfg.platform_token.clone(),
        RetryPolicy::default(),
        cancel.clone(),
    )?;
    let id = PrId {
        repo: repo.to_string(),
        number: pr_number,
    };

    // ---------------------------
    // Phase 0a: provider I/O + cache (fatal on failure)
    // ---------------------------
    info!("phase0: fetch PR {repo}#{pr_number}");
    let meta = client.get_meta(&id).await?;
    let head_sha = meta.head_sha.clone();
    debug!("phase0: meta ok, head_sha={head_sha}");

    let bundle: PrBundle = if let Some(b) = cache::load_bundle(&id, &head_sha).await? {
        info!("phase0: cache hit, files={}", b.changes.files.len());
        b
    } else {
        let changes = client.get_changeset(&id).await?;
        let b = PrBundle { meta, changes };
        cache::maybe_store_bundle(&id, &head_sha, &b).await?;
        b
    };

    let mut pre_diagnostics = Vec::new();

    // Phase 0b: head-side contents of the changed files (per-unit recoverable).
    let mut file_contents = BTreeMap::new();
    for file in &bundle.changes.files {
        if file.status == FileStatus::Removed || file.is_binary {
            continue;
        }
        if !code_symbols::Language::supports_path(&file.path) {
            continue;
        }
        match client.get_file(repo, &head_sha, &file.path).await {
            Ok(Some(text)) => {
                file_contents.insert(file.path.clone(), text);
            }
            Ok(None) => {
                warn!("phase0: {} missing at head", file.path);
                pre_diagnostics.push(Diagnostic::new(
                    "phase0",
                    Some(file.path.clone()),
                    DiagnosticKind::Failure,
                    "file missing at head sha",
                ));
            }
            Err(e) => {
                if e.is_fatal() {
                    return Err(e.into());
                }
                warn!("phase0: fetch of {} failed ({e})", file.path);
                pre_diagnostics.push(Diagnostic::new(
                    "phase0",
                    Some(file.path.clone()),
                    DiagnosticKind::Failure,
                    e.to_string(),
                ));
            }
        }
    }
    if bundle.changes.is_truncated {
        pre_diagnostics.push(Diagnostic::new(
            "phase0",
            None,
            DiagnosticKind::Skipped,
            "platform truncated the changed-file listing",
        ));
    }

    // Open the store snapshot and decide whether base-branch contents are
    // needed for the breaking-change baseline.
    let store = VectorStore::open_read(&cfg.vector_store_path);
    let scope_indexed = !store.scope(repo, &bundle.meta.base_branch).is_empty();

    let base_contents = if scope_indexed {
        None
    } else {
        let mut base = BTreeMap::new();
        for file in &bundle.changes.files {
            if file.status == FileStatus::Added || file.is_binary {
                continue;
            }
            let base_path = file.previous_path.as_deref().unwrap_or(&file.path);
            if !code_symbols::Language::supports_path(base_path) {
                continue;
            }
            match client
                .get_file(repo, &bundle.meta.base_sha, base_path)
                .await
            {
                Ok(Some(text)) => {
                    base.insert(file.path.clone(), text);
                }
                Ok(None) => {
                    pre_diagnostics.push(Diagnostic::new(
                        "phase0.1",
                        Some(base_path.to_string()),
                        DiagnosticKind::Failure,
                        "file missing on base branch",
                    ));
                }
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    pre_diagnostics.push(Diagnostic::new(
                        "phase0.1",
                        Some(base_path.to_string()),
                        DiagnosticKind::Failure,
                        e.to_string(),
                    ));
                }
            }
        }
        Some(base)
    };

    let llm = match &cfg.llm {
        Some(llm_cfg) => match LlmService::new(llm_cfg.clone()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("llm service unavailable ({e}); running fallback path");
                pre_diagnostics.push(Diagnostic::new(
                    "setup",
                    None,
                    DiagnosticKind::Fallback,
                    e.to_string(),
                ));
                None
            }
        },
        None => None,
    };

    let deps = PipelineDeps {
        embedder: EmbeddingClient::from_service(llm.clone()),
        llm,
        store: Some(store),
        rules: RuleSet::default(),
        similarity_threshold: cfg.similarity_threshold,
        cancel: cancel.clone(),
    };

    // The bundle moves into run_phases; the poster needs the changed-line
    // sets, so derive them first.
    let changed_lines = platform_client::ChangedLines::from_changes(&bundle.changes);

    let mut report = run_phases(bundle, file_contents, base_contents, deps, pre_diagnostics).await;

    // ----------------------------------------------------
    // Final: optional comment post, then serialize (fatal).
    // ----------------------------------------------------
    if cfg.post_comments && !cancel.is_cancelled() {
        let plan = publish::plan_comments(&report.findings, &changed_lines);
        if plan.is_empty() {
            info!("post: nothing to publish");
        } else {
            let (posted, diags) =
                publish::post_comments(&client, &id, &report.head_sha, &plan, &cancel).await;
            info!("post: created {posted} comments");
            report.run_diagnostics.extend(diags);
        }
    }

    report.save(&cfg.report_path)?;

    let status = status_of(&report);
    Ok(RunOutcome { report, status })
}

/// Derives the exit status from the finished report.
pub fn status_of(report: &Report) -> RunStatus {
    let noisy = report.degraded
        || report.cancelled
        || report
            .run_diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::Fallback | DiagnosticKind::Failure));
    if noisy {
        RunStatus::Partial
    } else {
        RunStatus::Success
    }
}

/// Runs phases 0 (parse) through 9 over already-fetched data.
///
/// This is the seam integration tests drive: no platform client, no
/// network. `base_contents` feeds the fresh-extraction baseline when the
/// index has no scope for the base branch.
pub async fn run_phases(
    bundle: PrBundle,
    file_contents: BTreeMap<String, String>,
    base_contents: Option<BTreeMap<String, String>>,
    deps: PipelineDeps,
    pre_diagnostics: Vec<Diagnostic>,
) -> Report {
    let repo = bundle.meta.id.repo.clone();
    let pr_number = bundle.meta.id.number;
    let pr_title = bundle.meta.title.clone();
    let head_sha = bundle.meta.head_sha.clone();
    let base_branch = bundle.meta.base_branch.clone();

    let mut diagnostics = pre_diagnostics;
    let mut degraded = false;
    let mut cancelled = false;

    // Phase 0 (parse part): build the analysis context.
    info!("phase0: parse changed files");
    let mut ctx = AnalysisContext::build(bundle, file_contents, deps.similarity_threshold);
    debug!(
        "phase0: {} files parsed, {} symbols",
        ctx.pr_files.len(),
        ctx.pr_symbols().count()
    );

    // Phase 0.1: index snapshot + baseline.
    if let Some(store) = deps.store {
        if store.degraded() {
            degraded = true;
            diagnostics.push(Diagnostic::new(
                "phase0.1",
                None,
                DiagnosticKind::Failure,
                "vector store was partially unreadable; cross-repo analysis may be incomplete",
            ));
        }
        let scope = store.scope(&repo, &base_branch);
        if !scope.is_empty() {
            ctx.baseline = breaking::baseline_from_index(&store, &repo, &base_branch);
            ctx.baseline_source = BaselineSource::Index;
            info!("phase0.1: baseline from index ({} symbols)", ctx.baseline.len());
        }
        if !store.is_empty() {
            ctx.index = Some(store);
        }
    }
    if ctx.baseline_source == BaselineSource::Unavailable {
        if let Some(base) = &base_contents {
            if !base.is_empty() {
                ctx.baseline = breaking::baseline_from_files(base);
                ctx.baseline_source = BaselineSource::Fresh;
                info!(
                    "phase0.1: baseline from base-branch files ({} symbols)",
                    ctx.baseline.len()
                );
            }
        }
    }
    if ctx.baseline_source == BaselineSource::Unavailable {
        diagnostics.push(Diagnostic::new(
            "phase0.1",
            None,
            DiagnosticKind::Skipped,
            "no baseline available; breaking-change analysis skipped",
        ));
    }

    let mut findings: Vec<Finding> = Vec::new();
    let mut dup_summary = DuplicateSummary::default();
    let mut breaking_changes = Vec::new();

    // Phase 0.2: deterministic analyzers, each independently skippable.
    if !deps.cancel.is_cancelled() {
        info!("phase0.2: deterministic analyzers");

        // Embeddings for PR symbols feed both duplicate modes. A failing
        // remote provider degrades the whole run to the hash projection;
        // vectors must stay uniform in dimension, so everything is
        // re-embedded from the start (the projection is cheap).
        let mut embedder = deps.embedder;
        ctx.vectors_are_fallback = embedder.is_fallback();
        let callables: Vec<code_symbols::Symbol> = ctx
            .pr_symbols()
            .filter(|s| s.kind.is_callable())
            .cloned()
            .collect();
        let mut idx = 0;
        while idx < callables.len() {
            if deps.cancel.is_cancelled() {
                break;
            }
            let symbol = &callables[idx];
            match embedder.embed(&symbol.body).await {
                Ok(v) => {
                    ctx.pr_vectors.insert(symbol.identity_key(), v);
                    idx += 1;
                }
                Err(e) if !embedder.is_fallback() => {
                    warn!(
                        "embedding provider degraded ({e}); switching to the hash projection"
                    );
                    diagnostics.push(Diagnostic::new(
                        "phase0.2",
                        None,
                        DiagnosticKind::Fallback,
                        format!("embedding provider degraded: {e}"),
                    ));
                    degraded = true;
                    embedder = EmbeddingClient::from_service(None);
                    ctx.vectors_are_fallback = true;
                    ctx.pr_vectors.clear();
                    idx = 0;
                }
                Err(e) => {
                    warn!("embedding failed for {} ({e})", symbol.qualified_name);
                    diagnostics.push(Diagnostic::new(
                        "phase0.2",
                        Some(symbol.qualified_name.clone()),
                        DiagnosticKind::Failure,
                        e.to_string(),
                    ));
                    idx += 1;
                }
            }
        }

        dup_summary.within_pr = duplicates::within_pr(&ctx);
        dup_summary.cross_repo = duplicates::cross_repo(&ctx);
        findings.extend(duplicates::to_findings(&dup_summary.within_pr));
        findings.extend(duplicates::to_findings(&dup_summary.cross_repo));

        breaking_changes = breaking::detect(&ctx);
        findings.extend(breaking::to_findings(&breaking_changes, &ctx));

        findings.extend(heuristics::run_all(&ctx));
    }

    // Phase 1: LLM review per changed file, strictly sequential.
    let mut reviewer = LlmReviewer::new(deps.llm.clone());
    let llm_configured = deps.llm.is_some();
    if deps.cancel.is_cancelled() {
        cancelled = true;
    } else {
        info!("phase1: review {} files", ctx.pr_files.len());
        let paths: Vec<String> = ctx.pr_files.keys().cloned().collect();
        for path in paths {
            if deps.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if reviewer.available() {
                match reviewer.review_file(&ctx, &path, &findings, &deps.cancel).await {
                    Ok(review) => {
                        if review.repaired {
                            diagnostics.push(Diagnostic::new(
                                "phase1",
                                Some(path.clone()),
                                DiagnosticKind::Retry,
                                "llm output repaired on second attempt",
                            ));
                        }
                        findings.extend(review.findings);
                        continue;
                    }
                    Err(LlmFileError::Cancelled) => {
                        cancelled = true;
                        break;
                    }
                    Err(LlmFileError::Unparseable) => {
                        degraded = true;
                        diagnostics.push(Diagnostic::new(
                            "phase1",
                            Some(path.clone()),
                            DiagnosticKind::Fallback,
                            "llm output failed validation twice; fallback generator used",
                        ));
                    }
                    Err(LlmFileError::Unavailable(reason)) => {
                        degraded = true;
                        diagnostics.push(Diagnostic::new(
                            "phase1",
                            Some(path.clone()),
                            DiagnosticKind::Fallback,
                            format!("llm unavailable for file: {reason}"),
                        ));
                    }
                }
            } else if llm_configured {
                // Quota died mid-run; every remaining file degrades.
                degraded = true;
                diagnostics.push(Diagnostic::new(
                    "phase1",
                    Some(path.clone()),
                    DiagnosticKind::Fallback,
                    "llm unavailable for file: quota exhausted earlier in the run",
                ));
            } else {
                diagnostics.push(Diagnostic::new(
                    "phase1",
                    Some(path.clone()),
                    DiagnosticKind::Skipped,
                    "llm not configured; fallback generator used",
                ));
            }
            // Fallback path for this file.
            let synthesized = fallback::findings_for_file(&path, &findings);
            findings.extend(synthesized);
        }
    }

    // Phase 6: architecture rules.
    if !cancelled && !deps.cancel.is_cancelled() {
        info!("phase6: architecture rules");
        findings.extend(architecture::apply(&ctx, &deps.rules));
    }

    // Phase 7: normalization (never skipped; pure).
    info!("phase7: normalize {} findings", findings.len());
    let merge = match (&deps.llm, reviewer.available()) {
        (Some(service), true) => MergeBackend::Llm(service),
        _ => MergeBackend::Template,
    };
    let findings = normalize(findings, &ctx, merge).await;

    let counts = SeverityCounts::from_findings(&findings);
    let average_confidence = Report::compute_average_confidence(&findings);

    // Phase 8: summary.
    let llm_for_prose = if reviewer.available() {
        deps.llm.as_ref()
    } else {
        None
    };
    let (summary_markdown, summary_fellback) = if cancelled {
        (String::new(), false)
    } else {
        let inputs = SummaryInputs {
            repository: &repo,
            pr_number,
            pr_title: &pr_title,
            findings: &findings,
            counts: &counts,
            duplicates: &dup_summary,
            breaking_count: breaking_changes.len(),
        };
        generate_summary(llm_for_prose, &inputs).await
    };
    if summary_fellback && llm_configured {
        diagnostics.push(Diagnostic::new(
            "phase8",
            None,
            DiagnosticKind::Fallback,
            "summary produced from template",
        ));
        degraded = true;
    }

    // Phase 9: recommendations.
    let (recommendations, recs_fellback) = if cancelled {
        (Vec::new(), false)
    } else {
        generate_recommendations(llm_for_prose, &findings).await
    };
    if recs_fellback && llm_configured && !findings.is_empty() {
        diagnostics.push(Diagnostic::new(
            "phase9",
            None,
            DiagnosticKind::Fallback,
            "recommendations produced from template",
        ));
    }

    if deps.cancel.is_cancelled() {
        cancelled = true;
    }

    let architecture_violations: Vec<Finding> = findings
        .iter()
        .filter(|f| f.category == Category::Architecture)
        .cloned()
        .collect();

    Report {
        repository: repo,
        pr_number,
        head_sha,
        generated_at: Utc::now(),
        issue_counts: counts,
        findings,
        duplicates: dup_summary,
        breaking_changes,
        architecture_violations,
        average_confidence,
        summary_markdown,
        recommendations,
        run_diagnostics: diagnostics,
        degraded,
        cancelled,
    }
}

/// Builds a synthetic "all lines added" bundle from local files, used by
/// the `analyze` command and the offline tests.
pub fn synthetic_bundle(
    repo_label: &str,
    files: &BTreeMap<String, String>,
) -> (PrBundle, BTreeMap<String, String>) {
    use platform_client::{
        ChangeSet, DiffHunk, DiffLine, FileChange, PullRequest,
    };

    let mut changes = Vec::new();
    for (path, content) in files {
        let lines: Vec<DiffLine> = content
            .lines()
            .enumerate()
            .map(|(i, l)| DiffLine::Added {
                new_line: i as u32 + 1,
                content: l.to_string(),
            })
            .collect();
        let count = lines.len() as u32;
        let patch = std::iter::once(format!("@@ -0,0 +1,{count} @@"))
            .chain(content.lines().map(|l| format!("+{l}")))
            .collect::<Vec<_>>()
            .join("\n");
        changes.push(FileChange {
            path: path.clone(),
            previous_path: None,
            status: FileStatus::Added,
            is_binary: false,
            hunks: vec![DiffHunk {
                old_start: 0,
                old_lines: 0,
                new_start: 1,
                new_lines: count,
                lines,
            }],
            patch: Some(patch),
        });
    }

    let bundle = PrBundle {
        meta: PullRequest {
            id: PrId {
                repo: repo_label.to_string(),
                number: 0,
            },
            title: "local analysis".into(),
            body: None,
            author: None,
            state: "local".into(),
            web_url: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            head_sha: "local".into(),
            base_sha: "local".into(),
            head_branch: "local".into(),
            base_branch: "main".into(),
        },
        changes: ChangeSet {
            files: changes,
            is_truncated: false,
        },
    };
    (bundle, files.clone())
}
