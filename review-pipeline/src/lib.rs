//! Multi-phase pull-request review pipeline.
//!
//! One public entry runs the whole pipeline for a PR:
//!
//! 1. **Phase 0 — Provider I/O + parse** (fatal on failure)
//!    - Fetch PR metadata and the parsed change set (large-diff cache)
//!    - Fetch head-side contents and build the per-run symbol context
//! 2. **Phase 0.1 — Baseline** (skippable)
//!    - Vector-store snapshot; baseline from the index scope or from
//!      fresh base-branch extraction
//! 3. **Phase 0.2 — Deterministic analyzers** (each skippable)
//!    - Duplicates (within-PR + cross-repo), breaking changes, heuristics
//! 4. **Phase 1 — LLM review** per changed file, strictly sequential with
//!    an inter-request delay; per-file fallback on any model failure
//! 5. **Phase 6 — Architecture rules**
//! 6. **Phase 7 — Normalization** (severity/confidence/filters/dedup/merge)
//! 7. **Phases 8–9 — Summary & recommendations** (template fallback)
//! 8. **Final — Report serialization + optional comment posting**
//!
//! Failure policy: nothing but phase 0 and the report write aborts the
//! run. Every non-fatal failure lands under `runDiagnostics`, and the exit
//! status distinguishes full success (0) from degraded completion (3).
//!
//! The pipeline uses `tracing` for logging and avoids `async-trait` and
//! heap trait objects; provider and LLM dispatch are enum-based.

pub mod analyzers;
pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod fallback;
pub mod findings;
pub mod llm_review;
pub mod normalize;
pub mod orchestrator;
pub mod publish;
pub mod report;
pub mod summary;

pub use config::RunConfig;
pub use errors::{PipelineError, PipelineResult};
pub use findings::{
    BreakingChange, BreakingKind, Category, DuplicateMatch, DuplicateScope, Finding, Severity,
};
pub use orchestrator::{
    PipelineDeps, RunOutcome, RunStatus, run_phases, run_review, status_of, synthetic_bundle,
};
pub use report::{Diagnostic, DiagnosticKind, Report};
