//! CLI surface: subcommands plus the legacy flag-only form.
//!
//! `pr-reviewer review --repo owner/name --pr 42` is the canonical shape;
//! `pr-reviewer --repo owner/name --pr 42` (no subcommand) is accepted for
//! backward compatibility and behaves as `review`.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pr-reviewer",
    version,
    about = "AI-assisted pull request reviewer with deterministic analyzers and a code index"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Legacy form: repository as owner/name (implies `review`).
    #[arg(long)]
    pub repo: Option<String>,

    /// Legacy form: pull request number (implies `review`).
    #[arg(long)]
    pub pr: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Review a pull request and write the report.
    Review(ReviewArgs),
    /// Index a branch into the vector store.
    Index(IndexArgs),
    /// Analyze a local file or directory with the deterministic analyzers.
    Analyze(AnalyzeArgs),
    /// Render the markdown summary of a previous (or fresh) review.
    Summarize(SummarizeArgs),
}

#[derive(Debug, Args)]
pub struct ReviewArgs {
    /// Repository as owner/name.
    #[arg(long)]
    pub repo: String,

    /// Pull request number.
    #[arg(long)]
    pub pr: u64,

    /// GitHub Enterprise host (e.g. ghe.acme.com); defaults to github.com.
    #[arg(long)]
    pub enterprise: Option<String>,

    /// Post inline and summary comments back to the platform.
    #[arg(long)]
    pub post: bool,

    /// Platform token override (else PLATFORM_TOKEN).
    #[arg(long)]
    pub token: Option<String>,

    /// LLM API key override (else LLM_API_KEY; absent runs the fallback path).
    #[arg(long)]
    pub llm_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Repository as owner/name.
    #[arg(long)]
    pub repo: String,

    /// Branch to index.
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Platform token override (else PLATFORM_TOKEN).
    #[arg(long)]
    pub token: Option<String>,

    /// LLM API key override for remote embeddings.
    #[arg(long)]
    pub llm_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// File or directory to analyze.
    #[arg(long)]
    pub file: std::path::PathBuf,

    /// Repository label recorded in the report.
    #[arg(long)]
    pub repo: Option<String>,

    /// Platform token (unused offline; accepted for parity).
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    /// Repository as owner/name.
    #[arg(long)]
    pub repo: String,

    /// Pull request number.
    #[arg(long)]
    pub pr: u64,

    /// Ignore a cached report and run the review again.
    #[arg(long)]
    pub force: bool,

    /// Platform token override (else PLATFORM_TOKEN).
    #[arg(long)]
    pub token: Option<String>,

    /// LLM API key override.
    #[arg(long)]
    pub llm_key: Option<String>,
}

impl Cli {
    /// Resolves the legacy flag-only form into a `review` command.
    pub fn resolve(self) -> Option<Command> {
        match self.command {
            Some(cmd) => Some(cmd),
            None => match (self.repo, self.pr) {
                (Some(repo), Some(pr)) => Some(Command::Review(ReviewArgs {
                    repo,
                    pr,
                    enterprise: None,
                    post: false,
                    token: None,
                    llm_key: None,
                })),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommand_form_parses() {
        let cli = Cli::parse_from(["pr-reviewer", "review", "--repo", "acme/app", "--pr", "42"]);
        match cli.resolve() {
            Some(Command::Review(args)) => {
                assert_eq!(args.repo, "acme/app");
                assert_eq!(args.pr, 42);
                assert!(!args.post);
            }
            other => panic!("expected review, got {other:?}"),
        }
    }

    #[test]
    fn legacy_flag_form_implies_review() {
        let cli = Cli::parse_from(["pr-reviewer", "--repo", "acme/app", "--pr", "7"]);
        match cli.resolve() {
            Some(Command::Review(args)) => {
                assert_eq!(args.repo, "acme/app");
                assert_eq!(args.pr, 7);
            }
            other => panic!("expected review, got {other:?}"),
        }
    }

    #[test]
    fn bare_invocation_resolves_to_nothing() {
        let cli = Cli::parse_from(["pr-reviewer"]);
        assert!(cli.resolve().is_none());
    }

    #[test]
    fn index_defaults_branch_to_main() {
        let cli = Cli::parse_from(["pr-reviewer", "index", "--repo", "acme/app"]);
        match cli.resolve() {
            Some(Command::Index(args)) => assert_eq!(args.branch, "main"),
            other => panic!("expected index, got {other:?}"),
        }
    }
}
