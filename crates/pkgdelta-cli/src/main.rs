#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Context;
use clap::Parser;
use pkgdelta_core::api::{compare_api_dumps, format_diff_results, ActionType, ApiDump, DiffResult};
use pkgdelta_core::changelog::rebase::rebase_changelog_dir;
use pkgdelta_core::changelog::storage::{
    archive_old_actions, changelog_filepath, consolidate_changelog_files,
    find_foreign_changelog_files, find_release_action, parse_changelog_dir,
};
use pkgdelta_core::changelog::{
    ApiState, BumpType, Reconciler, TargetPath, UnmatchedResolution,
};
use pkgdelta_core::git::GitRepository;
use pkgdelta_core::version::{unreleased_actions, BumpPolicy, PkgVersion, VersionCalculator};
use pkgdelta_core::Settings;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pkgdelta",
    version,
    about = "API diff, changelog and version bump for release pipelines"
)]
struct Cli {
    /// Repository path (default: current directory)
    #[arg(long, global = true, env = "PKGDELTA_REPO_PATH")]
    repo_path: Option<PathBuf>,

    /// Output format: gha, json, text (default: auto-detect)
    #[arg(long, global = true, env = "PKGDELTA_OUTPUT_FORMAT")]
    output_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compare two API dumps and report classified changes
    Diff(DumpArgs),
    /// Merge API changes into the changelog file of a pull request
    Reconcile(ReconcileArgs),
    /// Calculate the next version from unreleased changelog actions
    Bump(BumpArgs),
    /// Move old changelog files into archive buckets
    Archive(ArchiveArgs),
    /// Repair fix entries whose commits were rewritten
    Rebase(RebaseArgs),
    /// Detect (and optionally merge) changelog files of other pull requests
    Foreign(ForeignArgs),
    /// Print the pull request that carried a release
    ReleasePr(ReleasePrArgs),
    /// Show the stability of a group, symbol or argument and whether it is public
    Stability(StabilityArgs),
}

#[derive(clap::Args)]
struct DumpArgs {
    /// API dump of the last release (missing file means no history)
    #[arg(long, env = "PKGDELTA_BASELINE")]
    baseline: PathBuf,

    /// API dump of the working tree
    #[arg(long, env = "PKGDELTA_DEV")]
    dev: PathBuf,
}

#[derive(clap::Args)]
struct ReconcileArgs {
    #[command(flatten)]
    dumps: DumpArgs,

    /// Pull request number owning the changelog file
    #[arg(long, env = "PKGDELTA_PR")]
    pr: u64,

    /// Author recorded on new entries (default: settings)
    #[arg(long, env = "PKGDELTA_AUTHOR")]
    author: Option<String>,
}

#[derive(clap::Args)]
struct BumpArgs {
    /// Current version
    #[arg(long, env = "PKGDELTA_CURRENT_VERSION", default_value = "0.0.0")]
    current: String,

    /// Advance pre-release counters instead of leaving the channel
    #[arg(long, env = "PKGDELTA_KEEP_PRERELEASE")]
    keep_prerelease: bool,

    /// Cap when the log holds no max_bump_type action: patch, minor, major
    #[arg(long, env = "PKGDELTA_MAX_BUMP_TYPE")]
    max_bump_type: Option<String>,
}

#[derive(clap::Args)]
struct ArchiveArgs {
    /// Archive once more than this many files are active (default: settings)
    #[arg(long, env = "PKGDELTA_CLEANUP_TRIGGER")]
    cleanup_trigger: Option<usize>,

    /// Files left active (default: settings)
    #[arg(long, env = "PKGDELTA_KEEP_COUNT")]
    keep_count: Option<usize>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum UnmatchedPolicy {
    /// Leave the stale SHA in place
    Keep,
    /// Delete the entry
    Remove,
}

#[derive(clap::Args)]
struct RebaseArgs {
    /// Only consider commits after this reference
    #[arg(long, env = "PKGDELTA_SINCE")]
    since: Option<String>,

    /// What to do with stale entries that have no message match
    #[arg(long, value_enum, default_value = "keep")]
    unmatched: UnmatchedPolicy,
}

#[derive(clap::Args)]
struct ForeignArgs {
    /// Base branch of the pull request
    #[arg(long, env = "PKGDELTA_BASE_REF", default_value = "origin/main")]
    base: String,

    /// Current pull request number
    #[arg(long, env = "PKGDELTA_PR")]
    pr: u64,

    /// Merge foreign files into the current pull request file
    #[arg(long)]
    consolidate: bool,
}

#[derive(clap::Args)]
struct ReleasePrArgs {
    /// Release tag, e.g. v1.2.3
    #[arg(long)]
    tag: String,
}

#[derive(clap::Args)]
struct StabilityArgs {
    /// `group`, `group.symbol` or `group.symbol.arg`
    target: String,
}

/// Output format for the CLI
enum OutputFormat {
    /// GitHub Actions: write to $GITHUB_OUTPUT + summary to stdout
    Gha,
    /// Full JSON to stdout
    Json,
    /// Human-readable text to stdout
    Text,
}

impl OutputFormat {
    fn detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("gha") => OutputFormat::Gha,
            Some("json") => OutputFormat::Json,
            Some("text") => OutputFormat::Text,
            _ => {
                if std::env::var("GITHUB_ACTIONS").is_ok() {
                    OutputFormat::Gha
                } else {
                    OutputFormat::Text
                }
            }
        }
    }
}

/// Shared state of every subcommand
struct RunContext {
    repo_root: PathBuf,
    settings: Settings,
    format: OutputFormat,
}

impl RunContext {
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let repo_root = match &cli.repo_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let settings = Settings::load(&repo_root)
            .with_context(|| format!("loading settings from {}", repo_root.display()))?;
        Ok(Self {
            repo_root,
            settings,
            format: OutputFormat::detect(cli.output_format.as_deref()),
        })
    }

    fn changelog_dir(&self) -> PathBuf {
        self.settings.changelog_path(&self.repo_root)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PKGDELTA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = RunContext::load(&cli).and_then(|ctx| match &cli.command {
        Commands::Diff(args) => run_diff(&ctx, args),
        Commands::Reconcile(args) => run_reconcile(&ctx, args),
        Commands::Bump(args) => run_bump(&ctx, args),
        Commands::Archive(args) => run_archive(&ctx, args),
        Commands::Rebase(args) => run_rebase(&ctx, args),
        Commands::Foreign(args) => run_foreign(&ctx, args),
        Commands::ReleasePr(args) => run_release_pr(&ctx, args),
        Commands::Stability(args) => run_stability(&ctx, args),
    });

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn load_dumps(args: &DumpArgs) -> anyhow::Result<Vec<DiffResult>> {
    let baseline = ApiDump::load_optional(&args.baseline)
        .with_context(|| format!("reading baseline dump {}", args.baseline.display()))?;
    let dev = ApiDump::load(&args.dev)
        .with_context(|| format!("reading dev dump {}", args.dev.display()))?;
    Ok(compare_api_dumps(baseline.as_ref(), &dev))
}

fn run_diff(ctx: &RunContext, args: &DumpArgs) -> anyhow::Result<i32> {
    let results = load_dumps(args)?;
    let breaking = results
        .iter()
        .filter(|r| r.action_type == ActionType::BreakingChange)
        .count();

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({
            "results": results,
            "breaking": breaking,
            "additional": results.len() - breaking,
        }))?,
        OutputFormat::Text => println!("{}", format_diff_results(&results)),
        OutputFormat::Gha => {
            write_gha(&[
                ("has_breaking", (breaking > 0).to_string()),
                ("change_count", results.len().to_string()),
                ("report", format_diff_results(&results)),
            ])?;
            println!("{}", format_diff_results(&results));
        }
    }
    Ok(0)
}

fn run_reconcile(ctx: &RunContext, args: &ReconcileArgs) -> anyhow::Result<i32> {
    let results = load_dumps(&args.dumps)?;
    let author = args
        .author
        .clone()
        .unwrap_or_else(|| ctx.settings.default_author.clone());

    let outcome = Reconciler::new(author)
        .reconcile_changelog_file(&ctx.changelog_dir(), args.pr, &results)
        .with_context(|| format!("reconciling changelog for pr {}", args.pr))?;
    let path = &outcome.path;
    let auto = outcome.actions.iter().filter(|a| a.is_auto_generated()).count();
    let stale: Vec<&Path> = outcome
        .stale_elsewhere
        .iter()
        .map(|(file, _)| file.as_path())
        .collect();

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({
            "file": path,
            "changed": outcome.changed,
            "actions": outcome.actions.len(),
            "auto_generated": auto,
            "covered_elsewhere": outcome.covered_elsewhere,
            "stale_elsewhere": stale,
        }))?,
        OutputFormat::Gha => write_gha(&[
            ("changelog_changed", outcome.changed.to_string()),
            ("changelog_file", path.display().to_string()),
        ])?,
        OutputFormat::Text => println!(
            "{}: {} actions ({} auto-generated, {} already recorded elsewhere){}",
            path.display(),
            outcome.actions.len(),
            auto,
            outcome.covered_elsewhere,
            if outcome.changed { ", updated" } else { ", unchanged" }
        ),
    }
    Ok(0)
}

/// Settings overridden by the bump flags, validated like the settings file
fn bump_policy(settings: &Settings, args: &BumpArgs) -> anyhow::Result<BumpPolicy> {
    let mut settings = settings.clone();
    if let Some(raw) = &args.max_bump_type {
        settings.max_bump_type = Some(raw.parse::<BumpType>()?);
    }
    settings.keep_prerelease |= args.keep_prerelease;
    settings.validate().context("invalid bump options")?;
    Ok(BumpPolicy::from(&settings))
}

fn run_bump(ctx: &RunContext, args: &BumpArgs) -> anyhow::Result<i32> {
    let current = PkgVersion::from_tag(&args.current, &ctx.settings.tag_prefix)
        .with_context(|| format!("parsing current version '{}'", args.current))?;
    let policy = bump_policy(&ctx.settings, args)?;

    let actions = parse_changelog_dir(&ctx.changelog_dir())?;
    let pending = unreleased_actions(&actions);
    let decision = VersionCalculator::new(policy).decide(&current, pending)?;

    match ctx.format {
        OutputFormat::Json => write_json(&decision)?,
        OutputFormat::Gha => {
            write_gha(&[
                ("next_version", decision.next.to_string()),
                ("bump_type", decision.applied.to_string()),
                ("has_bump", (decision.next != current).to_string()),
            ])?;
            println!("{} -> {} ({})", current, decision.next, decision.applied);
        }
        OutputFormat::Text => println!("{}", decision.next),
    }
    Ok(0)
}

fn run_archive(ctx: &RunContext, args: &ArchiveArgs) -> anyhow::Result<i32> {
    let trigger = args.cleanup_trigger.unwrap_or(ctx.settings.cleanup_trigger);
    let keep = args.keep_count.unwrap_or(ctx.settings.keep_count);
    let moved = archive_old_actions(&ctx.changelog_dir(), trigger, keep)?;

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({ "archived": moved }))?,
        _ => {
            for path in &moved {
                println!("archived {}", path.display());
            }
            if moved.is_empty() {
                println!("nothing to archive");
            }
        }
    }
    Ok(0)
}

fn run_rebase(ctx: &RunContext, args: &RebaseArgs) -> anyhow::Result<i32> {
    let repo = GitRepository::discover(&ctx.repo_root)?;
    let commits = repo.commits(args.since.as_deref())?;
    let policy = args.unmatched;

    let report = rebase_changelog_dir(&ctx.changelog_dir(), &commits, |action| {
        tracing::warn!(name = action.name.as_str(), "stale fix without matching commit");
        match policy {
            UnmatchedPolicy::Keep => UnmatchedResolution::KeepStale,
            UnmatchedPolicy::Remove => UnmatchedResolution::RemoveEntry,
        }
    })?;

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({
            "remapped": report.remapped,
            "unmatched": report.unmatched.iter().map(|(sha, _)| sha).collect::<Vec<_>>(),
            "files_changed": report.files_changed,
        }))?,
        _ => {
            for (old, new) in &report.remapped {
                println!("{old} -> {new}");
            }
            for (sha, resolution) in &report.unmatched {
                println!("{sha}: {resolution:?}");
            }
        }
    }
    Ok(0)
}

fn run_foreign(ctx: &RunContext, args: &ForeignArgs) -> anyhow::Result<i32> {
    let repo = GitRepository::discover(&ctx.repo_root)?;
    let dir = ctx.changelog_dir();
    let changed = repo.changed_changelog_files(&dir, &args.base)?;
    let foreign = find_foreign_changelog_files(&changed, args.pr);

    if foreign.is_empty() {
        println!("no foreign changelog files");
        return Ok(0);
    }
    let names = stems(&foreign);

    if args.consolidate {
        let target = changelog_filepath(&dir, args.pr);
        consolidate_changelog_files(&target, &foreign)?;
        println!("consolidated {} into {}", names, target.display());
        return Ok(0);
    }

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({ "foreign": foreign }))?,
        OutputFormat::Gha => write_gha(&[("foreign_files", names.clone())])?,
        OutputFormat::Text => {}
    }
    eprintln!("changelog files from other pull requests: {names}");
    Ok(1)
}

fn run_release_pr(ctx: &RunContext, args: &ReleasePrArgs) -> anyhow::Result<i32> {
    let version = args
        .tag
        .strip_prefix(ctx.settings.tag_prefix.as_str())
        .unwrap_or(&args.tag);
    let release = find_release_action(&ctx.changelog_dir(), version)?;

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({
            "version": release.version,
            "old_version": release.old_version,
            "pr": release.pr,
        }))?,
        OutputFormat::Gha => write_gha(&[("release_pr", release.pr.to_string())])?,
        OutputFormat::Text => println!("{}", release.pr),
    }
    Ok(0)
}

fn run_stability(ctx: &RunContext, args: &StabilityArgs) -> anyhow::Result<i32> {
    let target = TargetPath::parse(&args.target)?;
    let state = ApiState::from_actions(&parse_changelog_dir(&ctx.changelog_dir())?);
    let stability = state.stability_of(&target);
    let public = target
        .symbol
        .map(|symbol| state.is_public(target.group, symbol));

    match ctx.format {
        OutputFormat::Json => write_json(&serde_json::json!({
            "target": args.target,
            "stability": stability,
            "public": public,
        }))?,
        OutputFormat::Gha => write_gha(&[("stability", stability.to_string())])?,
        OutputFormat::Text => match public {
            Some(false) => println!("{} ({}, not public)", stability, args.target),
            _ => println!("{} ({})", stability, args.target),
        },
    }
    Ok(0)
}

fn stems(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer(&mut lock, value)?;
    writeln!(lock)?;
    Ok(())
}

/// Write outputs using GitHub Actions multiline syntax to $GITHUB_OUTPUT
fn write_gha(outputs: &[(&str, String)]) -> anyhow::Result<()> {
    let Ok(output_file) = std::env::var("GITHUB_OUTPUT") else {
        tracing::warn!("GITHUB_OUTPUT not set, falling back to stdout");
        for (name, value) in outputs {
            println!("{name}={value}");
        }
        return Ok(());
    };

    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(Path::new(&output_file))
        .with_context(|| format!("cannot open GITHUB_OUTPUT ({output_file})"))?;

    let delim = "PKGDELTA_EOF";
    for (name, value) in outputs {
        if value.contains('\n') {
            writeln!(f, "{name}<<{delim}")?;
            writeln!(f, "{value}")?;
            writeln!(f, "{delim}")?;
        } else {
            writeln!(f, "{name}={value}")?;
        }
    }
    Ok(())
}
