use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use devbench_cli::config::{Config, TextGenConfig};
use devbench_cli::dataset::{merge_instances, read_jsonl, select_bench, write_jsonl};
use devbench_cli::pipeline::{recover_outcomes, StepPipeline};
use devbench_cli::prompts::{PromptKind, PromptSet};
use devbench_cli::samples::{
    collect_docstrings, collect_specifications, docstring_requests,
    prepare_docstring_samples, prepare_specification_samples, specification_requests,
};
use devbench_cli::textgen::{OpenAiCompatClient, TextGenerator};
use devbench_cli::tokens::{EstimateCounter, TiktokenCounter, TokenCounter};
use devbench_cli::vcs::GitWorkingTree;
use devbench_cli::{print_stdout, read_json, write_json};
use devbench_patch::patch_to_replace;
use devbench_protocol::{
    DevelopmentStep, DocstringMap, SpecificationEntry, StepOutcome, TaskInstance, TraceRecord,
};
use devbench_rewriter::Rewriter;
use devbench_schedule::build_schedule;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devbench")]
#[command(
    about = "Turn traced Python test suites into incremental development tasks",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the development schedule from call traces
    Schedule(ScheduleArgs),

    /// Generate a docstring for every node to develop
    Docstrings(DocstringsArgs),

    /// Generate a specification for every step
    Specifications(SpecificationsArgs),

    /// Materialize skeleton and reference branches for every step
    Codebase(CodebaseArgs),

    /// Recover commit hashes and flags from an existing working tree
    Commits(CommitsArgs),

    /// Join step outcomes and specifications into task instances (JSONL)
    Merge(MergeArgs),

    /// Select benchmark instances from allow-listed repositories
    Bench(BenchArgs),

    /// Convert a unified diff into search/replace blocks
    Replace(ReplaceArgs),
}

#[derive(Args)]
struct ScheduleArgs {
    /// JSON array of trace records
    #[arg(long)]
    traces: PathBuf,

    /// Output path for the development schedule
    #[arg(long)]
    output: PathBuf,

    /// Output path for the per-step dependency graphs
    #[arg(long)]
    graphs: Option<PathBuf>,
}

#[derive(Args, Default)]
struct TextGenArgs {
    /// OpenAI-compatible endpoint (overrides textgen.base_url)
    #[arg(long)]
    base_url: Option<String>,

    /// Model name (overrides textgen.model)
    #[arg(long)]
    model: Option<String>,

    /// Requests in flight at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Extra attempts after a failed request
    #[arg(long)]
    max_retries: Option<usize>,

    /// Demonstrations per request
    #[arg(long)]
    n_shots: Option<usize>,

    /// Directory with prompt overrides
    #[arg(long)]
    prompt_dir: Option<PathBuf>,
}

impl TextGenArgs {
    fn apply(&self, mut config: TextGenConfig) -> TextGenConfig {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.max_concurrency = max_concurrency;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(n_shots) = self.n_shots {
            config.n_shots = n_shots;
        }
        if let Some(dir) = &self.prompt_dir {
            config.prompt_dir = Some(dir.clone());
        }
        config
    }
}

#[derive(Args)]
struct DocstringsArgs {
    /// Root of the project the traces were recorded on
    #[arg(long)]
    project_root: PathBuf,

    /// Development schedule produced by `schedule`
    #[arg(long)]
    schedule: PathBuf,

    /// Output path for the docstring map
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    textgen: TextGenArgs,
}

#[derive(Args)]
struct SpecificationsArgs {
    /// Root of the project the traces were recorded on
    #[arg(long)]
    project_root: PathBuf,

    /// Development schedule produced by `schedule`
    #[arg(long)]
    schedule: PathBuf,

    /// Output path for the specifications
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    textgen: TextGenArgs,
}

#[derive(Args)]
struct CodebaseArgs {
    /// Root of the project the traces were recorded on
    #[arg(long)]
    project_root: PathBuf,

    /// Development schedule produced by `schedule`
    #[arg(long)]
    schedule: PathBuf,

    /// Docstring map produced by `docstrings` (placeholders are used without it)
    #[arg(long)]
    docstrings: Option<PathBuf>,

    /// Directory for the new git working tree
    #[arg(long)]
    workdir: PathBuf,

    /// Output path for the step outcomes
    #[arg(long)]
    output: PathBuf,

    /// Minimum patch size in tokens (overrides dataset.threshold)
    #[arg(long)]
    threshold: Option<usize>,

    /// Statement left in stubbed bodies (overrides rewriter.stub_statement)
    #[arg(long)]
    stub_statement: Option<String>,
}

#[derive(Args)]
struct CommitsArgs {
    /// Existing working tree with step branches
    #[arg(long)]
    workdir: PathBuf,

    /// Development schedule produced by `schedule`
    #[arg(long)]
    schedule: PathBuf,

    /// Step outcomes produced by `codebase`
    #[arg(long)]
    outcomes: PathBuf,

    /// Output path for the refreshed step outcomes
    #[arg(long)]
    output: PathBuf,

    /// Minimum patch size in tokens (overrides dataset.threshold)
    #[arg(long)]
    threshold: Option<usize>,
}

#[derive(Args)]
struct MergeArgs {
    /// Repository full name, e.g. `pallets/jinja`
    #[arg(long)]
    repo: String,

    /// Step outcomes produced by `codebase` or `commits`
    #[arg(long)]
    outcomes: PathBuf,

    /// Specifications produced by `specifications`
    #[arg(long)]
    specifications: PathBuf,

    /// Output JSONL path
    #[arg(long)]
    output: PathBuf,
}

#[derive(Args)]
struct BenchArgs {
    /// Task instances (JSONL)
    #[arg(long)]
    input: PathBuf,

    /// Output JSONL path; per-repository counts go next to it as `.stats.json`
    #[arg(long)]
    output: PathBuf,

    /// Cap instances per repository at dataset.lite_cap
    #[arg(long)]
    lite: bool,

    /// Explicit per-repository cap
    #[arg(long, conflicts_with = "lite")]
    cap: Option<usize>,
}

#[derive(Args)]
struct ReplaceArgs {
    /// Unified diff to convert (stdin when omitted)
    #[arg(long)]
    patch: Option<PathBuf>,

    /// Write blocks here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Schedule(args) => run_schedule(args)?,
        Commands::Docstrings(args) => run_docstrings(args, config).await?,
        Commands::Specifications(args) => run_specifications(args, config).await?,
        Commands::Codebase(args) => run_codebase(args, config)?,
        Commands::Commits(args) => run_commits(args, config)?,
        Commands::Merge(args) => run_merge(args)?,
        Commands::Bench(args) => run_bench(args, config)?,
        Commands::Replace(args) => run_replace(args)?,
    }

    Ok(())
}

fn token_counter() -> Box<dyn TokenCounter> {
    match TiktokenCounter::o200k_base() {
        Ok(counter) => Box::new(counter),
        Err(err) => {
            log::warn!("o200k_base encoding unavailable ({err:#}); estimating token counts");
            Box::new(EstimateCounter)
        }
    }
}

fn run_schedule(args: ScheduleArgs) -> Result<()> {
    let traces: Vec<TraceRecord> = read_json(&args.traces)?;
    let plan = build_schedule(&traces).context("Failed to build schedule")?;
    log::info!(
        "{} traces scheduled into {} steps",
        traces.len(),
        plan.steps.len()
    );
    write_json(&args.output, &plan.steps)?;
    if let Some(path) = &args.graphs {
        write_json(path, &plan.dependency_graphs)?;
    }
    Ok(())
}

async fn run_docstrings(args: DocstringsArgs, config: Config) -> Result<()> {
    let textgen = args.textgen.apply(config.textgen);
    let steps: Vec<DevelopmentStep> = read_json(&args.schedule)?;
    let mut rewriter = Rewriter::new(config.rewriter)?;

    log::info!("Preparing docstrings for {}", args.project_root.display());
    let samples = prepare_docstring_samples(&mut rewriter, &args.project_root, &steps)?;
    let prompts = PromptSet::load(PromptKind::Docstring, textgen.prompt_dir.as_deref())?;
    let requests = docstring_requests(&samples, &prompts, &textgen.model, textgen.n_shots);

    let client = OpenAiCompatClient::from_config(&textgen)?;
    let responses = client.generate(requests).await;
    let docstrings = collect_docstrings(samples, responses);
    log::info!("Collected {} docstrings", docstrings.len());
    write_json(&args.output, &docstrings)
}

async fn run_specifications(args: SpecificationsArgs, config: Config) -> Result<()> {
    let textgen = args.textgen.apply(config.textgen);
    let steps: Vec<DevelopmentStep> = read_json(&args.schedule)?;
    let mut rewriter = Rewriter::new(config.rewriter)?;

    log::info!("Generating specifications for {}", args.project_root.display());
    let samples = prepare_specification_samples(&mut rewriter, &args.project_root, &steps)?;
    let prompts = PromptSet::load(PromptKind::Specification, textgen.prompt_dir.as_deref())?;
    let requests = specification_requests(&samples, &prompts, &textgen.model, textgen.n_shots);

    let client = OpenAiCompatClient::from_config(&textgen)?;
    let responses = client.generate(requests).await;
    let specifications = collect_specifications(&samples, responses);
    log::info!("Collected {} specifications", specifications.len());
    write_json(&args.output, &specifications)
}

fn run_codebase(args: CodebaseArgs, config: Config) -> Result<()> {
    let steps: Vec<DevelopmentStep> = read_json(&args.schedule)?;
    let docstrings: DocstringMap = match &args.docstrings {
        Some(path) => read_json(path)?,
        None => DocstringMap::new(),
    };
    if args.workdir.join(".git").exists() {
        anyhow::bail!(
            "{} already holds a git repository; use `commits` to recover it",
            args.workdir.display()
        );
    }

    let mut rewriter_config = config.rewriter;
    if let Some(stub) = args.stub_statement {
        rewriter_config.stub_statement = stub;
    }
    let mut rewriter = Rewriter::new(rewriter_config)?;
    let mut tree = GitWorkingTree::init_from(&args.project_root, &args.workdir)
        .context("Failed to prepare working tree")?;
    let counter = token_counter();

    let mut pipeline = StepPipeline {
        vcs: &mut tree,
        rewriter: &mut rewriter,
        counter: counter.as_ref(),
        threshold: args.threshold.unwrap_or(config.dataset.threshold),
    };
    let outcomes = pipeline.run(&args.project_root, &steps, &docstrings)?;

    let kept = outcomes.iter().filter(|o| o.flag).count();
    log::info!("{kept} of {} steps carry a non-trivial patch", outcomes.len());
    write_json(&args.output, &outcomes)
}

fn run_commits(args: CommitsArgs, config: Config) -> Result<()> {
    let steps: Vec<DevelopmentStep> = read_json(&args.schedule)?;
    let outcomes: Vec<StepOutcome> = read_json(&args.outcomes)?;
    let mut tree = GitWorkingTree::open(&args.workdir)?;
    let counter = token_counter();
    let threshold = args.threshold.unwrap_or(config.dataset.threshold);

    let outcomes = recover_outcomes(&mut tree, &steps, outcomes, counter.as_ref(), threshold)?;
    write_json(&args.output, &outcomes)
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let outcomes: Vec<StepOutcome> = read_json(&args.outcomes)?;
    let specifications: Vec<SpecificationEntry> = read_json(&args.specifications)?;
    let instances = merge_instances(&args.repo, &outcomes, &specifications);
    write_jsonl(&args.output, &instances)?;
    log::info!("Wrote {} instances to {}", instances.len(), args.output.display());
    Ok(())
}

fn run_bench(args: BenchArgs, config: Config) -> Result<()> {
    let instances: Vec<TaskInstance> = read_jsonl(&args.input)?;
    let cap = args
        .cap
        .or(args.lite.then_some(config.dataset.lite_cap));
    let selection = select_bench(&instances, &config.dataset.repositories, cap);

    write_jsonl(&args.output, &selection.instances)?;
    write_json(&args.output.with_extension("stats.json"), &selection.stats)?;
    for (repo, count) in &selection.stats {
        log::info!("{repo}: {count}");
    }
    log::info!(
        "Selected {} of {} instances",
        selection.instances.len(),
        instances.len()
    );
    Ok(())
}

fn run_replace(args: ReplaceArgs) -> Result<()> {
    let patch = match &args.patch {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read patch from stdin")?;
            buf
        }
    };
    let blocks = patch_to_replace(&patch).context("Failed to parse patch")?;
    match &args.output {
        Some(path) => {
            fs::write(path, &blocks).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => print_stdout(&blocks),
    }
}
