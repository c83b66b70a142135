//! Trellis CLI binary: run, resume and inspect pipeline definitions.
//!
//! Subcommands: `run` (fresh run), `resume` (continue a paused run from its continuation
//! file), `inspect` (print the graph as text or DOT). Events go to stdout as one JSON
//! object per line.

use clap::{Parser, Subcommand};
use cli::{
    build_engine, parse_decision, read_continuation, stream_events, thread_seed,
    write_continuation, CliError,
};
use std::path::{Path, PathBuf};
use trellis::{
    generate_dot, generate_text, EngineConfig, GraphIndex, PipelineDefinition, RunInput,
    RunOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Trellis: run pipeline definitions from the CLI")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a pipeline from its input node
    Run(RunArgs),
    /// Resume a run paused for plan or tool review
    Resume(ResumeArgs),
    /// Print the pipeline graph
    Inspect(InspectArgs),
}

#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Model name (default: TRELLIS_MODEL or gpt-4o-mini)
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// SQLite run store path; runs are kept in memory when not set
    #[arg(long, value_name = "PATH", env = "TRELLIS_DB")]
    db: Option<PathBuf>,

    /// Max graph hops per run (default: TRELLIS_MAX_STEPS or 1000)
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,

    /// Write the continuation here when the run pauses
    #[arg(long, value_name = "PATH")]
    continuation_out: Option<PathBuf>,

    /// Pretty-print events (multi-line). Default: compact, one line per event
    #[arg(long)]
    pretty: bool,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Pipeline definition (JSON)
    #[arg(long, value_name = "FILE")]
    pipeline: PathBuf,

    /// Query (or pass as trailing positional arguments)
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Session id (default: a new one per invocation)
    #[arg(long, value_name = "ID")]
    session: Option<String>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(clap::Args, Debug)]
struct ResumeArgs {
    /// Pipeline definition (JSON); must be the one the run started with
    #[arg(long, value_name = "FILE")]
    pipeline: PathBuf,

    /// Continuation file written by `run --continuation-out`
    #[arg(long, value_name = "PATH")]
    continuation: PathBuf,

    /// approved | rejected | revised | JSON arguments
    #[arg(long, default_value = "approved")]
    decision: String,

    /// Revised tool arguments (JSON) for `--decision revised`
    #[arg(long, value_name = "JSON")]
    arguments: Option<String>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(clap::Args, Debug)]
struct InspectArgs {
    /// Pipeline definition (JSON)
    #[arg(long, value_name = "FILE")]
    pipeline: PathBuf,

    /// Print Graphviz DOT instead of the text summary
    #[arg(long)]
    dot: bool,
}

fn engine_config(args: &EngineArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(ref model) = args.model {
        config.default_model = model.clone();
    }
    if let Some(n) = args.max_steps {
        config = config.with_max_steps(n);
    }
    config
}

/// Writes the continuation of a suspended outcome, or tells the user how to keep it.
fn handle_outcome(outcome: &RunOutcome, continuation_out: Option<&Path>) -> Result<(), CliError> {
    if let RunOutcome::Suspended(c) = outcome {
        match continuation_out {
            Some(path) => {
                write_continuation(path, c)?;
                eprintln!(
                    "trellis: run paused at {} for {}; continuation written to {}",
                    c.node_id,
                    c.reason.as_str(),
                    path.display()
                );
            }
            None => eprintln!(
                "trellis: run paused at {} for {}; pass --continuation-out to keep it",
                c.node_id,
                c.reason.as_str()
            ),
        }
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    let definition = PipelineDefinition::from_path(&args.pipeline)?;
    let query = args.message.unwrap_or_else(|| args.rest.join(" "));
    let session = args
        .session
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    let config = engine_config(&args.engine);
    let model = config.default_model.clone();
    let (engine, _agent) = build_engine(config, args.engine.db.as_deref())?;

    let handle = engine.start(definition, RunInput::new(session, query).with_model(model))?;
    let mut stdout = std::io::stdout();
    let outcome = stream_events(handle, &mut stdout, args.engine.pretty).await?;
    handle_outcome(&outcome, args.engine.continuation_out.as_deref())
}

async fn resume(args: ResumeArgs) -> Result<(), CliError> {
    let definition = PipelineDefinition::from_path(&args.pipeline)?;
    let continuation = read_continuation(&args.continuation)?;
    let decision = parse_decision(&args.decision, args.arguments.as_deref())?;
    let config = engine_config(&args.engine);
    let (engine, agent) = build_engine(config, args.engine.db.as_deref())?;
    agent.restore_thread(
        continuation.thread.clone(),
        thread_seed(&continuation, &definition)?,
    );

    let handle = engine.resume(definition, continuation.resume_with(decision))?;
    let mut stdout = std::io::stdout();
    let outcome = stream_events(handle, &mut stdout, args.engine.pretty).await?;
    handle_outcome(&outcome, args.engine.continuation_out.as_deref())
}

fn inspect(args: InspectArgs) -> Result<(), CliError> {
    let definition = PipelineDefinition::from_path(&args.pipeline)?;
    let index = GraphIndex::build(&definition)?;
    if args.dot {
        print!("{}", generate_dot(&index));
    } else {
        print!("{}", generate_text(&index));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("trellis", None::<&Path>).ok();
    let _log_guard = config::tracing_init::init("info")?;

    let args = Args::parse();
    let result = match args.cmd {
        Command::Run(a) => run(a).await,
        Command::Resume(a) => resume(a).await,
        Command::Inspect(a) => inspect(a),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("trellis: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
