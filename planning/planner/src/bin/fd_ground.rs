use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use downward_grounding::{CompilationKind, Compiler, FastDownwardGrounder, FastDownwardReachabilityGrounder};
use downward_model::pddl::{PddlWriter, find_domain_of, input::Input, read_problem, writer::write_plan};
use downward_model::*;
use downward_planner::config::DOWNWARD_PATH_VAR;
use downward_planner::*;
use itertools::Itertools;

/// Grounding of PDDL problems and solving with Fast Downward.
#[derive(Parser, Debug)]
#[command(name = "fd-ground", rename_all = "kebab-case")]
struct App {
    /// Logging level to use: one of "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Grounds the problem and prints the ground domain and problem.
    Ground(GroundArgs),
    /// Solves the problem with Fast Downward and prints the plan found.
    Solve(SolveArgs),
}

#[derive(Debug, Args)]
struct ProblemFiles {
    /// If not set, will look for a `domain.pddl` file in the directory of the
    /// problem file or in the parent directory.
    #[arg(long, short)]
    domain: Option<PathBuf>,
    /// Path to the problem file.
    problem: PathBuf,
}

impl ProblemFiles {
    fn read(&self) -> anyhow::Result<Problem> {
        let problem_file = self
            .problem
            .canonicalize()
            .with_context(|| format!("Problem file {} does not exist", self.problem.display()))?;
        let domain_file = match &self.domain {
            Some(domain) => domain.clone(),
            None => find_domain_of(&problem_file).context(
                "Unable to automatically find the domain file. Consider specifying the domain with the option -d/--domain",
            )?,
        };
        let domain = Input::from_file(&domain_file)?;
        let problem = Input::from_file(&problem_file)?;
        Ok(read_problem(domain, problem)?)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Engine {
    /// Full instantiation of the Fast Downward translator.
    Full,
    /// Instantiation of the parameters found reachable by the translator.
    Reachability,
}

impl Engine {
    fn compiler(self) -> Box<dyn Compiler> {
        match self {
            Engine::Full => Box::new(FastDownwardGrounder),
            Engine::Reachability => Box::new(FastDownwardReachabilityGrounder),
        }
    }
}

#[derive(Debug, Args)]
struct GroundArgs {
    #[command(flatten)]
    files: ProblemFiles,

    #[arg(long, short, value_enum, default_value_t = Engine::Full)]
    engine: Engine,

    /// Directory in which to write `domain.pddl` and `problem.pddl`. Printed on the standard output if not set.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Also print the action of the input problem each ground action stems from.
    #[arg(long)]
    trace: bool,

    /// Reject problems using features the engine does not support instead of attempting them.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
struct SolveArgs {
    #[command(flatten)]
    files: ProblemFiles,

    /// Use the optimal configuration (A* with LM-cut).
    #[arg(long)]
    optimal: bool,

    /// Ground the problem with this engine before solving it.
    #[arg(long, value_enum)]
    ground: Option<Engine>,

    /// Report every plan found by the anytime configuration.
    #[arg(long)]
    anytime: bool,

    /// Path of the `fast-downward.py` driver script.
    #[arg(long, env = DOWNWARD_PATH_VAR)]
    downward: Option<PathBuf>,

    /// Interpreter running the driver script, e.g. `python3`.
    #[arg(long)]
    python: Option<PathBuf>,

    #[arg(long)]
    alias: Option<String>,

    /// Search configuration, e.g. "eager_greedy([ff()])".
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    anytime_alias: Option<String>,

    #[arg(long)]
    anytime_search: Option<String>,

    /// Option passed to the translator (repeatable).
    #[arg(long = "translate-option", allow_hyphen_values = true)]
    translate_options: Vec<String>,

    /// Time limit of the search, e.g. "30s".
    #[arg(long)]
    search_time_limit: Option<String>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    planner_log_level: LogLevel,

    /// Timeout (s) after which the planner is killed.
    #[arg(long)]
    timeout: Option<f64>,
}

impl SolveArgs {
    fn config(&self) -> DownwardConfig {
        let mut config = if self.optimal {
            DownwardConfig::optimal()
        } else {
            DownwardConfig::satisficing()
        };
        if let Some(downward) = &self.downward {
            config.executable = downward.clone();
        }
        config.interpreter = self.python.clone();
        if self.alias.is_some() || self.search.is_some() {
            config.alias = self.alias.clone();
            config.search_config = self.search.clone();
        }
        if self.anytime_alias.is_some() || self.anytime_search.is_some() {
            config.anytime_alias = self.anytime_alias.clone();
            config.anytime_search_config = self.anytime_search.clone();
        }
        config.translate_options = self.translate_options.clone();
        config.search_time_limit = self.search_time_limit.clone();
        config.log_level = self.planner_log_level;
        config
    }
}

fn ground(args: &GroundArgs) -> anyhow::Result<()> {
    let problem = args.files.read()?;
    let compiler = args.engine.compiler();
    let res = if args.strict {
        compiler.compile_strict(&problem, CompilationKind::Grounding)?
    } else {
        compiler.compile(&problem, CompilationKind::Grounding)?
    };
    let writer = PddlWriter::new(&res.problem);
    let (domain, ground_problem) = (writer.domain()?, writer.problem()?);
    match &args.output {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            write_file(&dir.join("domain.pddl"), &domain)?;
            write_file(&dir.join("problem.pddl"), &ground_problem)?;
        }
        None => {
            println!("{domain}");
            println!("{ground_problem}");
        }
    }
    if args.trace {
        let entries = res
            .trace_back_map()
            .iter()
            .sorted_by_key(|(name, _)| name.canonical_str());
        for (name, entry) in entries {
            match entry.original_instance() {
                Some(instance) => println!("; {name} -> {instance}"),
                None => println!("; {name} -> (none)"),
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content).with_context(|| format!("Unable to write {}", path.display()))
}

fn print_plan(problem: &Problem, plan: &SequentialPlan) -> anyhow::Result<()> {
    let writer = PddlWriter::new(problem);
    print!("{}", write_plan(plan, writer.name_table())?);
    Ok(())
}

fn solve(args: &SolveArgs) -> anyhow::Result<()> {
    let problem = args.files.read()?;
    let planner = FastDownward::new(args.config())?;
    let timeout = args.timeout.map(Duration::from_secs_f64);
    let res = match (args.anytime, args.ground) {
        (true, Some(_)) => bail!("Anytime solving of a ground problem is not supported"),
        (true, None) => {
            let mut num_plans = 0;
            planner.solve_anytime(&problem, |plan| {
                num_plans += 1;
                println!("; plan {num_plans}");
                if let Err(e) = print_plan(&problem, plan) {
                    tracing::error!(error = %e, "unable to print plan");
                }
            })?
        }
        (false, Some(engine)) => planner.solve_grounded(engine.compiler().as_ref(), &problem, timeout)?,
        (false, None) => planner.solve(&problem, timeout)?,
    };
    println!("; {}: {}", res.planner_name, res.status);
    if let Some(plan) = &res.plan {
        print_plan(&problem, plan)?;
    }
    tracing::debug!(log = %res.log, "planner output");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let app = App::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(Instant::now()))
        .with_thread_ids(true)
        .with_max_level(app.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &app.command {
        Command::Ground(args) => ground(args),
        Command::Solve(args) => solve(args),
    }
}
