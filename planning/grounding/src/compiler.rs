//! Grounding engines: compile a lifted problem into an equivalent problem without action parameters.

use std::fmt::{Display, Formatter};

use downward_model::pddl::PddlWriter;
use downward_model::*;

use crate::errors::{AXIOMS_MSG, GroundingError, Result};
use crate::goal;
use crate::ground::BindingGrounder;
use crate::kind::*;
use crate::materialize::Materializer;
use crate::metric;
use crate::reachability;
use crate::trace::{PlanLifter, TraceBackMap};

/// Result of a compilation.
pub struct CompilerResult {
    pub problem: Problem,
    /// Maps the actions of `problem` back to actions of the input problem.
    pub lifter: PlanLifter,
    pub engine_name: &'static str,
}

impl CompilerResult {
    pub fn trace_back_map(&self) -> &TraceBackMap {
        self.lifter.trace_back_map()
    }
}

pub trait Compiler {
    fn name(&self) -> &'static str;

    /// Features of the problems accepted by the compiler.
    fn supported_kind(&self) -> ProblemKind;

    fn supports(&self, kind: &ProblemKind) -> bool {
        kind.is_subset_of(&self.supported_kind())
    }

    fn supports_compilation(&self, kind: CompilationKind) -> bool {
        kind == CompilationKind::Grounding
    }

    /// Features of the problem produced by compiling a problem of the given kind.
    fn resulting_problem_kind(&self, kind: &ProblemKind, compilation: CompilationKind) -> ProblemKind;

    /// Compiles the problem. The input problem is left untouched.
    ///
    /// Problems using features outside of [`Compiler::supported_kind`] are attempted anyway, with a warning.
    fn compile(&self, problem: &Problem, kind: CompilationKind) -> Result<CompilerResult>;

    /// Compiles the problem, rejecting it upfront if it uses features outside of the supported kind.
    fn compile_strict(&self, problem: &Problem, kind: CompilationKind) -> Result<CompilerResult> {
        let problem_kind = problem.kind();
        if !self.supports(&problem_kind) {
            let unsupported = problem_kind.difference(&self.supported_kind()).collect();
            return Err(GroundingError::UnsupportedProblemKind(unsupported));
        }
        self.compile(problem, kind)
    }
}

/// Steps of a compilation, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Idle,
    GoalRewritten,
    Serialized,
    Analyzed,
    Materialized,
    TraceBackBuilt,
    MetricsRegrounded,
    Done,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

struct Progress {
    stage: Stage,
}

impl Progress {
    fn new() -> Self {
        Progress { stage: Stage::Idle }
    }

    fn reached(&mut self, stage: Stage) {
        self.stage = stage;
        tracing::trace!(%stage);
    }

    /// Logs the stage at which a compilation failed.
    fn finish<T>(&self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            tracing::debug!(stage = %self.stage, error = %e, "compilation failed");
        }
        res
    }
}

/// Common checks before compiling.
fn check(compiler: &dyn Compiler, problem: &Problem, kind: CompilationKind) -> Result<()> {
    if !compiler.supports_compilation(kind) {
        return Err(GroundingError::UnsupportedCompilation(kind));
    }
    let problem_kind = problem.kind();
    if !compiler.supports(&problem_kind) {
        let unsupported = problem_kind.difference(&compiler.supported_kind()).collect::<Vec<_>>();
        tracing::warn!(engine = compiler.name(), ?unsupported, "problem kind is not supported");
    }
    Ok(())
}

fn ground_problem_name(engine: &str, problem: &Problem) -> Sym {
    Sym::from(format!("{engine}_{}", problem.name))
}

/// Grounds a problem with the full instantiation of the Fast Downward translator.
///
/// Goals that are not a conjunction of literals are first rewritten into a goal action. Problems whose
/// grounding requires derived predicates are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastDownwardGrounder;

impl FastDownwardGrounder {
    fn ground(&self, problem: &Problem, progress: &mut Progress) -> Result<CompilerResult> {
        let goal = goal::transform(problem, true)?;
        progress.reached(Stage::GoalRewritten);
        let working = &goal.problem;

        let writer = PddlWriter::new(working);
        let domain = writer.domain()?;
        let pddl_problem = writer.problem()?;
        progress.reached(Stage::Serialized);

        let explored = reachability::explore(&domain, &pddl_problem)?;
        if !explored.axioms.is_empty() {
            return Err(GroundingError::UnsupportedProblemFeature(AXIOMS_MSG));
        }
        if !explored.relaxed_reachable {
            tracing::warn!(problem = %problem.name, "goal is not reachable in the delete relaxation");
        }
        progress.reached(Stage::Analyzed);

        let mut ground = working.clone();
        ground.name = ground_problem_name(self.name(), problem);
        ground.clear_actions();
        ground.clear_goals();
        let mut materializer = Materializer::new(writer.name_table());
        let mut origins = Vec::with_capacity(explored.actions.len());
        for a in &explored.actions {
            origins.push(materializer.add_action(&mut ground, a)?);
        }
        for g in &explored.goals {
            let g = materializer.literal(&mut ground.env, g)?;
            ground.goals.push(g);
        }
        progress.reached(Stage::Materialized);

        let trace = TraceBackMap::build(origins, |a| goal.original_action(a).cloned());
        progress.reached(Stage::TraceBackBuilt);

        metric::reground(working, &trace, &mut ground)?;
        progress.reached(Stage::MetricsRegrounded);

        tracing::debug!(num_actions = ground.actions.len(), num_goals = ground.goals.len(), "ground problem");
        Ok(CompilerResult {
            problem: ground,
            lifter: PlanLifter::new(trace),
            engine_name: self.name(),
        })
    }
}

impl Compiler for FastDownwardGrounder {
    fn name(&self) -> &'static str {
        "Fast Downward Grounder"
    }

    fn supported_kind(&self) -> ProblemKind {
        full_grounding_kind()
    }

    fn resulting_problem_kind(&self, kind: &ProblemKind, _compilation: CompilationKind) -> ProblemKind {
        full_grounding_result(kind)
    }

    fn compile(&self, problem: &Problem, kind: CompilationKind) -> Result<CompilerResult> {
        let _span = tracing::info_span!("compile", engine = self.name(), problem = %problem.name).entered();
        check(self, problem, kind)?;
        let mut progress = Progress::new();
        let res = self.ground(problem, &mut progress);
        if res.is_ok() {
            progress.reached(Stage::Done);
        }
        progress.finish(res)
    }
}

/// Grounds a problem by instantiating its actions for the parameters found reachable by the Fast Downward
/// translator, without full instantiation. Conditions are only simplified, so the goals and the kind of the
/// problem are unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastDownwardReachabilityGrounder;

impl FastDownwardReachabilityGrounder {
    fn ground(&self, problem: &Problem, progress: &mut Progress) -> Result<CompilerResult> {
        let writer = PddlWriter::new(problem);
        let domain = writer.domain()?;
        let pddl_problem = writer.problem()?;
        progress.reached(Stage::Serialized);

        let bindings = reachability::reachable_bindings(&domain, &pddl_problem)?;
        progress.reached(Stage::Analyzed);

        let mut ground = problem.clone();
        ground.name = ground_problem_name(self.name(), problem);
        ground.clear_actions();
        let names = Materializer::new(writer.name_table());
        let mut grounder = BindingGrounder::new(problem);
        let mut origins = Vec::with_capacity(bindings.len());
        for b in &bindings {
            let action = names.action(b.action.canonical_str())?;
            let arguments = b
                .arguments
                .iter()
                .map(|a| names.object(a.canonical_str()).cloned())
                .collect::<Result<Vec<_>>>()?;
            if let Some(origin) = grounder.ground(&mut ground, action, &arguments)? {
                origins.push(origin);
            }
        }
        progress.reached(Stage::Materialized);

        let trace = TraceBackMap::build(origins, |a| Some(a.clone()));
        progress.reached(Stage::TraceBackBuilt);

        metric::reground(problem, &trace, &mut ground)?;
        progress.reached(Stage::MetricsRegrounded);

        tracing::debug!(num_actions = ground.actions.len(), "ground problem");
        Ok(CompilerResult {
            problem: ground,
            lifter: PlanLifter::new(trace),
            engine_name: self.name(),
        })
    }
}

impl Compiler for FastDownwardReachabilityGrounder {
    fn name(&self) -> &'static str {
        "Fast Downward Reachability Grounder"
    }

    fn supported_kind(&self) -> ProblemKind {
        reachability_grounding_kind()
    }

    fn resulting_problem_kind(&self, kind: &ProblemKind, _compilation: CompilationKind) -> ProblemKind {
        kind.clone()
    }

    fn compile(&self, problem: &Problem, kind: CompilationKind) -> Result<CompilerResult> {
        let _span = tracing::info_span!("compile", engine = self.name(), problem = %problem.name).entered();
        check(self, problem, kind)?;
        let mut progress = Progress::new();
        let res = self.ground(problem, &mut progress);
        if res.is_ok() {
            progress.reached(Stage::Done);
        }
        progress.finish(res)
    }
}

/// Grounding engine with the given name, as returned by [`Compiler::name`].
pub fn compiler_by_name(name: &str) -> Option<Box<dyn Compiler>> {
    let engines: [Box<dyn Compiler>; 2] = [Box::new(FastDownwardGrounder), Box::new(FastDownwardReachabilityGrounder)];
    engines.into_iter().find(|e| e.name() == name)
}
