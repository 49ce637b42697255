//! Runs of the planner on a problem written to PDDL in a temporary directory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use downward_grounding::{CompilationKind, Compiler, goal};
use downward_model::pddl::input::Input;
use downward_model::pddl::{NameTable, PddlWriter, writer};
use downward_model::*;
use tempfile::TempDir;

use crate::command::{Files, anytime_command, command};
use crate::config::DownwardConfig;
use crate::errors::{PlannerError, Result};
use crate::output::AnytimeOutput;
use crate::status::{ResultStatus, result_status};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct PlanResult {
    pub status: ResultStatus,
    pub plan: Option<SequentialPlan>,
    /// Exit code of the planner, `None` if it was killed.
    pub exit_code: Option<i32>,
    /// Everything the planner wrote on its output streams.
    pub log: String,
    pub planner_name: &'static str,
}

/// Problem written for the planner, together with what is needed to read its plans back.
struct Workspace {
    dir: TempDir,
    domain: PathBuf,
    problem: PathBuf,
    plan: PathBuf,
    names: NameTable,
    /// Action added to reach the goal, to be removed from the plans.
    goal_action: Option<Sym>,
}

impl Workspace {
    fn files(&self) -> Files<'_> {
        Files {
            domain: &self.domain,
            problem: &self.problem,
            plan: &self.plan,
        }
    }
}

/// The plan file written by the planner: `plan` itself, or `plan.N` with the largest `N` when the
/// planner numbers its successive plans.
fn find_plan_file(plan: &Path) -> Result<Option<PathBuf>> {
    if plan.exists() {
        return Ok(Some(plan.to_path_buf()));
    }
    let (Some(dir), Some(name)) = (plan.parent(), plan.file_name().and_then(|n| n.to_str())) else {
        return Ok(None);
    };
    let mut latest: Option<(u32, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let index = file_name
            .to_str()
            .and_then(|f| f.strip_prefix(name))
            .and_then(|f| f.strip_prefix('.'))
            .and_then(|i| i.parse::<u32>().ok());
        if let Some(index) = index {
            if latest.as_ref().is_none_or(|(l, _)| index > *l) {
                latest = Some((index, entry.path()));
            }
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// Waits for the process to terminate, killing it after `timeout`. Returns `None` if it was killed.
fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return Ok(Some(child.wait()?));
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "unable to kill the planner");
            }
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// The Fast Downward planner, invoked through its driver script.
#[derive(Clone, Debug)]
pub struct FastDownward {
    config: DownwardConfig,
}

impl FastDownward {
    pub fn new(config: DownwardConfig) -> Result<Self> {
        config.validate()?;
        Ok(FastDownward { config })
    }

    pub fn config(&self) -> &DownwardConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        if self.config.optimal {
            "Fast Downward (with optimality guarantee)"
        } else {
            "Fast Downward"
        }
    }

    fn prepare(&self, problem: &Problem) -> Result<Workspace> {
        // the goal of optimal runs is reached by a dedicated action
        let transformed;
        let (working, goal_action) = if self.config.optimal {
            transformed = goal::introduce_goal_action(problem, false)?;
            (&transformed.problem, transformed.goal_action.clone())
        } else {
            (problem, None)
        };
        let writer = PddlWriter::new(working);
        let dir = tempfile::Builder::new().prefix("downward").tempdir()?;
        let domain = dir.path().join("domain.pddl");
        let problem = dir.path().join("problem.pddl");
        std::fs::write(&domain, writer.domain()?)?;
        std::fs::write(&problem, writer.problem()?)?;
        let plan = dir.path().join("plan");
        Ok(Workspace {
            dir,
            domain,
            problem,
            plan,
            names: writer.into_name_table(),
            goal_action,
        })
    }

    fn read_plan(&self, ws: &Workspace, plan: Input) -> Result<SequentialPlan> {
        let mut plan = writer::read_plan(plan, &ws.names)?;
        if let Some(goal_action) = &ws.goal_action {
            if plan.actions.last().is_some_and(|step| &step.action == goal_action) {
                plan.actions.pop();
            }
        }
        Ok(plan)
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child> {
        tracing::debug!(?cmd, "running planner");
        cmd.spawn().map_err(|source| PlannerError::Spawn {
            executable: self.config.executable.display().to_string(),
            source,
        })
    }

    /// Runs the planner once on the problem, killing it after `timeout` if given.
    pub fn solve(&self, problem: &Problem, timeout: Option<Duration>) -> Result<PlanResult> {
        let _span = tracing::info_span!("solve", planner = self.name(), problem = %problem.name).entered();
        let ws = self.prepare(problem)?;

        let log_path = ws.dir.path().join("log");
        let log = File::create(&log_path)?;
        let mut cmd = command(&self.config, ws.files());
        cmd.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));
        let mut child = self.spawn(cmd)?;
        let exit = wait(&mut child, timeout)?;
        let log = String::from_utf8_lossy(&std::fs::read(&log_path)?).into_owned();

        let plan = match find_plan_file(&ws.plan)? {
            Some(path) => Some(self.read_plan(&ws, Input::from_file(&path)?)?),
            None => None,
        };
        let status = match exit {
            Some(exit) => result_status(&self.config, !problem.metrics.is_empty(), plan.is_some(), exit.code()),
            None => ResultStatus::Timeout,
        };
        let exit_code = exit.and_then(|e| e.code());
        tracing::info!(%status, ?exit_code, plan_length = plan.as_ref().map(|p| p.len()), "planner terminated");
        Ok(PlanResult {
            status,
            plan,
            exit_code,
            log,
            planner_name: self.name(),
        })
    }

    fn read_anytime_output(
        &self,
        ws: &Workspace,
        stdout: ChildStdout,
        on_plan: &mut impl FnMut(&SequentialPlan),
    ) -> Result<(String, Option<SequentialPlan>)> {
        let mut parser = AnytimeOutput::new();
        let mut log = String::new();
        let mut last = None;
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if let Some(text) = parser.feed(&line) {
                let plan = self.read_plan(ws, Input::from_string(text))?;
                tracing::debug!(index = parser.num_plans(), plan_length = plan.len(), "intermediate plan");
                on_plan(&plan);
                last = Some(plan);
            }
            log.push_str(&line);
            log.push('\n');
        }
        Ok((log, last))
    }

    /// Runs the planner with its anytime configuration, calling `on_plan` on every plan reported. The
    /// result holds the last plan found.
    pub fn solve_anytime(&self, problem: &Problem, mut on_plan: impl FnMut(&SequentialPlan)) -> Result<PlanResult> {
        if !self.config.has_anytime_config() {
            return Err(PlannerError::InvalidConfig(
                "no anytime alias or anytime search configuration".to_string(),
            ));
        }
        let _span = tracing::info_span!("solve_anytime", planner = self.name(), problem = %problem.name).entered();
        let ws = self.prepare(problem)?;

        let mut cmd = anytime_command(&self.config, ws.files());
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        let mut child = self.spawn(cmd)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("planner output is not available"))?;
        let (log, plan) = match self.read_anytime_output(&ws, stdout, &mut on_plan) {
            Ok(res) => res,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };
        let exit = child.wait()?;
        let status = result_status(&self.config, !problem.metrics.is_empty(), plan.is_some(), exit.code());
        tracing::info!(%status, exit_code = ?exit.code(), "planner terminated");
        Ok(PlanResult {
            status,
            plan,
            exit_code: exit.code(),
            log,
            planner_name: self.name(),
        })
    }

    /// Grounds the problem with the given compiler, solves the ground problem and lifts its plan back to the
    /// input problem.
    pub fn solve_grounded(
        &self,
        compiler: &dyn Compiler,
        problem: &Problem,
        timeout: Option<Duration>,
    ) -> Result<PlanResult> {
        let compiled = compiler.compile(problem, CompilationKind::Grounding)?;
        let mut res = self.solve(&compiled.problem, timeout)?;
        res.plan = res.plan.map(|p| compiled.lifter.lift_plan(&p)).transpose()?;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downward_model::pddl::read_problem;

    const DOMAIN: &str = "
(define (domain switch)
  (:requirements :strips)
  (:predicates (x) (y))
  (:action a
    :parameters ()
    :precondition (y)
    :effect (and (x) (not (y)))))";

    const PROBLEM: &str = "
(define (problem switch-1) (:domain switch)
  (:init (y))
  (:goal (x)))";

    #[test]
    fn latest_plan_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let plan = dir.path().join("plan");
        assert_eq!(find_plan_file(&plan)?, None);
        for name in ["plan.1", "plan.10", "plan.2", "plan.x", "other.11"] {
            std::fs::write(dir.path().join(name), "")?;
        }
        assert_eq!(find_plan_file(&plan)?, Some(dir.path().join("plan.10")));
        std::fs::write(&plan, "")?;
        assert_eq!(find_plan_file(&plan)?, Some(plan));
        Ok(())
    }

    #[test]
    fn goal_action_is_removed() -> anyhow::Result<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let planner = FastDownward::new(DownwardConfig::optimal())?;
        let ws = planner.prepare(&pb)?;
        assert!(ws.domain.exists() && ws.problem.exists());
        let goal_action = ws.goal_action.clone().expect("no goal action");
        let text = format!("(a)\n({})\n; cost = 2 (unit cost)\n", ws.names.action_name(&goal_action)?);
        let plan = planner.read_plan(&ws, Input::from_string(text))?;
        assert_eq!(plan, SequentialPlan::new(vec![ActionInstance::new("a", vec![])]));

        let planner = FastDownward::new(DownwardConfig::satisficing())?;
        let ws = planner.prepare(&pb)?;
        assert!(ws.goal_action.is_none());
        assert_eq!(planner.read_plan(&ws, Input::from_string("(a)\n"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn anytime_requires_configuration() -> anyhow::Result<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let planner = FastDownward::new(DownwardConfig::optimal())?;
        assert!(matches!(
            planner.solve_anytime(&pb, |_| {}),
            Err(PlannerError::InvalidConfig(_))
        ));
        Ok(())
    }
}
