//! Runs of the planner replaced by shell scripts reproducing its interface.

use std::path::PathBuf;
use std::time::Duration;

use downward_grounding::FastDownwardGrounder;
use downward_model::pddl::{input::Input, read_problem};
use downward_model::*;
use downward_planner::*;
use tempfile::TempDir;

/// The action `open` shares its name with a predicate and is written as `open_0` for the planner.
const DOMAIN: &str = "
(define (domain boxes)
  (:requirements :typing :negative-preconditions)
  (:types box)
  (:predicates (reachable ?b - box) (open ?b - box))
  (:action open
    :parameters (?b - box)
    :precondition (and (reachable ?b) (not (open ?b)))
    :effect (open ?b)))";

const PROBLEM: &str = "
(define (problem boxes-3) (:domain boxes)
  (:objects b1 b2 b3 - box)
  (:init (reachable b1) (reachable b2))
  (:goal (and (open b2))))";

fn problem() -> anyhow::Result<Problem> {
    Ok(read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?)
}

/// A configuration running `script` with `sh`. The plan file is the second argument of the script.
fn config(dir: &TempDir, script: &str, base: DownwardConfig) -> anyhow::Result<DownwardConfig> {
    let path: PathBuf = dir.path().join("fast-downward.sh");
    std::fs::write(&path, script)?;
    Ok(DownwardConfig {
        executable: path,
        interpreter: Some("sh".into()),
        ..base
    })
}

fn step(pb: &Problem, action: &str, args: &[&str]) -> anyhow::Result<ActionInstance> {
    let args = args.iter().map(|a| pb.object(a).cloned()).collect::<Res<Vec<_>>>()?;
    Ok(ActionInstance::new(action, args))
}

#[test]
fn plan_is_read_from_plan_file() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let script = "echo 'Solution found!'\nprintf '(open_0 b2)\\n; cost = 1 (unit cost)\\n' > \"$2\"\nexit 0\n";
    let planner = FastDownward::new(config(&dir, script, DownwardConfig::satisficing())?)?;
    let res = planner.solve(&pb, None)?;
    assert_eq!(res.status, ResultStatus::SolvedSatisficing);
    assert_eq!(res.exit_code, Some(0));
    assert_eq!(res.planner_name, "Fast Downward");
    assert!(res.log.contains("Solution found!"));
    assert_eq!(res.plan, Some(SequentialPlan::new(vec![step(&pb, "open", &["b2"])?])));
    Ok(())
}

#[test]
fn numbered_plan_files() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let script = "printf '(open_0 b1)\\n(open_0 b2)\\n' > \"$2.1\"\nprintf '(open_0 b2)\\n' > \"$2.2\"\nexit 0\n";
    let planner = FastDownward::new(config(&dir, script, DownwardConfig::satisficing())?)?;
    let res = planner.solve(&pb, None)?;
    assert_eq!(res.plan.map(|p| p.len()), Some(1));
    Ok(())
}

#[test]
fn exit_code_without_plan() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let planner = FastDownward::new(config(&dir, "exit 12\n", DownwardConfig::satisficing())?)?;
    let res = planner.solve(&pb, None)?;
    assert_eq!(res.status, ResultStatus::UnsolvableIncompletely);
    assert_eq!(res.plan, None);

    let planner = FastDownward::new(config(&dir, "exit 0\n", DownwardConfig::optimal())?)?;
    assert_eq!(planner.solve(&pb, None)?.status, ResultStatus::UnsolvableProven);

    let planner = FastDownward::new(config(&dir, "exit 22\n", DownwardConfig::optimal())?)?;
    assert_eq!(planner.solve(&pb, None)?.status, ResultStatus::Memout);
    Ok(())
}

#[test]
fn timeout_kills_the_planner() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let planner = FastDownward::new(config(&dir, "sleep 10\n", DownwardConfig::satisficing())?)?;
    let res = planner.solve(&pb, Some(Duration::from_millis(200)))?;
    assert_eq!(res.status, ResultStatus::Timeout);
    assert_eq!(res.exit_code, None);
    Ok(())
}

#[test]
fn optimal_plan_without_goal_action() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let script = "printf '(open_0 b2)\\n(reach_goal0)\\n; cost = 2 (unit cost)\\n' > \"$2\"\nexit 0\n";
    let planner = FastDownward::new(config(&dir, script, DownwardConfig::optimal())?)?;
    let res = planner.solve(&pb, None)?;
    assert_eq!(res.planner_name, "Fast Downward (with optimality guarantee)");
    assert_eq!(res.status, ResultStatus::SolvedSatisficing);
    assert_eq!(res.plan, Some(SequentialPlan::new(vec![step(&pb, "open", &["b2"])?])));
    Ok(())
}

#[test]
fn anytime_plans_are_reported() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let script = "\
echo '[t=0.01s, 9 KB] Solution found!'
echo 'open_0 b1 (1)'
echo 'open_0 b2 (1)'
echo '[t=0.01s, 9 KB] Plan length: 2 step(s).'
echo '[t=0.02s, 9 KB] Solution found!'
echo 'open_0 b2 (1)'
echo '[t=0.02s, 9 KB] Plan length: 1 step(s).'
exit 0
";
    let planner = FastDownward::new(config(&dir, script, DownwardConfig::satisficing())?)?;
    let mut lengths = Vec::new();
    let res = planner.solve_anytime(&pb, |p| lengths.push(p.len()))?;
    assert_eq!(lengths, vec![2, 1]);
    assert_eq!(res.status, ResultStatus::SolvedSatisficing);
    assert_eq!(res.plan, Some(SequentialPlan::new(vec![step(&pb, "open", &["b2"])?])));
    Ok(())
}

#[test]
fn grounded_plan_is_lifted() -> anyhow::Result<()> {
    let pb = problem()?;
    let dir = tempfile::tempdir()?;
    let script = "printf '(open_b2)\\n' > \"$2\"\nexit 0\n";
    let planner = FastDownward::new(config(&dir, script, DownwardConfig::satisficing())?)?;
    let res = planner.solve_grounded(&FastDownwardGrounder, &pb, None)?;
    assert_eq!(res.status, ResultStatus::SolvedSatisficing);
    assert_eq!(res.plan, Some(SequentialPlan::new(vec![step(&pb, "open", &["b2"])?])));
    Ok(())
}

#[test]
fn missing_executable() -> anyhow::Result<()> {
    let pb = problem()?;
    let config = DownwardConfig {
        executable: "/nonexistent/fast-downward.py".into(),
        ..DownwardConfig::satisficing()
    };
    let planner = FastDownward::new(config)?;
    assert!(matches!(planner.solve(&pb, None), Err(PlannerError::Spawn { .. })));
    Ok(())
}
