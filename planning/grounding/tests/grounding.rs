use downward_grounding::*;
use downward_model::pddl::{input::Input, read_problem};
use downward_model::validate::{plan_cost, validate};
use downward_model::*;
use hashbrown::HashSet;

fn problem(domain: &str, problem: &str) -> anyhow::Result<Problem> {
    Ok(read_problem(Input::from_string(domain), Input::from_string(problem))?)
}

fn step(pb: &Problem, action: &str, args: &[&str]) -> anyhow::Result<ActionInstance> {
    let args = args.iter().map(|a| pb.object(a).cloned()).collect::<Res<Vec<_>>>()?;
    Ok(ActionInstance::new(action, args))
}

fn ground_step(action: &str) -> ActionInstance {
    ActionInstance::new(action, Vec::new())
}

/// Checks the properties that hold for any grounding.
fn check_result(res: &CompilerResult, original: &Problem) -> anyhow::Result<()> {
    let names: HashSet<&Sym> = res.problem.actions.iter().map(|a| &a.name).collect();
    assert_eq!(names.len(), res.problem.actions.len(), "duplicated action names");
    assert_eq!(res.trace_back_map().len(), res.problem.actions.len());
    for a in res.problem.actions.iter() {
        assert!(a.is_ground());
        let entry = res.trace_back_map().get(&a.name).expect("missing trace entry");
        if let Some(lifted) = res.lifter.lift(&ground_step(a.name.canonical_str()))? {
            let schema = original.action(&lifted.action)?;
            assert_eq!(schema.parameters.len(), lifted.arguments.len());
            assert_eq!(entry.original.as_ref(), Some(&lifted.action));
        }
    }
    Ok(())
}

const SWITCH_DOMAIN: &str = "
(define (domain switch)
  (:requirements :strips)
  (:predicates (x) (y))
  (:action a
    :parameters ()
    :precondition (y)
    :effect (and (x) (not (y)))))";

const SWITCH_PROBLEM: &str = "
(define (problem switch-1) (:domain switch)
  (:init (y))
  (:goal (x)))";

#[test]
fn parameterless_action() -> anyhow::Result<()> {
    let pb = problem(SWITCH_DOMAIN, SWITCH_PROBLEM)?;
    let res = FastDownwardGrounder.compile(&pb, CompilationKind::Grounding)?;
    check_result(&res, &pb)?;
    assert_eq!(res.engine_name, "Fast Downward Grounder");
    assert_eq!(res.problem.name, "Fast Downward Grounder_switch-1");
    assert_eq!(res.problem.actions.len(), 1);
    let a = res.problem.action("a")?;
    assert_eq!(a.preconditions.len(), 1);
    assert_eq!(a.effects.len(), 2);
    assert_eq!(res.problem.goals.len(), 1);

    let plan = SequentialPlan::new(vec![ground_step("a")]);
    assert!(validate(&res.problem, &plan)?);
    let lifted = res.lifter.lift_plan(&plan)?;
    assert_eq!(lifted, SequentialPlan::new(vec![step(&pb, "a", &[])?]));
    assert!(validate(&pb, &lifted)?);

    // the input problem is left untouched
    assert_eq!(pb.actions.len(), 1);
    assert_eq!(pb.name, "switch-1");
    Ok(())
}

const BOXES_DOMAIN: &str = "
(define (domain boxes)
  (:requirements :typing :negative-preconditions)
  (:types box)
  (:predicates (reachable ?b - box) (open ?b - box))
  (:action open
    :parameters (?b - box)
    :precondition (and (reachable ?b) (not (open ?b)))
    :effect (open ?b)))";

const BOXES_PROBLEM: &str = "
(define (problem boxes-3) (:domain boxes)
  (:objects b1 b2 b3 - box)
  (:init (reachable b1) (reachable b2))
  (:goal (and (open b2))))";

#[test]
fn only_reachable_bindings_are_grounded() -> anyhow::Result<()> {
    let pb = problem(BOXES_DOMAIN, BOXES_PROBLEM)?;
    for engine in [compiler_by_name("Fast Downward Grounder"), compiler_by_name("Fast Downward Reachability Grounder")] {
        let engine = engine.expect("unknown engine");
        let res = engine.compile(&pb, CompilationKind::Grounding)?;
        check_result(&res, &pb)?;
        let mut names: Vec<&str> = res.problem.actions.iter().map(|a| a.name.canonical_str()).collect();
        names.sort();
        assert_eq!(names, vec!["open_b1", "open_b2"], "{}", engine.name());

        let plan = SequentialPlan::new(vec![ground_step("open_b2")]);
        assert!(validate(&res.problem, &plan)?);
        let lifted = res.lifter.lift_plan(&plan)?;
        assert_eq!(lifted.actions, vec![step(&pb, "open", &["b2"])?]);
        assert!(validate(&pb, &lifted)?);
    }
    Ok(())
}

const CHOICE_DOMAIN: &str = "
(define (domain choice)
  (:requirements :typing :disjunctive-preconditions)
  (:types obj)
  (:predicates (p ?o - obj) (q ?o - obj) (done ?o - obj))
  (:action a
    :parameters (?o - obj)
    :precondition (or (p ?o) (q ?o))
    :effect (done ?o)))";

const CHOICE_PROBLEM: &str = "
(define (problem choice-3) (:domain choice)
  (:objects o1 o2 o3 - obj)
  (:init (p o1) (q o1) (q o2))
  (:goal (and (done o1) (done o2))))";

#[test]
fn disjuncts_get_distinct_names() -> anyhow::Result<()> {
    let pb = problem(CHOICE_DOMAIN, CHOICE_PROBLEM)?;
    let res = FastDownwardGrounder.compile(&pb, CompilationKind::Grounding)?;
    check_result(&res, &pb)?;
    // one ground action per disjunct of the precondition that holds for the binding
    let mut names: Vec<&str> = res.problem.actions.iter().map(|a| a.name.canonical_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a_o1", "a_o1_0", "a_o2"]);
    for name in ["a_o1", "a_o1_0"] {
        let lifted = res.lifter.lift(&ground_step(name))?.expect("no original action");
        assert_eq!(lifted, step(&pb, "a", &["o1"])?);
    }

    for first in ["a_o1", "a_o1_0"] {
        let plan = SequentialPlan::new(vec![ground_step(first), ground_step("a_o2")]);
        assert!(validate(&res.problem, &plan)?);
        let lifted = res.lifter.lift_plan(&plan)?;
        assert_eq!(lifted.actions, vec![step(&pb, "a", &["o1"])?, step(&pb, "a", &["o2"])?]);
        assert!(validate(&pb, &lifted)?);
    }
    Ok(())
}

const ITEMS_DOMAIN: &str = "
(define (domain items)
  (:requirements :typing :negative-preconditions :existential-preconditions :universal-preconditions)
  (:types item)
  (:predicates (p ?o - item) (q ?o - item))
  (:action make-p
    :parameters (?o - item)
    :precondition (and)
    :effect (p ?o))
  (:action make-q
    :parameters (?o - item)
    :precondition (p ?o)
    :effect (q ?o)))";

fn items_problem(goal: &str) -> anyhow::Result<Problem> {
    let pb = format!(
        "(define (problem items-2) (:domain items) (:objects i1 i2 - item) (:init (q i1)) (:goal {goal}))"
    );
    problem(ITEMS_DOMAIN, &pb)
}

#[test]
fn complicated_goal_is_rewritten() -> anyhow::Result<()> {
    let pb = items_problem("(exists (?o - item) (and (p ?o) (not (q ?o))))")?;
    assert!(goal::has_complicated_goal(&pb));
    let rewritten = goal::transform(&pb, true)?;
    assert_eq!(rewritten.problem.env.fluents.len(), pb.env.fluents.len() + 1);
    assert_eq!(rewritten.problem.actions.len(), pb.actions.len() + 1);

    let res = FastDownwardGrounder.compile(&pb, CompilationKind::Grounding)?;
    check_result(&res, &pb)?;
    assert_eq!(res.problem.goals.len(), 1);

    // one instance of the goal action per value of the existential variable
    let goal_actions: Vec<&Sym> = res
        .problem
        .actions
        .iter()
        .map(|a| &a.name)
        .filter(|n| n.canonical_str().starts_with("reach_goal"))
        .collect();
    assert!(!goal_actions.is_empty());
    for a in &goal_actions {
        assert!(res.lifter.lift(&ground_step(a.canonical_str()))?.is_none());
        assert_eq!(res.trace_back_map().get(a).unwrap().original, None);
    }

    let witness = goal_actions.iter().find_map(|a| {
        let plan = SequentialPlan::new(vec![ground_step("make-p_i2"), ground_step(a.canonical_str())]);
        validate(&res.problem, &plan).ok()?.then_some(plan)
    });
    let plan = witness.expect("no valid ground plan");
    let lifted = res.lifter.lift_plan(&plan)?;
    assert_eq!(lifted.actions, vec![step(&pb, "make-p", &["i2"])?]);
    assert!(validate(&pb, &lifted)?);
    Ok(())
}

#[test]
fn universal_goal_requires_axioms() -> anyhow::Result<()> {
    let pb = items_problem("(forall (?o - item) (p ?o))")?;
    assert!(!FastDownwardGrounder.supports(&pb.kind()));
    match FastDownwardGrounder.compile(&pb, CompilationKind::Grounding) {
        Err(GroundingError::UnsupportedProblemFeature(msg)) => assert!(msg.contains("axioms")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("grounding should fail"),
    }

    match FastDownwardGrounder.compile_strict(&pb, CompilationKind::Grounding) {
        Err(GroundingError::UnsupportedProblemKind(features)) => {
            assert_eq!(features, vec![Feature::UniversalConditions]);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("strict grounding should fail"),
    }

    // the reachability grounder keeps the goal as is
    let res = FastDownwardReachabilityGrounder.compile_strict(&pb, CompilationKind::Grounding)?;
    assert!(FastDownwardReachabilityGrounder.supports(&pb.kind()));
    check_result(&res, &pb)?;
    assert_eq!(res.problem.goals, pb.goals);
    let plan = SequentialPlan::new(vec![ground_step("make-p_i1"), ground_step("make-p_i2")]);
    assert!(validate(&res.problem, &plan)?);
    assert!(validate(&pb, &res.lifter.lift_plan(&plan)?)?);
    Ok(())
}

const SHOP_DOMAIN: &str = "
(define (domain shop)
  (:requirements :typing :action-costs)
  (:types article)
  (:predicates (bought ?a - article))
  (:functions (price ?a - article) - number (total-cost) - number)
  (:action buy
    :parameters (?a - article)
    :precondition (and)
    :effect (and (bought ?a) (increase (total-cost) (price ?a)))))";

const SHOP_PROBLEM: &str = "
(define (problem shop-2) (:domain shop)
  (:objects bread milk - article)
  (:init (= (price bread) 3) (= (price milk) 5) (= (total-cost) 0))
  (:goal (and (bought bread) (bought milk)))
  (:metric minimize (total-cost)))";

#[test]
fn action_costs_are_preserved() -> anyhow::Result<()> {
    let pb = problem(SHOP_DOMAIN, SHOP_PROBLEM)?;
    for engine in [
        Box::new(FastDownwardGrounder) as Box<dyn Compiler>,
        Box::new(FastDownwardReachabilityGrounder),
    ] {
        let res = engine.compile(&pb, CompilationKind::Grounding)?;
        check_result(&res, &pb)?;
        let costs = res.problem.action_costs().expect("no action costs");
        let cost = |a: &str| (&res.problem.env / costs.get(a).unwrap()).numeric_constant();
        assert_eq!(cost("buy_bread"), Some(RealValue::from_integer(3)));
        assert_eq!(cost("buy_milk"), Some(RealValue::from_integer(5)));

        let plan = SequentialPlan::new(vec![ground_step("buy_bread"), ground_step("buy_milk")]);
        assert!(validate(&res.problem, &plan)?);
        let lifted = res.lifter.lift_plan(&plan)?;
        assert!(validate(&pb, &lifted)?);
        assert_eq!(plan_cost(&res.problem, &plan)?, Some(RealValue::from_integer(8)));
        assert_eq!(plan_cost(&res.problem, &plan)?, plan_cost(&pb, &lifted)?);
    }
    Ok(())
}

#[test]
fn capabilities() {
    let full = FastDownwardGrounder;
    assert!(full.supports_compilation(CompilationKind::Grounding));
    assert!(!full.supports_compilation(CompilationKind::QuantifiersRemoving));
    let res = full.resulting_problem_kind(&full.supported_kind(), CompilationKind::Grounding);
    assert!(!res.has(Feature::DisjunctiveConditions));
    assert!(!res.has(Feature::ExistentialConditions));

    let reach = FastDownwardReachabilityGrounder;
    let kind = reach.supported_kind();
    assert_eq!(reach.resulting_problem_kind(&kind, CompilationKind::Grounding), kind);
}

#[test]
fn unsupported_compilation_kind() -> anyhow::Result<()> {
    let pb = problem(SWITCH_DOMAIN, SWITCH_PROBLEM)?;
    let res = FastDownwardGrounder.compile(&pb, CompilationKind::ConditionalEffectsRemoving);
    assert!(matches!(
        res,
        Err(GroundingError::UnsupportedCompilation(CompilationKind::ConditionalEffectsRemoving))
    ));
    Ok(())
}

#[test]
fn unknown_ground_action() -> anyhow::Result<()> {
    let pb = problem(SWITCH_DOMAIN, SWITCH_PROBLEM)?;
    let res = FastDownwardGrounder.compile(&pb, CompilationKind::Grounding)?;
    assert!(matches!(
        res.lifter.lift(&ground_step("b")),
        Err(GroundingError::NameResolution(_))
    ));
    Ok(())
}
