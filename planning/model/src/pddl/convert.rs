use std::rc::Rc;

use errors::*;

use crate::pddl::sexpr::{ListIter, SExpr};
use crate::*;

use super::parser::{self as pddl, Domain, Problem as PddlProblem};

/// Name of the numeric fluent that PDDL domains increase to express action costs.
pub const TOTAL_COST: &str = "total-cost";

/// Scoped mapping from symbols (objects or parameters) to the expression they denote.
pub struct Bindings {
    lasts: hashbrown::HashMap<Sym, Expr>,
    prev: Option<Rc<Bindings>>,
}

impl Bindings {
    pub fn objects(objects: &Objects) -> Self {
        let mut lasts = hashbrown::HashMap::new();
        for o in objects.iter() {
            lasts.insert(o.name().clone(), Expr::Object(o.clone()));
        }
        Self { lasts, prev: None }
    }

    pub fn stacked(params: &[Param], prev: &Rc<Bindings>) -> Self {
        let mut lasts = hashbrown::HashMap::new();
        for p in params {
            lasts.insert(p.name().clone(), Expr::Param(p.clone()));
        }
        Self {
            lasts,
            prev: Some(prev.clone()),
        }
    }

    pub fn get(&self, name: &Sym) -> Result<Expr, Message> {
        if let Some(expr) = self.lasts.get(name) {
            Ok(expr.clone())
        } else if let Some(prev) = self.prev.as_ref() {
            prev.get(name)
        } else {
            Err(Message::error("Unknown symbol").snippet(name.error("unrecognized")))
        }
    }
}

fn user_types(dom: &Domain) -> Result<UserTypes, Message> {
    let mut types = UserTypes::new();
    for tpe in &dom.types {
        match tpe.tpe.as_slice() {
            [] => types.add_type(&tpe.symbol, None),
            [parent] => types.add_type(&tpe.symbol, Some(parent)),
            [_, second_parent, ..] => {
                return Err(second_parent
                    .invalid("unexpected second parent type")
                    .info(&tpe.symbol, "for type"));
            }
        }
    }
    Ok(types)
}

/// Numeric functions are integer valued unless the problem assigns a non integer value to one of them.
fn numeric_type(func: &pddl::Function, prob: &PddlProblem) -> Type {
    for init in &prob.init {
        if let Some([sv, value]) = init.as_application("=") {
            let is_func = sv
                .as_list_iter()
                .and_then(|mut l| l.pop_atom().ok().cloned())
                .is_some_and(|head| head == func.name);
            let is_int = value
                .as_atom()
                .and_then(|v| parse_number(v.canonical_str()))
                .is_some_and(|v| v.is_integer());
            if is_func && !is_int {
                return Type::Real;
            }
        }
    }
    Type::Int
}

/// Builds the lifted problem corresponding to a PDDL domain and problem.
pub fn build_problem(dom: &Domain, prob: &PddlProblem) -> Res<Problem> {
    if let Some(derived) = dom.derived.first() {
        return Err(derived
            .name
            .invalid("derived predicates are not supported")
            .info(&dom.name, "in domain"));
    }
    let types = Types::new(user_types(dom)?);
    let mut problem = Problem::new(prob.problem_name.clone(), types);

    for pred in &dom.predicates {
        let parameters = parse_parameters(&pred.args, &problem.env.types).msg(&problem.env)?;
        problem
            .env
            .fluents
            .add_fluent(&pred.name, parameters, Type::Bool)
            .map_err(|e| pred.name.invalid(e))?;
    }

    for func in &dom.functions {
        if func.name == TOTAL_COST {
            continue;
        }
        let parameters = parse_parameters(&func.args, &problem.env.types).msg(&problem.env)?;
        problem
            .env
            .fluents
            .add_fluent(&func.name, parameters, numeric_type(func, prob))
            .map_err(|e| func.name.invalid(e))?;
    }

    for obj in dom.constants.iter().chain(prob.objects.iter()) {
        let tpe = match obj.tpe.as_slice() {
            [] => problem.env.types.top_user_type(),
            [tpe] => problem.env.types.get_user_type(tpe).msg(&problem.env)?,
            [_, tpe, ..] => return Err(tpe.invalid("object with more than one type")),
        };
        problem
            .env
            .objects
            .add_object(&obj.symbol, tpe)
            .map_err(|e| obj.symbol.invalid(e))?;
    }

    let bindings = Rc::new(Bindings::objects(&problem.env.objects));

    for init in &prob.init {
        read_init(init, &mut problem, &bindings).with_info(|| init.info("in initial state"))?;
    }

    for g in &prob.goal {
        for g in pddl::conjuncts(g) {
            if is_empty_list(g) {
                continue;
            }
            let g = parse(g, &mut problem.env, &bindings)?;
            problem.goals.push(g);
        }
    }

    let mut costs = Vec::new();
    for a in &dom.actions {
        let name: Sym = a.name.clone();
        let (action, cost) =
            into_action(a, &mut problem.env, &bindings).with_info(|| name.info("when parsing action"))?;
        if let Some(cost) = cost {
            costs.push((action.name.clone(), cost));
        }
        problem.add_action(action)?;
    }

    if let Some(metric) = &prob.metric {
        let metric = match metric {
            pddl::Metric::Minimize(e) if is_total_cost(e) => {
                // actions that do not increase the total cost are free
                let zero = problem.env.int(0);
                let mut action_costs = ActionCosts::new(Some(zero));
                for (action, cost) in costs {
                    action_costs.set(action, cost);
                }
                Metric::MinimizeActionCosts(action_costs)
            }
            pddl::Metric::Minimize(e) => Metric::Minimize(parse(e, &mut problem.env, &bindings)?),
            pddl::Metric::Maximize(e) => Metric::Maximize(parse(e, &mut problem.env, &bindings)?),
        };
        problem.metrics.push(metric);
    }

    tracing::debug!(
        num_objects = problem.env.objects.len(),
        num_fluents = problem.env.fluents.len(),
        num_actions = problem.actions.len(),
        "problem built"
    );
    Ok(problem)
}

fn is_total_cost(e: &SExpr) -> bool {
    e.as_application(TOTAL_COST).is_some_and(|args| args.is_empty())
}

fn read_init(init: &SExpr, problem: &mut Problem, bindings: &Rc<Bindings>) -> Res<()> {
    if let Some([sv, value]) = init.as_application("=") {
        if is_total_cost(sv) {
            // the initial cost is always zero
            return Ok(());
        }
        let sv = parse_sv(sv, None, &mut problem.env, bindings)?;
        let value = parse(value, &mut problem.env, bindings)?;
        problem.env.fluents.get(sv.fluent).return_type.accepts(value, &problem.env).msg(&problem.env)?;
        problem.set_initial_value(sv, value);
    } else {
        let sv = parse_sv(init, Some(Type::Bool), &mut problem.env, bindings)?;
        let value = problem.env.bool(true);
        problem.set_initial_value(sv, value);
    }
    Ok(())
}

/// Converts an action and returns the expression it increases the total cost by (if any).
fn into_action(a: &pddl::Action, env: &mut Environment, bindings: &Rc<Bindings>) -> Res<(Action, Option<ExprId>)> {
    let parameters = parse_parameters(&a.args, &env.types).msg(env)?;

    let bindings = Rc::new(Bindings::stacked(&parameters, bindings));

    let mut action = Action::new(&a.name, parameters);

    for c in &a.pre {
        for c in pddl::conjuncts(c) {
            if is_empty_list(c) {
                continue;
            }
            let c = parse(c, env, &bindings)?;
            action.preconditions.push(c);
        }
    }

    let mut cost = None;
    for e in &a.eff {
        let mut effects = EffectsBuilder {
            env: &mut *env,
            effects: &mut action.effects,
            cost: &mut cost,
        };
        effects.read(e, &[], None, &bindings)?;
    }
    Ok((action, cost))
}

struct EffectsBuilder<'a> {
    env: &'a mut Environment,
    effects: &'a mut Vec<Effect>,
    cost: &'a mut Option<ExprId>,
}

impl EffectsBuilder<'_> {
    /// Reads an effect that applies for all values of `forall`, when `condition` holds.
    fn read(
        &mut self,
        expr: &SExpr,
        forall: &[Param],
        condition: Option<ExprId>,
        bindings: &Rc<Bindings>,
    ) -> Res<()> {
        if let Some(conjuncts) = expr.as_application("and") {
            for e in conjuncts {
                self.read(e, forall, condition, bindings)?;
            }
            Ok(())
        } else if let Some([vars, body]) = expr.as_application("forall") {
            let vars = parse_var_list(vars, self.env)?;
            let bindings = Rc::new(Bindings::stacked(&vars, bindings));
            let all_vars: Vec<Param> = forall.iter().cloned().chain(vars).collect();
            self.read(body, &all_vars, condition, &bindings)
        } else if let Some([cond, body]) = expr.as_application("when") {
            let cond = parse(cond, self.env, bindings)?;
            let cond = match condition {
                Some(outer) => self.env.and(vec![outer, cond])?,
                None => cond,
            };
            self.read(body, forall, Some(cond), bindings)
        } else if let Some([sv, delta]) = expr.as_application("increase")
            && is_total_cost(sv)
        {
            if !forall.is_empty() || condition.is_some() {
                return Err(expr.invalid("conditional action costs are not supported"));
            }
            let delta = parse(delta, self.env, bindings)?;
            Type::Real.accepts(delta, self.env).msg(self.env)?;
            *self.cost = match *self.cost {
                Some(previous) => Some(self.env.app(Fun::Plus, [previous, delta])?),
                None => Some(delta),
            };
            Ok(())
        } else {
            let mut effect = into_effect(expr, self.env, bindings)?;
            effect.forall = forall.to_vec();
            effect.condition = condition;
            self.effects.push(effect);
            Ok(())
        }
    }
}

fn parse_sv(
    expr: &SExpr,
    expected_type: Option<Type>,
    env: &mut Environment,
    bindings: &Rc<Bindings>,
) -> Result<StateVariable, Message> {
    let x = parse(expr, env, bindings)?;
    if let Some(expected_type) = expected_type {
        expected_type.accepts(x, env).msg(env)?;
    }
    let (fluent, sv_args) = env.node(x).state_variable()?;
    Ok(StateVariable::new(fluent, sv_args.iter().copied()))
}

fn into_effect(expr: &SExpr, env: &mut Environment, bindings: &Rc<Bindings>) -> Result<Effect, Message> {
    if let Some([arg]) = expr.as_application("not") {
        let contradiction = env.bool(false);
        let sv = parse_sv(arg, Some(Type::Bool), env, bindings)?;
        Ok(Effect::assignement(sv, contradiction))
    } else if let Some([sv, val]) = expr.as_application("assign") {
        let sv = parse_sv(sv, None, env, bindings)?;
        let val = parse(val, env, bindings)?;
        env.fluents.get(sv.fluent).return_type.accepts(val, env).msg(env)?;
        Ok(Effect::assignement(sv, val))
    } else if let Some([sv, val]) = expr.as_application("increase") {
        // (increase (fuel-level r1) 2)
        let sv = parse_sv(sv, Some(Type::Real), env, bindings)?;
        let val = parse(val, env, bindings)?;
        env.fluents.get(sv.fluent).return_type.accepts(val, env).msg(env)?;
        Ok(Effect::increase(sv, val))
    } else if let Some([sv, val]) = expr.as_application("decrease") {
        let sv = parse_sv(sv, Some(Type::Real), env, bindings)?;
        let val = parse(val, env, bindings)?;
        env.fluents.get(sv.fluent).return_type.accepts(val, env).msg(env)?;
        Ok(Effect {
            forall: Vec::new(),
            condition: None,
            state_variable: sv,
            operation: EffectOp::Decrease(val),
        })
    } else {
        let tautology = env.bool(true);
        let sv = parse_sv(expr, Some(Type::Bool), env, bindings)?;
        Ok(Effect::assignement(sv, tautology))
    }
}

fn parse_parameters(params: &[pddl::Param], types: &Types) -> Result<Vec<Param>, TypeError> {
    let mut parameters = Vec::with_capacity(params.len());
    for a in params {
        let tpe = match a.tpe.as_slice() {
            [] => types.top_user_type(),
            [tpe] => types.get_user_type(tpe)?,
            // `either` types are not part of the supported fragment
            [_, other, ..] => return Err(TypeError::UnknownType(other.clone())),
        };
        parameters.push(Param::new(&a.symbol, tpe))
    }
    Ok(parameters)
}

/// Parses a list of variables for forall/exists : (?d - depot ?x - loc)
fn parse_var_list(vars: &SExpr, env: &Environment) -> Result<Vec<Param>, Message> {
    let mut vars = vars
        .as_list_iter()
        .ok_or_else(|| vars.invalid("expected variable list"))?;
    let vars = pddl::consume_typed_symbols(&mut vars)?;
    parse_parameters(&vars, &env.types).msg(env)
}

fn is_empty_list(sexpr: &SExpr) -> bool {
    match sexpr {
        SExpr::Atom(_) => false,
        SExpr::List(l) => l.is_empty(),
    }
}

fn parse(sexpr: &SExpr, env: &mut Environment, bindings: &Rc<Bindings>) -> Result<ExprId, Message> {
    fn parse_args(l: ListIter<'_>, env: &mut Environment, bindings: &Rc<Bindings>) -> Result<SeqExprId, Message> {
        let mut args = SeqExprId::new();
        for e in l {
            let arg = parse(e, env, bindings)?;
            args.push(arg);
        }
        Ok(args)
    }

    let expr = match sexpr {
        SExpr::Atom(atom) => match bindings.get(atom) {
            Ok(x) => x,
            Err(err) => match parse_number(atom.canonical_str()) {
                Some(n) if n.is_integer() => Expr::Int(n.to_integer()),
                Some(n) => Expr::Real(n),
                None => return Err(err),
            },
        },
        SExpr::List(l) => {
            let mut l = l.iter();
            let f = l.pop_atom()?.clone();
            if let Some(f) = env.fluents.get_by_name(f.canonical_str()) {
                let args = parse_args(l, env, bindings)?;
                Expr::StateVariable(f, args)
            } else if let Some(f) = parse_function(&f) {
                let args = parse_args(l, env, bindings)?;
                Expr::App(f, args)
            } else if let Some(f) = parse_reversed_comparison(&f) {
                // (> a b) is read as (< b a)
                let mut args = parse_args(l, env, bindings)?;
                args.reverse();
                Expr::App(f, args)
            } else if f.canonical_str() == "exists" || f.canonical_str() == "forall" {
                let vars = parse_var_list(l.pop()?, env)?;
                let expr = l.pop()?;
                let bindings = Rc::new(Bindings::stacked(&vars, bindings));
                let expr = parse(expr, env, &bindings)?;
                if f.canonical_str() == "forall" {
                    Expr::Forall(vars, expr)
                } else {
                    Expr::Exists(vars, expr)
                }
            } else {
                return Err(f.invalid("unknown atom"));
            }
        }
    };
    env.intern(expr, sexpr.loc())
        .map_err(|e| e.snippet(sexpr.loc().info("when parsing expression")))
}

fn parse_number(decimal_str: &str) -> Option<RealValue> {
    if let Ok(i) = decimal_str.parse::<IntValue>() {
        Some(RealValue::from_integer(i))
    } else {
        let (lhs, rhs) = decimal_str.split_once(".")?;
        if rhs.is_empty() || !rhs.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let denom = 10i64.checked_pow(rhs.len() as u32)?;
        let negative = lhs.starts_with('-');
        let lhs: i64 = if lhs.is_empty() || lhs == "-" { 0 } else { lhs.parse().ok()? };
        let rhs: i64 = rhs.parse().ok()?;
        let frac = if negative { -rhs } else { rhs };
        Some(RealValue::new(lhs * denom + frac, denom))
    }
}

fn parse_function(sym: &Sym) -> Option<Fun> {
    match sym.canonical_str() {
        "+" => Some(Fun::Plus),
        "-" => Some(Fun::Minus),
        "/" => Some(Fun::Div),
        "*" => Some(Fun::Times),
        "and" => Some(Fun::And),
        "or" => Some(Fun::Or),
        "imply" => Some(Fun::Implies),
        "not" => Some(Fun::Not),
        "=" => Some(Fun::Eq),
        "<=" => Some(Fun::Leq),
        "<" => Some(Fun::Lt),
        _ => None,
    }
}

fn parse_reversed_comparison(sym: &Sym) -> Option<Fun> {
    match sym.canonical_str() {
        ">=" => Some(Fun::Leq),
        ">" => Some(Fun::Lt),
        _ => None,
    }
}

/// Reads a PDDL domain and problem and builds the corresponding lifted problem.
pub fn read_problem(domain: super::input::Input, problem: super::input::Input) -> Res<Problem> {
    let domain = pddl::parse_pddl_domain(domain)?;
    let problem = pddl::parse_pddl_problem(problem)?;
    build_problem(&domain, &problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::input::Input;

    const DOMAIN: &str = "
(define (domain transport)
  (:requirements :typing :conditional-effects :action-costs)
  (:types vehicle location - object truck - vehicle)
  (:predicates (at ?v - vehicle ?l - location) (road ?from ?to - location) (visited ?l - location))
  (:functions (distance ?from ?to - location) - number (total-cost) - number)
  (:action drive
    :parameters (?v - vehicle ?from ?to - location)
    :precondition (and (at ?v ?from) (road ?from ?to))
    :effect (and (not (at ?v ?from)) (at ?v ?to)
                 (forall (?l - location) (when (= ?l ?to) (visited ?l)))
                 (increase (total-cost) (distance ?from ?to)))))";

    const PROBLEM: &str = "
(define (problem p1) (:domain transport)
  (:objects t1 - truck a b c - location)
  (:init (at t1 a) (road a b) (road b c) (= (distance a b) 3) (= (distance b c) 5) (= (total-cost) 0))
  (:goal (and (at t1 c) (exists (?l - location) (visited ?l))))
  (:metric minimize (total-cost)))";

    #[test]
    fn build() -> Res<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        assert_eq!(pb.env.objects.len(), 4);
        assert_eq!(pb.env.fluents.len(), 4);
        assert!(pb.env.fluents.get_by_name(TOTAL_COST).is_none());
        let distance = pb.env.fluents.find("distance").unwrap();
        assert!(matches!(pb.env.fluents.get(distance).return_type, Type::Int));

        let drive = pb.action("drive")?;
        assert_eq!(drive.parameters.len(), 3);
        assert_eq!(drive.preconditions.len(), 2);
        assert_eq!(drive.effects.len(), 3);
        assert_eq!(drive.effects[2].forall.len(), 1);
        assert!(drive.effects[2].is_conditional());

        let costs = pb.action_costs().unwrap();
        assert!(costs.get("drive").is_some());
        assert_eq!(pb.goals.len(), 2);
        // 5 atoms and 2 distances
        assert_eq!(pb.init.len(), 5);

        let kind = pb.kind();
        assert!(kind.has(Feature::HierarchicalTyping));
        assert!(kind.has(Feature::ConditionalEffects));
        assert!(kind.has(Feature::ForallEffects));
        assert!(kind.has(Feature::ExistentialConditions));
        assert!(kind.has(Feature::StaticFluentsInActionsCost));
        assert!(!kind.has(Feature::NumericFluents));
        Ok(())
    }

    #[test]
    fn unknown_symbol() {
        let pb = PROBLEM.replace("(at t1 c)", "(at t2 c)");
        let res = read_problem(Input::from_string(DOMAIN), Input::from_string(pb));
        assert!(res.is_err());
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("12"), Some(RealValue::from_integer(12)));
        assert_eq!(parse_number("1.5"), Some(RealValue::new(3, 2)));
        assert_eq!(parse_number("-0.25"), Some(RealValue::new(-1, 4)));
        assert_eq!(parse_number("abc"), None);
    }
}
