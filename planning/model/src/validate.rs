//! Simulation of sequential plans, used to check that a plan is executable and reaches the goals.

use itertools::Itertools;

use crate::*;

/// Value of an expression in a state.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(RealValue),
    Object(Object),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}

impl Value {
    fn as_bool(&self) -> Res<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Message::error(format!("expected a boolean value but got {other}"))),
        }
    }
    fn as_number(&self) -> Res<RealValue> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(Message::error(format!("expected a numeric value but got {other}"))),
        }
    }
    fn as_object(&self) -> Res<&Object> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(Message::error(format!("expected an object but got {other}"))),
        }
    }

    fn from_constant(env: &Environment, e: ExprId) -> Res<Value> {
        let e = env / e;
        match e.expr() {
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Object(o) => Ok(Value::Object(o.clone())),
            _ => e
                .numeric_constant()
                .map(Value::Number)
                .ok_or_else(|| e.invalid("expected a constant")),
        }
    }
}

type Key = (FluentId, Vec<Sym>);

/// Value of every state variable. Boolean state variables absent from the map are false.
#[derive(Clone, Debug, Default)]
pub struct State {
    values: hashbrown::HashMap<Key, Value>,
}

impl State {
    pub fn initial(problem: &Problem) -> Res<State> {
        let mut values = hashbrown::HashMap::new();
        for ini in &problem.init {
            let args = ground_args(&problem.env, &ini.state_variable).ok_or_else(|| {
                Message::error(format!(
                    "non-ground initial value: {}",
                    &problem.env / &ini.state_variable
                ))
            })?;
            values.insert(
                (ini.state_variable.fluent, args),
                Value::from_constant(&problem.env, ini.value)?,
            );
        }
        Ok(State { values })
    }

    pub fn get(&self, env: &Environment, fluent: FluentId, args: &[Sym]) -> Res<Value> {
        match self.values.get(&(fluent, args.to_vec())) {
            Some(v) => Ok(v.clone()),
            None if env.fluents.get(fluent).is_boolean() => Ok(Value::Bool(false)),
            None => Err(Message::error(format!(
                "undefined value for {}({})",
                env / fluent,
                args.iter().format(", ")
            ))),
        }
    }

    fn set(&mut self, key: Key, value: Value) {
        self.values.insert(key, value);
    }
}

type Bindings = hashbrown::HashMap<Sym, Value>;

/// Evaluates an expression in the given state, where parameters take their value from `bindings`.
pub fn eval(env: &Environment, e: ExprId, state: &State, bindings: &Bindings) -> Res<Value> {
    let node = env / e;
    match node.expr() {
        Expr::Int(i) => Ok(Value::Number(RealValue::from_integer(*i))),
        Expr::Real(r) => Ok(Value::Number(*r)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Object(o) => Ok(Value::Object(o.clone())),
        Expr::Param(p) => bindings
            .get(&p.name)
            .cloned()
            .ok_or_else(|| node.invalid("unbound parameter")),
        Expr::StateVariable(fluent, args) => {
            let args = eval_objects(env, args, state, bindings)?;
            state.get(env, *fluent, &args)
        }
        Expr::Exists(vars, body) => {
            let mut found = false;
            for_each_binding(env, vars, bindings, &mut |b| {
                found = found || eval(env, *body, state, b)?.as_bool()?;
                Ok(())
            })?;
            Ok(Value::Bool(found))
        }
        Expr::Forall(vars, body) => {
            let mut all = true;
            for_each_binding(env, vars, bindings, &mut |b| {
                all = all && eval(env, *body, state, b)?.as_bool()?;
                Ok(())
            })?;
            Ok(Value::Bool(all))
        }
        Expr::App(fun, args) => {
            let values = args
                .iter()
                .map(|&a| eval(env, a, state, bindings))
                .collect::<Res<Vec<_>>>()?;
            eval_fun(*fun, &values)
        }
    }
}

fn eval_fun(fun: Fun, values: &[Value]) -> Res<Value> {
    let numbers = || -> Res<Vec<RealValue>> { values.iter().map(|v| v.as_number()).collect() };
    let bools = || -> Res<Vec<bool>> { values.iter().map(|v| v.as_bool()).collect() };
    Ok(match fun {
        Fun::And => Value::Bool(bools()?.into_iter().all(|b| b)),
        Fun::Or => Value::Bool(bools()?.into_iter().any(|b| b)),
        Fun::Not => Value::Bool(!values[0].as_bool()?),
        Fun::Implies => Value::Bool(!values[0].as_bool()? || values[1].as_bool()?),
        Fun::Iff => Value::Bool(values[0].as_bool()? == values[1].as_bool()?),
        Fun::Eq => Value::Bool(values[0] == values[1]),
        Fun::Lt => Value::Bool(values[0].as_number()? < values[1].as_number()?),
        Fun::Leq => Value::Bool(values[0].as_number()? <= values[1].as_number()?),
        Fun::Plus => Value::Number(numbers()?.into_iter().sum()),
        Fun::Times => Value::Number(numbers()?.into_iter().product()),
        Fun::Minus => match numbers()?.as_slice() {
            [x] => Value::Number(-x),
            [x, y] => Value::Number(x - y),
            _ => return Err(Message::error("invalid arity for `-`")),
        },
        Fun::Div => {
            let n = numbers()?;
            if n[1] == RealValue::from_integer(0) {
                return Err(Message::error("division by zero"));
            }
            Value::Number(n[0] / n[1])
        }
    })
}

fn eval_objects(env: &Environment, args: &[ExprId], state: &State, bindings: &Bindings) -> Res<Vec<Sym>> {
    args.iter()
        .map(|&a| eval(env, a, state, bindings).and_then(|v| v.as_object().map(|o| o.name().clone())))
        .collect()
}

/// Calls `f` for every assignment of the variables to objects of their type, on top of the given bindings.
fn for_each_binding(
    env: &Environment,
    vars: &[Param],
    bindings: &Bindings,
    f: &mut dyn FnMut(&Bindings) -> Res<()>,
) -> Res<()> {
    let Some((first, rest)) = vars.split_first() else {
        return f(bindings);
    };
    let tpe = first
        .tpe
        .as_user_type()
        .ok_or_else(|| Message::error(format!("cannot quantify over non-object variable {first:?}")))?;
    for o in env.objects.of_type(tpe) {
        let mut extended = bindings.clone();
        extended.insert(first.name.clone(), Value::Object(o.clone()));
        for_each_binding(env, rest, &extended, f)?;
    }
    Ok(())
}

fn action_bindings<'a>(problem: &'a Problem, instance: &ActionInstance) -> Res<(&'a Action, Bindings)> {
    let action = problem.action(&instance.action)?;
    if action.parameters.len() != instance.arguments.len() {
        return Err(Message::error(format!(
            "{instance}: expected {} arguments",
            action.parameters.len()
        )));
    }
    let bindings = action
        .parameters
        .iter()
        .zip(&instance.arguments)
        .map(|(p, o)| (p.name.clone(), Value::Object(o.clone())))
        .collect();
    Ok((action, bindings))
}

/// Applies the action instance in the state. Returns `None` if its preconditions do not hold.
///
/// All conditions and values are evaluated in `state`. Assignments to false are applied before
/// assignments to true so that an atom both added and deleted ends up true.
pub fn apply(problem: &Problem, state: &State, instance: &ActionInstance) -> Res<Option<State>> {
    let env = &problem.env;
    let (action, bindings) = action_bindings(problem, instance)?;
    for &pre in &action.preconditions {
        if !eval(env, pre, state, &bindings)?.as_bool()? {
            return Ok(None);
        }
    }
    let mut deletes = Vec::new();
    let mut others = Vec::new();
    for eff in &action.effects {
        for_each_binding(env, &eff.forall, &bindings, &mut |b| {
            if let Some(c) = eff.condition {
                if !eval(env, c, state, b)?.as_bool()? {
                    return Ok(());
                }
            }
            let sv = &eff.state_variable;
            let key = (sv.fluent, eval_objects(env, &sv.arguments, state, b)?);
            let value = eval(env, eff.operation.value(), state, b)?;
            let value = match eff.operation {
                EffectOp::Assign(_) => value,
                EffectOp::Increase(_) => {
                    Value::Number(state.get(env, key.0, &key.1)?.as_number()? + value.as_number()?)
                }
                EffectOp::Decrease(_) => {
                    Value::Number(state.get(env, key.0, &key.1)?.as_number()? - value.as_number()?)
                }
            };
            if value == Value::Bool(false) {
                deletes.push((key, value));
            } else {
                others.push((key, value));
            }
            Ok(())
        })?;
    }
    let mut next = state.clone();
    for (key, value) in deletes.into_iter().chain(others) {
        next.set(key, value);
    }
    Ok(Some(next))
}

pub fn goals_hold(problem: &Problem, state: &State) -> Res<bool> {
    for &g in &problem.goals {
        if !eval(&problem.env, g, state, &Bindings::new())?.as_bool()? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Returns true if the plan is applicable from the initial state and reaches a state satisfying the goals.
pub fn validate(problem: &Problem, plan: &SequentialPlan) -> Res<bool> {
    let mut state = State::initial(problem)?;
    for (i, step) in plan.actions.iter().enumerate() {
        match apply(problem, &state, step)? {
            Some(next) => state = next,
            None => {
                tracing::debug!(step = i, action = %step, "inapplicable action");
                return Ok(false);
            }
        }
    }
    goals_hold(problem, &state)
}

/// Total cost of the plan under the first action-cost metric of the problem, if any.
/// Cost expressions are evaluated in the state where the action is applied.
pub fn plan_cost(problem: &Problem, plan: &SequentialPlan) -> Res<Option<RealValue>> {
    let Some(costs) = problem.action_costs() else {
        return Ok(None);
    };
    let mut state = State::initial(problem)?;
    let mut total = RealValue::from_integer(0);
    for step in &plan.actions {
        let (_, bindings) = action_bindings(problem, step)?;
        if let Some(cost) = costs.get(&step.action) {
            total += eval(&problem.env, cost, &state, &bindings)?.as_number()?;
        }
        if let Some(next) = apply(problem, &state, step)? {
            state = next;
        }
    }
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::{input::Input, read_problem};

    const DOMAIN: &str = "
(define (domain lights)
  (:requirements :typing :conditional-effects :action-costs)
  (:types lamp)
  (:predicates (on ?l - lamp) (power))
  (:functions (total-cost) - number)
  (:action switch
    :parameters (?l - lamp)
    :precondition (power)
    :effect (and (when (not (on ?l)) (on ?l)) (when (on ?l) (not (on ?l))) (increase (total-cost) 2)))
  (:action cut
    :parameters ()
    :precondition (power)
    :effect (and (not (power)) (increase (total-cost) 1))))";

    const PROBLEM: &str = "
(define (problem lights-2) (:domain lights)
  (:objects l1 l2 - lamp)
  (:init (power) (on l2) (= (total-cost) 0))
  (:goal (and (on l1) (not (on l2))))
  (:metric minimize (total-cost)))";

    fn step(pb: &Problem, action: &str, args: &[&str]) -> Res<ActionInstance> {
        let args = args.iter().map(|a| pb.object(a).cloned()).collect::<Res<Vec<_>>>()?;
        Ok(ActionInstance::new(action, args))
    }

    #[test]
    fn plans() -> Res<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        assert!(!validate(&pb, &SequentialPlan::default())?);

        let plan = SequentialPlan::new(vec![step(&pb, "switch", &["l1"])?, step(&pb, "switch", &["l2"])?]);
        assert!(validate(&pb, &plan)?);
        assert_eq!(plan_cost(&pb, &plan)?, Some(RealValue::from_integer(4)));

        // switching twice restores the lamp
        let plan = SequentialPlan::new(vec![
            step(&pb, "switch", &["l1"])?,
            step(&pb, "switch", &["l2"])?,
            step(&pb, "switch", &["l1"])?,
        ]);
        assert!(!validate(&pb, &plan)?);

        // no power left for the second switch
        let plan = SequentialPlan::new(vec![
            step(&pb, "switch", &["l1"])?,
            step(&pb, "cut", &[])?,
            step(&pb, "switch", &["l2"])?,
        ]);
        assert!(!validate(&pb, &plan)?);
        Ok(())
    }
}
