//! Reading of a PDDL domain and problem into a [`Task`].

use downward_model::errors::Spanned;
use downward_model::pddl::input::Input;
use downward_model::pddl::sexpr::{ListIter, SExpr};
use downward_model::pddl::{self, TypedSymbol, consume_typed_symbols};
use downward_model::TOP_TYPE;
use hashbrown::HashMap;

use crate::errors::{GroundingError, Result};
use crate::reachability::task::*;

/// Renaming of the variables in scope.
type Scope = HashMap<Name, Name>;

pub fn parse_task(domain: &str, problem: &str) -> Result<Task> {
    let dom = pddl::parse_pddl_domain(Input::named("domain", domain))?;
    let pb = pddl::parse_pddl_problem(Input::named("problem", problem))?;
    if !dom.derived.is_empty() {
        return Err(GroundingError::UnsupportedTask("derived predicates".to_string()));
    }
    let mut reader = Reader { num_vars: 0 };

    let mut parents: HashMap<Name, Name> = HashMap::new();
    for t in &dom.types {
        parents.insert(t.symbol.clone(), type_of(t)?);
    }
    let object = Name::from(TOP_TYPE);
    let mut supertypes = HashMap::new();
    for tpe in parents.keys().chain(std::iter::once(&object)) {
        let mut chain = vec![tpe.clone()];
        let mut cur = tpe;
        while let Some(p) = parents.get(cur) {
            if chain.contains(p) {
                break;
            }
            chain.push(p.clone());
            cur = p;
        }
        if !chain.contains(&object) {
            chain.push(object.clone());
        }
        supertypes.insert(tpe.clone(), chain);
    }

    let mut objects = Vec::new();
    for o in dom.constants.iter().chain(&pb.objects) {
        objects.push(TypedVar::new(o.symbol.clone(), type_of(o)?));
    }

    let mut task = Task {
        domain_name: dom.name.clone(),
        problem_name: pb.problem_name.clone(),
        supertypes,
        objects,
        predicates: dom.predicates.iter().map(|p| p.name.clone()).collect(),
        init: Vec::new(),
        init_assignments: HashMap::new(),
        goal: Condition::Truth,
        actions: Vec::new(),
        axioms: Vec::new(),
        use_min_cost_metric: false,
    };

    let mut init = Vec::new();
    for o in &task.objects {
        for tpe in task.supertypes_of(&o.tpe) {
            init.push(Atom::new(type_predicate(tpe), vec![o.name.clone()]));
        }
        init.push(Atom::new("=", vec![o.name.clone(), o.name.clone()]));
    }
    task.init = init;
    for fact in &pb.init {
        if let Some([target, value]) = fact.as_application("=") {
            if target.as_list().is_some() {
                let fluent = read_atom(target, &Scope::new())?;
                // only integer values matter to the analysis, for action costs
                if let Some(value) = value.as_atom().and_then(|v| v.canonical_str().parse::<i64>().ok()) {
                    task.init_assignments.insert(fluent, value);
                }
                continue;
            }
        }
        task.init.push(read_atom(fact, &Scope::new())?);
    }

    let goals = pb
        .goal
        .iter()
        .map(|g| reader.condition(g, false, &Scope::new()))
        .collect::<Result<Vec<_>>>()?;
    task.goal = Condition::And(goals).simplified();

    for a in &dom.actions {
        let parameters = a
            .args
            .iter()
            .map(|p| Ok(TypedVar::new(p.symbol.clone(), type_of(p)?)))
            .collect::<Result<Vec<_>>>()?;
        let scope = Scope::new();
        let pre = a
            .pre
            .iter()
            .map(|c| reader.condition(c, false, &scope))
            .collect::<Result<Vec<_>>>()?;
        let mut effects = Vec::new();
        let mut cost = None;
        for e in &a.eff {
            reader.effect(e, &[], &Condition::Truth, &scope, &mut effects, &mut cost)?;
        }
        task.actions.push(Action {
            name: a.name.clone(),
            num_external_parameters: parameters.len(),
            parameters,
            precondition: Condition::And(pre).simplified(),
            effects,
            cost,
        });
    }

    if let Some(pddl::Metric::Minimize(e)) = &pb.metric {
        task.use_min_cost_metric = e.as_application("total-cost").is_some_and(|args| args.is_empty());
    }
    Ok(task)
}

fn type_of(symbol: &TypedSymbol) -> Result<Name> {
    match symbol.tpe.as_slice() {
        [] => Ok(Name::from(TOP_TYPE)),
        [single] => Ok(single.clone()),
        _ => Err(GroundingError::UnsupportedTask(format!(
            "`either` type of {}",
            symbol.symbol
        ))),
    }
}

/// Reads `(p a b ...)` where each argument is an object or a variable of the scope.
fn read_atom(e: &SExpr, scope: &Scope) -> Result<Atom> {
    let mut list = e.as_list_iter().ok_or_else(|| e.invalid("expected an atom"))?;
    let predicate = list.pop_atom()?.clone();
    let mut args = Vec::with_capacity(list.len());
    for arg in list {
        let arg = arg.as_atom().ok_or_else(|| arg.invalid("expected an object or a variable"))?;
        args.push(scope.get(arg).cloned().unwrap_or_else(|| arg.clone()));
    }
    Ok(Atom::new(predicate, args))
}

struct Reader {
    num_vars: usize,
}

impl Reader {
    /// Reads quantified variables, renaming them apart from all other variables of the task.
    fn bind(&mut self, vars: &mut ListIter, scope: &Scope) -> Result<(Vec<TypedVar>, Scope)> {
        let mut inner = scope.clone();
        let mut res = Vec::new();
        for v in consume_typed_symbols(vars)? {
            let renamed = Name::from(format!("{}@{}", v.symbol.canonical_str(), self.num_vars));
            self.num_vars += 1;
            res.push(TypedVar::new(renamed.clone(), type_of(&v)?));
            inner.insert(v.symbol.clone(), renamed);
        }
        Ok((res, inner))
    }

    /// Reads a condition, pushing negations down to the literals.
    fn condition(&mut self, e: &SExpr, negated: bool, scope: &Scope) -> Result<Condition> {
        let list = e.as_list().ok_or_else(|| e.invalid("expected a condition"))?;
        let mut it = list.iter();
        let Some(head) = it.peek() else {
            return Ok(if negated { Condition::Falsity } else { Condition::Truth });
        };
        let Some(head) = head.as_atom() else {
            return Err(head.invalid("expected an operator or predicate").into());
        };
        let cond = match head.canonical_str() {
            "and" | "or" => {
                it.pop()?;
                let parts = it
                    .map(|p| self.condition(p, negated, scope))
                    .collect::<Result<Vec<_>>>()?;
                if (head.canonical_str() == "and") != negated {
                    Condition::And(parts)
                } else {
                    Condition::Or(parts)
                }
            }
            "not" => {
                it.pop()?;
                let inner = it.pop()?;
                self.condition(inner, !negated, scope)?
            }
            "imply" => {
                it.pop()?;
                let lhs = it.pop()?;
                let rhs = it.pop()?;
                if negated {
                    Condition::And(vec![self.condition(lhs, false, scope)?, self.condition(rhs, true, scope)?])
                } else {
                    Condition::Or(vec![self.condition(lhs, true, scope)?, self.condition(rhs, false, scope)?])
                }
            }
            "exists" | "forall" => {
                it.pop()?;
                let (vars, inner) = self.bind(&mut it.pop_list()?.iter(), scope)?;
                let body = Box::new(self.condition(it.pop()?, negated, &inner)?);
                if (head.canonical_str() == "exists") != negated {
                    Condition::Exists(vars, body)
                } else {
                    Condition::Forall(vars, body)
                }
            }
            _ => {
                let atom = read_atom(e, scope)?;
                Condition::Literal(Literal { atom, negated })
            }
        };
        Ok(cond)
    }

    /// Reads an effect as a list of simple effects, with the cost increase (if any) stored in `cost`.
    fn effect(
        &mut self,
        e: &SExpr,
        parameters: &[TypedVar],
        condition: &Condition,
        scope: &Scope,
        out: &mut Vec<Effect>,
        cost: &mut Option<Cost>,
    ) -> Result<()> {
        let list = e.as_list().ok_or_else(|| e.invalid("expected an effect"))?;
        let mut it = list.iter();
        let Some(head) = it.peek().and_then(|h| h.as_atom()) else {
            return if it.is_empty() {
                Ok(())
            } else {
                Err(e.invalid("expected an effect").into())
            };
        };
        match head.canonical_str() {
            "and" => {
                it.pop()?;
                for sub in it {
                    self.effect(sub, parameters, condition, scope, out, cost)?;
                }
            }
            "forall" => {
                it.pop()?;
                let (vars, inner) = self.bind(&mut it.pop_list()?.iter(), scope)?;
                let mut params = parameters.to_vec();
                params.extend(vars);
                self.effect(it.pop()?, &params, condition, &inner, out, cost)?;
            }
            "when" => {
                it.pop()?;
                let c = self.condition(it.pop()?, false, scope)?;
                let c = Condition::And(vec![condition.clone(), c]).simplified();
                self.effect(it.pop()?, parameters, &c, scope, out, cost)?;
            }
            "not" => {
                it.pop()?;
                let atom = read_atom(it.pop()?, scope)?;
                out.push(Effect {
                    parameters: parameters.to_vec(),
                    condition: condition.clone(),
                    literal: Literal::neg(atom),
                });
            }
            "increase" => {
                it.pop()?;
                let target = it.pop()?;
                if !target.as_application("total-cost").is_some_and(|args| args.is_empty()) {
                    return Err(GroundingError::UnsupportedTask(format!("numeric effect {e}")));
                }
                if !parameters.is_empty() || *condition != Condition::Truth {
                    return Err(GroundingError::UnsupportedTask(format!("conditional cost {e}")));
                }
                let value = it.pop()?;
                *cost = Some(match value.as_atom() {
                    Some(v) => Cost::Constant(v.canonical_str().parse::<i64>().map_err(|_| {
                        GroundingError::UnsupportedTask(format!("non-integer action cost {v}"))
                    })?),
                    None => Cost::Fluent(read_atom(value, scope)?),
                });
            }
            "decrease" | "assign" | "scale-up" | "scale-down" => {
                return Err(GroundingError::UnsupportedTask(format!("numeric effect {e}")));
            }
            _ => {
                let atom = read_atom(e, scope)?;
                out.push(Effect {
                    parameters: parameters.to_vec(),
                    condition: condition.clone(),
                    literal: Literal::pos(atom),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "
(define (domain delivery)
  (:requirements :typing :conditional-effects :action-costs)
  (:types truck - vehicle vehicle place)
  (:constants depot - place)
  (:predicates (at ?v - vehicle ?p - place) (road ?a ?b - place) (visited ?p - place))
  (:functions (distance ?a ?b - place) - number (total-cost) - number)
  (:action drive
    :parameters (?v - truck ?a ?b - place)
    :precondition (and (at ?v ?a) (road ?a ?b) (not (exists (?w - vehicle) (at ?w ?b))))
    :effect (and (not (at ?v ?a)) (at ?v ?b)
                 (forall (?p - place) (when (= ?p ?b) (visited ?p)))
                 (increase (total-cost) (distance ?a ?b)))))";

    const PROBLEM: &str = "
(define (problem deliver-1)
  (:domain delivery)
  (:objects t1 - truck shop - place)
  (:init (at t1 depot) (road depot shop) (= (distance depot shop) 4) (= (total-cost) 0))
  (:goal (and (visited shop)))
  (:metric minimize (total-cost)))";

    #[test]
    fn read_task() -> Result<()> {
        let task = parse_task(DOMAIN, PROBLEM)?;
        assert!(task.use_min_cost_metric);
        assert_eq!(task.objects.len(), 3);
        assert_eq!(
            task.supertypes_of(&Name::from("truck")),
            &[Name::from("truck"), Name::from("vehicle"), Name::from("object")]
        );
        // t1 is a truck, a vehicle and an object
        let t1 = Name::from("t1");
        assert_eq!(task.init.iter().filter(|a| a.args == vec![t1.clone()]).count(), 3);
        assert!(task.init.contains(&Atom::new("=", vec![t1.clone(), t1.clone()])));
        let distance = Atom::new("distance", vec![Name::from("depot"), Name::from("shop")]);
        assert_eq!(task.init_assignments.get(&distance), Some(&4));

        let drive = &task.actions[0];
        assert_eq!(drive.num_external_parameters, 3);
        assert!(matches!(drive.cost, Some(Cost::Fluent(_))));
        assert_eq!(drive.effects.len(), 3);
        assert_eq!(drive.effects[2].parameters.len(), 1);
        // the negated existential is read as a universal over a renamed variable
        match &drive.precondition {
            Condition::And(parts) => match &parts[2] {
                Condition::Forall(vars, body) => {
                    assert_eq!(vars[0].name, "?w@0");
                    assert_eq!(body.to_string(), "not at(?w@0, ?b)");
                }
                other => panic!("unexpected condition {other}"),
            },
            other => panic!("unexpected precondition {other}"),
        }
        Ok(())
    }

    #[test]
    fn numeric_effects_are_rejected() {
        let domain = DOMAIN.replace("(increase (total-cost) (distance ?a ?b))", "(decrease (distance ?a ?b) 1)");
        assert!(matches!(
            parse_task(&domain, PROBLEM),
            Err(GroundingError::UnsupportedTask(_))
        ));
    }
}
