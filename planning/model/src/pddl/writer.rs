//! Serialization of a [`Problem`] into a PDDL domain and problem.
//!
//! Every item of the model receives a PDDL-safe name, unique among all items. The [`NameTable`] built
//! while writing maps these names back to the items of the model.

use std::fmt::Write;

use itertools::Itertools;

use crate::pddl::convert::TOTAL_COST;
use crate::*;

/// An item of the model that received a name in the written PDDL.
#[derive(Clone, Debug)]
pub enum Item {
    Type(UserType),
    Fluent(FluentId),
    Action(Sym),
    Object(Object),
    Parameter(Param),
}

#[derive(Debug, thiserror::Error)]
#[error("no item named `{0}` in the written PDDL")]
pub struct UnknownName(pub String);

/// Bidirectional mapping between the items of a problem and their names in the written PDDL.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    types: hashbrown::HashMap<Sym, String>,
    fluents: hashbrown::HashMap<FluentId, String>,
    actions: hashbrown::HashMap<Sym, String>,
    objects: hashbrown::HashMap<Sym, String>,
    items: hashbrown::HashMap<String, Item>,
}

const RESERVED: &[&str] = &[
    "and", "or", "not", "imply", "exists", "forall", "when", "either", "number", "increase", "decrease",
    "assign", "define", "domain", "problem", "minimize", "maximize", TOTAL_COST,
];

/// Turns any string into a valid PDDL identifier.
fn sanitize(name: &str) -> String {
    let mut res: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if !res.starts_with(|c: char| c.is_ascii_alphabetic()) {
        res.insert_str(0, "x_");
    }
    if RESERVED.contains(&res.as_str()) {
        res.push('_');
    }
    res
}

impl NameTable {
    pub fn new(problem: &Problem) -> Self {
        let mut table = NameTable::default();
        let env = &problem.env;
        for tpe in env.types.user_types() {
            let name = if tpe.is_top() {
                // the root of the hierarchy must keep its name
                table.items.insert(TOP_TYPE.to_string(), Item::Type(tpe.clone()));
                TOP_TYPE.to_string()
            } else {
                table.fresh(&tpe.name, Item::Type(tpe.clone()))
            };
            table.types.insert(tpe.name.clone(), name);
        }
        for (id, fluent) in env.fluents.iter() {
            let name = table.fresh(&fluent.name, Item::Fluent(id));
            table.fluents.insert(id, name);
        }
        for o in env.objects.iter() {
            let name = table.fresh(o.name(), Item::Object(o.clone()));
            table.objects.insert(o.name().clone(), name);
        }
        for a in problem.actions.iter() {
            let name = table.fresh(&a.name, Item::Action(a.name.clone()));
            table.actions.insert(a.name.clone(), name);
            for p in &a.parameters {
                table
                    .items
                    .entry(param_name(p))
                    .or_insert_with(|| Item::Parameter(p.clone()));
            }
        }
        table
    }

    /// Records the item under a sanitized version of `name`, suffixed with `_0`, `_1`, ... if already taken.
    fn fresh(&mut self, name: &Sym, item: Item) -> String {
        let base = sanitize(name.canonical_str());
        let mut candidate = base.clone();
        let mut i = 0;
        while self.items.contains_key(&candidate) {
            candidate = format!("{base}_{i}");
            i += 1;
        }
        self.items.insert(candidate.clone(), item);
        candidate
    }

    /// Returns the item that was given this name.
    pub fn get_item_named(&self, name: &str) -> Result<&Item, UnknownName> {
        self.items
            .get(name)
            .or_else(|| self.items.get(&name.to_ascii_lowercase()))
            .ok_or_else(|| UnknownName(name.to_string()))
    }

    pub fn type_name(&self, tpe: &UserType) -> Res<&str> {
        self.types
            .get(&tpe.name)
            .map(|s| s.as_str())
            .ok_or_else(|| Message::error(format!("unnamed type {tpe}")))
    }

    pub fn fluent_name(&self, fluent: FluentId) -> Res<&str> {
        self.fluents
            .get(&fluent)
            .map(|s| s.as_str())
            .ok_or_else(|| Message::error("unnamed fluent"))
    }

    pub fn action_name(&self, action: &Sym) -> Res<&str> {
        self.actions
            .get(action)
            .map(|s| s.as_str())
            .ok_or_else(|| Message::error(format!("unnamed action {action}")))
    }

    pub fn object_name(&self, object: &Object) -> Res<&str> {
        self.objects
            .get(object.name())
            .map(|s| s.as_str())
            .ok_or_else(|| Message::error(format!("unnamed object {object}")))
    }
}

/// Name of a parameter or quantified variable. Variables only need to be unique in their scope.
fn param_name(p: &Param) -> String {
    let name = p.name.canonical_str();
    format!("?{}", sanitize(name.strip_prefix('?').unwrap_or(name)))
}

fn number(value: RealValue) -> String {
    if value.is_integer() {
        value.to_integer().to_string()
    } else {
        // PDDL has no notation for fractions
        format!("{}", *value.numer() as f64 / *value.denom() as f64)
    }
}

pub struct PddlWriter<'a> {
    problem: &'a Problem,
    names: NameTable,
}

impl<'a> PddlWriter<'a> {
    pub fn new(problem: &'a Problem) -> Self {
        Self {
            problem,
            names: NameTable::new(problem),
        }
    }

    pub fn name_table(&self) -> &NameTable {
        &self.names
    }

    pub fn into_name_table(self) -> NameTable {
        self.names
    }

    fn domain_name(&self) -> String {
        format!("{}-domain", sanitize(self.problem.name.canonical_str()))
    }

    fn env(&self) -> &'a Environment {
        &self.problem.env
    }

    fn expr(&self, e: ExprId) -> Res<String> {
        let env = self.env();
        let node = env / e;
        let list = |head: &str, args: &[ExprId]| -> Res<String> {
            let mut s = format!("({head}");
            for &a in args {
                s.push(' ');
                s.push_str(&self.expr(a)?);
            }
            s.push(')');
            Ok(s)
        };
        Ok(match node.expr() {
            Expr::Bool(true) => "(and)".to_string(),
            Expr::Bool(false) => "(or)".to_string(),
            Expr::Int(i) => i.to_string(),
            Expr::Real(r) => number(*r),
            Expr::Object(o) => self.names.object_name(o)?.to_string(),
            Expr::Param(p) => param_name(p),
            Expr::StateVariable(fluent, args) => list(self.names.fluent_name(*fluent)?, args)?,
            Expr::App(Fun::Iff, args) => {
                let (a, b) = (self.expr(args[0])?, self.expr(args[1])?);
                format!("(and (imply {a} {b}) (imply {b} {a}))")
            }
            Expr::App(fun, args) => {
                let head = match fun {
                    Fun::Implies => "imply".to_string(),
                    other => other.to_string(),
                };
                list(&head, args)?
            }
            Expr::Exists(vars, body) | Expr::Forall(vars, body) => {
                let quantifier = if matches!(node.expr(), Expr::Exists(_, _)) {
                    "exists"
                } else {
                    "forall"
                };
                format!("({quantifier} ({}) {})", self.typed_params(vars)?, self.expr(*body)?)
            }
        })
    }

    fn typed_params(&self, params: &[Param]) -> Res<String> {
        let mut s = Vec::with_capacity(params.len());
        for p in params {
            let tpe = p
                .tpe
                .as_user_type()
                .ok_or_else(|| Message::error(format!("parameter {p:?} is not an object")))?;
            s.push(format!("{} - {}", param_name(p), self.names.type_name(tpe)?));
        }
        Ok(s.join(" "))
    }

    fn state_variable(&self, sv: &StateVariable) -> Res<String> {
        let mut s = format!("({}", self.names.fluent_name(sv.fluent)?);
        for &a in &sv.arguments {
            s.push(' ');
            s.push_str(&self.expr(a)?);
        }
        s.push(')');
        Ok(s)
    }

    fn effect(&self, eff: &Effect) -> Res<Vec<String>> {
        let env = self.env();
        let sv = self.state_variable(&eff.state_variable)?;
        // pairs of (additional condition, effect)
        let mut simple: Vec<(Option<String>, String)> = Vec::with_capacity(2);
        match eff.operation {
            EffectOp::Assign(value) if matches!((env / value).tpe(), Type::Bool) => match (env / value).expr() {
                Expr::Bool(true) => simple.push((None, sv)),
                Expr::Bool(false) => simple.push((None, format!("(not {sv})"))),
                _ => {
                    let v = self.expr(value)?;
                    simple.push((Some(v.clone()), sv.clone()));
                    simple.push((Some(format!("(not {v})")), format!("(not {sv})")));
                }
            },
            EffectOp::Assign(value) => simple.push((None, format!("(assign {sv} {})", self.expr(value)?))),
            EffectOp::Increase(value) => simple.push((None, format!("(increase {sv} {})", self.expr(value)?))),
            EffectOp::Decrease(value) => simple.push((None, format!("(decrease {sv} {})", self.expr(value)?))),
        }
        let condition = eff.condition.map(|c| self.expr(c)).transpose()?;
        let mut res = Vec::with_capacity(simple.len());
        for (extra, e) in simple {
            let cond = match (&condition, extra) {
                (Some(c), Some(x)) => Some(format!("(and {c} {x})")),
                (Some(c), None) => Some(c.clone()),
                (None, x) => x,
            };
            let e = match cond {
                Some(c) => format!("(when {c} {e})"),
                None => e,
            };
            let e = if eff.forall.is_empty() {
                e
            } else {
                format!("(forall ({}) {e})", self.typed_params(&eff.forall)?)
            };
            res.push(e);
        }
        Ok(res)
    }

    fn requirements(&self) -> String {
        let kind = self.problem.kind();
        let mut reqs = vec![":strips", ":typing"];
        if kind.has(Feature::NegativeConditions) {
            reqs.push(":negative-preconditions");
        }
        if kind.has(Feature::DisjunctiveConditions) {
            reqs.push(":disjunctive-preconditions");
        }
        if kind.has(Feature::Equalities) {
            reqs.push(":equality");
        }
        if kind.has(Feature::ExistentialConditions) {
            reqs.push(":existential-preconditions");
        }
        if kind.has(Feature::UniversalConditions) {
            reqs.push(":universal-preconditions");
        }
        if kind.has(Feature::ConditionalEffects) || kind.has(Feature::FluentsInBooleanAssignments) {
            reqs.push(":conditional-effects");
        }
        if kind.has(Feature::NumericFluents) {
            reqs.push(":numeric-fluents");
        }
        if kind.has(Feature::ActionsCost) {
            reqs.push(":action-costs");
        }
        reqs.join(" ")
    }

    /// Objects that appear in the actions and must thus be declared as constants of the domain.
    fn constants(&self) -> hashbrown::HashSet<Sym> {
        fn collect(env: &Environment, e: ExprId, out: &mut hashbrown::HashSet<Sym>) {
            match (env / e).expr() {
                Expr::Object(o) => {
                    out.insert(o.name().clone());
                }
                Expr::App(_, args) | Expr::StateVariable(_, args) => {
                    for &a in args {
                        collect(env, a, out)
                    }
                }
                Expr::Exists(_, body) | Expr::Forall(_, body) => collect(env, *body, out),
                _ => {}
            }
        }
        let env = self.env();
        let mut constants = hashbrown::HashSet::new();
        for a in self.problem.actions.iter() {
            for &c in &a.preconditions {
                collect(env, c, &mut constants);
            }
            for eff in &a.effects {
                for &x in eff.condition.iter().chain(&eff.state_variable.arguments) {
                    collect(env, x, &mut constants);
                }
                collect(env, eff.operation.value(), &mut constants);
            }
            if let Some(cost) = self.cost_of(&a.name) {
                collect(env, cost, &mut constants);
            }
        }
        constants
    }

    fn cost_of(&self, action: &Sym) -> Option<ExprId> {
        self.problem.action_costs().and_then(|costs| costs.get(action))
    }

    fn objects(&self, constants: bool) -> Res<String> {
        let declared = self.constants();
        let mut s = Vec::new();
        for o in self.env().objects.iter() {
            if declared.contains(o.name()) == constants {
                s.push(format!("{} - {}", self.names.object_name(o)?, self.names.type_name(o.tpe())?));
            }
        }
        Ok(s.join(" "))
    }

    pub fn domain(&self) -> Res<String> {
        let env = self.env();
        let mut out = String::new();
        let w = &mut out;
        let fmt = |_| Message::error("formatting error");
        writeln!(w, "(define (domain {})", self.domain_name()).map_err(fmt)?;
        writeln!(w, " (:requirements {})", self.requirements()).map_err(fmt)?;

        let mut types = Vec::new();
        for tpe in env.types.user_types() {
            if tpe.is_top() {
                continue;
            }
            let parent = tpe.parents().next().unwrap_or_else(|| env.types.top_user_type());
            types.push(format!("{} - {}", self.names.type_name(&tpe)?, self.names.type_name(&parent)?));
        }
        writeln!(w, " (:types {})", types.join(" ")).map_err(fmt)?;

        let constants = self.objects(true)?;
        if !constants.is_empty() {
            writeln!(w, " (:constants {constants})").map_err(fmt)?;
        }

        let mut predicates = Vec::new();
        let mut functions = Vec::new();
        for (id, fluent) in env.fluents.iter() {
            let decl = format!(
                "({}{}{})",
                self.names.fluent_name(id)?,
                if fluent.parameters.is_empty() { "" } else { " " },
                self.typed_params(&fluent.parameters)?
            );
            if fluent.is_boolean() {
                predicates.push(decl);
            } else {
                functions.push(format!("{decl} - number"));
            }
        }
        if self.problem.action_costs().is_some() {
            functions.push(format!("({TOTAL_COST}) - number"));
        }
        writeln!(w, " (:predicates {})", predicates.join(" ")).map_err(fmt)?;
        if !functions.is_empty() {
            writeln!(w, " (:functions {})", functions.join(" ")).map_err(fmt)?;
        }

        for a in self.problem.actions.iter() {
            writeln!(w, " (:action {}", self.names.action_name(&a.name)?).map_err(fmt)?;
            writeln!(w, "  :parameters ({})", self.typed_params(&a.parameters)?).map_err(fmt)?;
            if !a.preconditions.is_empty() {
                let pre: Vec<String> = a.preconditions.iter().map(|&c| self.expr(c)).collect::<Res<_>>()?;
                writeln!(w, "  :precondition (and {})", pre.join(" ")).map_err(fmt)?;
            }
            let mut effects = Vec::new();
            for eff in &a.effects {
                effects.extend(self.effect(eff)?);
            }
            if let Some(cost) = self.cost_of(&a.name) {
                effects.push(format!("(increase ({TOTAL_COST}) {})", self.expr(cost)?));
            }
            writeln!(w, "  :effect (and {}))", effects.join(" ")).map_err(fmt)?;
        }
        writeln!(w, ")").map_err(fmt)?;
        Ok(out)
    }

    pub fn problem(&self) -> Res<String> {
        let env = self.env();
        let mut out = String::new();
        let w = &mut out;
        let fmt = |_| Message::error("formatting error");
        writeln!(
            w,
            "(define (problem {}-problem)\n (:domain {})",
            sanitize(self.problem.name.canonical_str()),
            self.domain_name()
        )
        .map_err(fmt)?;
        writeln!(w, " (:objects {})", self.objects(false)?).map_err(fmt)?;

        let mut init = Vec::with_capacity(self.problem.init.len());
        for ini in &self.problem.init {
            let sv = self.state_variable(&ini.state_variable)?;
            match (env / ini.value).expr() {
                Expr::Bool(true) => init.push(sv),
                Expr::Bool(false) => {}
                _ => init.push(format!("(= {sv} {})", self.expr(ini.value)?)),
            }
        }
        if self.problem.action_costs().is_some() {
            init.push(format!("(= ({TOTAL_COST}) 0)"));
        }
        writeln!(w, " (:init {})", init.join(" ")).map_err(fmt)?;

        let goals: Vec<String> = self.problem.goals.iter().map(|&g| self.expr(g)).collect::<Res<_>>()?;
        writeln!(w, " (:goal (and {}))", goals.join(" ")).map_err(fmt)?;

        for metric in &self.problem.metrics {
            match metric {
                Metric::MinimizeActionCosts(_) => writeln!(w, " (:metric minimize ({TOTAL_COST}))").map_err(fmt)?,
                Metric::MinimizeSequentialPlanLength => {}
                Metric::Minimize(e) => writeln!(w, " (:metric minimize {})", self.expr(*e)?).map_err(fmt)?,
                Metric::Maximize(e) => writeln!(w, " (:metric maximize {})", self.expr(*e)?).map_err(fmt)?,
            }
        }
        writeln!(w, ")").map_err(fmt)?;
        Ok(out)
    }
}

/// Reads a plan written with the names of a [`NameTable`], e.g. `(move r1 l1 l2)` on each line.
pub fn read_plan(plan: crate::pddl::input::Input, names: &NameTable) -> Res<SequentialPlan> {
    let plan = crate::pddl::parse_plan(plan)?;
    let mut actions = Vec::with_capacity(plan.actions.len());
    for step in plan.actions {
        let action = match names.get_item_named(step.name.canonical_str()) {
            Ok(Item::Action(a)) => a.clone(),
            _ => return Err(step.name.invalid("unknown action")),
        };
        let mut arguments = Vec::with_capacity(step.arguments.len());
        for arg in &step.arguments {
            match names.get_item_named(arg.canonical_str()) {
                Ok(Item::Object(o)) => arguments.push(o.clone()),
                _ => return Err(arg.invalid("unknown object")),
            }
        }
        actions.push(ActionInstance::new(action, arguments));
    }
    Ok(SequentialPlan::new(actions))
}

/// Writes a plan with the names of a [`NameTable`], one action per line.
pub fn write_plan(plan: &SequentialPlan, names: &NameTable) -> Res<String> {
    let mut out = String::new();
    for step in &plan.actions {
        let args: Vec<&str> = step.arguments.iter().map(|o| names.object_name(o)).collect::<Res<_>>()?;
        out.push_str(&format!(
            "({}{}{})\n",
            names.action_name(&step.action)?,
            if args.is_empty() { "" } else { " " },
            args.iter().format(" ")
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::convert::read_problem;
    use crate::pddl::input::Input;

    const DOMAIN: &str = "
(define (domain lights)
  (:requirements :typing :action-costs :negative-preconditions)
  (:types room)
  (:constants hall - room)
  (:predicates (on ?r - room) (and-gate))
  (:functions (total-cost) - number)
  (:action switch
    :parameters (?r - room)
    :precondition (not (on ?r))
    :effect (and (on ?r) (increase (total-cost) 2)))
  (:action reset
    :parameters ()
    :precondition (on hall)
    :effect (forall (?r - room) (not (on ?r)))))";

    const PROBLEM: &str = "
(define (problem Two-Rooms) (:domain lights)
  (:objects kitchen - room)
  (:init)
  (:goal (and (on kitchen) (on hall)))
  (:metric minimize (total-cost)))";

    #[test]
    fn names_are_unique_and_resolvable() -> Res<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let writer = PddlWriter::new(&pb);
        let names = writer.name_table();
        // `and-gate` is not reserved but `and` would be
        assert!(matches!(names.get_item_named("and-gate"), Ok(Item::Fluent(_))));
        assert!(matches!(names.get_item_named("switch"), Ok(Item::Action(_))));
        assert!(matches!(names.get_item_named("kitchen"), Ok(Item::Object(_))));
        assert!(matches!(names.get_item_named("room"), Ok(Item::Type(_))));
        assert!(matches!(names.get_item_named("?r"), Ok(Item::Parameter(_))));
        assert!(names.get_item_named("garage").is_err());
        assert_eq!(sanitize("and"), "and_");
        assert_eq!(sanitize("3d print"), "x_3d_print");
        Ok(())
    }

    #[test]
    fn written_pddl_can_be_read_back() -> Res<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let writer = PddlWriter::new(&pb);
        let domain = writer.domain()?;
        let problem = writer.problem()?;
        assert!(domain.contains("(:constants hall - room)"));
        assert!(domain.contains("(increase (total-cost) 2)"));
        assert!(domain.contains("(increase (total-cost) 0)"));
        assert!(problem.contains("(:objects kitchen - room)"));
        assert!(problem.contains("(= (total-cost) 0)"));
        assert!(problem.contains("(:metric minimize (total-cost))"));

        let again = read_problem(Input::from_string(&domain), Input::from_string(&problem))?;
        assert_eq!(again.actions.len(), 2);
        assert_eq!(again.env.objects.len(), 2);
        assert_eq!(again.goals.len(), 2);
        assert!(again.action_costs().is_some());
        Ok(())
    }

    #[test]
    fn plans() -> Res<()> {
        let pb = read_problem(Input::from_string(DOMAIN), Input::from_string(PROBLEM))?;
        let writer = PddlWriter::new(&pb);
        let plan = read_plan(Input::from_string("(switch kitchen)\n(SWITCH hall)\n; cost = 4"), writer.name_table())?;
        assert_eq!(plan.len(), 2);
        assert!(validate::validate(&pb, &plan)?);
        assert_eq!(write_plan(&plan, writer.name_table())?, "(switch kitchen)\n(switch hall)\n");
        assert!(read_plan(Input::from_string("(fly kitchen)"), writer.name_table()).is_err());
        Ok(())
    }

    #[test]
    fn action_named_like_a_predicate() -> Res<()> {
        let domain = "
(define (domain boxes)
  (:requirements :typing)
  (:types box)
  (:predicates (open ?b - box) (big ?b - box))
  (:action open
    :parameters (?b - box)
    :precondition (and)
    :effect (open ?b)))";
        let problem = "
(define (problem boxes-1) (:domain boxes)
  (:objects b1 - box)
  (:init (big b1))
  (:goal (open b1)))";
        let pb = read_problem(Input::from_string(domain), Input::from_string(problem))?;
        let writer = PddlWriter::new(&pb);
        let names = writer.name_table();
        assert_eq!(names.action_name(&Sym::from("open"))?, "open_0");
        assert!(matches!(names.get_item_named("open"), Ok(Item::Fluent(_))));
        assert!(writer.domain()?.contains("(:action open_0"));

        let plan = read_plan(Input::from_string("(open_0 b1)\n"), names)?;
        assert_eq!(plan.actions[0].action, "open");
        assert!(validate::validate(&pb, &plan)?);
        assert!(read_plan(Input::from_string("(open b1)\n"), names).is_err());
        Ok(())
    }
}
