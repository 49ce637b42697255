//! PDDL abstract syntax: domains, problems and plans as read from their s-expressions.
//!
//! Conditions and effects are kept as s-expressions, their interpretation is left to the conversion to the
//! model.

use crate::Res;
use crate::Sym;
use crate::errors::*;

use itertools::Itertools;
use smallvec::{SmallVec, smallvec};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::pddl::input::*;
use crate::pddl::sexpr::*;

pub fn parse_pddl_domain(pb: Input) -> Res<Domain> {
    let expr = parse(Arc::new(pb))?;
    read_domain(expr).title("Invalid domain: Syntax error")
}

pub fn parse_pddl_problem(pb: Input) -> Res<Problem> {
    let expr = parse(Arc::new(pb))?;
    read_problem(expr).title("Invalid problem: Syntax error")
}

/// Parses a plan as produced by classical planners: one `(action arg1 arg2 ...)` per line.
/// Comments (starting with `;`) are ignored.
pub fn parse_plan(plan: Input) -> Res<Plan> {
    let steps = parse_many(Arc::new(plan))?;
    let actions = steps.iter().map(read_plan_step).collect::<Res<Vec<_>>>()?;
    Ok(Plan { actions })
}

fn read_plan_step(e: &SExpr) -> Res<PlanStep> {
    let mut elems = e
        .as_list_iter()
        .ok_or_else(|| e.invalid("expected a list with action name and parameters"))?;
    let name = elems.pop_atom()?.clone();
    let mut arguments = Vec::with_capacity(elems.len());
    while !elems.is_empty() {
        arguments.push(elems.pop_atom()?.clone());
    }
    Ok(PlanStep {
        name,
        arguments,
        span: e.loc(),
    })
}

/// A PDDL requirement flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PddlFeature {
    Strips,
    Typing,
    Equality,
    NegativePreconditions,
    DisjunctivePreconditions,
    UniversalPreconditions,
    ExistentialPreconditions,
    QuantifiedPreconditions,
    ConditionalEffects,
    DerivedPredicates,
    Fluents,
    NumericFluent,
    Adl,
    ActionCosts,
}

const REQUIREMENTS: [(&str, PddlFeature); 14] = [
    (":strips", PddlFeature::Strips),
    (":typing", PddlFeature::Typing),
    (":equality", PddlFeature::Equality),
    (":negative-preconditions", PddlFeature::NegativePreconditions),
    (":disjunctive-preconditions", PddlFeature::DisjunctivePreconditions),
    (":universal-preconditions", PddlFeature::UniversalPreconditions),
    (":existential-preconditions", PddlFeature::ExistentialPreconditions),
    (":quantified-preconditions", PddlFeature::QuantifiedPreconditions),
    (":conditional-effects", PddlFeature::ConditionalEffects),
    (":derived-predicates", PddlFeature::DerivedPredicates),
    (":fluents", PddlFeature::Fluents),
    (":numeric-fluents", PddlFeature::NumericFluent),
    (":adl", PddlFeature::Adl),
    (":action-costs", PddlFeature::ActionCosts),
];

impl PddlFeature {
    /// The requirement flag, e.g. `:typing`.
    pub fn requirement(self) -> &'static str {
        REQUIREMENTS
            .iter()
            .find_map(|&(flag, f)| (f == self).then_some(flag))
            .unwrap_or_default()
    }

    pub fn from_requirement(flag: &str) -> Option<PddlFeature> {
        REQUIREMENTS.iter().find_map(|&(r, f)| (r == flag).then_some(f))
    }
}

impl Display for PddlFeature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.requirement())
    }
}

#[derive(Debug, Clone)]
pub struct Domain {
    pub name: Sym,
    pub features: Vec<PddlFeature>,
    pub types: Vec<TypedSymbol>,
    pub constants: Vec<TypedSymbol>,
    pub predicates: Vec<Predicate>,
    pub functions: Vec<Function>,
    pub actions: Vec<Action>,
    pub derived: Vec<Derived>,
}

fn section<T: Display>(f: &mut Formatter<'_>, title: &str, items: &[T]) -> std::fmt::Result {
    write!(f, "\n# {title}\n  {}", items.iter().format("\n  "))
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "# Domain : {}", self.name)?;
        section(f, "Types", &self.types)?;
        section(f, "Predicates", &self.predicates)?;
        section(f, "Functions", &self.functions)?;
        section(f, "Actions", &self.actions)?;
        if !self.derived.is_empty() {
            section(f, "Derived", &self.derived)?;
        }
        Ok(())
    }
}

pub type TypedSymbol = Param;

/// Types of a symbol, several for `(either t1 t2)`.
pub type Types = SmallVec<[Sym; 1]>;

/// Typed symbol of a list such as `(?x ?y - block ?z)`: a parameter, an object, a constant or a type.
#[derive(Debug, Clone)]
pub struct Param {
    pub symbol: Sym,
    /// Possible types of the symbol, `object` if empty.
    pub tpe: Types,
}

impl Param {
    pub fn new(symbol: impl Into<Sym>, tpe: impl Into<Sym>) -> Self {
        Param {
            symbol: symbol.into(),
            tpe: smallvec![tpe.into()],
        }
    }

    pub fn new_union(symbol: impl Into<Sym>, tpe: Types) -> Self {
        Param {
            symbol: symbol.into(),
            tpe,
        }
    }

    pub fn untyped(symbol: impl Into<Sym>) -> Self {
        Param::new_union(symbol, Types::new())
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.tpe.as_slice() {
            [] => write!(f, "{}", self.symbol),
            [tpe] => write!(f, "{}: {tpe}", self.symbol),
            types => write!(f, "{}: {{{}}}", self.symbol, types.iter().format(", ")),
        }
    }
}

/// Boolean state function `(name ?x - t ...)`.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub name: Sym,
    pub args: Vec<Param>,
    pub source: Option<Span>,
}

/// Numeric state function, declared in the `:functions` block.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Sym,
    pub args: Vec<Param>,
    /// Declared return type (`number` or a user type), PDDL 3.1 only.
    pub tpe: Option<Sym>,
    pub source: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub name: Sym,
    pub args: Vec<Param>,
    pub pre: Vec<SExpr>,
    pub eff: Vec<SExpr>,
    /// Span covering the entire action definition
    pub span: Span,
}

/// A derived predicate `(:derived (head ?x - t) body)`
#[derive(Clone, Debug)]
pub struct Derived {
    pub name: Sym,
    pub args: Vec<Param>,
    pub body: SExpr,
    pub span: Span,
}

fn signature(f: &mut Formatter<'_>, name: &Sym, args: &[Param]) -> std::fmt::Result {
    write!(f, "{name}({})", args.iter().format(", "))
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        signature(f, &self.name, &self.args)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        signature(f, &self.name, &self.args)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        signature(f, &self.name, &self.args)
    }
}

impl Display for Derived {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        signature(f, &self.name, &self.args)?;
        write!(f, " <- {}", self.body)
    }
}

#[derive(Debug)]
pub struct Plan {
    pub actions: Vec<PlanStep>,
}

#[derive(Debug)]
pub struct PlanStep {
    pub name: Sym,
    pub arguments: Vec<Sym>,
    pub span: Span,
}

impl Spanned for PlanStep {
    fn span(&self) -> Option<&Span> {
        Some(&self.span)
    }
}

impl Display for PlanStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {})", self.name, self.arguments.iter().format(" "))
    }
}

fn type_annotation(tpe: &SExpr) -> Res<Types> {
    let name = |e: &SExpr| e.as_atom().cloned().ok_or_else(|| e.invalid("expected type name"));
    match tpe.as_application("either") {
        Some(variants) => variants.iter().map(name).collect(),
        None => Ok(smallvec![name(tpe)?]),
    }
}

/// Consume a typed list of symbols
///  - (a - loc b - loc c - loc) : symbols a, b and c of type loc
///  - (a b c - loc)  : symbols a, b and c of type loc
///  - (a b c) : symbols a b and c of type object
pub fn consume_typed_symbols(input: &mut ListIter) -> Res<Vec<TypedSymbol>> {
    let mut symbols = Vec::with_capacity(input.len());
    // symbols waiting for their type
    let mut pending: Vec<Sym> = Vec::new();
    while !input.is_empty() {
        let next = input.pop_atom()?;
        if next.canonical_str() == "-" {
            let types = type_annotation(input.pop()?)?;
            symbols.extend(pending.drain(..).map(|s| Param::new_union(s, types.clone())));
        } else {
            pending.push(next.clone());
        }
    }
    symbols.extend(pending.into_iter().map(Param::untyped));
    Ok(symbols)
}

/// Header of a definition, e.g. `(domain blocks)`, returning its name.
fn header(list: &mut ListIter, keyword: &str) -> Res<Sym> {
    let mut decl = list
        .pop_list()
        .title(format!("Expected a declaration of the form '({keyword} NAME)'"))?
        .iter();
    decl.pop_known_atom(keyword)?;
    Ok(decl.pop_atom()?.clone())
}

fn read_requirements(property: ListIter) -> Res<Vec<PddlFeature>> {
    property
        .map(|flag| {
            let flag = flag
                .as_atom()
                .ok_or_else(|| flag.invalid("Expected feature name but got list"))?;
            PddlFeature::from_requirement(flag.canonical_str())
                .ok_or_else(|| flag.invalid(format!("Unknown feature `{flag}`")))
        })
        .collect()
}

fn read_predicate(decl: &SExpr) -> Res<Predicate> {
    let mut pred = decl.as_list_iter().ok_or_else(|| decl.invalid("Expected a list"))?;
    let name = pred.pop_atom()?.clone();
    let args = consume_typed_symbols(&mut pred)?;
    Ok(Predicate {
        name,
        args,
        source: Some(decl.loc()),
    })
}

/// Function declarations, each optionally followed by `- type`.
fn read_functions(mut property: ListIter) -> Res<Vec<Function>> {
    let mut functions = Vec::new();
    while let Ok(decl) = property.pop() {
        let mut func = decl.as_list_iter().ok_or_else(|| decl.invalid("Expected a list"))?;
        let name = func.pop_atom()?.clone();
        let args = consume_typed_symbols(&mut func)?;
        let tpe = if property.peek().is_some_and(|a| a.is_atom("-")) {
            property.pop_known_atom("-")?;
            Some(property.pop_atom().title("expected a type").cloned()?)
        } else {
            None
        };
        functions.push(Function {
            name,
            args,
            tpe,
            source: Some(decl.loc()),
        });
    }
    Ok(functions)
}

fn read_action(mut property: ListIter, span: Span) -> Res<Action> {
    let name = property.pop_atom()?.clone();
    let mut args = None;
    let mut pre = Vec::new();
    let mut eff = Vec::new();
    while !property.is_empty() {
        let key = property.pop_atom()?;
        let value = property.pop().ctx2(key, "No value associated to arg")?;
        match key.canonical_str() {
            ":parameters" if args.is_some() => {
                return Err(key.invalid("Duplicated ':parameters' tag is not allowed"));
            }
            ":parameters" => {
                let mut params = value
                    .as_list_iter()
                    .ok_or_else(|| value.invalid("Expected a parameter list"))?;
                args = Some(consume_typed_symbols(&mut params)?);
            }
            ":precondition" => pre.push(value.clone()),
            ":effect" => eff.push(value.clone()),
            _ => return Err(key.invalid("unsupported key in action")),
        }
    }
    Ok(Action {
        name,
        args: args.unwrap_or_default(),
        pre,
        eff,
        span,
    })
}

fn read_derived(mut property: ListIter, span: Span) -> Res<Derived> {
    let mut head = property
        .pop_list()
        .title("expected the head of the derived predicate")?
        .iter();
    let name = head.pop_atom()?.clone();
    let args = consume_typed_symbols(&mut head)?;
    let body = property.pop().title("expected the body of the derived predicate")?.clone();
    Ok(Derived { name, args, body, span })
}

fn read_domain(dom: SExpr) -> Res<Domain> {
    let mut blocks = dom.as_list_iter().ok_or_else(|| dom.invalid("Expected a list"))?;
    blocks.pop_known_atom("define")?;
    let name = header(&mut blocks, "domain").title("missing name of domain")?;

    let mut res = Domain {
        name,
        features: vec![],
        types: vec![],
        constants: vec![],
        predicates: vec![],
        functions: vec![],
        actions: vec![],
        derived: vec![],
    };

    for block in blocks {
        let mut property = block
            .as_list_iter()
            .ok_or_else(|| block.invalid("expected a property list"))?;
        match property.pop_atom()?.canonical_str() {
            ":requirements" => res.features.extend(read_requirements(property)?),
            ":types" if !res.types.is_empty() => {
                return Err(block.invalid("More than one ':types' section definition"));
            }
            ":types" => res.types = consume_typed_symbols(&mut property)?,
            ":constants" if !res.constants.is_empty() => {
                return Err(block.invalid("More than one ':constants' section definition"));
            }
            ":constants" => res.constants = consume_typed_symbols(&mut property)?,
            ":predicates" => {
                for decl in property {
                    res.predicates.push(read_predicate(decl)?);
                }
            }
            ":functions" => res.functions.extend(read_functions(property)?),
            ":action" => res.actions.push(read_action(property, block.loc())?),
            ":derived" => res.derived.push(read_derived(property, block.loc())?),
            _ => return Err(block.invalid("unsupported block")),
        }
    }
    Ok(res)
}

#[derive(Clone, Debug)]
pub struct Problem {
    pub problem_name: Sym,
    pub domain_name: Sym,
    pub objects: Vec<TypedSymbol>,
    pub init: Vec<SExpr>,
    pub goal: Vec<SExpr>,
    pub metric: Option<Metric>,
}

#[derive(Clone, Debug)]
pub enum Metric {
    Minimize(SExpr),
    Maximize(SExpr),
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "# Problem {} (domain: {})", self.problem_name, self.domain_name)?;
        section(f, "Objects", &self.objects)?;
        section(f, "Init", &self.init)?;
        section(f, "Goal", &self.goal)
    }
}

fn read_metric(mut property: ListIter) -> Res<Metric> {
    let direction = property.pop_atom()?;
    let objective = property.pop().cloned()?;
    match direction.canonical_str() {
        "minimize" => Ok(Metric::Minimize(objective)),
        "maximize" => Ok(Metric::Maximize(objective)),
        _ => Err(direction.invalid("expected `maximize` or `minimize`")),
    }
}

fn read_problem(problem: SExpr) -> Res<Problem> {
    let mut blocks = problem
        .as_list_iter()
        .ok_or_else(|| problem.invalid("Expected a list"))?;
    blocks.pop_known_atom("define")?;
    let problem_name = header(&mut blocks, "problem")?;
    let domain_name = header(&mut blocks, ":domain")?;

    let mut res = Problem {
        problem_name,
        domain_name,
        objects: vec![],
        init: vec![],
        goal: vec![],
        metric: None,
    };

    for block in blocks {
        let mut property = block
            .as_list_iter()
            .ok_or_else(|| block.invalid("Expected a list"))?;
        match property.pop_atom()?.canonical_str() {
            // some problems repeat the requirements of their domain
            ":requirements" => {}
            ":objects" => res.objects.extend(consume_typed_symbols(&mut property)?),
            ":init" => res.init.extend(property.cloned()),
            ":goal" => res.goal.extend(property.cloned()),
            ":metric" => res.metric = Some(read_metric(property)?),
            _ => return Err(block.invalid("unsupported block")),
        }
    }
    Ok(res)
}

/// If `e` is a conjunction, returns its conjuncts. Otherwise returns `e` itself.
pub fn conjuncts(e: &SExpr) -> Vec<&SExpr> {
    match e.as_application("and") {
        Some(args) => args.iter().flat_map(conjuncts).collect(),
        None => vec![e],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const BLOCKS_DOMAIN: &str = "
(define (domain blocks)
  (:requirements :strips :typing)
  (:types block)
  (:predicates (on ?x - block ?y - block) (ontable ?x - block) (clear ?x - block) (handempty) (holding ?x - block))
  (:action pick-up
    :parameters (?x - block)
    :precondition (and (clear ?x) (ontable ?x) (handempty))
    :effect (and (not (ontable ?x)) (not (clear ?x)) (not (handempty)) (holding ?x))))";

    #[test]
    fn parse_domain() -> Res<()> {
        let dom = parse_pddl_domain(Input::from_string(BLOCKS_DOMAIN))?;
        assert_eq!(dom.name, "blocks");
        assert_eq!(dom.features, vec![PddlFeature::Strips, PddlFeature::Typing]);
        assert_eq!(dom.predicates.len(), 5);
        assert_eq!(dom.actions.len(), 1);
        let pick = &dom.actions[0];
        assert_eq!(pick.args.len(), 1);
        assert_eq!(pick.args[0].tpe.as_slice(), &[Sym::from("block")]);
        assert_eq!(conjuncts(&pick.pre[0]).len(), 3);
        Ok(())
    }

    #[test]
    fn requirements() {
        assert_eq!(PddlFeature::from_requirement(":action-costs"), Some(PddlFeature::ActionCosts));
        assert_eq!(PddlFeature::from_requirement(":durative-actions"), None);
        assert_eq!(PddlFeature::ConditionalEffects.to_string(), ":conditional-effects");
        let dom = BLOCKS_DOMAIN.replace(":typing", ":timed-initial-literals");
        assert!(parse_pddl_domain(Input::from_string(dom)).is_err());
    }

    #[test]
    fn typed_symbols() -> Res<()> {
        let dom = "(define (domain d) (:constants a b - (either t u) c - t d))";
        let dom = parse_pddl_domain(Input::from_string(dom))?;
        let types: Vec<usize> = dom.constants.iter().map(|c| c.tpe.len()).collect();
        assert_eq!(types, vec![2, 2, 1, 0]);
        assert_eq!(dom.constants[0].to_string(), "a: {t, u}");
        Ok(())
    }

    #[test]
    fn parse_problem() -> Res<()> {
        let pb = "(define (problem p1) (:domain blocks) (:objects a b - block c)
                  (:init (clear a) (ontable a)) (:goal (and (holding a))) (:metric minimize (total-cost)))";
        let pb = parse_pddl_problem(Input::from_string(pb))?;
        assert_eq!(pb.objects.len(), 3);
        assert!(pb.objects[2].tpe.is_empty());
        assert_eq!(pb.init.len(), 2);
        assert!(matches!(pb.metric, Some(Metric::Minimize(_))));
        Ok(())
    }

    #[test]
    fn invalid_block() {
        let pb = "(define (problem p1) (:domain blocks) (:unknown a))";
        assert!(parse_pddl_problem(Input::from_string(pb)).is_err());
    }

    #[test]
    fn plan() -> Res<()> {
        let plan = "(pick-up a)\n(stack a b)\n; cost = 2 (unit cost)\n";
        let plan = parse_plan(Input::from_string(plan))?;
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[1].name, "stack");
        assert_eq!(plan.actions[1].arguments.len(), 2);
        Ok(())
    }
}
