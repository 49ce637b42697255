//! Classification of problems by the features they use, used by engines to declare what they support.

use std::collections::BTreeSet;

use itertools::Itertools;

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    ActionBased,
    FlatTyping,
    HierarchicalTyping,
    NegativeConditions,
    DisjunctiveConditions,
    Equalities,
    ExistentialConditions,
    UniversalConditions,
    ConditionalEffects,
    ForallEffects,
    IncreaseEffects,
    DecreaseEffects,
    StaticFluentsInBooleanAssignments,
    FluentsInBooleanAssignments,
    NumericFluents,
    ActionsCost,
    PlanLength,
    FinalValue,
    StaticFluentsInActionsCost,
    FluentsInActionsCost,
    IntNumbersInActionsCost,
    RealNumbersInActionsCost,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        use Feature::*;
        match self {
            ActionBased => "ACTION_BASED",
            FlatTyping => "FLAT_TYPING",
            HierarchicalTyping => "HIERARCHICAL_TYPING",
            NegativeConditions => "NEGATIVE_CONDITIONS",
            DisjunctiveConditions => "DISJUNCTIVE_CONDITIONS",
            Equalities => "EQUALITIES",
            ExistentialConditions => "EXISTENTIAL_CONDITIONS",
            UniversalConditions => "UNIVERSAL_CONDITIONS",
            ConditionalEffects => "CONDITIONAL_EFFECTS",
            ForallEffects => "FORALL_EFFECTS",
            IncreaseEffects => "INCREASE_EFFECTS",
            DecreaseEffects => "DECREASE_EFFECTS",
            StaticFluentsInBooleanAssignments => "STATIC_FLUENTS_IN_BOOLEAN_ASSIGNMENTS",
            FluentsInBooleanAssignments => "FLUENTS_IN_BOOLEAN_ASSIGNMENTS",
            NumericFluents => "NUMERIC_FLUENTS",
            ActionsCost => "ACTIONS_COST",
            PlanLength => "PLAN_LENGTH",
            FinalValue => "FINAL_VALUE",
            StaticFluentsInActionsCost => "STATIC_FLUENTS_IN_ACTIONS_COST",
            FluentsInActionsCost => "FLUENTS_IN_ACTIONS_COST",
            IntNumbersInActionsCost => "INT_NUMBERS_IN_ACTIONS_COST",
            RealNumbersInActionsCost => "REAL_NUMBERS_IN_ACTIONS_COST",
        }
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A set of features.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemKind {
    features: BTreeSet<Feature>,
}

impl ProblemKind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(features: impl IntoIterator<Item = Feature>) -> Self {
        Self {
            features: features.into_iter().collect(),
        }
    }

    pub fn set(&mut self, feature: Feature) {
        self.features.insert(feature);
    }

    pub fn unset(&mut self, feature: Feature) {
        self.features.remove(&feature);
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_subset_of(&self, other: &ProblemKind) -> bool {
        self.features.is_subset(&other.features)
    }

    /// Features of `self` that are absent from `other`.
    pub fn difference<'a>(&'a self, other: &'a ProblemKind) -> impl Iterator<Item = Feature> + 'a {
        self.features.difference(&other.features).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.features.iter().copied()
    }
}

impl Display for ProblemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.features.iter().format(", "))
    }
}

impl Problem {
    /// Computes the set of features used by the problem.
    pub fn kind(&self) -> ProblemKind {
        let mut kind = ProblemKind::new();
        kind.set(Feature::ActionBased);
        let env = &self.env;
        for tpe in env.types.user_types() {
            if tpe.is_top() {
                continue;
            }
            kind.set(Feature::FlatTyping);
            if tpe.parents().any(|p| !p.is_top()) {
                kind.set(Feature::HierarchicalTyping);
            }
        }
        let statics = self.static_fluents();
        for (id, fluent) in env.fluents.iter() {
            if fluent.return_type.is_numeric() && !statics.contains(&id) {
                kind.set(Feature::NumericFluents);
            }
        }

        for a in self.actions.iter() {
            for &c in &a.preconditions {
                condition_features(env, c, &statics, &mut kind);
            }
            for eff in &a.effects {
                if let Some(c) = eff.condition {
                    kind.set(Feature::ConditionalEffects);
                    condition_features(env, c, &statics, &mut kind);
                }
                if !eff.forall.is_empty() {
                    kind.set(Feature::ForallEffects);
                }
                match eff.operation {
                    EffectOp::Increase(_) => kind.set(Feature::IncreaseEffects),
                    EffectOp::Decrease(_) => kind.set(Feature::DecreaseEffects),
                    EffectOp::Assign(value) => {
                        if matches!((env / value).tpe(), Type::Bool) {
                            let mut used = Vec::new();
                            fluents_of(env, value, &mut used);
                            if used.iter().any(|f| !statics.contains(f)) {
                                kind.set(Feature::FluentsInBooleanAssignments);
                            } else if !used.is_empty() {
                                kind.set(Feature::StaticFluentsInBooleanAssignments);
                            }
                        }
                    }
                }
            }
        }
        for &g in &self.goals {
            condition_features(env, g, &statics, &mut kind);
        }
        for metric in &self.metrics {
            match metric {
                Metric::MinimizeActionCosts(costs) => {
                    kind.set(Feature::ActionsCost);
                    for cost in costs.iter().map(|(_, c)| c).chain(costs.default) {
                        let mut used = Vec::new();
                        fluents_of(env, cost, &mut used);
                        if used.iter().any(|f| !statics.contains(f)) {
                            kind.set(Feature::FluentsInActionsCost);
                        } else if !used.is_empty() {
                            kind.set(Feature::StaticFluentsInActionsCost);
                        }
                        match (env / cost).tpe() {
                            Type::Int => kind.set(Feature::IntNumbersInActionsCost),
                            _ => kind.set(Feature::RealNumbersInActionsCost),
                        }
                    }
                }
                Metric::MinimizeSequentialPlanLength => kind.set(Feature::PlanLength),
                Metric::Minimize(_) | Metric::Maximize(_) => kind.set(Feature::FinalValue),
            }
        }
        kind
    }
}

fn condition_features(
    env: &Environment,
    e: ExprId,
    statics: &hashbrown::HashSet<FluentId>,
    kind: &mut ProblemKind,
) {
    match (env / e).expr() {
        Expr::App(fun, args) => {
            match fun {
                Fun::Not => kind.set(Feature::NegativeConditions),
                Fun::Or | Fun::Implies | Fun::Iff => kind.set(Feature::DisjunctiveConditions),
                Fun::Eq => {
                    if args.iter().all(|&a| (env / a).tpe().as_user_type().is_some()) {
                        kind.set(Feature::Equalities)
                    } else {
                        kind.set(Feature::NumericFluents)
                    }
                }
                Fun::Lt | Fun::Leq => kind.set(Feature::NumericFluents),
                _ => {}
            }
            for &a in args {
                condition_features(env, a, statics, kind);
            }
        }
        Expr::StateVariable(fluent, _) => {
            if env.fluents.get(*fluent).return_type.is_numeric() && !statics.contains(fluent) {
                kind.set(Feature::NumericFluents)
            }
        }
        Expr::Exists(_, body) => {
            kind.set(Feature::ExistentialConditions);
            condition_features(env, *body, statics, kind);
        }
        Expr::Forall(_, body) => {
            kind.set(Feature::UniversalConditions);
            condition_features(env, *body, statics, kind);
        }
        _ => {}
    }
}

/// Collects all fluents appearing in the expression.
pub fn fluents_of(env: &Environment, e: ExprId, out: &mut Vec<FluentId>) {
    match (env / e).expr() {
        Expr::StateVariable(fluent, args) => {
            out.push(*fluent);
            for &a in args {
                fluents_of(env, a, out);
            }
        }
        Expr::App(_, args) => {
            for &a in args {
                fluents_of(env, a, out);
            }
        }
        Expr::Exists(_, body) | Expr::Forall(_, body) => fluents_of(env, *body, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset() {
        let small = ProblemKind::with([Feature::ActionBased, Feature::NegativeConditions]);
        let large = ProblemKind::with([
            Feature::ActionBased,
            Feature::NegativeConditions,
            Feature::Equalities,
        ]);
        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
        assert_eq!(large.difference(&small).collect::<Vec<_>>(), vec![Feature::Equalities]);
        assert_eq!(small.to_string(), "{ACTION_BASED, NEGATIVE_CONDITIONS}");
    }
}
