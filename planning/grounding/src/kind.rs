//! Capabilities of the grounding engines.

use std::fmt::Display;

use downward_model::{Feature, ProblemKind};

/// Kind of transformation a compiler can be asked to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationKind {
    Grounding,
    ConditionalEffectsRemoving,
    DisjunctiveConditionsRemoving,
    NegativeConditionsRemoving,
    QuantifiersRemoving,
}

impl Display for CompilationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompilationKind::Grounding => "GROUNDING",
            CompilationKind::ConditionalEffectsRemoving => "CONDITIONAL_EFFECTS_REMOVING",
            CompilationKind::DisjunctiveConditionsRemoving => "DISJUNCTIVE_CONDITIONS_REMOVING",
            CompilationKind::NegativeConditionsRemoving => "NEGATIVE_CONDITIONS_REMOVING",
            CompilationKind::QuantifiersRemoving => "QUANTIFIERS_REMOVING",
        };
        write!(f, "{name}")
    }
}

const COMMON: [Feature; 14] = [
    Feature::ActionBased,
    Feature::FlatTyping,
    Feature::HierarchicalTyping,
    Feature::NegativeConditions,
    Feature::DisjunctiveConditions,
    Feature::Equalities,
    Feature::ExistentialConditions,
    Feature::ConditionalEffects,
    Feature::StaticFluentsInBooleanAssignments,
    Feature::FluentsInBooleanAssignments,
    Feature::ActionsCost,
    Feature::StaticFluentsInActionsCost,
    Feature::IntNumbersInActionsCost,
    Feature::PlanLength,
];

/// Problems accepted by the full instantiation grounder. Universal conditions are left out as they
/// would be compiled into axioms.
pub fn full_grounding_kind() -> ProblemKind {
    let mut kind = ProblemKind::with(COMMON);
    kind.set(Feature::ForallEffects);
    kind
}

/// Problems accepted by the grounder that only relies on the reachable bindings.
pub fn reachability_grounding_kind() -> ProblemKind {
    let mut kind = ProblemKind::with(COMMON);
    kind.set(Feature::ForallEffects);
    kind.set(Feature::UniversalConditions);
    kind
}

/// Kind of the problem produced by the full grounder: all conditions are conjunctions of ground literals.
pub fn full_grounding_result(kind: &ProblemKind) -> ProblemKind {
    let mut res = kind.clone();
    res.unset(Feature::DisjunctiveConditions);
    res.unset(Feature::ExistentialConditions);
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounded_conditions_are_conjunctive() {
        let res = full_grounding_result(&full_grounding_kind());
        assert!(!res.has(Feature::DisjunctiveConditions));
        assert!(!res.has(Feature::ExistentialConditions));
        assert!(res.has(Feature::ConditionalEffects));
        assert!(full_grounding_kind().is_subset_of(&reachability_grounding_kind()));
        assert!(!full_grounding_kind().has(Feature::UniversalConditions));
    }
}
