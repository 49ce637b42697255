use crate::{env::Env, *};
use itertools::Itertools;

/// A fluent applied to some arguments, e.g. `at(?r, l1)`.
#[derive(Debug, Clone)]
pub struct StateVariable {
    pub fluent: FluentId,
    pub arguments: SeqExprId,
}

impl<'env> Display for Env<'env, &StateVariable> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.env / self.elem.fluent)?;
        if !self.elem.arguments.is_empty() {
            write!(
                f,
                "({})",
                self.elem.arguments.iter().map(|&a| self.env / a).format(", ")
            )?;
        }
        Ok(())
    }
}

impl StateVariable {
    pub fn new(fluent: FluentId, arguments: impl IntoIterator<Item = ExprId>) -> Self {
        StateVariable {
            fluent,
            arguments: arguments.into_iter().collect(),
        }
    }

    pub fn substitute(&self, env: &mut Environment, substitution: &Substitution) -> Res<StateVariable> {
        let arguments = self
            .arguments
            .iter()
            .map(|&a| env.substitute(a, substitution))
            .collect::<Res<_>>()?;
        Ok(StateVariable {
            fluent: self.fluent,
            arguments,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EffectOp {
    Assign(ExprId),
    Increase(ExprId),
    Decrease(ExprId),
}

impl EffectOp {
    pub fn value(&self) -> ExprId {
        match self {
            EffectOp::Assign(e) | EffectOp::Increase(e) | EffectOp::Decrease(e) => *e,
        }
    }

    pub fn with_value(&self, value: ExprId) -> EffectOp {
        match self {
            EffectOp::Assign(_) => EffectOp::Assign(value),
            EffectOp::Increase(_) => EffectOp::Increase(value),
            EffectOp::Decrease(_) => EffectOp::Decrease(value),
        }
    }
}

impl<'env> Display for Env<'env, &EffectOp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.elem {
            EffectOp::Assign(expr_id) => write!(f, ":= {}", self.env / *expr_id),
            EffectOp::Increase(delta) => write!(f, "+= {}", self.env / *delta),
            EffectOp::Decrease(delta) => write!(f, "-= {}", self.env / *delta),
        }
    }
}

/// Effect of an action: for all values of the `forall` variables, if `condition` holds in the state
/// where the action is applied, the operation is applied to the state variable.
#[derive(Debug, Clone)]
pub struct Effect {
    pub forall: Vec<Param>,
    pub condition: Option<ExprId>,
    pub state_variable: StateVariable,
    pub operation: EffectOp,
}

impl Effect {
    pub fn assignement(state_variable: StateVariable, value: ExprId) -> Self {
        Effect {
            forall: Vec::new(),
            condition: None,
            state_variable,
            operation: EffectOp::Assign(value),
        }
    }
    pub fn increase(state_variable: StateVariable, delta: ExprId) -> Self {
        Effect {
            forall: Vec::new(),
            condition: None,
            state_variable,
            operation: EffectOp::Increase(delta),
        }
    }

    pub fn with_condition(mut self, condition: ExprId) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_forall(mut self, variables: Vec<Param>) -> Self {
        self.forall = variables;
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

impl<'env> Display for Env<'env, &Effect> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.elem.forall.is_empty() {
            write!(
                f,
                "forall({}) ",
                self.elem.forall.iter().map(|p| format!("{p:?}")).format(", ")
            )?;
        }
        if let Some(cond) = self.elem.condition {
            write!(f, "if {} then ", self.env / cond)?;
        }
        write!(
            f,
            "{} {}",
            self.env / &self.elem.state_variable,
            self.env / &self.elem.operation
        )
    }
}
