use crate::{env::Environment, *};

/// Value of a ground state variable in the initial state.
#[derive(Clone, Debug)]
pub struct InitialValue {
    pub state_variable: StateVariable,
    pub value: ExprId,
}

impl<'env> Display for Env<'env, &InitialValue> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} := {}",
            self.env / &self.elem.state_variable,
            self.env / self.elem.value
        )
    }
}

/// A classical planning problem with instantaneous (possibly parameterized) actions.
///
/// Boolean state variables absent from `init` are false in the initial state.
#[derive(Clone)]
pub struct Problem {
    pub name: Sym,
    pub env: Environment,
    pub actions: Actions,
    pub init: Vec<InitialValue>,
    /// Conjunction of conditions that must hold in the final state.
    pub goals: Vec<ExprId>,
    pub metrics: Vec<Metric>,
}

impl Problem {
    pub fn new(name: impl Into<Sym>, types: Types) -> Self {
        Self {
            name: name.into(),
            env: Environment::new(types),
            actions: Default::default(),
            init: Default::default(),
            goals: Default::default(),
            metrics: Default::default(),
        }
    }

    /// Returns true if the name is already used by a type, an object, a fluent or an action.
    pub fn has_name(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.env.types.hierarchy().contains(&Sym::from(name))
            || self.env.objects.contains(name)
            || self.env.fluents.get_by_name(name).is_some()
            || self.actions.contains(name)
    }

    /// Returns `{base}{i}` for the smallest `i` such that the name is not used in the problem.
    pub fn fresh_name(&self, base: &str) -> Sym {
        let mut i = 0usize;
        loop {
            let candidate = format!("{base}{i}");
            if !self.has_name(&candidate) {
                return Sym::from(candidate);
            }
            i += 1;
        }
    }

    pub fn action(&self, name: impl AsRef<str>) -> Res<&Action> {
        self.actions.get(name).map_err(|e| Message::error(e))
    }

    pub fn add_action(&mut self, action: Action) -> Res<()> {
        self.actions.add(action).map_err(|e| Message::error(e))
    }

    pub fn object(&self, name: impl AsRef<str>) -> Res<&Object> {
        self.env.objects.get(name).map_err(|e| Message::error(e))
    }

    /// Sets the initial value of a ground state variable, replacing any previous value.
    pub fn set_initial_value(&mut self, state_variable: StateVariable, value: ExprId) {
        let key = self.ground_key(&state_variable);
        if let Some(key) = key {
            for ini in self.init.iter_mut() {
                if ini.state_variable.fluent == key.0
                    && ground_args(&self.env, &ini.state_variable).as_deref() == Some(key.1.as_slice())
                {
                    ini.value = value;
                    return;
                }
            }
        }
        self.init.push(InitialValue { state_variable, value })
    }

    fn ground_key(&self, sv: &StateVariable) -> Option<(FluentId, Vec<Sym>)> {
        ground_args(&self.env, sv).map(|args| (sv.fluent, args))
    }

    /// Fluents that are not modified by any action, i.e., whose value is given by the initial state.
    pub fn static_fluents(&self) -> hashbrown::HashSet<FluentId> {
        let mut statics: hashbrown::HashSet<FluentId> = self.env.fluents.iter().map(|(id, _)| id).collect();
        for a in self.actions.iter() {
            for eff in &a.effects {
                statics.remove(&eff.state_variable.fluent);
            }
        }
        statics
    }

    pub fn action_costs(&self) -> Option<&ActionCosts> {
        self.metrics.iter().find_map(|m| match m {
            Metric::MinimizeActionCosts(costs) => Some(costs),
            _ => None,
        })
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear()
    }

    pub fn clear_goals(&mut self) {
        self.goals.clear()
    }
}

/// Names of the objects a ground state variable is applied to, or `None` if some argument is not an object.
pub fn ground_args(env: &Environment, sv: &StateVariable) -> Option<Vec<Sym>> {
    sv.arguments
        .iter()
        .map(|&a| match (env / a).expr() {
            Expr::Object(o) => Some(o.name().clone()),
            _ => None,
        })
        .collect()
}

impl Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Problem: {}\n{}\n{}\n", self.name, self.env.objects, self.env.fluents)?;

        write!(f, "\nActions:")?;
        for a in self.actions.iter() {
            write!(f, "\n\n  {}", &self.env / a)?;
        }
        write!(f, "\n\nInit:")?;
        for ini in &self.init {
            write!(f, "\n  {}", &self.env / ini)?;
        }

        write!(f, "\n\nGoals:")?;
        for g in &self.goals {
            write!(f, "\n  {}", &self.env / *g)?;
        }
        for metric in &self.metrics {
            write!(f, "\n\nMetric:\n  {}", &self.env / metric)?;
        }
        Ok(())
    }
}
