use crate::*;

/// Constant folding of expressions, where static fluents (those never modified by an action) applied to
/// objects are replaced by their initial value.
pub struct Simplifier {
    statics: hashbrown::HashSet<FluentId>,
    initial_values: hashbrown::HashMap<(FluentId, Vec<Sym>), ExprId>,
}

impl Simplifier {
    /// Simplifier that only folds constants, without knowledge of any initial state.
    pub fn constants_only() -> Self {
        Simplifier {
            statics: Default::default(),
            initial_values: Default::default(),
        }
    }

    pub fn new(problem: &Problem) -> Self {
        let statics = problem.static_fluents();
        let mut initial_values = hashbrown::HashMap::new();
        for ini in &problem.init {
            if !statics.contains(&ini.state_variable.fluent) {
                continue;
            }
            if let Some(args) = ground_args(&problem.env, &ini.state_variable) {
                initial_values.insert((ini.state_variable.fluent, args), ini.value);
            }
        }
        Simplifier {
            statics,
            initial_values,
        }
    }

    pub fn is_static(&self, fluent: FluentId) -> bool {
        self.statics.contains(&fluent)
    }

    pub fn simplify(&self, env: &mut Environment, e: ExprId) -> Res<ExprId> {
        let expr = (&*env / e).expr().clone();
        match expr {
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Object(_) | Expr::Param(_) => Ok(e),
            Expr::StateVariable(fluent, args) => {
                let mut new_args = SeqExprId::new();
                for &a in &args {
                    new_args.push(self.simplify(env, a)?);
                }
                if self.statics.contains(&fluent) {
                    let sv = StateVariable::new(fluent, new_args.iter().copied());
                    if let Some(key) = ground_args(env, &sv) {
                        if let Some(&value) = self.initial_values.get(&(fluent, key)) {
                            return Ok(value);
                        } else if env.fluents.get(fluent).is_boolean() {
                            return Ok(env.bool(false));
                        }
                    }
                }
                if new_args == args {
                    Ok(e)
                } else {
                    env.state_variable(fluent, new_args)
                }
            }
            Expr::Exists(vars, body) | Expr::Forall(vars, body) => {
                let is_exists = matches!((&*env / e).expr(), Expr::Exists(_, _));
                let new_body = self.simplify(env, body)?;
                if let Expr::Bool(value) = (&*env / new_body).expr() {
                    let value = *value;
                    let all_inhabited = vars.iter().all(|v| match v.tpe.as_user_type() {
                        Some(t) => env.objects.of_type(t).next().is_some(),
                        None => true,
                    });
                    if all_inhabited {
                        return Ok(env.bool(value));
                    } else {
                        // empty domain: exists is false and forall is true
                        return Ok(env.bool(!is_exists));
                    }
                }
                if new_body == body {
                    Ok(e)
                } else if is_exists {
                    env.intern(Expr::Exists(vars, new_body), None)
                } else {
                    env.intern(Expr::Forall(vars, new_body), None)
                }
            }
            Expr::App(fun, args) => {
                let mut new_args = SeqExprId::new();
                for &a in &args {
                    new_args.push(self.simplify(env, a)?);
                }
                self.simplify_app(env, e, fun, &args, new_args)
            }
        }
    }

    fn simplify_app(
        &self,
        env: &mut Environment,
        e: ExprId,
        fun: Fun,
        original_args: &[ExprId],
        args: SeqExprId,
    ) -> Res<ExprId> {
        let bool_of = |env: &Environment, a: ExprId| match (&*env / a).expr() {
            Expr::Bool(b) => Some(*b),
            _ => None,
        };
        let rebuild = |env: &mut Environment, args: SeqExprId| -> Res<ExprId> {
            if args.as_slice() == original_args {
                Ok(e)
            } else {
                env.app(fun, args)
            }
        };
        match fun {
            Fun::And | Fun::Or => {
                // neutral element of the operator, whose negation is the absorbing one
                let neutral = fun == Fun::And;
                let mut kept: Vec<ExprId> = Vec::with_capacity(args.len());
                for a in args {
                    match bool_of(env, a) {
                        Some(b) if b == neutral => {}
                        Some(_) => return Ok(env.bool(!neutral)),
                        None => {
                            // flatten nested operators of the same kind
                            match (&*env / a).expr() {
                                Expr::App(inner, inner_args) if *inner == fun => {
                                    kept.extend(inner_args.iter().copied())
                                }
                                _ => kept.push(a),
                            }
                        }
                    }
                }
                kept.dedup();
                match kept.len() {
                    0 => Ok(env.bool(neutral)),
                    1 => Ok(kept[0]),
                    _ => rebuild(env, kept.into_iter().collect()),
                }
            }
            Fun::Not => {
                let a = args[0];
                if let Some(b) = bool_of(env, a) {
                    return Ok(env.bool(!b));
                }
                if let Expr::App(Fun::Not, inner) = (&*env / a).expr() {
                    return Ok(inner[0]);
                }
                rebuild(env, args)
            }
            Fun::Implies => {
                let (lhs, rhs) = (args[0], args[1]);
                match (bool_of(env, lhs), bool_of(env, rhs)) {
                    (Some(false), _) | (_, Some(true)) => Ok(env.bool(true)),
                    (Some(true), _) => Ok(rhs),
                    (None, Some(false)) => env.not(lhs),
                    (None, None) => rebuild(env, args),
                }
            }
            Fun::Iff => {
                let (lhs, rhs) = (args[0], args[1]);
                match (bool_of(env, lhs), bool_of(env, rhs)) {
                    (Some(l), Some(r)) => Ok(env.bool(l == r)),
                    (Some(true), None) => Ok(rhs),
                    (None, Some(true)) => Ok(lhs),
                    (Some(false), None) => env.not(rhs),
                    (None, Some(false)) => env.not(lhs),
                    (None, None) => rebuild(env, args),
                }
            }
            Fun::Eq => {
                let (lhs, rhs) = (args[0], args[1]);
                if lhs == rhs {
                    return Ok(env.bool(true));
                }
                match ((&*env / lhs).expr(), (&*env / rhs).expr()) {
                    (Expr::Object(a), Expr::Object(b)) => {
                        let eq = a == b;
                        Ok(env.bool(eq))
                    }
                    (Expr::Param(a), Expr::Param(b)) if a == b => Ok(env.bool(true)),
                    (Expr::Bool(a), Expr::Bool(b)) => {
                        let eq = a == b;
                        Ok(env.bool(eq))
                    }
                    _ => match ((&*env / lhs).numeric_constant(), (&*env / rhs).numeric_constant()) {
                        (Some(a), Some(b)) => Ok(env.bool(a == b)),
                        _ => rebuild(env, args),
                    },
                }
            }
            Fun::Lt | Fun::Leq => match ((&*env / args[0]).numeric_constant(), (&*env / args[1]).numeric_constant()) {
                (Some(a), Some(b)) => {
                    let holds = if fun == Fun::Lt { a < b } else { a <= b };
                    Ok(env.bool(holds))
                }
                _ => rebuild(env, args),
            },
            Fun::Plus | Fun::Minus | Fun::Times | Fun::Div => {
                let values: Option<Vec<RealValue>> = args.iter().map(|&a| (&*env / a).numeric_constant()).collect();
                let Some(values) = values else {
                    return rebuild(env, args);
                };
                let folded = match (fun, values.as_slice()) {
                    (Fun::Plus, vs) => Some(vs.iter().fold(RealValue::from_integer(0), |acc, v| acc + v)),
                    (Fun::Times, vs) => Some(vs.iter().fold(RealValue::from_integer(1), |acc, v| acc * v)),
                    (Fun::Minus, [single]) => Some(-single),
                    (Fun::Minus, [a, b]) => Some(a - b),
                    (Fun::Div, [_, b]) if *b == RealValue::from_integer(0) => None,
                    (Fun::Div, [a, b]) => Some(a / b),
                    _ => None,
                };
                match folded {
                    Some(value) => Ok(env.number(value)),
                    None => rebuild(env, args),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> Problem {
        let mut problem = Problem::new("test", Types::new(UserTypes::new()));
        let top = problem.env.types.top_user_type();
        problem.env.objects.add_object("a", top.clone()).unwrap();
        problem.env.objects.add_object("b", top.clone()).unwrap();
        problem
            .env
            .fluents
            .add_fluent("road", vec![Param::new("?x", &top)], Type::Bool)
            .unwrap();
        problem
            .env
            .fluents
            .add_fluent("length", vec![Param::new("?x", &top)], Type::Int)
            .unwrap();
        problem.env.fluents.add_fluent("done", vec![], Type::Bool).unwrap();
        let road = problem.env.fluents.find("road").unwrap();
        let length = problem.env.fluents.find("length").unwrap();
        let a = problem.object("a").unwrap().clone();
        let a = problem.env.object(&a);
        let t = problem.env.bool(true);
        problem.set_initial_value(StateVariable::new(road, [a]), t);
        let five = problem.env.int(5);
        problem.set_initial_value(StateVariable::new(length, [a]), five);
        problem
    }

    #[test]
    fn static_fluents_are_replaced() -> Res<()> {
        let mut pb = problem();
        let simplifier = Simplifier::new(&pb);
        let road = pb.env.fluents.find("road").unwrap();
        let length = pb.env.fluents.find("length").unwrap();
        let a = pb.object("a")?.clone();
        let b = pb.object("b")?.clone();
        let (a, b) = (pb.env.object(&a), pb.env.object(&b));
        let road_a = pb.env.state_variable(road, [a])?;
        let road_b = pb.env.state_variable(road, [b])?;
        let road_a = simplifier.simplify(&mut pb.env, road_a)?;
        let road_b = simplifier.simplify(&mut pb.env, road_b)?;
        assert!((&pb.env / road_a).bool()?);
        assert!(!(&pb.env / road_b).bool()?);

        let len = pb.env.state_variable(length, [a])?;
        let two = pb.env.int(2);
        let sum = pb.env.app(Fun::Plus, [len, two])?;
        let sum = simplifier.simplify(&mut pb.env, sum)?;
        assert_eq!((&pb.env / sum).numeric_constant(), Some(RealValue::from_integer(7)));
        Ok(())
    }

    #[test]
    fn boolean_folding() -> Res<()> {
        let mut pb = problem();
        let done = pb.env.fluents.find("done").unwrap();
        let road = pb.env.fluents.find("road").unwrap();
        let a = pb.object("a")?.clone();
        let a = pb.env.object(&a);
        // `done` is not static because an action will modify it
        let mut action = Action::new("finish", vec![]);
        let t = pb.env.bool(true);
        action
            .effects
            .push(Effect::assignement(StateVariable::new(done, []), t));
        pb.add_action(action)?;
        let simplifier = Simplifier::new(&pb);
        let done_sv = pb.env.state_variable(done, [])?;
        let road_a = pb.env.state_variable(road, [a])?;
        let conj = pb.env.app(Fun::And, [road_a, done_sv])?;
        let simplified = simplifier.simplify(&mut pb.env, conj)?;
        assert_eq!(simplified, done_sv);

        let not_done = pb.env.not(done_sv)?;
        let not_not_done = pb.env.not(not_done)?;
        assert_eq!(simplifier.simplify(&mut pb.env, not_not_done)?, done_sv);

        let f = pb.env.bool(false);
        let imp = pb.env.app(Fun::Implies, [f, done_sv])?;
        let imp = simplifier.simplify(&mut pb.env, imp)?;
        assert!((&pb.env / imp).bool()?);
        Ok(())
    }
}
