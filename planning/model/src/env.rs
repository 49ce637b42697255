use smallvec::SmallVec;

use crate::{
    Expr, ExprId, ExprNode, FluentId, Fluents, Fun, IntValue, Message, Object, Objects, Param, RealValue, Res, Sym,
    Types, errors::EnvError, errors::Span,
};

/// Owner of all the symbols (types, objects, fluents) and expressions of a problem.
///
/// Expressions are interned in an arena and referred to by their [`ExprId`]. Interning type-checks the
/// expression, so every `ExprId` handed out by an environment is well typed.
#[derive(Clone)]
pub struct Environment {
    pub types: Types,
    pub objects: Objects,
    pub fluents: Fluents,
    exprs: Vec<ExprNode>,
}

#[derive(Copy, Clone)]
pub struct Env<'a, T> {
    pub elem: T,
    pub env: &'a Environment,
}

/// Replacement of parameters (identified by name) with expressions.
pub type Substitution = hashbrown::HashMap<Sym, ExprId>;

impl Environment {
    pub fn new(types: Types) -> Self {
        Self {
            types,
            objects: Default::default(),
            fluents: Default::default(),
            exprs: Default::default(),
        }
    }

    pub(crate) fn get(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn node<T>(&self, id: T) -> Env<'_, T> {
        self / id
    }

    pub fn intern(&mut self, expr: Expr, span: impl Into<Option<Span>>) -> Result<ExprId, Message> {
        let tpe = expr.tpe(self).msg(self)?;
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode::new(expr, tpe, span.into()));
        Ok(id)
    }

    fn intern_typed(&mut self, expr: Expr, tpe: crate::Type) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode::new(expr, tpe, None));
        id
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        self.intern_typed(Expr::Bool(value), crate::Type::Bool)
    }

    pub fn int(&mut self, value: IntValue) -> ExprId {
        self.intern_typed(Expr::Int(value), crate::Type::Int)
    }

    /// Interns a numeric constant, as an integer when it has no fractional part.
    pub fn number(&mut self, value: RealValue) -> ExprId {
        if value.is_integer() {
            self.int(value.to_integer())
        } else {
            self.intern_typed(Expr::Real(value), crate::Type::Real)
        }
    }

    pub fn object(&mut self, object: &Object) -> ExprId {
        let tpe = object.tpe().into();
        self.intern_typed(Expr::Object(object.clone()), tpe)
    }

    pub fn param(&mut self, param: &Param) -> ExprId {
        let tpe = param.tpe().clone();
        self.intern_typed(Expr::Param(param.clone()), tpe)
    }

    pub fn app(&mut self, fun: Fun, args: impl IntoIterator<Item = ExprId>) -> Res<ExprId> {
        self.intern(Expr::App(fun, args.into_iter().collect()), None)
    }

    pub fn not(&mut self, e: ExprId) -> Res<ExprId> {
        self.app(Fun::Not, [e])
    }

    /// Conjunction of the given expressions. Returns the single conjunct or `true` for fewer than two elements.
    pub fn and(&mut self, conjuncts: Vec<ExprId>) -> Res<ExprId> {
        match conjuncts.as_slice() {
            [] => Ok(self.bool(true)),
            [single] => Ok(*single),
            _ => self.app(Fun::And, conjuncts),
        }
    }

    pub fn state_variable(&mut self, fluent: FluentId, args: impl IntoIterator<Item = ExprId>) -> Res<ExprId> {
        self.intern(Expr::StateVariable(fluent, args.into_iter().collect()), None)
    }

    /// Replaces every parameter bound in `substitution` by its value. Variables of quantifiers shadow the
    /// parameters of the same name in their body.
    pub fn substitute(&mut self, expr: ExprId, substitution: &Substitution) -> Res<ExprId> {
        if substitution.is_empty() {
            return Ok(expr);
        }
        let node = self.get(expr).expr.clone();
        match node {
            Expr::Param(p) => Ok(substitution.get(&p.name).copied().unwrap_or(expr)),
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Object(_) => Ok(expr),
            Expr::App(fun, args) => {
                let new_args = self.substitute_all(&args, substitution)?;
                if new_args == args {
                    Ok(expr)
                } else {
                    self.intern(Expr::App(fun, new_args), self.get(expr).span.clone())
                }
            }
            Expr::StateVariable(fluent, args) => {
                let new_args = self.substitute_all(&args, substitution)?;
                if new_args == args {
                    Ok(expr)
                } else {
                    self.intern(Expr::StateVariable(fluent, new_args), self.get(expr).span.clone())
                }
            }
            Expr::Exists(vars, body) | Expr::Forall(vars, body) => {
                let exists = matches!(self.get(expr).expr, Expr::Exists(_, _));
                let shadowed: Substitution = substitution
                    .iter()
                    .filter(|(name, _)| !vars.iter().any(|v| &v.name == *name))
                    .map(|(name, value)| (name.clone(), *value))
                    .collect();
                let new_body = self.substitute(body, &shadowed)?;
                if new_body == body {
                    Ok(expr)
                } else if exists {
                    self.intern(Expr::Exists(vars, new_body), None)
                } else {
                    self.intern(Expr::Forall(vars, new_body), None)
                }
            }
        }
    }

    fn substitute_all(&mut self, args: &[ExprId], substitution: &Substitution) -> Res<SmallVec<[ExprId; 3]>> {
        args.iter().map(|&a| self.substitute(a, substitution)).collect()
    }

    /// Collects the names of the parameters that appear free in the expression.
    pub fn free_params(&self, expr: ExprId, out: &mut Vec<Param>) {
        match &self.get(expr).expr {
            Expr::Param(p) => {
                if !out.contains(p) {
                    out.push(p.clone())
                }
            }
            Expr::App(_, args) | Expr::StateVariable(_, args) => {
                for &a in args {
                    self.free_params(a, out)
                }
            }
            Expr::Exists(vars, body) | Expr::Forall(vars, body) => {
                let mut inner = Vec::new();
                self.free_params(*body, &mut inner);
                for p in inner {
                    if !vars.contains(&p) && !out.contains(&p) {
                        out.push(p)
                    }
                }
            }
            Expr::Int(_) | Expr::Real(_) | Expr::Bool(_) | Expr::Object(_) => {}
        }
    }
}

impl<'a, T> std::ops::Div<T> for &'a Environment {
    type Output = Env<'a, T>;

    fn div(self, rhs: T) -> Self::Output {
        Env { elem: rhs, env: self }
    }
}

impl<'a, T> std::ops::Div<T> for &'a mut Environment {
    type Output = Env<'a, T>;

    fn div(self, rhs: T) -> Self::Output {
        Env { elem: rhs, env: self }
    }
}
