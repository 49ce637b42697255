use crate::errors::ToEnvMessage;
use crate::*;
use Type::*;
use errors::{Message, Spanned};
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug)]
pub enum TypeError {
    UnknownType(Sym),
    IncompatibleType(ExprId, Type),
    MissingParameter(Param),
    UnexpectedArgument(ExprId),
}

impl ToEnvMessage for TypeError {
    fn to_message(self, env: &Environment) -> Message {
        match self {
            TypeError::UnknownType(name) => name.invalid("unknown type"),
            TypeError::IncompatibleType(expr, expected) => {
                let expr = env / expr;
                expr.invalid(format!(
                    "has type `{}` but type `{}` was expected",
                    expr.tpe(),
                    expected
                ))
            }
            TypeError::UnexpectedArgument(expr) => {
                let expr = env / expr;
                expr.invalid("Unexpected argument")
            }
            TypeError::MissingParameter(param) => errors::Message::error(format!("missing parameter: {param}")),
        }
    }
}

/// Name of the root of every type hierarchy.
pub const TOP_TYPE: &str = "object";

#[derive(Clone)]
pub struct Types {
    user_types: Arc<UserTypes>,
}

impl Types {
    pub fn new(types: UserTypes) -> Self {
        Self {
            user_types: Arc::new(types),
        }
    }

    pub fn top_user_type(&self) -> UserType {
        UserType::new(self.user_types.top_type.clone(), self.user_types.clone())
    }

    pub fn get_user_type(&self, name: impl Into<Sym>) -> Result<UserType, TypeError> {
        let name = name.into();
        if !self.user_types.contains(&name) {
            Err(TypeError::UnknownType(name))
        } else {
            Ok(UserType::new(name, self.user_types.clone()))
        }
    }

    pub fn get_user_type_or_top(&self, name: Option<impl Into<Sym>>) -> Result<UserType, TypeError> {
        if let Some(name) = name {
            self.get_user_type(name)
        } else {
            Ok(self.top_user_type())
        }
    }

    /// All user types in declaration order, the top type first.
    pub fn user_types(&self) -> impl Iterator<Item = UserType> + '_ {
        self.user_types
            .order
            .iter()
            .map(|name| UserType::new(name.clone(), self.user_types.clone()))
    }

    pub fn hierarchy(&self) -> &UserTypes {
        &self.user_types
    }
}

/// Represents a single user-defined type within a a type hierarchy
#[derive(Clone)]
pub struct UserType {
    pub name: Sym,
    pub hier: Arc<UserTypes>,
}
impl UserType {
    fn new(name: Sym, hier: Arc<UserTypes>) -> Self {
        Self { name, hier }
    }

    pub fn is_subtype_of(&self, other: &UserType) -> bool {
        self.hier.is_subtype_of(&self.name, &other.name)
    }

    pub fn is_top(&self) -> bool {
        self.name == self.hier.top_type
    }

    /// Direct parents of the type. Only the top type has none.
    pub fn parents(&self) -> impl Iterator<Item = UserType> + '_ {
        self.hier
            .parents(&self.name)
            .iter()
            .map(|p| UserType::new(p.clone(), self.hier.clone()))
    }
}
impl From<&UserType> for Type {
    fn from(value: &UserType) -> Self {
        Type::User(value.clone())
    }
}
impl From<UserType> for Type {
    fn from(value: UserType) -> Self {
        Type::User(value)
    }
}
impl PartialEq for UserType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for UserType {}
impl Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
impl Debug for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Hierarchy of user types, rooted in `object`.
#[derive(Clone)]
pub struct UserTypes {
    top_type: Sym,
    types: hashbrown::HashMap<Sym, Vec<Sym>>,
    order: Vec<Sym>,
}

impl Default for UserTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl UserTypes {
    pub fn new() -> Self {
        let top_type = Sym::from(TOP_TYPE);
        let mut types = hashbrown::HashMap::new();
        types.insert(top_type.clone(), Vec::new());
        Self {
            order: vec![top_type.clone()],
            top_type,
            types,
        }
    }

    pub fn is_subtype_of(&self, a: &Sym, b: &Sym) -> bool {
        if a == b || b == &self.top_type {
            true
        } else if let Some(parents) = self.types.get(a) {
            parents.iter().any(|parent| self.is_subtype_of(parent, b))
        } else {
            false
        }
    }

    pub fn contains(&self, name: &Sym) -> bool {
        self.types.contains_key(name)
    }

    pub fn parents(&self, name: &Sym) -> &[Sym] {
        self.types.get(name).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Records a new type with the given parent (the top type if none).
    /// If the parent is not recorded yet, it is created as a direct child of the top type.
    /// If the type already exists, a new parent is added (multiple inheritance)
    pub fn add_type<T: Into<Sym>>(&mut self, tpe: T, parent: Option<T>) {
        let tpe = tpe.into();
        if tpe == self.top_type {
            return;
        }
        let parent = parent.map(|p| p.into()).unwrap_or_else(|| self.top_type.clone());
        if !self.types.contains_key(&parent) {
            self.types.insert(parent.clone(), vec![self.top_type.clone()]);
            self.order.push(parent.clone());
        }
        if !self.types.contains_key(&tpe) {
            self.order.push(tpe.clone());
        }
        let parents = self.types.entry(tpe).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        // a type declared first as a parent was given the top type as default parent
        if parents.len() > 1 {
            let top = self.top_type.clone();
            parents.retain(|p| p != &top);
        }
    }
}

#[derive(Clone)]
pub enum Type {
    Bool,
    Int,
    Real,
    User(UserType),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.is_subtype_of(other) && other.is_subtype_of(self)
    }
}

impl Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bool => write!(f, "bool"),
            Int => write!(f, "int"),
            Real => write!(f, "real"),
            User(name) => write!(f, "{name}"),
        }
    }
}
impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Type {
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        match (self, other) {
            (Bool, Bool) => true,
            (Real, Real) => true,
            (Int, Int) => true,
            (User(left), User(right)) => left.is_subtype_of(right),
            (Int, Real) => true,
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Int | Real)
    }

    pub fn accepts(&self, expr: ExprId, env: &Environment) -> Result<(), TypeError> {
        if env.node(expr).tpe().is_subtype_of(self) {
            Ok(())
        } else {
            Err(TypeError::IncompatibleType(expr, self.clone()))
        }
    }

    /// Returns true if two types are overlapping
    pub fn overlaps(&self, other: &Type) -> bool {
        self.is_subtype_of(other) || other.is_subtype_of(self)
    }

    pub fn as_user_type(&self) -> Option<&UserType> {
        match self {
            User(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy() {
        let mut types = UserTypes::new();
        types.add_type("truck", Some("vehicle"));
        types.add_type("vehicle", None);
        types.add_type("location", None);
        let types = Types::new(types);
        let truck = types.get_user_type("truck").unwrap();
        let vehicle = types.get_user_type("vehicle").unwrap();
        let location = types.get_user_type("location").unwrap();
        assert!(truck.is_subtype_of(&vehicle));
        assert!(truck.is_subtype_of(&types.top_user_type()));
        assert!(!vehicle.is_subtype_of(&truck));
        assert!(!location.is_subtype_of(&vehicle));
        let names: Vec<String> = types.user_types().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["object", "vehicle", "truck", "location"]);
        assert!(types.get_user_type("robot").is_err());
    }
}
