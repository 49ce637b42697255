use derive_more::derive::Display;
use thiserror::Error;

use crate::*;

#[derive(Clone, Display, Debug)]
#[display("{}", name)]
pub struct Object {
    name: Sym,
    tpe: UserType,
}

impl Object {
    pub fn new(name: impl Into<Sym>, tpe: UserType) -> Self {
        Self { name: name.into(), tpe }
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }

    pub fn tpe(&self) -> &UserType {
        &self.tpe
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Object {}
impl std::hash::Hash for Object {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("duplicate object : {0} and {1}")]
    DuplicateObjectDeclaration(Sym, Sym),
    #[error("unknown object {0}")]
    UnknownObject(Sym),
}

/// Objects of a problem, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Objects {
    objects: Vec<Object>,
    index: hashbrown::HashMap<Sym, usize>,
}

impl Display for Objects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Objects:")?;
        for o in self.iter() {
            write!(f, "\n  {}: {}", o.name, o.tpe)?;
        }
        writeln!(f)
    }
}

impl Objects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, name: impl Into<Sym>, tpe: UserType) -> Result<Object, ObjectError> {
        let name = name.into();
        if let Some(&previous) = self.index.get(&name) {
            let previous = &self.objects[previous];
            if previous.tpe == tpe {
                // objects are exactly the same, ignore as some PDDL domain contain such patterns
                Ok(previous.clone())
            } else {
                Err(ObjectError::DuplicateObjectDeclaration(name, previous.name.clone()))
            }
        } else {
            let object = Object::new(name.clone(), tpe);
            self.index.insert(name, self.objects.len());
            self.objects.push(object.clone());
            Ok(object)
        }
    }

    pub fn get(&self, name: impl AsRef<str>) -> Result<&Object, ObjectError> {
        let name = name.as_ref();
        match self.index.get(name) {
            Some(&i) => Ok(&self.objects[i]),
            None => Err(ObjectError::UnknownObject(Sym::from(name))),
        }
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.index.contains_key(name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Object> + '_ {
        self.objects.iter()
    }

    /// All objects that are instances of `tpe` (including its subtypes), in declaration order.
    pub fn of_type<'a>(&'a self, tpe: &'a UserType) -> impl Iterator<Item = &'a Object> + 'a {
        self.objects.iter().filter(move |o| o.tpe.is_subtype_of(tpe))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
