pub mod convert;
pub mod find_file;
pub mod input;
pub mod parser;
pub mod sexpr;
pub mod writer;

pub use convert::{build_problem, read_problem};
pub use find_file::find_domain_of;
pub use parser::*;
pub use sexpr::{SAtom, SExpr, SList};
pub use writer::{Item, NameTable, PddlWriter};
