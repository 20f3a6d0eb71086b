//! The AST node families (spec §3): tagged variants rather than a
//! C++-style abstract-base hierarchy, per the redesign note in spec §9 —
//! exhaustive pattern matching replaces visitor dispatch at pass
//! boundaries.

pub mod attr;
pub mod contract;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use attr::{AttrId, UnresolvedAttr};
pub use contract::{Cont, ContId, ContKind};
pub use decl::{Decl, DeclId, DeclKind, Modifiers, Visibility};
pub use expr::{Expr, ExprId, ExprKind};
pub use stmt::{Stmt, StmtId, StmtKind};
pub use types::{TypeId, TypeKind, TypeNode};
