//! The `Cont` family (spec §3, §4.7).

use crate::arena::Id;
use crate::ast::expr::ExprId;
use crate::ast::types::TypeId;
use crate::diagnostics::SourceRange;
use serde::{Deserialize, Serialize};

pub type ContId = Id<Cont>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContKind {
    Requires(ExprId),
    Ensures(ExprId),
    Throws(Option<TypeId>),
    Where(ExprId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cont {
    pub kind: ContKind,
    pub range: SourceRange,
}

impl Cont {
    pub fn new(kind: ContKind, range: SourceRange) -> Self {
        Cont { kind, range }
    }
}
