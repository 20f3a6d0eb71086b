//! Attributes (spec §4.2): `[Name(expr,...)]`, deferred to an unspecified
//! later resolution pass — this crate stores them unresolved and never
//! interprets them, matching the spec's explicit scope boundary.

use crate::arena::Id;
use crate::ast::expr::ExprId;
use crate::diagnostics::SourceRange;
use crate::ident::Identifier;
use serde::{Deserialize, Serialize};

pub type AttrId = Id<UnresolvedAttr>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedAttr {
    pub name: Identifier,
    pub args: Vec<ExprId>,
    pub range: SourceRange,
}
