//! The `Stmt` algebraic family (spec §3).

use crate::arena::Id;
use crate::ast::decl::DeclId;
use crate::ast::expr::ExprId;
use crate::diagnostics::SourceRange;
use crate::ident::Identifier;
use serde::{Deserialize, Serialize};

pub type StmtId = Id<Stmt>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub exception_type: Option<crate::ast::types::TypeId>,
    pub binding: Option<Identifier>,
    pub body: StmtId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub is_default: bool,
    pub values: Vec<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Compound {
        body: Vec<StmtId>,
        /// Temporary locals produced while lowering this block's
        /// expressions (spec §4.8's "Temporaries" / P7). Populated by the
        /// code-gen driver, empty for any earlier pass.
        temporaries: Vec<DeclId>,
    },
    If { cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId> },
    While { cond: ExprId, body: StmtId },
    DoWhile { body: StmtId, cond: ExprId },
    For { init: Option<StmtId>, cond: Option<ExprId>, step: Option<ExprId>, body: StmtId },
    Switch { discriminant: ExprId, cases: Vec<SwitchCase> },
    Fallthrough,
    Break { label: Option<Identifier> },
    Continue { label: Option<Identifier> },
    Goto { label: Identifier },
    Return { value: Option<ExprId> },
    Labeled { label: Identifier, stmt: StmtId },
    DoCatch { body: StmtId, catches: Vec<CatchClause>, finally: Option<StmtId> },
    Expr(ExprId),
    Decl(DeclId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: SourceRange,
}

impl Stmt {
    pub fn new(kind: StmtKind, range: SourceRange) -> Self {
        Stmt { kind, range }
    }
}
