//! Identifiers (spec §3).

use crate::diagnostics::SourceRange;
use serde::{Deserialize, Serialize};

/// The anonymous label; never matches another name for redefinition
/// purposes and never matches another argument label at a call site.
pub const ANONYMOUS: &str = "_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub range: SourceRange,
}

impl Identifier {
    pub fn new(name: impl Into<String>, range: SourceRange) -> Self {
        Identifier { name: name.into(), range }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }

    /// Identifiers compare by textual equality; `_` never matches another
    /// name for redefinition/label-matching purposes (spec §3).
    pub fn redefinition_matches(&self, other: &Identifier) -> bool {
        if self.is_anonymous() || other.is_anonymous() {
            return false;
        }
        self.name == other.name
    }

    /// Plain textual equality, used for ordinary name lookup where `_` is
    /// just another identifier (e.g. matching a declared parameter label
    /// written literally as `_` against an anonymous argument).
    pub fn text_eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Identifier {}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
