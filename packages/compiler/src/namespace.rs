//! The namespace-prototype tree (spec §4.3, step 1): every namespace
//! fragment across all files, merged by qualified dotted name, so that
//! `namespace io { ... }` appearing in two files contributes to one
//! logical `io` namespace for import resolution.

use crate::ast::decl::DeclKind;
use crate::ast::DeclId;
use crate::ident::Identifier;
use crate::session::Session;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct NamespaceTree {
    /// Qualified dotted name -> every `Namespace`-kind decl fragment
    /// sharing that name, across every file.
    prototypes: IndexMap<String, Vec<DeclId>>,
}

impl NamespaceTree {
    pub fn build(session: &Session) -> Self {
        let mut prototypes: IndexMap<String, Vec<DeclId>> = IndexMap::new();
        for file in &session.files {
            for &id in &file.top_level {
                Self::collect(session, id, String::new(), &mut prototypes);
            }
        }
        NamespaceTree { prototypes }
    }

    fn collect(session: &Session, id: DeclId, prefix: String, out: &mut IndexMap<String, Vec<DeclId>>) {
        if let DeclKind::Namespace { name, members } = &session.decls.get(id).kind {
            let qualified = if prefix.is_empty() { name.name.clone() } else { format!("{prefix}.{}", name.name) };
            out.entry(qualified.clone()).or_default().push(id);
            for &m in members {
                Self::collect(session, m, qualified.clone(), out);
            }
        }
    }

    /// All members contributed by every fragment of the namespace named
    /// `qualified`.
    pub fn merged_members(&self, session: &Session, qualified: &str) -> Vec<DeclId> {
        let mut result = Vec::new();
        if let Some(fragments) = self.prototypes.get(qualified) {
            for &f in fragments {
                if let DeclKind::Namespace { members, .. } = &session.decls.get(f).kind {
                    result.extend(members.iter().copied());
                }
            }
        }
        result
    }

    pub fn namespace_fragment(&self, qualified: &str) -> Option<DeclId> {
        self.prototypes.get(qualified).and_then(|v| v.first()).copied()
    }

    /// Resolve a dotted import path (spec §4.3 step 1). Returns the final
    /// segment's target declaration, or `None` on failure (a fatal error
    /// at the call site).
    pub fn resolve_path(&self, session: &Session, path: &[Identifier]) -> Option<DeclId> {
        if path.is_empty() {
            return None;
        }
        let full_name: String = path.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(".");
        if let Some(frag) = self.namespace_fragment(&full_name) {
            return Some(frag);
        }

        let (last, prefix) = path.split_last().unwrap();
        if prefix.is_empty() {
            for file in &session.files {
                if let Some(&id) = file.top_level.iter().find(|&&id| session.decl_name_matches(id, &last.name)) {
                    return Some(id);
                }
            }
            return None;
        }

        let prefix_name: String = prefix.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(".");
        let members = self.merged_members(session, &prefix_name);
        members.into_iter().find(|&id| session.decl_name_matches(id, &last.name))
    }
}
