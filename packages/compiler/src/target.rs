//! The target descriptor the CLI collaborator hands to the core (spec §6):
//! `{pointerSize, alignofStruct, implicitConvTable}`.

use serde::{Deserialize, Serialize};

/// Numeric-conversion direction ranks used by `compareArgsToParams`
/// (spec §4.6) to distinguish `Match` from `Castable`.
///
/// This table is one of the spec's explicit Open Questions ("the precise
/// implicit numeric-conversion table ... is not uniformly stated"). The
/// rule adopted here (see `DESIGN.md`): any same-signedness widening is
/// `Castable`; narrowing or a signed/unsigned crossing is never an
/// implicit conversion (it requires an explicit `as`). Integer-to-float
/// and float-to-float widening are `Castable`; float-to-integer is never
/// implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitConvTable;

impl ImplicitConvTable {
    /// `true` iff a value of built-in type `from` can be implicitly
    /// converted to built-in type `to` (both already resolved, by name).
    pub fn numeric_castable(&self, from: &crate::ast::types::BuiltIn, to: &crate::ast::types::BuiltIn) -> bool {
        if from.name == to.name {
            return true;
        }
        match (from.floating, to.floating) {
            (false, false) => {
                // Integer widening: same signedness, larger width only.
                from.signed == to.signed && to.size_bytes >= from.size_bytes
            }
            (false, true) => true, // int -> float widening is always allowed
            (true, true) => to.size_bytes >= from.size_bytes,
            (true, false) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub pointer_size: u32,
    pub alignof_struct: u32,
    pub implicit_conv_table: ImplicitConvTable,
}

impl TargetDescriptor {
    pub fn host_default() -> Self {
        TargetDescriptor { pointer_size: 8, alignof_struct: 8, implicit_conv_table: ImplicitConvTable }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::BuiltIn;

    fn bi(name: &'static str, size: u32, signed: Option<bool>, floating: bool) -> BuiltIn {
        BuiltIn { name, size_bytes: size, signed, floating }
    }

    #[test]
    fn widening_same_signedness_is_castable() {
        let t = ImplicitConvTable;
        assert!(t.numeric_castable(&bi("i8", 1, Some(true), false), &bi("i32", 4, Some(true), false)));
    }

    #[test]
    fn narrowing_is_not_castable() {
        let t = ImplicitConvTable;
        assert!(!t.numeric_castable(&bi("i32", 4, Some(true), false), &bi("i8", 1, Some(true), false)));
    }

    #[test]
    fn signed_unsigned_crossing_is_not_castable() {
        let t = ImplicitConvTable;
        assert!(!t.numeric_castable(&bi("i32", 4, Some(true), false), &bi("u32", 4, Some(false), false)));
    }

    #[test]
    fn int_to_float_is_castable() {
        let t = ImplicitConvTable;
        assert!(t.numeric_castable(&bi("i32", 4, Some(true), false), &bi("f64", 8, None, true)));
    }

    #[test]
    fn float_to_int_is_not_castable() {
        let t = ImplicitConvTable;
        assert!(!t.numeric_castable(&bi("f32", 4, None, true), &bi("i32", 4, Some(true), false)));
    }
}
