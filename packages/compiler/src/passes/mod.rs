//! The fixed-point pipeline of semantic passes (spec §4): each module here
//! is one letter of the L/P/V/R/I/S/C/G pipeline, run in sequence by
//! `crate::compile_program`.

pub mod contract_solver;
pub mod decl_validator;
pub mod signature_resolver;
pub mod template_instantiator;
pub mod type_resolver;
