//! The pipeline passes between parsing and block dispatch (C3-C5, C13).

pub mod collect;
pub mod expand;
pub mod seed_validate;
pub mod vars;
