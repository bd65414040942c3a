//! Core math modules.

pub mod interp;
pub mod quadrature;
pub mod stats;
