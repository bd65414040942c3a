//! OED numeric primitives.

pub mod math;

pub use math::interp::*;
pub use math::quadrature::*;
pub use math::stats::*;
