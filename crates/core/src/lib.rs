pub mod context;
pub mod direction;
pub mod error;
pub mod flow;
pub mod matrix;
pub mod options;

pub use context::ContextKey;
pub use direction::Direction;
pub use error::CoreError;
pub use flow::{ExchDef, ExteriorRef, FlowRef, ProcessRef, ProductFlow, TermRef, Termination};
pub use matrix::{l1_norm, unit_vector, CscMatrix};
pub use options::{BuildOptions, SolveOptions, Solver};
