//! CLI command implementations (facade).
//!
//! Re-exports the command surface used by `run.rs`. Implementations live
//! in `commands/*`.

mod blueprints;
mod clarify;
mod common;
mod distill;
mod generate;
mod json_emit;
mod refine;
mod verify;

pub use blueprints::execute_blueprints_command;
pub use clarify::execute_clarify_command;
pub use distill::execute_distill_command;
pub use generate::execute_generate_command;
pub use refine::execute_refine_command;
pub use verify::execute_verify_command;

#[cfg(test)]
pub use common::{gather_context, load_inputs};
