pub mod choices;
pub mod field;
pub mod step;

pub use field::{Condition, FieldSpec, Rule};
pub use step::{Step, StepSpec, step_spec};
