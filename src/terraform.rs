pub mod state;

pub use state::{StateEntry, StateError, TerraformStateSource};
