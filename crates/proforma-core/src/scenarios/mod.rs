pub mod sensitivity;

pub use sensitivity::{run_sensitivity, ProFormaMetric, SensitivityInput, SensitivityOutput};
