pub mod config;
pub mod estimate;
pub mod presets;
pub mod profiles;
pub mod units;

pub(crate) use anyhow::{anyhow, Result};

pub use config::{CalculatorState, EstimationInput, MergeReport, ValidationError};
pub use estimate::{estimate, scaling_curve, EstimationResult, Regime, ScalingPoint, Tone, Verdict};
pub use profiles::{HardwareProfile, ProfileStore};
