pub mod snapshot;
pub mod state;

use crate::presets::{KvDtype, KvQuantScheme, WeightDtype};
use thiserror::Error;

pub use snapshot::{
    export_snapshot, import_snapshot, load_config_file, merge_snapshot, snapshot_to_string,
    MergeReport, SNAPSHOT_VERSION,
};
pub use state::CalculatorState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelShape {
    /// Parameter count in billions.
    pub params_b: f64,
    pub layers: u64,
    pub hidden: u64,
    pub heads: u64,
    /// `kv_heads < heads` models GQA/MQA. `kv_heads == heads` is the maximal-KV baseline.
    pub kv_heads: u64,
}

impl ModelShape {
    pub fn head_dim(&self) -> f64 {
        self.hidden as f64 / self.heads.max(1) as f64
    }

    pub fn uses_grouped_kv(&self) -> bool {
        self.kv_heads < self.heads
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionConfig {
    pub weight_dtype: WeightDtype,
    pub kv_dtype: KvDtype,
    /// Scale/zero-point storage on top of packed weights, in percent.
    pub quant_overhead_pct: f64,
}

/// Engine-level KV realism: quantization metadata, alignment padding, and runtime
/// copies/fragmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KvRealismConfig {
    pub scheme: KvQuantScheme,
    pub group_size: u64,
    /// Round each token's KV bytes up to this boundary. 0 disables padding.
    pub alignment_bytes: u64,
    /// Runtime copies/fragmentation as a percentage on top of the aligned size.
    pub copies_factor_pct: f64,
    pub extra_overhead_pct: f64,
}

impl KvRealismConfig {
    /// The multiplier form the KV estimator consumes. Never below 1.0.
    pub fn copies_factor(&self) -> f64 {
        (1.0 + self.copies_factor_pct / 100.0).max(1.0)
    }
}

impl Default for KvRealismConfig {
    fn default() -> Self {
        Self {
            scheme: KvQuantScheme::None,
            group_size: 64,
            alignment_bytes: 256,
            copies_factor_pct: 10.0,
            extra_overhead_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub context_tokens: u64,
    pub sliding_window_enabled: bool,
    pub sliding_window_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareConfig {
    pub ram_gib: f64,
    /// Peak TOPS at the chosen accelerator dtype.
    pub peak_tops: f64,
    pub utilization_pct: f64,
    pub bandwidth_gbs: f64,
    /// Pessimism multiplier on KV traffic.
    pub attn_read_factor: f64,
    /// Pessimism multiplier on weight traffic.
    pub weights_read_factor: f64,
}

impl HardwareConfig {
    /// Utilization as a fraction in (0, 1].
    pub fn utilization(&self) -> f64 {
        self.utilization_pct / 100.0
    }
}

/// Everything one estimation needs. Passed by value into the engine; nothing is
/// read from ambient state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationInput {
    pub model: ModelShape,
    pub precision: PrecisionConfig,
    /// `None` selects the naive KV formula with no metadata, alignment, or copies.
    pub kv_realism: Option<KvRealismConfig>,
    pub context: ContextConfig,
    pub hardware: HardwareConfig,
    /// Flat framework/buffer overhead added to the total.
    pub runtime_overhead_gib: f64,
}

impl EstimationInput {
    /// Same configuration at a different nominal context length.
    pub fn with_context_tokens(&self, context_tokens: u64) -> Self {
        let mut input = *self;
        input.context.context_tokens = context_tokens;
        input
    }

    /// Rejects inputs the engine would otherwise silently degrade on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let model = &self.model;
        if !(model.params_b.is_finite() && model.params_b > 0.0) {
            return Err(ValidationError::NonPositiveParams(model.params_b));
        }
        if model.layers == 0 {
            return Err(ValidationError::ZeroLayers);
        }
        if model.heads == 0 {
            return Err(ValidationError::ZeroHeads);
        }
        if model.hidden < model.heads {
            return Err(ValidationError::HeadDimBelowOne {
                hidden: model.hidden,
                heads: model.heads,
            });
        }
        if model.kv_heads == 0 || model.kv_heads > model.heads {
            return Err(ValidationError::KvHeadsOutOfRange {
                kv_heads: model.kv_heads,
                heads: model.heads,
            });
        }
        if model.hidden % model.heads != 0 {
            tracing::debug!(
                hidden = model.hidden,
                heads = model.heads,
                "hidden is not divisible by heads; head_dim is fractional"
            );
        }

        non_negative("quant_overhead_pct", self.precision.quant_overhead_pct)?;
        non_negative("runtime_overhead_gib", self.runtime_overhead_gib)?;

        if let Some(realism) = &self.kv_realism {
            if realism.group_size == 0 {
                return Err(ValidationError::ZeroGroupSize);
            }
            non_negative("copies_factor_pct", realism.copies_factor_pct)?;
            non_negative("extra_overhead_pct", realism.extra_overhead_pct)?;
        }

        let context = &self.context;
        if context.context_tokens == 0 {
            return Err(ValidationError::ZeroContext);
        }
        if context.sliding_window_enabled && context.sliding_window_tokens == 0 {
            return Err(ValidationError::ZeroSlidingWindow);
        }

        let hardware = &self.hardware;
        positive("ram_gib", hardware.ram_gib)?;
        positive("bandwidth_gbs", hardware.bandwidth_gbs)?;
        positive("attn_read_factor", hardware.attn_read_factor)?;
        positive("weights_read_factor", hardware.weights_read_factor)?;
        non_negative("peak_tops", hardware.peak_tops)?;
        if !(hardware.utilization_pct > 0.0 && hardware.utilization_pct <= 100.0) {
            return Err(ValidationError::UtilizationOutOfRange(
                hardware.utilization_pct,
            ));
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::Negative { field, value })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("params_b must be > 0 (got {0})")]
    NonPositiveParams(f64),

    #[error("layers must be >= 1")]
    ZeroLayers,

    #[error("heads must be >= 1")]
    ZeroHeads,

    #[error("hidden ({hidden}) must be >= heads ({heads}) so head_dim >= 1")]
    HeadDimBelowOne { hidden: u64, heads: u64 },

    #[error("kv_heads ({kv_heads}) must be in [1, heads={heads}]")]
    KvHeadsOutOfRange { kv_heads: u64, heads: u64 },

    #[error("group_size must be >= 1")]
    ZeroGroupSize,

    #[error("context_tokens must be >= 1")]
    ZeroContext,

    #[error("sliding_window_tokens must be >= 1 when the sliding window is enabled")]
    ZeroSlidingWindow,

    #[error("utilization_pct must be in (0, 100] (got {0})")]
    UtilizationOutOfRange(f64),

    #[error("{field} must be > 0 (got {value})")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be >= 0 (got {value})")]
    Negative { field: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> EstimationInput {
        CalculatorState::default().to_input()
    }

    #[test]
    fn default_state_is_valid() {
        assert_eq!(valid_input().validate(), Ok(()));
    }

    #[test]
    fn grouped_kv_detection() {
        let mut shape = valid_input().model;
        assert!(!shape.uses_grouped_kv());
        shape.kv_heads = 8;
        assert!(shape.uses_grouped_kv());
        assert_eq!(shape.head_dim(), 128.0);
    }

    #[test]
    fn rejects_degenerate_model_shapes() {
        let mut input = valid_input();
        input.model.params_b = 0.0;
        assert_eq!(input.validate(), Err(ValidationError::NonPositiveParams(0.0)));

        let mut input = valid_input();
        input.model.heads = 0;
        assert_eq!(input.validate(), Err(ValidationError::ZeroHeads));

        let mut input = valid_input();
        input.model.layers = 0;
        assert_eq!(input.validate(), Err(ValidationError::ZeroLayers));

        let mut input = valid_input();
        input.model.kv_heads = input.model.heads + 1;
        assert!(matches!(
            input.validate(),
            Err(ValidationError::KvHeadsOutOfRange { .. })
        ));

        let mut input = valid_input();
        input.model.hidden = 8;
        input.model.heads = 16;
        input.model.kv_heads = 16;
        assert!(matches!(
            input.validate(),
            Err(ValidationError::HeadDimBelowOne { .. })
        ));
    }

    #[test]
    fn rejects_bad_hardware() {
        let mut input = valid_input();
        input.hardware.utilization_pct = 0.0;
        assert_eq!(
            input.validate(),
            Err(ValidationError::UtilizationOutOfRange(0.0))
        );

        let mut input = valid_input();
        input.hardware.utilization_pct = 100.0;
        assert_eq!(input.validate(), Ok(()));

        let mut input = valid_input();
        input.hardware.bandwidth_gbs = -1.0;
        assert_eq!(
            input.validate(),
            Err(ValidationError::NotPositive {
                field: "bandwidth_gbs",
                value: -1.0
            })
        );
    }

    #[test]
    fn rejects_bad_context() {
        let mut input = valid_input();
        input.context.context_tokens = 0;
        assert_eq!(input.validate(), Err(ValidationError::ZeroContext));

        let mut input = valid_input();
        input.context.sliding_window_enabled = true;
        input.context.sliding_window_tokens = 0;
        assert_eq!(input.validate(), Err(ValidationError::ZeroSlidingWindow));

        // A zero window is irrelevant while the window is off.
        input.context.sliding_window_enabled = false;
        assert_eq!(input.validate(), Ok(()));
    }

    #[test]
    fn copies_factor_never_below_one() {
        let realism = KvRealismConfig {
            copies_factor_pct: -50.0,
            ..KvRealismConfig::default()
        };
        assert_eq!(realism.copies_factor(), 1.0);
        assert!((KvRealismConfig::default().copies_factor() - 1.10).abs() < 1e-12);
    }

    #[test]
    fn with_context_tokens_only_touches_context() {
        let input = valid_input();
        let other = input.with_context_tokens(65536);
        assert_eq!(other.context.context_tokens, 65536);
        assert_eq!(other.model, input.model);
        assert_eq!(other.hardware, input.hardware);
    }
}
