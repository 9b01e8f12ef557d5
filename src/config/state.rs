use super::{
    ContextConfig, EstimationInput, HardwareConfig, KvRealismConfig, ModelShape, PrecisionConfig,
};
use crate::{
    estimate::{default_scaling_curve, estimate, EstimationResult, ScalingPoint},
    presets::{
        find_edge_preset, find_engine_preset, find_hardware_preset, find_model_preset, KvDtype,
        KvQuantScheme, WeightDtype, MANUAL_BANDWIDTH_PRESET_ID,
    },
    profiles::HardwareProfile,
    units::clamp,
};

pub const DEFAULT_MODEL_PRESET: &str = "10b";
pub const DEFAULT_BANDWIDTH_PRESET: &str = "ddr4-3200-2ch";
pub const DEFAULT_ENGINE_PRESET: &str = "naive";
/// Sustained LLM utilization rarely leaves this band on edge accelerators.
pub const UTILIZATION_PCT_RANGE: (f64, f64) = (0.2, 20.0);

/// Every knob of the calculator in one flat record, including which presets are
/// selected. This is the shape snapshots are written from and merged into.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorState {
    pub model_preset: String,
    pub params_b: f64,
    pub layers: u64,
    pub hidden: u64,
    pub heads: u64,
    pub kv_heads: u64,

    pub weight_dtype: WeightDtype,
    pub kv_dtype: KvDtype,
    pub quant_overhead_pct: f64,
    pub runtime_overhead_gib: f64,

    pub context_tokens: u64,
    pub sliding_window_enabled: bool,
    pub sliding_window_tokens: u64,

    pub peak_tops: f64,
    pub utilization_pct: f64,
    pub bandwidth_preset: String,
    pub bandwidth_gbs_manual: f64,
    pub attn_read_factor: f64,
    pub weights_read_factor: f64,
    pub ram_gib: f64,

    pub engine_preset: String,
    /// When false the naive KV formula is used and the knobs below are ignored.
    pub realistic_kv: bool,
    pub kv_scheme: KvQuantScheme,
    pub kv_group_size: u64,
    pub kv_alignment_bytes: u64,
    pub kv_copies_factor_pct: f64,
    pub kv_extra_overhead_pct: f64,
}

impl Default for CalculatorState {
    fn default() -> Self {
        Self {
            model_preset: DEFAULT_MODEL_PRESET.to_string(),
            params_b: 10.0,
            layers: 40,
            hidden: 4608,
            heads: 36,
            kv_heads: 36,
            weight_dtype: WeightDtype::Int4,
            kv_dtype: KvDtype::Fp16,
            quant_overhead_pct: 20.0,
            runtime_overhead_gib: 1.5,
            context_tokens: 4096,
            sliding_window_enabled: false,
            sliding_window_tokens: 8192,
            peak_tops: 26.0,
            utilization_pct: 2.0,
            bandwidth_preset: DEFAULT_BANDWIDTH_PRESET.to_string(),
            bandwidth_gbs_manual: 51.0,
            attn_read_factor: 1.0,
            weights_read_factor: 1.0,
            ram_gib: 32.0,
            engine_preset: DEFAULT_ENGINE_PRESET.to_string(),
            realistic_kv: true,
            kv_scheme: KvQuantScheme::None,
            kv_group_size: 64,
            kv_alignment_bytes: 0,
            kv_copies_factor_pct: 0.0,
            kv_extra_overhead_pct: 0.0,
        }
    }
}

impl CalculatorState {
    pub fn apply_model_preset(&mut self, id: &str) -> crate::Result<()> {
        let preset =
            find_model_preset(id).ok_or_else(|| crate::anyhow!("Unknown model preset: `{id}`"))?;
        let shape = preset.shape;
        self.model_preset = preset.id.to_string();
        self.params_b = shape.params_b;
        self.layers = shape.layers;
        self.hidden = shape.hidden;
        self.heads = shape.heads;
        self.kv_heads = shape.kv_heads;
        Ok(())
    }

    pub fn apply_engine_preset(&mut self, id: &str) -> crate::Result<()> {
        let preset =
            find_engine_preset(id).ok_or_else(|| crate::anyhow!("Unknown engine preset: `{id}`"))?;
        self.engine_preset = preset.id.to_string();
        self.set_kv_realism(&preset.realism);
        if let Some(kv_dtype) = preset.kv_dtype {
            self.kv_dtype = kv_dtype;
        }
        Ok(())
    }

    pub fn apply_edge_preset(&mut self, id: &str) -> crate::Result<()> {
        let preset =
            find_edge_preset(id).ok_or_else(|| crate::anyhow!("Unknown edge preset: `{id}`"))?;
        self.apply_model_preset(preset.model_preset_id)?;
        if let Some(kv_heads) = preset.kv_heads {
            self.kv_heads = kv_heads.min(self.heads);
        }
        self.weight_dtype = preset.weight_dtype;
        self.kv_dtype = preset.kv_dtype;
        self.context_tokens = preset.context_tokens;
        match preset.sliding_window {
            Some(window) => {
                self.sliding_window_enabled = true;
                self.sliding_window_tokens = window;
            }
            None => self.sliding_window_enabled = false,
        }
        self.ram_gib = preset.ram_gib;
        self.bandwidth_preset = preset.bandwidth_preset_id.to_string();
        self.peak_tops = preset.peak_tops;
        self.utilization_pct = preset.utilization_pct;
        tracing::debug!(preset = preset.id, "applied edge preset");
        Ok(())
    }

    /// A saved profile only carries RAM and bandwidth; bandwidth switches to manual.
    pub fn apply_profile(&mut self, profile: &HardwareProfile) {
        self.ram_gib = profile.ram_gib;
        self.bandwidth_preset = MANUAL_BANDWIDTH_PRESET_ID.to_string();
        self.bandwidth_gbs_manual = profile.bandwidth_gbs;
    }

    /// Sets utilization, clamped into [`UTILIZATION_PCT_RANGE`].
    pub fn set_utilization_pct(&mut self, pct: f64) {
        let (min, max) = UTILIZATION_PCT_RANGE;
        let clamped = clamp(pct, min, max);
        if clamped != pct {
            tracing::warn!(requested = pct, used = clamped, "utilization clamped");
        }
        self.utilization_pct = clamped;
    }

    /// Resolved bandwidth. An unknown preset id falls back to the manual value.
    pub fn bandwidth_gbs(&self) -> f64 {
        if self.bandwidth_preset == MANUAL_BANDWIDTH_PRESET_ID {
            return self.bandwidth_gbs_manual;
        }
        match find_hardware_preset(&self.bandwidth_preset) {
            Some(preset) => preset.bandwidth_gbs,
            None => {
                tracing::warn!(
                    preset = %self.bandwidth_preset,
                    "unknown bandwidth preset, using manual bandwidth"
                );
                self.bandwidth_gbs_manual
            }
        }
    }

    pub fn kv_realism(&self) -> KvRealismConfig {
        KvRealismConfig {
            scheme: self.kv_scheme,
            group_size: self.kv_group_size,
            alignment_bytes: self.kv_alignment_bytes,
            copies_factor_pct: self.kv_copies_factor_pct,
            extra_overhead_pct: self.kv_extra_overhead_pct,
        }
    }

    pub fn set_kv_realism(&mut self, realism: &KvRealismConfig) {
        self.kv_scheme = realism.scheme;
        self.kv_group_size = realism.group_size;
        self.kv_alignment_bytes = realism.alignment_bytes;
        self.kv_copies_factor_pct = realism.copies_factor_pct;
        self.kv_extra_overhead_pct = realism.extra_overhead_pct;
    }

    pub fn to_input(&self) -> EstimationInput {
        EstimationInput {
            model: ModelShape {
                params_b: self.params_b,
                layers: self.layers,
                hidden: self.hidden,
                heads: self.heads,
                kv_heads: self.kv_heads,
            },
            precision: PrecisionConfig {
                weight_dtype: self.weight_dtype,
                kv_dtype: self.kv_dtype,
                quant_overhead_pct: self.quant_overhead_pct,
            },
            kv_realism: self.realistic_kv.then(|| self.kv_realism()),
            context: ContextConfig {
                context_tokens: self.context_tokens,
                sliding_window_enabled: self.sliding_window_enabled,
                sliding_window_tokens: self.sliding_window_tokens,
            },
            hardware: HardwareConfig {
                ram_gib: self.ram_gib,
                peak_tops: self.peak_tops,
                utilization_pct: self.utilization_pct,
                bandwidth_gbs: self.bandwidth_gbs(),
                attn_read_factor: self.attn_read_factor,
                weights_read_factor: self.weights_read_factor,
            },
            runtime_overhead_gib: self.runtime_overhead_gib,
        }
    }

    pub fn estimate(&self) -> EstimationResult {
        estimate(&self.to_input())
    }

    pub fn scaling_curve(&self) -> Vec<ScalingPoint> {
        default_scaling_curve(&self.to_input())
    }
}
