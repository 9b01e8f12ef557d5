pub mod context;
pub mod kv_cache;
pub mod scaling;
pub mod throughput;
pub mod verdict;
pub mod weights;

use crate::{
    config::EstimationInput,
    units::{bytes_to_gib, bytes_to_mib},
};
use serde::Serialize;

pub use context::effective_kv_tokens;
pub use kv_cache::{
    kv_breakdown_for, kv_bytes_per_token, kv_bytes_per_token_realistic, realistic_kv_breakdown,
    KvBytesBreakdown,
};
pub use scaling::{default_scaling_curve, scaling_curve, ScalingPoint};
pub use throughput::{tok_per_sec_bandwidth, tok_per_sec_compute};
pub use verdict::{advisory_flags, classify, regime, ClassifyInputs, Regime, Tone, Verdict};
pub use weights::weights_bytes;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    pub effective_kv_tokens: u64,
    pub weights_gib: f64,
    pub kv_gib: f64,
    pub runtime_overhead_gib: f64,
    /// `weights_gib + kv_gib + runtime_overhead_gib`.
    pub total_gib: f64,
    pub kv_bytes_per_token: f64,
    pub kv_bytes_per_token_mb: f64,
    /// `None` when the naive KV formula was used.
    pub kv_breakdown: Option<KvBytesBreakdown>,
    pub tok_per_sec_compute: f64,
    pub tok_per_sec_bandwidth: f64,
    /// `min(tok_per_sec_compute, tok_per_sec_bandwidth)`.
    pub tok_per_sec_final: f64,
    pub verdict: Verdict,
    pub regime: Regime,
    pub advisory_flags: Vec<String>,
}

/// Runs the whole pipeline for one configuration. Pure: no I/O, no shared state.
///
/// The input is not validated here. Degenerate values degrade to safe results
/// (zero throughput, fallback widths); call `EstimationInput::validate` first to
/// reject them instead.
pub fn estimate(input: &EstimationInput) -> EstimationResult {
    let kv_tokens = effective_kv_tokens(&input.context);
    let weights_bytes_total = weights_bytes(
        input.model.params_b,
        input.precision.weight_dtype,
        input.precision.quant_overhead_pct,
    );

    let kv_breakdown = input
        .kv_realism
        .as_ref()
        .map(|realism| kv_breakdown_for(&input.model, input.precision.kv_dtype, realism));
    let kv_per_token = match &kv_breakdown {
        Some(breakdown) => breakdown.total,
        None => kv_bytes_per_token(&input.model, input.precision.kv_dtype),
    };
    let kv_bytes_total = kv_per_token * kv_tokens as f64;

    let weights_gib = bytes_to_gib(weights_bytes_total);
    let kv_gib = bytes_to_gib(kv_bytes_total);
    let total_gib = bytes_to_gib(weights_bytes_total + kv_bytes_total) + input.runtime_overhead_gib;

    let hardware = &input.hardware;
    let compute = tok_per_sec_compute(
        input.model.params_b,
        hardware.peak_tops,
        hardware.utilization(),
    );
    let bandwidth = tok_per_sec_bandwidth(
        hardware.bandwidth_gbs,
        weights_bytes_total,
        hardware.weights_read_factor,
        kv_per_token,
        kv_tokens,
        hardware.attn_read_factor,
    );
    let tok_per_sec_final = compute.min(bandwidth);

    let classify_inputs = ClassifyInputs {
        total_gib,
        ram_gib: hardware.ram_gib,
        tok_per_sec_final,
        context_tokens: input.context.context_tokens,
        effective_kv_tokens: kv_tokens,
        params_b: input.model.params_b,
    };
    let verdict = classify(&classify_inputs);
    let regime = regime(&classify_inputs, compute, bandwidth);
    let advisory_flags = advisory_flags(input, &classify_inputs);

    tracing::debug!(
        kv_tokens,
        weights_gib,
        kv_gib,
        total_gib,
        compute,
        bandwidth,
        tone = %verdict.tone,
        "estimate"
    );

    EstimationResult {
        effective_kv_tokens: kv_tokens,
        weights_gib,
        kv_gib,
        runtime_overhead_gib: input.runtime_overhead_gib,
        total_gib,
        kv_bytes_per_token: kv_per_token,
        kv_bytes_per_token_mb: bytes_to_mib(kv_per_token),
        kv_breakdown,
        tok_per_sec_compute: compute,
        tok_per_sec_bandwidth: bandwidth,
        tok_per_sec_final,
        verdict,
        regime,
        advisory_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{
            CalculatorState, ContextConfig, HardwareConfig, ModelShape, PrecisionConfig,
        },
        presets::{KvDtype, WeightDtype},
    };
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn naive_7b(context_tokens: u64, window: Option<u64>) -> EstimationInput {
        EstimationInput {
            model: ModelShape {
                params_b: 7.0,
                layers: 32,
                hidden: 4096,
                heads: 32,
                kv_heads: 32,
            },
            precision: PrecisionConfig {
                weight_dtype: WeightDtype::Int4,
                kv_dtype: KvDtype::Fp16,
                quant_overhead_pct: 20.0,
            },
            kv_realism: None,
            context: ContextConfig {
                context_tokens,
                sliding_window_enabled: window.is_some(),
                sliding_window_tokens: window.unwrap_or(8192),
            },
            hardware: HardwareConfig {
                ram_gib: 32.0,
                peak_tops: 1000.0,
                utilization_pct: 100.0,
                bandwidth_gbs: 90.0,
                attn_read_factor: 1.0,
                weights_read_factor: 1.0,
            },
            runtime_overhead_gib: 1.5,
        }
    }

    #[test]
    fn ddr5_7b_with_8k_window() {
        let result = estimate(&naive_7b(128_000, Some(8192)));
        assert_eq!(result.effective_kv_tokens, 8192);
        assert_eq!(result.kv_bytes_per_token, 524_288.0);
        assert_relative_eq!(result.kv_bytes_per_token_mb, 0.5);
        assert_relative_eq!(result.weights_gib, 3.91, epsilon = 0.005);
        assert_relative_eq!(result.kv_gib, 4.0);
        assert_relative_eq!(result.tok_per_sec_bandwidth, 11.37, epsilon = 0.01);
        assert_eq!(result.tok_per_sec_final, result.tok_per_sec_bandwidth);
        assert_eq!(result.verdict.tone, Tone::Warn);
        assert_eq!(result.regime, Regime::BandwidthBound);
        assert!(result.kv_breakdown.is_none());
    }

    #[test]
    fn full_128k_does_not_fit_32gib() {
        let result = estimate(&naive_7b(128_000, None));
        // 62.5 GiB of KV alone.
        assert_relative_eq!(result.kv_gib, 62.5);
        assert_eq!(result.verdict.tone, Tone::Bad);
        assert_eq!(result.regime, Regime::KvOverflow);
        assert!(result.advisory_flags[0].starts_with("Full 128k"));
    }

    #[test]
    fn realistic_kv_is_heavier_than_naive() {
        let mut state = CalculatorState::default();
        state.realistic_kv = false;
        let naive = estimate(&state.to_input());
        state.realistic_kv = true;
        state.apply_engine_preset("vllm").unwrap();
        let realistic = estimate(&state.to_input());
        assert!(realistic.kv_gib > naive.kv_gib);
        assert_eq!(realistic.weights_gib, naive.weights_gib);
        assert!(realistic.kv_breakdown.is_some());
    }

    #[test]
    fn default_state_estimate() {
        let result = CalculatorState::default().estimate();
        // 10B int4 + 20%: 6e9 bytes.
        assert_relative_eq!(result.weights_gib, 6e9 / 1024f64.powi(3), max_relative = 1e-12);
        assert_relative_eq!(result.tok_per_sec_compute, 26.0, max_relative = 1e-12);
        assert!(result.tok_per_sec_bandwidth < 20.0);
        assert_eq!(result.verdict.tone, Tone::Warn);
    }

    fn arb_input() -> impl Strategy<Value = EstimationInput> {
        (
            0.5f64..80.0,
            1u64..=96,
            prop::sample::select(vec![8u64, 16, 32, 64]),
            prop::sample::select(vec![64u64, 128]),
            1u64..=200_000,
            any::<bool>(),
            1u64..=65_536,
            1.0f64..256.0,
            0.0f64..500.0,
            0.1f64..100.0,
            1.0f64..2000.0,
        )
            .prop_flat_map(
                |(
                    params_b,
                    layers,
                    heads,
                    head_dim,
                    context,
                    windowed,
                    window,
                    ram,
                    tops,
                    util,
                    bw,
                )| {
                    (1u64..=heads, any::<bool>()).prop_map(move |(kv_heads, realistic)| {
                        let mut state = CalculatorState::default();
                        state.params_b = params_b;
                        state.layers = layers;
                        state.heads = heads;
                        state.hidden = heads * head_dim;
                        state.kv_heads = kv_heads;
                        state.context_tokens = context;
                        state.sliding_window_enabled = windowed;
                        state.sliding_window_tokens = window;
                        state.ram_gib = ram;
                        state.peak_tops = tops;
                        state.utilization_pct = util;
                        state.bandwidth_preset = "manual".to_string();
                        state.bandwidth_gbs_manual = bw;
                        state.realistic_kv = realistic;
                        if realistic {
                            state.apply_engine_preset("vllm").unwrap();
                        }
                        state.to_input()
                    })
                },
            )
    }

    proptest! {
        #[test]
        fn final_is_min_of_ceilings(input in arb_input()) {
            let result = estimate(&input);
            prop_assert_eq!(
                result.tok_per_sec_final,
                result.tok_per_sec_compute.min(result.tok_per_sec_bandwidth)
            );
        }

        #[test]
        fn total_is_sum_of_parts(input in arb_input()) {
            let result = estimate(&input);
            let sum = result.weights_gib + result.kv_gib + result.runtime_overhead_gib;
            prop_assert!((result.total_gib - sum).abs() <= 1e-9 * sum.max(1.0));
        }

        #[test]
        fn longer_context_never_helps(input in arb_input(), extra in 1u64..100_000) {
            let mut input = input;
            input.context.sliding_window_enabled = false;
            let shorter = estimate(&input);
            let longer = estimate(&input.with_context_tokens(input.context.context_tokens + extra));
            prop_assert!(longer.kv_gib >= shorter.kv_gib);
            prop_assert!(longer.total_gib >= shorter.total_gib);
            prop_assert!(longer.tok_per_sec_bandwidth <= shorter.tok_per_sec_bandwidth);
        }
    }
}
