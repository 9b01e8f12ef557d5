use super::estimate;
use crate::{config::EstimationInput, presets::DEFAULT_CONTEXT_OPTIONS};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingPoint {
    pub context: u64,
    pub effective_kv_tokens: u64,
    pub kv_gib: f64,
    pub total_gib: f64,
    pub tok_per_sec_compute: f64,
    pub tok_per_sec_bandwidth: f64,
    pub tok_per_sec_final: f64,
}

/// Re-runs the full pipeline at each context length, holding everything else fixed.
/// Nothing is cached; each call reflects the input it is given.
pub fn scaling_curve(input: &EstimationInput, contexts: &[u64]) -> Vec<ScalingPoint> {
    contexts
        .iter()
        .map(|&context| {
            let result = estimate(&input.with_context_tokens(context));
            ScalingPoint {
                context,
                effective_kv_tokens: result.effective_kv_tokens,
                kv_gib: result.kv_gib,
                total_gib: result.total_gib,
                tok_per_sec_compute: result.tok_per_sec_compute,
                tok_per_sec_bandwidth: result.tok_per_sec_bandwidth,
                tok_per_sec_final: result.tok_per_sec_final,
            }
        })
        .collect()
}

pub fn default_scaling_curve(input: &EstimationInput) -> Vec<ScalingPoint> {
    scaling_curve(input, &DEFAULT_CONTEXT_OPTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalculatorState;

    #[test]
    fn one_point_per_context_in_order() {
        let input = CalculatorState::default().to_input();
        let curve = default_scaling_curve(&input);
        assert_eq!(curve.len(), DEFAULT_CONTEXT_OPTIONS.len());
        for (point, context) in curve.iter().zip(DEFAULT_CONTEXT_OPTIONS) {
            assert_eq!(point.context, context);
        }
        for pair in curve.windows(2) {
            assert!(pair[1].kv_gib > pair[0].kv_gib);
            assert!(pair[1].tok_per_sec_bandwidth < pair[0].tok_per_sec_bandwidth);
            // Compute ceiling does not depend on context.
            assert_eq!(pair[1].tok_per_sec_compute, pair[0].tok_per_sec_compute);
        }
    }

    #[test]
    fn window_flattens_the_curve() {
        let mut state = CalculatorState::default();
        state.sliding_window_enabled = true;
        state.sliding_window_tokens = 8192;
        let curve = default_scaling_curve(&state.to_input());
        let capped: Vec<&ScalingPoint> = curve.iter().filter(|p| p.context >= 8192).collect();
        assert_eq!(capped.len(), 5);
        for point in &capped {
            assert_eq!(point.effective_kv_tokens, 8192);
            assert_eq!(point.kv_gib, capped[0].kv_gib);
        }
    }

    #[test]
    fn matches_direct_estimate() {
        let input = CalculatorState::default().to_input();
        let curve = scaling_curve(&input, &[2048, 1024]);
        let direct = estimate(&input.with_context_tokens(2048));
        assert_eq!(curve[0].total_gib, direct.total_gib);
        assert_eq!(curve[0].tok_per_sec_final, direct.tok_per_sec_final);
        assert_eq!(curve[1].context, 1024);
        assert!(scaling_curve(&input, &[]).is_empty());
    }
}
