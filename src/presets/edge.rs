use super::{find_model_preset, KvDtype, WeightDtype};
use lazy_static::lazy_static;

/// One-click configuration reflecting a real edge constraint. These are guardrails
/// for exposing impossible claims, not benchmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePreset {
    pub id: &'static str,
    pub label: &'static str,
    pub desc: &'static str,
    pub model_preset_id: &'static str,
    pub weight_dtype: WeightDtype,
    pub kv_dtype: KvDtype,
    pub context_tokens: u64,
    /// `Some(window)` turns the sliding window on.
    pub sliding_window: Option<u64>,
    pub ram_gib: f64,
    pub bandwidth_preset_id: &'static str,
    pub peak_tops: f64,
    pub utilization_pct: f64,
    /// Overrides the model preset's KV heads to model GQA.
    pub kv_heads: Option<u64>,
}

/// GQA-ish approximation: a quarter of the query heads, never fewer than 8.
/// Takes the heads of the preset's own model, after that model preset is applied.
pub fn gqa_kv_heads(heads: u64) -> u64 {
    (heads / 4).max(8)
}

lazy_static! {
    pub static ref EDGE_PRESETS: Vec<EdgePreset> = vec![
        EdgePreset {
            id: "edge-lite",
            label: "Edge Lite (7B, 4k, 16GiB)",
            desc: "Plausible 20+ tok/s with good runtime (depends on accel).",
            model_preset_id: "7b",
            weight_dtype: WeightDtype::Int4,
            kv_dtype: KvDtype::Fp16,
            context_tokens: 4096,
            sliding_window: None,
            ram_gib: 16.0,
            bandwidth_preset_id: "lpddr5x-8533",
            peak_tops: 26.0,
            utilization_pct: 2.0,
            kv_heads: None,
        },
        EdgePreset {
            id: "edge-pro",
            label: "Edge Pro (10B, 8k, 32GiB DDR5)",
            desc: "KV math regime; shows where DDR4 starts choking.",
            model_preset_id: "10b",
            weight_dtype: WeightDtype::Int4,
            kv_dtype: KvDtype::Fp16,
            context_tokens: 8192,
            sliding_window: None,
            ram_gib: 32.0,
            bandwidth_preset_id: "ddr5-5600-2ch",
            peak_tops: 26.0,
            utilization_pct: 2.0,
            kv_heads: None,
        },
        EdgePreset {
            id: "128k-reality-check",
            label: "\"128k prompt\" reality check (30B, sliding 8k, INT8 KV)",
            desc: "How \"128k+\" is marketed without 200GB KV.",
            model_preset_id: "30b",
            weight_dtype: WeightDtype::Int4,
            kv_dtype: KvDtype::Int8,
            context_tokens: 128_000,
            sliding_window: Some(8192),
            ram_gib: 64.0,
            bandwidth_preset_id: "ddr5-5600-2ch",
            peak_tops: 60.0,
            utilization_pct: 3.0,
            kv_heads: find_model_preset("30b").map(|preset| gqa_kv_heads(preset.shape.heads)),
        },
    ];
}

pub fn find_edge_preset(id: &str) -> Option<&'static EdgePreset> {
    EDGE_PRESETS.iter().find(|preset| preset.id == id)
}
