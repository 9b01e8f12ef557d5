use crate::{
    config::{EstimationInput, KvRealismConfig},
    presets::{KvDtype, KvQuantScheme},
};
use serde::Serialize;

/// Fraction of RAM that may be used. The remaining 8% is reserved headroom.
pub const RAM_HEADROOM_FRACTION: f64 = 0.92;
/// The "20+ tok/s" bar most marketing claims aim for.
pub const TARGET_TOK_PER_SEC: f64 = 20.0;
pub const HUGE_CONTEXT_TOKENS: u64 = 128_000;
pub const BIG_MODEL_PARAMS_B: f64 = 15.0;
/// Ceilings within this fraction of each other count as balanced.
pub const BALANCED_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Ok,
    Warn,
    Bad,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Ok => f.write_str("ok"),
            Tone::Warn => f.write_str("warn"),
            Tone::Bad => f.write_str("bad"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub tone: Tone,
    pub text: &'static str,
}

/// The numbers the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifyInputs {
    pub total_gib: f64,
    pub ram_gib: f64,
    pub tok_per_sec_final: f64,
    pub context_tokens: u64,
    pub effective_kv_tokens: u64,
    pub params_b: f64,
}

impl ClassifyInputs {
    pub fn fits_with_headroom(&self) -> bool {
        self.total_gib <= self.ram_gib * RAM_HEADROOM_FRACTION
    }
}

/// Ordered, first match wins.
pub fn classify(inputs: &ClassifyInputs) -> Verdict {
    let fast_enough = inputs.tok_per_sec_final >= TARGET_TOK_PER_SEC;
    let huge_context = inputs.context_tokens >= HUGE_CONTEXT_TOKENS
        && inputs.params_b >= BIG_MODEL_PARAMS_B;
    let huge_kv = inputs.effective_kv_tokens >= HUGE_CONTEXT_TOKENS;

    if !inputs.fits_with_headroom() {
        Verdict {
            tone: Tone::Bad,
            text: "Not enough RAM (won't load / will thrash)",
        }
    } else if huge_context && huge_kv && fast_enough {
        Verdict {
            tone: Tone::Warn,
            text: "Suspicious: 128k+ & big model @20+ tok/s needs tricks",
        }
    } else if fast_enough {
        Verdict {
            tone: Tone::Ok,
            text: "Plausible for 20+ tok/s (given assumptions)",
        }
    } else {
        Verdict {
            tone: Tone::Warn,
            text: "Loads, but 20+ tok/s unlikely (memory/bandwidth bound)",
        }
    }
}

/// Which ceiling limits decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    ComputeBound,
    BandwidthBound,
    KvOverflow,
    Balanced,
}

impl Regime {
    pub fn label(&self) -> &'static str {
        match self {
            Regime::ComputeBound => "Compute-bound",
            Regime::BandwidthBound => "Bandwidth-bound",
            Regime::KvOverflow => "KV overflow",
            Regime::Balanced => "Balanced",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Regime::ComputeBound => {
                "Compute is the limiter (tok/s from TOPS/utilization is below bandwidth ceiling)."
            }
            Regime::BandwidthBound => {
                "Memory bandwidth is the limiter (KV/weights traffic caps decode tok/s)."
            }
            Regime::KvOverflow => {
                "Total memory (weights+KV+runtime) exceeds RAM headroom -> paging/offload risk."
            }
            Regime::Balanced => "Compute and bandwidth ceilings are close (within tolerance band).",
        }
    }
}

pub fn regime(
    inputs: &ClassifyInputs,
    tok_per_sec_compute: f64,
    tok_per_sec_bandwidth: f64,
) -> Regime {
    if !inputs.fits_with_headroom() {
        return Regime::KvOverflow;
    }
    let larger = tok_per_sec_compute.max(tok_per_sec_bandwidth);
    let gap = (tok_per_sec_compute - tok_per_sec_bandwidth).abs();
    if larger <= 0.0 || gap <= larger * BALANCED_TOLERANCE {
        Regime::Balanced
    } else if tok_per_sec_compute < tok_per_sec_bandwidth {
        Regime::ComputeBound
    } else {
        Regime::BandwidthBound
    }
}

/// Advisory text, evaluated independently in a fixed order. Never an error.
pub fn advisory_flags(input: &EstimationInput, inputs: &ClassifyInputs) -> Vec<String> {
    let mut flags = Vec::new();

    if input.context.context_tokens >= HUGE_CONTEXT_TOKENS
        && !input.context.sliding_window_enabled
    {
        flags.push("Full 128k KV grows linearly; edge RAM explodes.".to_string());
    }
    if input.model.kv_heads == input.model.heads {
        flags.push("No GQA/MQA (kvHeads=heads) -> KV is maximal.".to_string());
    }
    match input.precision.kv_dtype {
        KvDtype::Fp16 => {
            flags.push("KV FP16 is common, but heavy; INT8 KV halves KV size.".to_string())
        }
        KvDtype::Fp8 => flags.push(
            "KV FP8 needs runtime + hardware support; availability varies by engine.".to_string(),
        ),
        KvDtype::Int4 => flags.push(
            "KV INT4 is aggressive; accuracy must be validated per model.".to_string(),
        ),
        _ => {}
    }
    if inputs.tok_per_sec_final < TARGET_TOK_PER_SEC && inputs.total_gib <= inputs.ram_gib {
        flags.push("You fit in RAM but bandwidth/runtime likely caps tok/s.".to_string());
    }
    if inputs.total_gib > inputs.ram_gib {
        flags.push("RAM insufficient -> paging/offload -> tok/s collapses.".to_string());
    }
    if let Some(realism) = &input.kv_realism {
        if realism.scheme != KvQuantScheme::None {
            flags.push(scheme_flag(realism));
        }
    }
    flags
}

fn scheme_flag(realism: &KvRealismConfig) -> String {
    format!(
        "KV quant scheme {} active: group={}, align={}B, copies=+{}%, extra=+{}%.",
        realism.scheme.id(),
        realism.group_size,
        realism.alignment_bytes,
        realism.copies_factor_pct,
        realism.extra_overhead_pct,
    )
}
