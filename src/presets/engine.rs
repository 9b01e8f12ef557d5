use super::{KvDtype, KvQuantScheme};
use crate::config::KvRealismConfig;

/// A bundle of KV realism knobs that mimics how a known runtime lays out its cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePreset {
    pub id: &'static str,
    pub label: &'static str,
    pub desc: &'static str,
    pub realism: KvRealismConfig,
    /// Some presets only make sense with a matching KV dtype.
    pub kv_dtype: Option<KvDtype>,
}

const fn realism(
    scheme: KvQuantScheme,
    alignment_bytes: u64,
    copies_factor_pct: f64,
    extra_overhead_pct: f64,
) -> KvRealismConfig {
    KvRealismConfig {
        scheme,
        group_size: 64,
        alignment_bytes,
        copies_factor_pct,
        extra_overhead_pct,
    }
}

pub const ENGINE_PRESETS: &[EnginePreset] = &[
    EnginePreset {
        id: "naive",
        label: "Naive (optimistic)",
        desc: "No padding/copies; best-case math.",
        realism: realism(KvQuantScheme::None, 0, 0.0, 0.0),
        kv_dtype: None,
    },
    EnginePreset {
        id: "llamacpp",
        label: "llama.cpp (practical)",
        desc: "Some alignment, small overhead/copies.",
        realism: realism(KvQuantScheme::None, 128, 8.0, 3.0),
        kv_dtype: None,
    },
    EnginePreset {
        id: "vllm",
        label: "vLLM (paged KV)",
        desc: "Paged KV + fragmentation, higher overhead.",
        realism: realism(KvQuantScheme::None, 256, 22.0, 8.0),
        kv_dtype: None,
    },
    EnginePreset {
        id: "trtllm",
        label: "TensorRT-LLM (GPU-ish)",
        desc: "Bigger alignment; moderate overhead.",
        realism: realism(KvQuantScheme::None, 256, 12.0, 5.0),
        kv_dtype: None,
    },
    EnginePreset {
        id: "kv-int8",
        label: "KV INT8 (quant KV)",
        desc: "KV quantization with metadata; realistic overhead.",
        realism: realism(KvQuantScheme::Int8Group, 256, 15.0, 8.0),
        kv_dtype: Some(KvDtype::Int8),
    },
    EnginePreset {
        id: "kv-int4",
        label: "KV INT4 (aggressive)",
        desc: "Very optimistic unless validated; metadata+padding included.",
        realism: realism(KvQuantScheme::Int4Group, 256, 18.0, 10.0),
        kv_dtype: Some(KvDtype::Int4),
    },
];

pub fn find_engine_preset(id: &str) -> Option<&'static EnginePreset> {
    ENGINE_PRESETS.iter().find(|preset| preset.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_preset_adds_nothing() {
        let naive = find_engine_preset("naive").unwrap();
        assert_eq!(naive.realism.alignment_bytes, 0);
        assert_eq!(naive.realism.copies_factor(), 1.0);
        assert_eq!(naive.realism.extra_overhead_pct, 0.0);
    }

    #[test]
    fn quantized_presets_pin_kv_dtype() {
        let int8 = find_engine_preset("kv-int8").unwrap();
        assert_eq!(int8.kv_dtype, Some(KvDtype::Int8));
        assert_eq!(int8.realism.scheme, KvQuantScheme::Int8Group);

        let vllm = find_engine_preset("vllm").unwrap();
        assert_eq!(vllm.kv_dtype, None);
        assert!((vllm.realism.copies_factor() - 1.22).abs() < 1e-12);
    }
}
