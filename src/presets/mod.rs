pub mod edge;
pub mod engine;
pub mod escape_hatches;
pub mod hardware;
pub mod model;

pub use edge::{find_edge_preset, EdgePreset, EDGE_PRESETS};
pub use engine::{find_engine_preset, EnginePreset, ENGINE_PRESETS};
pub use escape_hatches::{EscapeHatch, ESCAPE_HATCHES};
pub use hardware::{
    find_hardware_preset, HardwarePreset, HARDWARE_PRESETS, MANUAL_BANDWIDTH_PRESET_ID,
};
pub use model::{find_model_preset, ModelPreset, MODEL_PRESETS};

/// Width used for any dtype key the tables do not know. fp16-equivalent.
pub const FALLBACK_BYTES_PER_ELEMENT: f64 = 2.0;

pub const DEFAULT_CONTEXT_OPTIONS: [u64; 8] = [1024, 2048, 4096, 8192, 16384, 32768, 65536, 128000];

macro_rules! dtype_table {
    ($enum_name:ident {
        $($variant:ident => $key:literal, $bytes:expr),* $(,)?
    }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $($variant,)*
            /// Any key outside the table. Sized with `FALLBACK_BYTES_PER_ELEMENT`.
            Unknown,
        }

        impl $enum_name {
            pub const ALL: &'static [$enum_name] = &[$($enum_name::$variant),*];

            pub fn key(&self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)*
                    Self::Unknown => "unknown",
                }
            }

            /// Never fails. Unrecognized keys become `Unknown`.
            pub fn from_key(key: &str) -> Self {
                match key.trim().to_ascii_lowercase().as_str() {
                    $($key => Self::$variant,)*
                    _ => Self::Unknown,
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown)
            }

            pub fn bytes_per_element(&self) -> f64 {
                match self {
                    $(Self::$variant => $bytes,)*
                    Self::Unknown => FALLBACK_BYTES_PER_ELEMENT,
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.key())
            }
        }
    };
}

dtype_table!(
    WeightDtype {
        Int4 => "int4", 0.5,
        Int8 => "int8", 1.0,
        Int16 => "int16", 2.0,
        Fp16 => "fp16", 2.0,
        Fp32 => "fp32", 4.0,
    }
);

dtype_table!(
    KvDtype {
        Fp32 => "fp32", 4.0,
        Fp16 => "fp16", 2.0,
        Bf16 => "bf16", 2.0,
        // e4m3/e5m2 storage
        Fp8 => "fp8", 1.0,
        Int8 => "int8", 1.0,
        Int4 => "int4", 0.5,
    }
);

impl KvDtype {
    /// Accuracy/packing overhead applied on top of the raw element width.
    pub fn overhead_multiplier(&self) -> f64 {
        match self {
            Self::Fp32 | Self::Fp16 | Self::Bf16 => 1.0,
            Self::Fp8 => 1.05,
            Self::Int8 => 1.1,
            Self::Int4 => 1.25,
            Self::Unknown => 1.0,
        }
    }
}

/// KV cache quantization scheme. Grouped schemes carry one fp16 scale per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KvQuantScheme {
    #[default]
    None,
    Int8Group,
    Int4Group,
}

impl KvQuantScheme {
    pub const ALL: &'static [KvQuantScheme] = &[Self::None, Self::Int8Group, Self::Int4Group];

    pub fn id(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int8Group => "int8-group",
            Self::Int4Group => "int4-group",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None (raw)",
            Self::Int8Group => "INT8 + scale/group",
            Self::Int4Group => "INT4 packed + scale/group",
        }
    }

    /// Unknown ids resolve to `None`, the first entry of the table.
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "int8-group" => Self::Int8Group,
            "int4-group" => Self::Int4Group,
            _ => Self::None,
        }
    }

    pub fn bytes_per_elem_multiplier(&self) -> f64 {
        1.0
    }

    pub fn meta_bytes_per_group(&self) -> f64 {
        match self {
            Self::None => 0.0,
            Self::Int8Group | Self::Int4Group => 2.0,
        }
    }
}

impl std::fmt::Display for KvQuantScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}
