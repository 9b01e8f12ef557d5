use crate::config::ModelShape;

/// Llama-like shapes. Not exact specs, but sane for orders of magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub shape: ModelShape,
}

macro_rules! model_presets {
    ($(
        $id:literal, $label:literal =>
            $params_b:expr, $layers:expr, $hidden:expr, $heads:expr, $kv_heads:expr
    );* $(;)?) => {
        pub const MODEL_PRESETS: &[ModelPreset] = &[
            $(
                ModelPreset {
                    id: $id,
                    label: $label,
                    shape: ModelShape {
                        params_b: $params_b,
                        layers: $layers,
                        hidden: $hidden,
                        heads: $heads,
                        kv_heads: $kv_heads,
                    },
                },
            )*
        ];
    };
}

model_presets!(
    "7b", "7B (approx)" => 7.0, 32, 4096, 32, 32;
    "10b", "10B (approx)" => 10.0, 40, 4608, 36, 36;
    "13b", "13B (approx)" => 13.0, 40, 5120, 40, 40;
    "15b", "15B (approx)" => 15.0, 48, 6144, 48, 48;
    "30b", "30B (approx)" => 30.0, 60, 6656, 52, 52;
);

pub fn find_model_preset(id: &str) -> Option<&'static ModelPreset> {
    MODEL_PRESETS.iter().find(|preset| preset.id == id)
}
