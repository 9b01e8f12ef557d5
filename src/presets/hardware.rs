/// Selecting this preset means "use the manually entered bandwidth".
pub const MANUAL_BANDWIDTH_PRESET_ID: &str = "manual";

// Approximate peak numbers. Sustained bandwidth is lower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwarePreset {
    pub id: &'static str,
    pub label: &'static str,
    pub bandwidth_gbs: f64,
}

pub const HARDWARE_PRESETS: &[HardwarePreset] = &[
    HardwarePreset {
        id: "ddr4-3200-2ch",
        label: "DDR4-3200 (2ch) ~51 GB/s peak",
        bandwidth_gbs: 51.0,
    },
    HardwarePreset {
        id: "ddr5-5600-2ch",
        label: "DDR5-5600 (2ch) ~90 GB/s peak",
        bandwidth_gbs: 90.0,
    },
    HardwarePreset {
        id: "lpddr5-6400",
        label: "LPDDR5-6400 ~51 GB/s peak",
        bandwidth_gbs: 51.0,
    },
    HardwarePreset {
        id: "lpddr5x-8533",
        label: "LPDDR5X-8533 ~68 GB/s peak",
        bandwidth_gbs: 68.0,
    },
    HardwarePreset {
        id: "hbm2e",
        label: "HBM2e class ~800 GB/s peak",
        bandwidth_gbs: 800.0,
    },
    HardwarePreset {
        id: MANUAL_BANDWIDTH_PRESET_ID,
        label: "Manual (set your own)",
        bandwidth_gbs: 75.0,
    },
];

pub fn find_hardware_preset(id: &str) -> Option<&'static HardwarePreset> {
    HARDWARE_PRESETS.iter().find(|preset| preset.id == id)
}
