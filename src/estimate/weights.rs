use crate::presets::WeightDtype;

/// Total bytes to store the weights, including quantization scale/zero-point
/// metadata expressed as a percentage of the packed size.
///
/// `WeightDtype::Unknown` is sized at 2 bytes/element rather than rejected.
pub fn weights_bytes(params_b: f64, weight_dtype: WeightDtype, quant_overhead_pct: f64) -> f64 {
    let raw = params_b * 1e9 * weight_dtype.bytes_per_element();
    raw + raw * (quant_overhead_pct / 100.0)
}
