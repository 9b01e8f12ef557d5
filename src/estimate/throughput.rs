use crate::units::BYTES_PER_GIB;

/// Compute-bound decode tokens/sec, assuming 2 ops per parameter per token.
///
/// `utilization` is a fraction (0.02 = 2%). Returns 0 for a non-positive parameter
/// count instead of dividing by zero.
pub fn tok_per_sec_compute(params_b: f64, peak_tops: f64, utilization: f64) -> f64 {
    let ops_per_token = 2.0 * params_b * 1e9;
    if ops_per_token <= 0.0 {
        return 0.0;
    }
    (peak_tops * utilization * 1e12) / ops_per_token
}

/// Bandwidth-bound decode tokens/sec. Intentionally pessimistic: every token streams
/// the full weight set and the full live KV cache, scaled by the read factors.
///
/// Bandwidth is treated as GiB/s. Returns 0 when a token costs no bytes.
pub fn tok_per_sec_bandwidth(
    bandwidth_gbs: f64,
    weights_bytes_total: f64,
    weights_read_factor: f64,
    kv_bytes_per_token: f64,
    kv_tokens: u64,
    attn_read_factor: f64,
) -> f64 {
    let bytes_per_token = weights_read_factor * weights_bytes_total
        + attn_read_factor * kv_bytes_per_token * kv_tokens as f64;
    if bytes_per_token <= 0.0 {
        return 0.0;
    }
    bandwidth_gbs * BYTES_PER_GIB / bytes_per_token
}
