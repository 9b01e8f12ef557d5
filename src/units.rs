pub const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

pub fn bytes_to_gib(bytes: f64) -> f64 {
    bytes / BYTES_PER_GIB
}

pub fn gib_to_bytes(gib: f64) -> f64 {
    gib * BYTES_PER_GIB
}

pub fn bytes_to_mib(bytes: f64) -> f64 {
    bytes / BYTES_PER_MIB
}

/// Clamps `n` into `[min, max]`. NaN collapses to `min`.
pub fn clamp(n: f64, min: f64, max: f64) -> f64 {
    if n.is_nan() {
        return min;
    }
    n.max(min).min(max)
}
