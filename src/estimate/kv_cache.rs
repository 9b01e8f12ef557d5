use crate::{
    config::{KvRealismConfig, ModelShape},
    presets::{KvDtype, KvQuantScheme},
};
use serde::Serialize;

/// KV bytes per token without any engine realism:
/// `2 * layers * head_dim * kv_heads * bytes_per_element`.
///
/// Used when no realism configuration is available.
pub fn kv_bytes_per_token(shape: &ModelShape, kv_dtype: KvDtype) -> f64 {
    2.0 * shape.layers as f64
        * shape.head_dim()
        * shape.kv_heads as f64
        * kv_dtype.bytes_per_element()
}

/// Every stage of the realistic per-token KV estimate. Each stage compounds on the
/// one before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KvBytesBreakdown {
    /// One K and one V vector per layer per KV head.
    pub elems_per_token: f64,
    pub value_bytes: f64,
    /// Per-group scale storage for grouped quantization schemes.
    pub meta_bytes: f64,
    pub raw: f64,
    pub aligned: f64,
    pub with_copies: f64,
    pub total: f64,
}

/// Realistic KV bytes per token.
///
/// `copies_factor` is a multiplier (1.10 = 10% extra) floored at 1.0, so runtime
/// copies never reduce the size. `block_overhead_pct` is applied last.
pub fn realistic_kv_breakdown(
    shape: &ModelShape,
    kv_dtype: KvDtype,
    scheme: KvQuantScheme,
    group_size: u64,
    alignment_bytes: u64,
    copies_factor: f64,
    block_overhead_pct: f64,
) -> KvBytesBreakdown {
    let elems_per_token =
        2.0 * shape.layers as f64 * shape.head_dim() * shape.kv_heads.max(1) as f64;

    let value_bytes = elems_per_token
        * kv_dtype.bytes_per_element()
        * kv_dtype.overhead_multiplier()
        * scheme.bytes_per_elem_multiplier();

    let groups = (elems_per_token / group_size.max(1) as f64).ceil();
    let meta_bytes = groups * scheme.meta_bytes_per_group();

    let raw = value_bytes + meta_bytes;
    let aligned = if alignment_bytes > 0 {
        let alignment = alignment_bytes as f64;
        (raw / alignment).ceil() * alignment
    } else {
        raw
    };

    let with_copies = aligned * copies_factor.max(1.0);
    let total = with_copies * (1.0 + block_overhead_pct / 100.0);

    KvBytesBreakdown {
        elems_per_token,
        value_bytes,
        meta_bytes,
        raw,
        aligned,
        with_copies,
        total,
    }
}

/// Realistic estimate driven by a `KvRealismConfig`. The config's percentage is
/// converted to the multiplier form here.
pub fn kv_breakdown_for(
    shape: &ModelShape,
    kv_dtype: KvDtype,
    realism: &KvRealismConfig,
) -> KvBytesBreakdown {
    realistic_kv_breakdown(
        shape,
        kv_dtype,
        realism.scheme,
        realism.group_size,
        realism.alignment_bytes,
        realism.copies_factor(),
        realism.extra_overhead_pct,
    )
}

pub fn kv_bytes_per_token_realistic(
    shape: &ModelShape,
    kv_dtype: KvDtype,
    realism: &KvRealismConfig,
) -> f64 {
    kv_breakdown_for(shape, kv_dtype, realism).total
}
