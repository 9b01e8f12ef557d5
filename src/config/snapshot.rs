use super::CalculatorState;
use crate::presets::{KvDtype, KvQuantScheme, WeightDtype};
use serde_json::{json, Map, Value};
use std::path::Path;

pub const SNAPSHOT_VERSION: u64 = 1;

/// Which snapshot fields were taken and which were skipped for having the wrong type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub fn export_snapshot(state: &CalculatorState) -> Value {
    json!({
        "version": SNAPSHOT_VERSION,
        "modelPreset": state.model_preset,
        "paramsB": state.params_b,
        "layers": state.layers,
        "hidden": state.hidden,
        "heads": state.heads,
        "kvHeads": state.kv_heads,
        "weightDtype": state.weight_dtype.key(),
        "kvDtype": state.kv_dtype.key(),
        "quantOverheadPct": state.quant_overhead_pct,
        "runtimeOverheadGiB": state.runtime_overhead_gib,
        "context": state.context_tokens,
        "slidingWindowEnabled": state.sliding_window_enabled,
        "slidingWindow": state.sliding_window_tokens,
        "tops": state.peak_tops,
        "utilization": state.utilization_pct,
        "bandwidthPreset": state.bandwidth_preset,
        "bandwidthGBsManual": state.bandwidth_gbs_manual,
        "attnReadFactor": state.attn_read_factor,
        "weightsReadFactor": state.weights_read_factor,
        "ramGiB": state.ram_gib,
        "enginePreset": state.engine_preset,
        "realisticKv": state.realistic_kv,
        "kvSchemeId": state.kv_scheme.id(),
        "kvGroupSize": state.kv_group_size,
        "kvAlignment": state.kv_alignment_bytes,
        "kvCopiesFactorPct": state.kv_copies_factor_pct,
        "kvExtraOverheadPct": state.kv_extra_overhead_pct,
    })
}

pub fn snapshot_to_string(state: &CalculatorState) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(&export_snapshot(state))?)
}

/// Type-checked accessors over one snapshot object. A present field of the wrong
/// type is recorded as skipped and yields `None`.
struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    report: &'a mut MergeReport,
}

impl<'a> FieldReader<'a> {
    fn take<T>(&mut self, key: &str, convert: impl Fn(&'a Value) -> Option<T>) -> Option<T> {
        let value = self.object.get(key)?;
        match convert(value) {
            Some(converted) => {
                self.report.applied.push(key.to_string());
                Some(converted)
            }
            None => {
                tracing::warn!(
                    field = key,
                    value = %value,
                    "skipping snapshot field with wrong type"
                );
                self.report.skipped.push(key.to_string());
                None
            }
        }
    }

    fn number(&mut self, key: &str) -> Option<f64> {
        self.take(key, Value::as_f64)
    }

    /// Non-negative whole numbers only; `4096.0` is skipped like any other mistype.
    fn integer(&mut self, key: &str) -> Option<u64> {
        self.take(key, Value::as_u64)
    }

    fn boolean(&mut self, key: &str) -> Option<bool> {
        self.take(key, Value::as_bool)
    }

    fn string(&mut self, key: &str) -> Option<&'a str> {
        self.take(key, Value::as_str)
    }
}

/// Merges a snapshot into `state` field by field. Unknown keys are ignored and a
/// mistyped field never aborts the merge. Dtype strings outside the tables are kept
/// as `Unknown` (sized at the fallback width); unknown scheme ids become `none`.
pub fn merge_snapshot(state: &mut CalculatorState, snapshot: &Value) -> MergeReport {
    let mut report = MergeReport::default();
    let Some(object) = snapshot.as_object() else {
        tracing::warn!("snapshot root is not an object; nothing merged");
        return report;
    };

    match object.get("version").and_then(Value::as_u64) {
        Some(SNAPSHOT_VERSION) | None => {}
        Some(version) => tracing::warn!(
            version,
            expected = SNAPSHOT_VERSION,
            "snapshot version mismatch; merging anyway"
        ),
    }

    let mut fields = FieldReader {
        object,
        report: &mut report,
    };

    if let Some(v) = fields.string("modelPreset") {
        state.model_preset = v.to_string();
    }
    if let Some(v) = fields.number("paramsB") {
        state.params_b = v;
    }
    if let Some(v) = fields.integer("layers") {
        state.layers = v;
    }
    if let Some(v) = fields.integer("hidden") {
        state.hidden = v;
    }
    if let Some(v) = fields.integer("heads") {
        state.heads = v;
    }
    if let Some(v) = fields.integer("kvHeads") {
        state.kv_heads = v;
    }

    if let Some(v) = fields.string("weightDtype") {
        state.weight_dtype = WeightDtype::from_key(v);
    }
    if let Some(v) = fields.string("kvDtype") {
        state.kv_dtype = KvDtype::from_key(v);
    }
    if let Some(v) = fields.number("quantOverheadPct") {
        state.quant_overhead_pct = v;
    }
    if let Some(v) = fields.number("runtimeOverheadGiB") {
        state.runtime_overhead_gib = v;
    }

    if let Some(v) = fields.integer("context") {
        state.context_tokens = v;
    }
    if let Some(v) = fields.boolean("slidingWindowEnabled") {
        state.sliding_window_enabled = v;
    }
    if let Some(v) = fields.integer("slidingWindow") {
        state.sliding_window_tokens = v;
    }

    if let Some(v) = fields.number("tops") {
        state.peak_tops = v;
    }
    if let Some(v) = fields.number("utilization") {
        state.utilization_pct = v;
    }
    if let Some(v) = fields.string("bandwidthPreset") {
        state.bandwidth_preset = v.to_string();
    }
    if let Some(v) = fields.number("bandwidthGBsManual") {
        state.bandwidth_gbs_manual = v;
    }
    if let Some(v) = fields.number("attnReadFactor") {
        state.attn_read_factor = v;
    }
    if let Some(v) = fields.number("weightsReadFactor") {
        state.weights_read_factor = v;
    }
    if let Some(v) = fields.number("ramGiB") {
        state.ram_gib = v;
    }

    if let Some(v) = fields.string("enginePreset") {
        state.engine_preset = v.to_string();
    }
    if let Some(v) = fields.boolean("realisticKv") {
        state.realistic_kv = v;
    }
    if let Some(v) = fields.string("kvSchemeId") {
        state.kv_scheme = KvQuantScheme::from_id(v);
    }
    if let Some(v) = fields.integer("kvGroupSize") {
        state.kv_group_size = v;
    }
    if let Some(v) = fields.integer("kvAlignment") {
        state.kv_alignment_bytes = v;
    }
    if let Some(v) = fields.number("kvCopiesFactorPct") {
        state.kv_copies_factor_pct = v;
    }
    if let Some(v) = fields.number("kvExtraOverheadPct") {
        state.kv_extra_overhead_pct = v;
    }

    report
}

/// Parses and merges an exported snapshot on top of a copy of `state`. Invalid JSON
/// is an error and leaves the caller's state as it was.
pub fn import_snapshot(
    state: &CalculatorState,
    text: &str,
) -> crate::Result<(CalculatorState, MergeReport)> {
    let snapshot: Value =
        serde_json::from_str(text).map_err(|e| crate::anyhow!("Invalid JSON: {e}"))?;
    let mut merged = state.clone();
    let report = merge_snapshot(&mut merged, &snapshot);
    Ok((merged, report))
}

/// Reads a configuration file in the snapshot shape. `.toml` files are parsed as
/// TOML, anything else as JSON.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> crate::Result<Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| crate::anyhow!("Failed to read config `{}`: {e}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        let value: toml::Value = toml::from_str(&content)?;
        Ok(serde_json::to_value(value)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn export_then_import_restores_state() {
        let mut state = CalculatorState::default();
        state.apply_edge_preset("128k-reality-check").unwrap();
        state.apply_engine_preset("kv-int8").unwrap();
        let text = snapshot_to_string(&state).unwrap();

        let (restored, report) = import_snapshot(&CalculatorState::default(), &text).unwrap();
        assert!(report.is_clean());
        assert_eq!(restored, state);
    }

    #[test]
    fn mistyped_fields_are_skipped_individually() {
        let mut state = CalculatorState::default();
        let snapshot = json!({
            "version": 1,
            "paramsB": "thirty",
            "layers": 48,
            "context": 4096.5,
            "slidingWindowEnabled": "yes",
            "ramGiB": 64,
            "kvDtype": 8,
            "somethingElse": true,
        });
        let report = merge_snapshot(&mut state, &snapshot);

        assert_eq!(state.params_b, 10.0);
        assert_eq!(state.layers, 48);
        assert_eq!(state.context_tokens, 4096);
        assert!(!state.sliding_window_enabled);
        assert_eq!(state.ram_gib, 64.0);
        assert_eq!(state.kv_dtype, KvDtype::Fp16);
        assert_eq!(report.applied, vec!["layers", "ramGiB"]);
        assert_eq!(
            report.skipped,
            vec!["paramsB", "kvDtype", "context", "slidingWindowEnabled"]
        );
    }

    #[test]
    fn invalid_json_keeps_previous_state() {
        let mut state = CalculatorState::default();
        state.ram_gib = 12.0;
        assert!(import_snapshot(&state, "{ not json").is_err());
        assert_eq!(state.ram_gib, 12.0);
    }

    #[test]
    fn non_object_root_merges_nothing() {
        let mut state = CalculatorState::default();
        let report = merge_snapshot(&mut state, &json!([1, 2, 3]));
        assert_eq!(report, MergeReport::default());
        assert_eq!(state, CalculatorState::default());
    }

    #[test]
    fn unknown_dtype_strings_fall_back() {
        let mut state = CalculatorState::default();
        let report = merge_snapshot(
            &mut state,
            &json!({"weightDtype": "unknown-value", "kvSchemeId": "int2-group"}),
        );
        assert!(report.is_clean());
        assert_eq!(state.weight_dtype, WeightDtype::Unknown);
        assert_eq!(state.kv_scheme, KvQuantScheme::None);
        assert!(state.estimate().weights_gib > 0.0);
    }

    #[test]
    fn toml_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "paramsB = 30.0\ncontext = 128000\nslidingWindowEnabled = true\n\
             slidingWindow = 8192\nbandwidthPreset = \"hbm2e\""
        )
        .unwrap();
        let value = load_config_file(file.path()).unwrap();
        let mut state = CalculatorState::default();
        let report = merge_snapshot(&mut state, &value);
        assert!(report.is_clean());
        assert_eq!(state.params_b, 30.0);
        assert_eq!(state.context_tokens, 128_000);
        assert_eq!(state.bandwidth_gbs(), 800.0);
    }

    #[test]
    fn json_config_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"ramGiB": 8, "weightDtype": "int8"}}"#).unwrap();
        let value = load_config_file(file.path()).unwrap();
        let mut state = CalculatorState::default();
        merge_snapshot(&mut state, &value);
        assert_eq!(state.ram_gib, 8.0);
        assert_eq!(state.weight_dtype, WeightDtype::Int8);
    }
}
