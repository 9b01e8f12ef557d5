use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use llm_hw_calc::{
    config::{
        import_snapshot, load_config_file, merge_snapshot, snapshot_to_string, CalculatorState,
        MergeReport,
    },
    estimate::{estimate, EstimationResult},
    presets::{
        KvDtype, WeightDtype, EDGE_PRESETS, ENGINE_PRESETS, ESCAPE_HATCHES, HARDWARE_PRESETS,
        MANUAL_BANDWIDTH_PRESET_ID, MODEL_PRESETS,
    },
    profiles::ProfileStore,
};
use serde_json::json;
use tracing::Level;

// cargo run --bin llm_hw_calc_cli -- estimate --edge-preset 128k-reality-check
// cargo run --bin llm_hw_calc_cli -- --config box.toml curve
// cargo run --bin llm_hw_calc_cli -- snapshot import state.json

fn estimate_args() -> Vec<Arg> {
    vec![
        Arg::new("edge_preset")
            .help("Apply an edge preset first (edge-lite, edge-pro, 128k-reality-check)")
            .long("edge-preset"),
        Arg::new("model_preset")
            .help("Model shape preset (7b, 10b, 13b, 15b, 30b)")
            .long("model-preset"),
        Arg::new("engine_preset")
            .help("KV realism preset (naive, llamacpp, vllm, trtllm, kv-int8, kv-int4)")
            .long("engine-preset"),
        Arg::new("profile")
            .help("Apply a saved hardware profile by id")
            .long("profile"),
        Arg::new("params_b")
            .help("Parameter count in billions")
            .long("params-b")
            .value_parser(value_parser!(f64)),
        Arg::new("kv_heads")
            .help("KV heads (fewer than heads models GQA/MQA)")
            .long("kv-heads")
            .value_parser(value_parser!(u64)),
        Arg::new("context")
            .help("Nominal context length in tokens")
            .long("context")
            .value_parser(value_parser!(u64)),
        Arg::new("sliding_window")
            .help("Enable a sliding window of this many tokens")
            .long("sliding-window")
            .value_parser(value_parser!(u64)),
        Arg::new("ram_gib")
            .help("Available RAM in GiB")
            .long("ram-gib")
            .value_parser(value_parser!(f64)),
        Arg::new("bandwidth_preset")
            .help("Memory bandwidth preset id")
            .long("bandwidth-preset"),
        Arg::new("bandwidth_gbs")
            .help("Manual memory bandwidth in GB/s (switches the preset to manual)")
            .long("bandwidth-gbs")
            .value_parser(value_parser!(f64)),
        Arg::new("tops")
            .help("Peak TOPS")
            .long("tops")
            .value_parser(value_parser!(f64)),
        Arg::new("utilization")
            .help("Sustained utilization in percent (clamped to 0.2-20)")
            .long("utilization")
            .value_parser(value_parser!(f64)),
        Arg::new("weight_dtype")
            .help("Weight dtype (int4, int8, int16, fp16, fp32)")
            .long("weight-dtype"),
        Arg::new("kv_dtype")
            .help("KV dtype (fp32, fp16, bf16, fp8, int8, int4)")
            .long("kv-dtype"),
        Arg::new("naive_kv")
            .help("Use the naive KV formula (no metadata, alignment or copies)")
            .long("naive-kv")
            .action(ArgAction::SetTrue),
    ]
}

fn command() -> Command {
    Command::new("LLM Hardware Calculator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Checks whether an LLM deployment claim fits in RAM and can reach 20+ tok/s")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .help("TOML or JSON file in the snapshot shape, merged over the defaults")
                .long("config")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .help("Debug logging")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("json")
                .help("Print JSON instead of text")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("estimate")
                .about("Estimate memory, throughput and a verdict")
                .args(estimate_args()),
        )
        .subcommand(
            Command::new("curve")
                .about("Scaling table over the standard context lengths")
                .args(estimate_args()),
        )
        .subcommand(Command::new("presets").about("List presets and escape hatches"))
        .subcommand(
            Command::new("profile")
                .about("Manage saved hardware profiles")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List saved profiles"))
                .subcommand(
                    Command::new("save")
                        .about("Save RAM and bandwidth as a named profile")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("note").long("note"))
                        .arg(
                            Arg::new("ram_gib")
                                .long("ram-gib")
                                .value_parser(value_parser!(f64)),
                        )
                        .arg(
                            Arg::new("bandwidth_gbs")
                                .long("bandwidth-gbs")
                                .value_parser(value_parser!(f64)),
                        ),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a profile by id")
                        .arg(Arg::new("id").required(true)),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Export or import the calculator state")
                .subcommand_required(true)
                .subcommand(Command::new("export").about("Write the state as JSON to stdout"))
                .subcommand(
                    Command::new("import")
                        .about("Merge an exported snapshot and estimate the result")
                        .arg(Arg::new("file").required(true)),
                ),
        )
}

fn apply_overrides(
    state: &mut CalculatorState,
    matches: &ArgMatches,
    store: &ProfileStore,
) -> Result<()> {
    if let Some(id) = matches.get_one::<String>("edge_preset") {
        state.apply_edge_preset(id)?;
    }
    if let Some(id) = matches.get_one::<String>("model_preset") {
        state.apply_model_preset(id)?;
    }
    if let Some(id) = matches.get_one::<String>("engine_preset") {
        state.apply_engine_preset(id)?;
    }
    if let Some(id) = matches.get_one::<String>("profile") {
        let profile = store
            .find(id)
            .ok_or_else(|| anyhow!("No saved profile with id `{id}`"))?;
        state.apply_profile(&profile);
    }
    if let Some(&params_b) = matches.get_one::<f64>("params_b") {
        state.params_b = params_b;
    }
    if let Some(&kv_heads) = matches.get_one::<u64>("kv_heads") {
        state.kv_heads = kv_heads;
    }
    if let Some(&context) = matches.get_one::<u64>("context") {
        state.context_tokens = context;
    }
    if let Some(&window) = matches.get_one::<u64>("sliding_window") {
        state.sliding_window_enabled = true;
        state.sliding_window_tokens = window;
    }
    if let Some(&ram_gib) = matches.get_one::<f64>("ram_gib") {
        state.ram_gib = ram_gib;
    }
    if let Some(preset) = matches.get_one::<String>("bandwidth_preset") {
        state.bandwidth_preset = preset.to_owned();
    }
    if let Some(&bandwidth_gbs) = matches.get_one::<f64>("bandwidth_gbs") {
        state.bandwidth_preset = MANUAL_BANDWIDTH_PRESET_ID.to_string();
        state.bandwidth_gbs_manual = bandwidth_gbs;
    }
    if let Some(&tops) = matches.get_one::<f64>("tops") {
        state.peak_tops = tops;
    }
    if let Some(&utilization) = matches.get_one::<f64>("utilization") {
        state.set_utilization_pct(utilization);
    }
    if let Some(key) = matches.get_one::<String>("weight_dtype") {
        state.weight_dtype = WeightDtype::from_key(key);
        if !state.weight_dtype.is_known() {
            tracing::warn!(dtype = %key, "unknown weight dtype, sizing at 2 bytes");
        }
    }
    if let Some(key) = matches.get_one::<String>("kv_dtype") {
        state.kv_dtype = KvDtype::from_key(key);
        if !state.kv_dtype.is_known() {
            tracing::warn!(dtype = %key, "unknown KV dtype, sizing at 2 bytes");
        }
    }
    if matches.get_flag("naive_kv") {
        state.realistic_kv = false;
    }
    Ok(())
}

fn print_estimate(state: &CalculatorState, result: &EstimationResult) {
    let input = state.to_input();
    println!(
        "KV heads            : {} of {} ({})",
        input.model.kv_heads,
        input.model.heads,
        if input.model.uses_grouped_kv() { "GQA/MQA" } else { "full MHA" }
    );
    match &input.kv_realism {
        Some(realism) => println!("KV scheme           : {}", realism.scheme.label()),
        None => println!("KV scheme           : naive formula"),
    }
    println!("Effective KV tokens : {}", result.effective_kv_tokens);
    println!("Weights             : {:.2} GiB", result.weights_gib);
    println!(
        "KV cache            : {:.2} GiB ({:.3} MiB/token)",
        result.kv_gib, result.kv_bytes_per_token_mb
    );
    println!("Runtime overhead    : {:.2} GiB", result.runtime_overhead_gib);
    println!("Total               : {:.2} GiB", result.total_gib);
    println!("Compute ceiling     : {:.1} tok/s", result.tok_per_sec_compute);
    println!("Bandwidth ceiling   : {:.1} tok/s", result.tok_per_sec_bandwidth);
    println!("Decode estimate     : {:.1} tok/s", result.tok_per_sec_final);
    println!(
        "Verdict             : [{}] {}",
        result.verdict.tone, result.verdict.text
    );
    println!(
        "Regime              : {} - {}",
        result.regime.label(),
        result.regime.hint()
    );
    for flag in &result.advisory_flags {
        println!("  * {flag}");
    }
}

fn print_presets(as_json: bool) -> Result<()> {
    if as_json {
        let value = json!({
            "models": MODEL_PRESETS.iter().map(|p| json!({
                "id": p.id,
                "label": p.label,
                "paramsB": p.shape.params_b,
                "layers": p.shape.layers,
                "hidden": p.shape.hidden,
                "heads": p.shape.heads,
                "kvHeads": p.shape.kv_heads,
            })).collect::<Vec<_>>(),
            "bandwidth": HARDWARE_PRESETS.iter().map(|p| json!({
                "id": p.id,
                "label": p.label,
                "bandwidthGBs": p.bandwidth_gbs,
            })).collect::<Vec<_>>(),
            "engines": ENGINE_PRESETS.iter().map(|p| json!({
                "id": p.id,
                "label": p.label,
                "desc": p.desc,
                "kvSchemeId": p.realism.scheme.id(),
                "kvSchemeLabel": p.realism.scheme.label(),
                "kvAlignment": p.realism.alignment_bytes,
                "kvCopiesFactorPct": p.realism.copies_factor_pct,
                "kvExtraOverheadPct": p.realism.extra_overhead_pct,
                "kvDtype": p.kv_dtype.map(|dtype| dtype.key()),
            })).collect::<Vec<_>>(),
            "edge": EDGE_PRESETS.iter().map(|p| json!({
                "id": p.id,
                "label": p.label,
                "desc": p.desc,
            })).collect::<Vec<_>>(),
            "escapeHatches": ESCAPE_HATCHES.iter().map(|h| json!({
                "id": h.id,
                "title": h.title,
                "effect": h.effect,
                "whatChanges": h.what_changes,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Model presets:");
    for preset in MODEL_PRESETS {
        println!("  {:<20} {}", preset.id, preset.label);
    }
    println!("Bandwidth presets:");
    for preset in HARDWARE_PRESETS {
        println!(
            "  {:<20} {} ({} GB/s)",
            preset.id, preset.label, preset.bandwidth_gbs
        );
    }
    println!("Engine presets:");
    for preset in ENGINE_PRESETS {
        println!(
            "  {:<20} {}: {} [{}]",
            preset.id,
            preset.label,
            preset.desc,
            preset.realism.scheme.label()
        );
    }
    println!("Edge presets:");
    for preset in EDGE_PRESETS.iter() {
        println!("  {:<20} {}: {}", preset.id, preset.label, preset.desc);
    }
    println!("Escape hatches:");
    for hatch in ESCAPE_HATCHES {
        println!(
            "  {:<20} {}: {} {}",
            hatch.id, hatch.title, hatch.effect, hatch.what_changes
        );
    }
    Ok(())
}

fn run_profile(
    matches: &ArgMatches,
    state: &CalculatorState,
    store: &ProfileStore,
    as_json: bool,
) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            let profiles = store.load();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else if profiles.is_empty() {
                println!("No profiles yet.");
            } else {
                for profile in &profiles {
                    println!(
                        "{}  {}  {} GiB @ {} GB/s  ({})",
                        profile.id,
                        profile.name,
                        profile.ram_gib,
                        profile.bandwidth_gbs,
                        profile.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        Some(("save", save)) => {
            let name = save
                .get_one::<String>("name")
                .ok_or_else(|| anyhow!("Profile name is required"))?;
            let ram_gib = save.get_one::<f64>("ram_gib").copied().unwrap_or(state.ram_gib);
            let bandwidth_gbs = save
                .get_one::<f64>("bandwidth_gbs")
                .copied()
                .unwrap_or_else(|| state.bandwidth_gbs());
            let profile = match save.get_one::<String>("note") {
                Some(note) => store.save_with_note(name, note, ram_gib, bandwidth_gbs)?,
                None => store.save(name, ram_gib, bandwidth_gbs)?,
            };
            println!("Saved profile {} ({})", profile.name, profile.id);
        }
        Some(("delete", delete)) => {
            let id = delete
                .get_one::<String>("id")
                .ok_or_else(|| anyhow!("Profile id is required"))?;
            if store.delete(id)? {
                println!("Deleted profile {id}");
            } else {
                println!("No profile with id {id}");
            }
        }
        _ => unreachable!("clap enforces a profile subcommand"),
    }
    Ok(())
}

/// Merges a snapshot file over `state`. On any error `state` is left as it was.
fn import_snapshot_file(state: &mut CalculatorState, path: &str) -> Result<MergeReport> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read snapshot `{path}`: {e}"))?;
    let (merged, report) = import_snapshot(state, &text)?;
    *state = merged;
    Ok(report)
}

fn main() -> Result<()> {
    let matches = command().get_matches();

    let level = if matches.get_flag("verbose") {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let as_json = matches.get_flag("json");
    let mut state = CalculatorState::default();
    if let Some(path) = matches.get_one::<String>("config") {
        let config = load_config_file(path)?;
        let report = merge_snapshot(&mut state, &config);
        tracing::info!(
            applied = report.applied.len(),
            skipped = ?report.skipped,
            "merged config"
        );
    }
    let store = ProfileStore::from_env();

    match matches.subcommand() {
        Some(("estimate", sub)) => {
            apply_overrides(&mut state, sub, &store)?;
            let input = state.to_input();
            input.validate()?;
            let result = estimate(&input);
            if as_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_estimate(&state, &result);
            }
        }
        Some(("curve", sub)) => {
            apply_overrides(&mut state, sub, &store)?;
            state.to_input().validate()?;
            let curve = state.scaling_curve();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&curve)?);
            } else {
                println!(
                    "{:>8} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
                    "context", "kv_tok", "kv_gib", "total_gib", "compute", "bandwidth", "final"
                );
                for point in &curve {
                    println!(
                        "{:>8} {:>8} {:>10.2} {:>10.2} {:>10.1} {:>10.1} {:>10.1}",
                        point.context,
                        point.effective_kv_tokens,
                        point.kv_gib,
                        point.total_gib,
                        point.tok_per_sec_compute,
                        point.tok_per_sec_bandwidth,
                        point.tok_per_sec_final
                    );
                }
            }
        }
        Some(("presets", _)) => print_presets(as_json)?,
        Some(("profile", sub)) => run_profile(sub, &state, &store, as_json)?,
        Some(("snapshot", sub)) => match sub.subcommand() {
            Some(("export", _)) => println!("{}", snapshot_to_string(&state)?),
            Some(("import", import)) => {
                let path = import
                    .get_one::<String>("file")
                    .ok_or_else(|| anyhow!("Snapshot file is required"))?;
                let report = import_snapshot_file(&mut state, path)?;
                if !report.is_clean() {
                    eprintln!("Skipped fields: {}", report.skipped.join(", "));
                }
                let input = state.to_input();
                input.validate()?;
                let result = estimate(&input);
                if as_json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_estimate(&state, &result);
                }
            }
            _ => unreachable!("clap enforces a snapshot subcommand"),
        },
        _ => unreachable!("clap enforces a subcommand"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn overrides_apply_in_order() {
        let matches = command()
            .try_get_matches_from([
                "llm_hw_calc_cli",
                "estimate",
                "--edge-preset",
                "edge-lite",
                "--context",
                "32768",
                "--bandwidth-gbs",
                "120",
                "--naive-kv",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        let mut state = CalculatorState::default();
        apply_overrides(&mut state, sub, &store).unwrap();

        assert_eq!(state.params_b, 7.0);
        assert_eq!(state.context_tokens, 32_768);
        assert_eq!(state.bandwidth_gbs(), 120.0);
        assert!(!state.realistic_kv);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let matches = command()
            .try_get_matches_from(["llm_hw_calc_cli", "estimate", "--profile", "missing"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        let mut state = CalculatorState::default();
        assert!(apply_overrides(&mut state, sub, &store).is_err());
    }

    #[test]
    fn blank_profile_name_with_note_is_rejected() {
        let matches = command()
            .try_get_matches_from(["llm_hw_calc_cli", "profile", "save", "   ", "--note", "x"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        let state = CalculatorState::default();
        assert!(run_profile(sub, &state, &store, false).is_err());
        assert!(store.load().is_empty());
    }

    #[test]
    fn profile_save_uses_state_hardware() {
        let matches = command()
            .try_get_matches_from(["llm_hw_calc_cli", "profile", "save", "desk", "--note", "x"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.json"));
        let state = CalculatorState::default();
        run_profile(sub, &state, &store, false).unwrap();

        let profiles = store.load();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].note, "x");
        assert_eq!(profiles[0].ram_gib, state.ram_gib);
        assert_eq!(profiles[0].bandwidth_gbs, state.bandwidth_gbs());
    }

    #[test]
    fn snapshot_import_merges_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"version": 1, "ramGiB": 64, "context": "lots"}"#).unwrap();
        let matches = command()
            .try_get_matches_from(["llm_hw_calc_cli", "snapshot", "import", path.to_str().unwrap()])
            .unwrap();
        let (_, snapshot) = matches.subcommand().unwrap();
        let (_, import) = snapshot.subcommand().unwrap();
        let file = import.get_one::<String>("file").unwrap();

        let mut state = CalculatorState::default();
        let report = import_snapshot_file(&mut state, file).unwrap();
        assert_eq!(state.ram_gib, 64.0);
        assert_eq!(state.context_tokens, 4096);
        assert_eq!(report.skipped, vec!["context"]);
    }

    #[test]
    fn snapshot_import_keeps_state_on_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut state = CalculatorState::default();
        state.ram_gib = 12.0;
        assert!(import_snapshot_file(&mut state, path.to_str().unwrap()).is_err());
        assert_eq!(state.ram_gib, 12.0);

        let missing = dir.path().join("missing.json");
        assert!(import_snapshot_file(&mut state, missing.to_str().unwrap()).is_err());
        assert_eq!(state, {
            let mut expected = CalculatorState::default();
            expected.ram_gib = 12.0;
            expected
        });
    }
}
