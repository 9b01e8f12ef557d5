/// Common techniques behind "128k context on 8-16GB" claims. If a claim does not use
/// one of these, it is probably nonsense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeHatch {
    pub id: &'static str,
    pub title: &'static str,
    pub effect: &'static str,
    pub what_changes: &'static str,
}

pub const ESCAPE_HATCHES: &[EscapeHatch] = &[
    EscapeHatch {
        id: "sliding",
        title: "Sliding Window / Local Attention",
        effect: "Caps effective KV tokens to a window (e.g. 4k-16k) even if prompt is 128k+.",
        what_changes: "Memory becomes O(window), not O(full_context). Quality depends on task.",
    },
    EscapeHatch {
        id: "gqa",
        title: "GQA / MQA",
        effect: "Reduces KV heads (kvHeads << heads), cutting KV size ~linearly.",
        what_changes: "KV bytes/tok drops by heads/kvHeads factor.",
    },
    EscapeHatch {
        id: "kvquant",
        title: "KV Quantization (INT8/FP8)",
        effect: "Cuts KV bytes by ~2x vs FP16 (or more with FP8).",
        what_changes: "Quality/stability varies; depends on runtime & model.",
    },
    EscapeHatch {
        id: "paged",
        title: "Paged KV / KV Cache Paging",
        effect: "Better memory management, fewer stalls, better locality.",
        what_changes: "Doesn't magically remove KV cost, but improves survivability.",
    },
    EscapeHatch {
        id: "offload",
        title: "KV Offload (RAM<->SSD) / Unified Memory tricks",
        effect: "Makes 'it runs' possible when RAM is insufficient.",
        what_changes: "Tokens/sec collapses; useful for demos, not for 20+ tok/s.",
    },
];
