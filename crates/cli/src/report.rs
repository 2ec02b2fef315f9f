//! Rendering of run summaries and the tag view for the terminal.

use serde_json::json;
use std::fmt::Write;
use tagger_core::models::PresentationView;
use tagger_core::pipeline::PipelineSummary;

pub fn summary_json(summary: &PipelineSummary) -> serde_json::Value {
    let mut out = json!({
        "status": "complete",
        "newly_analyzed": summary.newly_analyzed(),
    });
    if let Some(map) = &summary.map {
        out["discovered"] = json!(map.discovered);
        out["stale"] = json!(map.stale);
        out["failed"] = json!(map.failed);
    }
    if let Some(tags) = summary.tags {
        out["tags"] = json!(tags);
    }
    out
}

pub fn summary_line(summary: &PipelineSummary) -> String {
    let mut line = String::new();
    if let Some(map) = &summary.map {
        let _ = write!(
            line,
            "map: discovered {}, stale {}, analyzed {}, failed {}",
            map.discovered, map.stale, map.processed, map.failed
        );
    }
    if let Some(tags) = summary.tags {
        if !line.is_empty() {
            line.push_str("; ");
        }
        let _ = write!(line, "reduce: {} tags", tags);
    }
    line
}

pub fn view_text(view: &PresentationView) -> String {
    if view.is_empty() {
        return "no tagged files\n".to_string();
    }
    let mut out = String::new();
    for (tag, entries) in view {
        let _ = writeln!(out, "{} ({})", tag, entries.len());
        for entry in entries {
            let _ = writeln!(out, "  {}  [{}]", entry.name, entry.all_keys.join(", "));
        }
    }
    out
}
