use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::types::{AggregateRecord, ProvisioningState};

/// Milliseconds with two decimals, e.g. "123.46ms".
pub fn format_ms(value: f64) -> String {
    format!("{:.2}ms", value)
}

// Style constants
fn style_header() -> Style {
    Style::new().bold().underline()
}

fn style_memory() -> Style {
    Style::new().cyan().bold()
}

const COLUMNS: [&str; 6] = ["mean", "median", "min", "max", "dyn mean", "runs"];

/// Summary table of all emitted records, one row per configuration. Written
/// to stderr, so colors follow stderr's terminal detection.
pub fn format_summary(records: &[AggregateRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut out = String::new();

    let bundled = records.iter().any(|r| r.bundled);
    let title = if bundled {
        "Startup latency (bundled):"
    } else {
        "Startup latency:"
    };
    out.push_str(
        &title
            .if_supports_color(Stream::Stderr, |s| s.dimmed())
            .to_string(),
    );
    out.push_str("\n\n");

    let rows: Vec<(String, [String; 6])> = records
        .iter()
        .map(|r| {
            (
                format!("{} MB", r.memory_mbs),
                [
                    format_ms(r.mean),
                    format_ms(r.median),
                    format_ms(r.min),
                    format_ms(r.max),
                    r.dyn_mean.map(format_ms).unwrap_or_else(|| "-".to_string()),
                    r.iterations.to_string(),
                ],
            )
        })
        .collect();

    let memory_width = rows
        .iter()
        .map(|(m, _)| m.len())
        .max()
        .unwrap_or(0)
        .max("memory".len());
    let mut widths = COLUMNS.map(str::len);
    for (_, cells) in &rows {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.len());
        }
    }

    let header_style = style_header();
    let mut header = format!("  {:<width$}", "memory", width = memory_width);
    for (name, w) in COLUMNS.iter().zip(widths) {
        header.push_str(&format!("  {:>w$}", name));
    }
    out.push_str(
        &header
            .if_supports_color(Stream::Stderr, |s| s.style(header_style))
            .to_string(),
    );
    out.push('\n');

    let mem_style = style_memory();
    for (memory, cells) in &rows {
        let memory_padded = format!("{:<width$}", memory, width = memory_width);
        out.push_str("  ");
        out.push_str(
            &memory_padded
                .if_supports_color(Stream::Stderr, |s| s.style(mem_style))
                .to_string(),
        );
        for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
            let padded = format!("{:>w$}", cell);
            // Median is the headline number.
            let colored = if i == 1 {
                padded
                    .if_supports_color(Stream::Stderr, |s| s.green())
                    .to_string()
            } else {
                padded
            };
            out.push_str("  ");
            out.push_str(&colored);
        }
        out.push('\n');
    }

    out
}

/// Human-readable provisioning state for `coldstart status`.
pub fn format_state(state: &ProvisioningState, location: &str) -> String {
    let mut out = String::new();

    out.push_str(
        &format!("Provisioning state ({}):", location)
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push_str("\n\n");

    let stage = state.stage().to_string();
    out.push_str(&format!(
        "  stage    {}\n",
        stage.if_supports_color(Stream::Stdout, |s| s.yellow())
    ));

    for (label, value) in [
        ("task", &state.task_id),
        ("version", &state.version_id),
        ("build", &state.build_id),
    ] {
        let shown = match value {
            Some(id) => id
                .if_supports_color(Stream::Stdout, |s| s.green())
                .to_string(),
            None => "-"
                .if_supports_color(Stream::Stdout, |s| s.dimmed())
                .to_string(),
        };
        out.push_str(&format!("  {:<7}  {}\n", label, shown));
    }

    if state.task_id.is_some() {
        out.push('\n');
        out.push_str(
            &"Delete: coldstart teardown"
                .if_supports_color(Stream::Stdout, |s| s.dimmed())
                .to_string(),
        );
        out.push('\n');
    }

    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonState<'a> {
    stage: String,
    #[serde(flatten)]
    state: &'a ProvisioningState,
    path: &'a str,
}

pub fn format_state_json(state: &ProvisioningState, location: &str) -> String {
    let json = JsonState {
        stage: state.stage().to_string(),
        state,
        path: location,
    };
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(memory: &str, mean: f64, dyn_mean: Option<f64>) -> AggregateRecord {
        AggregateRecord {
            mean,
            median: mean,
            min: mean - 1.0,
            max: mean + 1.0,
            memory_mbs: memory.into(),
            iterations: 10,
            all_startup_times: vec![],
            dependencies_json: "{}".into(),
            dyn_mean,
            dyn_median: dyn_mean,
            dyn_min: dyn_mean,
            dyn_max: dyn_mean,
            bundled: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ms_two_decimals() {
        assert_eq!(format_ms(123.456), "123.46ms");
        assert_eq!(format_ms(5.0), "5.00ms");
    }

    #[test]
    fn summary_empty() {
        assert_eq!(format_summary(&[]), "");
    }

    #[test]
    fn summary_has_row_per_record() {
        let out = format_summary(&[record("128", 15.0, None), record("1024", 40.5, Some(90.0))]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Startup latency:");
        assert!(lines[2].contains("memory"));
        assert!(lines[2].contains("dyn mean"));
        assert!(lines[3].contains("128 MB"));
        assert!(lines[3].contains("15.00ms"));
        assert!(lines[3].trim_end().ends_with("10"));
        assert!(lines[3].contains(" -  "));
        assert!(lines[4].contains("1024 MB"));
        assert!(lines[4].contains("90.00ms"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn summary_columns_align() {
        let out = format_summary(&[record("128", 5.0, None), record("10240", 12345.5, None)]);
        let lines: Vec<&str> = out.lines().skip(2).collect();
        let len = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == len), "{out}");
    }

    #[test]
    fn summary_marks_bundled() {
        let mut r = record("128", 1.0, None);
        r.bundled = true;
        assert!(format_summary(&[r]).starts_with("Startup latency (bundled):"));
    }

    #[test]
    fn state_shows_unset_steps() {
        let state = ProvisioningState {
            task_id: Some("task_1".into()),
            version_id: None,
            build_id: None,
        };
        let out = format_state(&state, "/tmp/coldstart.json");
        assert!(out.contains("(/tmp/coldstart.json)"));
        assert!(out.contains("stage    task created"));
        assert!(out.contains("task     task_1"));
        assert!(out.contains("version  -"));
        assert!(out.contains("coldstart teardown"));
    }

    #[test]
    fn empty_state_has_no_teardown_hint() {
        let out = format_state(&ProvisioningState::default(), "x");
        assert!(out.contains("unprovisioned"));
        assert!(!out.contains("teardown"));
    }

    #[test]
    fn state_json() {
        let state = ProvisioningState {
            task_id: Some("t".into()),
            version_id: Some("v".into()),
            build_id: None,
        };
        let value: serde_json::Value =
            serde_json::from_str(&format_state_json(&state, "p.json")).unwrap();
        assert_eq!(value["stage"], "version published");
        assert_eq!(value["taskId"], "t");
        assert_eq!(value["versionId"], "v");
        assert!(value.get("buildId").is_none());
        assert_eq!(value["path"], "p.json");
    }
}
