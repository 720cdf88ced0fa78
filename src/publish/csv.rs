//! Summary-metrics CSV export, column-compatible with the upstream
//! benchmark collector.

use crate::ingest::RunRecord;

const HEADER: &str = "commit_hash,date,total_tests,passed,failed,broken,skipped,unknown,\
pass_rate,total_duration_ms,avg_duration_ms,min_duration_ms,max_duration_ms,\
total_retries,flaky_tests";

/// Build the summary CSV for the given runs, one row per run, header first.
pub fn build_summary_csv(runs: &[RunRecord]) -> String {
    let mut csv = String::with_capacity(128 * (runs.len() + 1));
    csv.push_str(HEADER);
    csv.push('\n');

    for run in runs {
        let pass_rate = run
            .pass_rate()
            .map(|r| format!("{:.2}", r * 100.0))
            .unwrap_or_default();

        let row = [
            escape_csv(&run.run_id),
            run.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            run.total_tests().to_string(),
            run.passed.to_string(),
            run.failed.to_string(),
            run.broken.to_string(),
            run.skipped.to_string(),
            run.unknown.to_string(),
            pass_rate,
            run.total_duration_ms.to_string(),
            format!("{:.2}", run.avg_duration_ms),
            run.min_duration_ms.to_string(),
            run.max_duration_ms.to_string(),
            run.total_retries.to_string(),
            run.flaky_tests.to_string(),
        ];
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    csv
}

fn escape_csv(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let needs_quotes = value.contains(',') || value.contains('"') || value.contains('\n');
    if needs_quotes {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}
