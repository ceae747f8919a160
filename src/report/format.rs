//! Formatted terminal output.
//!
//! All text rendering lives here so the alignment, sweep and forecast code
//! stays free of presentation concerns.

use crate::data::SignalMetadata;
use crate::data::catalog::{display_name, known_signals};
use crate::domain::{Correlation, CorrelationMethod, GeoType, LagSweepResult, SignalKey, TimeType};
use crate::forecast::{ForecastComparison, ForecastRun};
use crate::merge::MergedTable;
use crate::report::score_forecast;

/// List the known signals with their display names and, when metadata is
/// available, the geo types each one is published at.
pub fn format_catalog(metadata: Option<&SignalMetadata>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<40} {:<24} {}\n", "signal", "geo types", "name"));
    out.push_str(&format!("{:-<40} {:-<24} {:-<40}\n", "", "", ""));
    for (name, key) in known_signals() {
        let geo_types = match metadata {
            Some(meta) => {
                let types: Vec<&str> = meta
                    .signal_geo_types(&key)
                    .into_iter()
                    .map(GeoType::as_str)
                    .collect();
                if types.is_empty() {
                    "-".to_string()
                } else {
                    types.join(",")
                }
            }
            None => "?".to_string(),
        };
        out.push_str(&format!(
            "{:<40} {:<24} {name}\n",
            truncate(&key.to_string(), 40),
            truncate(&geo_types, 24)
        ));
    }
    out
}

/// Header plus the first and last `preview` rows of a merged table.
pub fn format_table_summary(table: &MergedTable, preview: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} '{}' ({}) | rows={}",
        table.geo_type().display_name(),
        table.geo_value(),
        table.time_type(),
        table.len()
    ));
    if let (Some(first), Some(last)) = (table.time_values().next(), table.last_time_value()) {
        out.push_str(&format!(" | {first} .. {last}"));
    }
    out.push('\n');

    let labels = table.column_labels();
    let width = labels.iter().map(|l| l.len()).max().unwrap_or(0).clamp(12, 48);

    let mut header = format!("{:<10}", "time_value");
    for label in &labels {
        header.push_str(&format!(" {:>width$}", truncate(label, width)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    let rows = table.rows();
    let shown: Vec<usize> = if rows.len() <= 2 * preview {
        (0..rows.len()).collect()
    } else {
        (0..preview).chain(rows.len() - preview..rows.len()).collect()
    };
    for (i, &idx) in shown.iter().enumerate() {
        if i > 0 && idx != shown[i - 1] + 1 {
            out.push_str("...\n");
        }
        let row = &rows[idx];
        let mut line = format!("{:<10}", row.time_value);
        for v in &row.values {
            line.push_str(&format!(" {v:>width$.4}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// One-line summary of a single lagged correlation.
pub fn format_correlation(
    series1: &SignalKey,
    series2: &SignalKey,
    lag: i32,
    time_type: TimeType,
    method: CorrelationMethod,
    cor: &Correlation,
) -> String {
    format!(
        "{} vs {}\nlag={lag} {}(s) | method={} | {}\n",
        display_name(series1),
        display_name(series2),
        time_type.as_str(),
        method.as_str(),
        fmt_cor(cor)
    )
}

/// Sweep table with the best lag marked.
pub fn format_sweep(
    series1: &SignalKey,
    series2: &SignalKey,
    result: &LagSweepResult,
    best: Option<(i32, f64)>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== Lag sweep: {} vs {} ===\n",
        display_name(series1),
        display_name(series2)
    ));
    out.push_str(&format!(
        "method={} | lags=[-{max}, {max}] {}(s)\n\n",
        result.method.as_str(),
        result.time_type.as_str(),
        max = result.max_lag
    ));

    out.push_str(&format!("  {:>6} {:>10} {:>6}\n", "lag", "cor", "n"));
    out.push_str(&format!("  {:->6} {:->10} {:->6}\n", "", "", ""));
    for (lag, cor) in result.iter() {
        let mark = if best.is_some_and(|(b, _)| b == lag) { "*" } else { " " };
        let value = match cor.value() {
            Some(v) => format!("{v:>10.4}"),
            None => format!("{:>10}", "NA"),
        };
        out.push_str(&format!("{mark} {lag:>6} {value} {:>6}\n", cor.n()));
    }

    out.push('\n');
    match best {
        Some((lag, cor)) => out.push_str(&format!(
            "Best lag: {lag} {}(s) (cor={cor:.4})\n",
            result.time_type.as_str()
        )),
        None => out.push_str("Best lag: none (no defined correlation)\n"),
    }
    out
}

/// Latest vs as-of forecasts with scores against the realized values.
pub fn format_forecast(cmp: &ForecastComparison) -> String {
    let spec = &cmp.spec;
    let mut out = String::new();
    out.push_str(&format!(
        "=== Forecast: {} ({} '{}') ===\n",
        display_name(&spec.predicted),
        spec.geo_type.display_name(),
        spec.geo_value
    ));
    out.push_str(&format!(
        "Forecaster: {} | origin={} | horizon={}d | training from {}\n",
        spec.forecaster.display_name(),
        spec.origin_date,
        spec.horizon_days,
        spec.training_start
    ));
    let predictors: Vec<String> = spec.fetch_keys().iter().map(display_name).collect();
    out.push_str(&format!("Predictors: {}\n", predictors.join(", ")));

    for run in [&cmp.latest, &cmp.as_of] {
        out.push('\n');
        out.push_str(&format_run(run, cmp));
    }
    out
}

fn format_run(run: &ForecastRun, cmp: &ForecastComparison) -> String {
    let mut out = String::new();
    out.push_str(&format!("Data {}:\n", run.data_state));
    let result = match &run.result {
        Ok(result) => result,
        Err(e) => {
            out.push_str(&format!("  failed: {e}\n"));
            return out;
        }
    };

    out.push_str(&format!(
        "  {:<10} {:>10} {:>10} {:>10} {:>10}\n",
        "target", "pred", "lower", "upper", "actual"
    ));
    for point in &result.points {
        let actual = cmp
            .actual
            .value_at(point.target_date)
            .map(|v| format!("{v:>10.4}"))
            .unwrap_or_else(|| format!("{:>10}", "-"));
        out.push_str(&format!(
            "  {:<10} {:>10.4} {:>10.4} {:>10.4} {actual}\n",
            point.target_date, point.pred, point.lower, point.upper
        ));
    }

    let score = score_forecast(result, &cmp.actual);
    match (score.mae, score.coverage) {
        (Some(mae), Some(coverage)) => out.push_str(&format!(
            "  MAE={mae:.4} | coverage={:.0}% over {} day(s)\n",
            coverage * 100.0,
            score.matched
        )),
        _ => out.push_str("  no realized values to score against\n"),
    }
    out
}

fn fmt_cor(cor: &Correlation) -> String {
    match cor {
        Correlation::Defined { cor, n } => format!("cor={cor:.4} (n={n})"),
        Correlation::Undefined { n, reason } => format!("cor=NA (n={n}, {reason:?})"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::UndefinedReason;

    #[test]
    fn sweep_table_marks_the_best_lag() {
        let mut entries = BTreeMap::new();
        entries.insert(-1, Correlation::Defined { cor: 0.5, n: 10 });
        entries.insert(0, Correlation::Defined { cor: 0.9, n: 11 });
        entries.insert(
            1,
            Correlation::Undefined {
                n: 1,
                reason: UndefinedReason::InsufficientOverlap,
            },
        );
        let result = LagSweepResult {
            time_type: TimeType::Week,
            method: CorrelationMethod::Kendall,
            max_lag: 1,
            entries,
        };
        let key = SignalKey::new("x", "y");
        let text = format_sweep(&key, &key, &result, Some((0, 0.9)));

        assert!(text.contains("method=kendall | lags=[-1, 1] week(s)"));
        assert!(text.lines().any(|l| l.starts_with('*') && l.contains("0.9000")));
        assert!(text.lines().any(|l| l.contains("NA")));
        assert!(text.contains("Best lag: 0 week(s)"));
    }

    #[test]
    fn catalog_lists_every_known_signal() {
        let text = format_catalog(None);
        assert!(text.contains("jhu-csse:deaths_7dav_incidence_prop"));
        assert_eq!(text.lines().count(), 2 + known_signals().count());

        let meta = SignalMetadata::from_reader(
            "data_source,signal,geo_type,min_time,max_time,time_type\n\
             jhu-csse,deaths_7dav_incidence_prop,state,2020-03-01,2023-03-01,day\n\
             jhu-csse,deaths_7dav_incidence_prop,nation,2020-03-01,2023-03-01,day\n"
                .as_bytes(),
        )
        .unwrap();
        let text = format_catalog(Some(&meta));
        let deaths = text
            .lines()
            .find(|l| l.starts_with("jhu-csse:deaths_7dav_incidence_prop"))
            .unwrap();
        assert!(deaths.contains("nation,state"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
