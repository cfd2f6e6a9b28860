//! C9 Visualization Chooser.

use crate::domain::{ChartKind, ChartSpec, Encoding, ResultSet};

const EXPLICIT_CHART_PHRASES: &[(&str, ChartKind)] = &[
    ("bar chart", ChartKind::Bar),
    ("pie chart", ChartKind::Pie),
    ("scatter plot", ChartKind::Scatter),
    ("histogram", ChartKind::Histogram),
    ("line chart", ChartKind::Line),
    ("treemap", ChartKind::Treemap),
    ("heatmap", ChartKind::Heatmap),
];

const DATE_NAME_HINTS: &[&str] = &["date", "time", "year", "month", "day"];

struct Features {
    column_count: usize,
    row_count: usize,
    has_date_column: bool,
    date_column: Option<String>,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
}

fn column_looks_numeric(result: &ResultSet, index: usize) -> bool {
    result
        .rows
        .iter()
        .filter_map(|row| row.get(index))
        .all(|v| v.is_null() || v.is_number())
        && result.rows.iter().any(|row| row.get(index).map(|v| v.is_number()).unwrap_or(false))
}

fn unique_count(result: &ResultSet, index: usize) -> usize {
    let mut seen = std::collections::HashSet::new();
    for row in &result.rows {
        if let Some(v) = row.get(index) {
            seen.insert(v.to_string());
        }
    }
    seen.len()
}

fn derive_features(result: &ResultSet) -> Features {
    let column_count = result.columns.len();
    let row_count = result.row_count;

    let date_column = result
        .columns
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            DATE_NAME_HINTS.iter().any(|h| lower.contains(h))
        })
        .cloned();

    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();
    for (i, name) in result.columns.iter().enumerate() {
        if Some(name) == date_column.as_ref() {
            continue;
        }
        if column_looks_numeric(result, i) {
            numeric_columns.push(name.clone());
        } else {
            let ratio = if row_count == 0 { 0.0 } else { unique_count(result, i) as f64 / row_count as f64 };
            if ratio < 0.5 {
                categorical_columns.push(name.clone());
            }
        }
    }

    Features {
        column_count,
        row_count,
        has_date_column: date_column.is_some(),
        date_column,
        numeric_columns,
        categorical_columns,
    }
}

/// Score the §4.9 rule table against `f`, returning every rule that matched.
/// `columns=1 ∧ rows=1` scores `value` — the only rule with no axis to
/// encode — ahead of everything else, since a single scalar never also
/// matches the 2-column rules.
fn score_rules(f: &Features) -> Vec<(ChartKind, f32)> {
    let mut scores = Vec::new();

    if f.has_date_column && f.column_count >= 2 && f.row_count >= 2 {
        scores.push((ChartKind::Line, 1.0));
    }
    if f.column_count == 1 && f.row_count == 1 {
        scores.push((ChartKind::Value, 0.95));
    }
    if f.column_count == 2 && (1..=10).contains(&f.row_count) {
        scores.push((ChartKind::Bar, 0.8));
    }
    if !f.numeric_columns.is_empty() && f.row_count >= 10 {
        scores.push((ChartKind::Histogram, 0.7));
    }
    if f.numeric_columns.len() >= 2 && f.row_count >= 5 {
        scores.push((ChartKind::Scatter, 0.85));
    }
    if f.column_count == 2 && (2..=10).contains(&f.row_count) {
        scores.push((ChartKind::Pie, 0.6));
    }
    if f.categorical_columns.len() >= 2 {
        scores.push((ChartKind::Treemap, 0.55));
    }

    scores
}

/// Choose a chart for `result`, optionally steered by an explicit mention in
/// `utterance` (§4.9 step 1 takes precedence over the scored rule table).
pub fn choose_chart(result: &ResultSet, utterance: Option<&str>) -> ChartSpec {
    if let Some(utterance) = utterance {
        let lower = utterance.to_lowercase();
        for (phrase, kind) in EXPLICIT_CHART_PHRASES {
            if lower.contains(phrase) {
                return build_spec(result, *kind, 0.9, format!("utterance explicitly named \"{phrase}\""));
            }
        }
    }

    let features = derive_features(result);
    let scores = score_rules(&features);
    let best = scores.into_iter().max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    match best {
        Some((kind, score)) if score >= 0.5 => {
            build_spec(result, kind, score, "matched visualization rule table".to_string())
        }
        _ if features.row_count > 10 => build_spec(
            result,
            ChartKind::Table,
            0.3,
            "no rule scored above threshold; row count exceeds 10, recommend tabular view".to_string(),
        ),
        _ => build_spec(result, ChartKind::Bar, 0.4, "no rule scored above threshold; defaulted to bar".to_string()),
    }
}

fn build_spec(result: &ResultSet, kind: ChartKind, confidence: f32, reason: String) -> ChartSpec {
    let features = derive_features(result);
    let encoding = match kind {
        ChartKind::Line | ChartKind::Bar | ChartKind::Pie | ChartKind::Area => Encoding {
            x: features.date_column.clone().or_else(|| features.categorical_columns.first().cloned()),
            y: features.numeric_columns.first().cloned(),
            color: None,
            size: None,
        },
        ChartKind::Scatter => Encoding {
            x: features.numeric_columns.first().cloned(),
            y: features.numeric_columns.get(1).cloned(),
            color: None,
            size: None,
        },
        ChartKind::Histogram => Encoding {
            x: features.numeric_columns.first().cloned(),
            y: None,
            color: None,
            size: None,
        },
        ChartKind::Value => Encoding {
            x: None,
            y: result.columns.first().cloned(),
            color: None,
            size: None,
        },
        _ => Encoding::empty(),
    };

    ChartSpec::new(kind, encoding, confidence, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(columns: Vec<&str>, rows: Vec<Vec<serde_json::Value>>) -> ResultSet {
        let mut rs = ResultSet::empty("default", columns.into_iter().map(str::to_string).collect());
        rs.row_count = rows.len();
        rs.rows = rows;
        rs
    }

    #[test]
    fn test_explicit_bar_chart_phrase_wins() {
        let result = result_with(vec!["month", "total"], vec![vec![serde_json::json!("Jan"), serde_json::json!(10)]]);
        let spec = choose_chart(&result, Some("show me a bar chart of sales"));
        assert_eq!(spec.kind, ChartKind::Bar);
        assert_eq!(spec.confidence, 0.9);
    }

    #[test]
    fn test_single_scalar_result_yields_value_chart() {
        let result = result_with(vec!["count"], vec![vec![serde_json::json!(42)]]);
        let spec = choose_chart(&result, None);
        assert_eq!(spec.kind, ChartKind::Value);
    }

    #[test]
    fn test_date_and_numeric_column_yields_line_chart() {
        let rows: Vec<Vec<serde_json::Value>> = (1..=12)
            .map(|m| vec![serde_json::json!(format!("2024-{m:02}-01")), serde_json::json!(m * 100)])
            .collect();
        let result = result_with(vec!["month_date", "total"], rows);
        let spec = choose_chart(&result, None);
        assert_eq!(spec.kind, ChartKind::Line);
        assert_eq!(spec.encoding.x.as_deref(), Some("month_date"));
        assert_eq!(spec.encoding.y.as_deref(), Some("total"));
    }

    #[test]
    fn test_large_unscored_result_recommends_table() {
        let rows: Vec<Vec<serde_json::Value>> = (0..50)
            .map(|i| vec![serde_json::json!(format!("id-{i}")), serde_json::json!(format!("name-{i}")), serde_json::json!(format!("extra-{i}"))])
            .collect();
        let result = result_with(vec!["id", "name", "extra"], rows);
        let spec = choose_chart(&result, None);
        assert_eq!(spec.kind, ChartKind::Table);
    }

    #[test]
    fn test_two_numeric_columns_enough_rows_yields_scatter() {
        let rows: Vec<Vec<serde_json::Value>> = (0..8)
            .map(|i| vec![serde_json::json!(i), serde_json::json!(i * 2)])
            .collect();
        let result = result_with(vec!["x", "y"], rows);
        let spec = choose_chart(&result, None);
        assert_eq!(spec.kind, ChartKind::Scatter);
    }
}
