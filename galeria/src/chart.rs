//! Comparison charts for the results page.
//!
//! The page embeds a JSON bundle with a `labels` array (one entry per
//! gallery) and a set of numeric series. Series are normalized to the label
//! count and grouped into a fixed layout of bar, stacked-bar and radar charts.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::coerce::{coerce_number, js_string};
use crate::GaleriaError;

/// Every series key the results page may embed.
pub const SERIES_KEYS: [&str; 28] = [
    "be_inv_total",
    "be_inv_loc",
    "be_inv_parq",
    "be_inv_zonas",
    "be_ing_total",
    "be_ing_arr",
    "be_ing_adm",
    "be_ing_parq",
    "be_egr_total",
    "be_egr_mant",
    "be_egr_serv",
    "be_egr_sal",
    "be_egr_ope",
    "be_egr_adm",
    "be_egr_leg",
    "be_egr_imp",
    "bs_acces",
    "bs_emp_dir",
    "bs_emp_ind",
    "bs_calidad",
    "ar_af",
    "ar_cp",
    "ar_nal",
    "ar_sc",
    "idx_mun",
    "idx_bc",
    "idx_bs_idx",
    "idx_fitness",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Bar,
    MultiBar { stacked: bool },
    Radar,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChartSpec {
    pub canvas_id: &'static str,
    pub title: &'static str,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

struct ChartLayout {
    canvas_id: &'static str,
    title: &'static str,
    kind: ChartKind,
    series: &'static [(&'static str, &'static str)],
}

const LAYOUT: &[ChartLayout] = &[
    ChartLayout {
        canvas_id: "chartInvTotal",
        title: "Inversión total",
        kind: ChartKind::Bar,
        series: &[("Inversión total", "be_inv_total")],
    },
    ChartLayout {
        canvas_id: "chartInvDesglose",
        title: "Desglose de inversión",
        kind: ChartKind::MultiBar { stacked: true },
        series: &[
            ("Locales", "be_inv_loc"),
            ("Parqueaderos", "be_inv_parq"),
            ("Zonas comunes", "be_inv_zonas"),
        ],
    },
    ChartLayout {
        canvas_id: "chartIngEgrTotal",
        title: "Ingresos vs egresos",
        kind: ChartKind::MultiBar { stacked: false },
        series: &[("Ingresos", "be_ing_total"), ("Egresos", "be_egr_total")],
    },
    ChartLayout {
        canvas_id: "chartIngDesglose",
        title: "Desglose de ingresos",
        kind: ChartKind::MultiBar { stacked: true },
        series: &[
            ("Arrendamiento", "be_ing_arr"),
            ("Administración", "be_ing_adm"),
            ("Parqueadero", "be_ing_parq"),
        ],
    },
    ChartLayout {
        canvas_id: "chartEgrDesglose",
        title: "Desglose de egresos",
        kind: ChartKind::MultiBar { stacked: true },
        series: &[
            ("Mantenimiento", "be_egr_mant"),
            ("Servicios públicos", "be_egr_serv"),
            ("Salarios", "be_egr_sal"),
            ("Operativos", "be_egr_ope"),
            ("Administrativos", "be_egr_adm"),
            ("Legales", "be_egr_leg"),
            ("Impuestos/Licencias", "be_egr_imp"),
        ],
    },
    ChartLayout {
        canvas_id: "chartEmpleo",
        title: "Empleo generado",
        kind: ChartKind::MultiBar { stacked: false },
        series: &[
            ("Empleo directo", "bs_emp_dir"),
            ("Empleo indirecto", "bs_emp_ind"),
        ],
    },
    ChartLayout {
        canvas_id: "chartAccCal",
        title: "Accesibilidad y calidad de vida",
        kind: ChartKind::Radar,
        series: &[("Accesibilidad", "bs_acces"), ("Calidad de vida", "bs_calidad")],
    },
    ChartLayout {
        canvas_id: "chartSocial",
        title: "Beneficio social",
        kind: ChartKind::MultiBar { stacked: false },
        series: &[
            ("Accesibilidad", "bs_acces"),
            ("Empleo directo", "bs_emp_dir"),
            ("Empleo indirecto", "bs_emp_ind"),
            ("Calidad de vida", "bs_calidad"),
        ],
    },
    ChartLayout {
        canvas_id: "chartAreas",
        title: "Distribución de áreas",
        kind: ChartKind::MultiBar { stacked: true },
        series: &[
            ("Alimentos frescos", "ar_af"),
            ("Comidas preparadas", "ar_cp"),
            ("No alimentarios", "ar_nal"),
            ("Esp. complementarios", "ar_sc"),
        ],
    },
    ChartLayout {
        canvas_id: "chartIndices",
        title: "Índices comparativos",
        kind: ChartKind::Radar,
        series: &[
            ("MUN", "idx_mun"),
            ("B/C", "idx_bc"),
            ("Benef. social", "idx_bs_idx"),
            ("Fitness", "idx_fitness"),
        ],
    },
];

/// Parsed chart payload. Series are kept raw and normalized on access.
#[derive(Clone, Debug, Default)]
pub struct ChartBundle {
    labels: Vec<String>,
    raw: Map<String, Value>,
}

impl ChartBundle {
    /// Parse the embedded JSON text. A non-object payload yields an empty bundle.
    pub fn from_json(text: &str) -> Result<Self, GaleriaError> {
        let trimmed = text.trim();
        let value: Value = if trimmed.is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(trimmed)?
        };
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        let raw = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let labels = match raw.get("labels") {
            Some(Value::Array(items)) => items.iter().map(js_string).collect(),
            _ => Vec::new(),
        };
        Self { labels, raw }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Keys present in the payload that no chart reads.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.raw
            .keys()
            .map(String::as_str)
            .filter(|k| *k != "labels" && !SERIES_KEYS.contains(k))
            .collect()
    }

    /// Series `key` coerced to numbers and fitted to the label count.
    pub fn series(&self, key: &str) -> Vec<f64> {
        let values: Vec<f64> = match self.raw.get(key) {
            Some(Value::Array(items)) => items.iter().map(coerce_number).collect(),
            _ => Vec::new(),
        };
        normalize_series(values, self.labels.len())
    }
}

/// Truncate or zero-pad `values` to exactly `len` entries.
pub fn normalize_series(mut values: Vec<f64>, len: usize) -> Vec<f64> {
    values.resize(len, 0.0);
    values
}

/// Build the fixed comparison layout from `bundle`.
pub fn comparison_charts(bundle: &ChartBundle) -> Result<Vec<ChartSpec>, GaleriaError> {
    if bundle.labels.is_empty() {
        return Err(GaleriaError::EmptyLabels);
    }
    let specs = LAYOUT
        .iter()
        .map(|layout| ChartSpec {
            canvas_id: layout.canvas_id,
            title: layout.title,
            kind: layout.kind,
            labels: bundle.labels.clone(),
            datasets: layout
                .series
                .iter()
                .map(|(label, key)| Dataset {
                    label: (*label).to_string(),
                    data: bundle.series(key),
                })
                .collect(),
        })
        .collect();
    Ok(specs)
}

impl ChartSpec {
    pub fn is_stacked(&self) -> bool {
        matches!(self.kind, ChartKind::MultiBar { stacked: true })
    }

    /// Radial scale hint for radar charts: the larger of 1 and the maximum
    /// value across the first two datasets.
    pub fn suggested_max(&self) -> Option<f64> {
        if self.kind != ChartKind::Radar {
            return None;
        }
        let max = self
            .datasets
            .iter()
            .take(2)
            .flat_map(|d| d.data.iter().copied())
            .fold(1.0_f64, f64::max);
        Some(max)
    }

    /// Value-axis extent including zero. Stacked charts stack positive and
    /// negative values separately per category.
    pub fn value_range(&self) -> (f64, f64) {
        let (mut lo, mut hi) = (0.0_f64, 0.0_f64);
        if self.is_stacked() {
            for i in 0..self.labels.len() {
                let (mut neg, mut pos) = (0.0, 0.0);
                for v in self.datasets.iter().filter_map(|d| d.data.get(i).copied()) {
                    if v < 0.0 {
                        neg += v;
                    } else {
                        pos += v;
                    }
                }
                lo = lo.min(neg);
                hi = hi.max(pos);
            }
        } else {
            for v in self.datasets.iter().flat_map(|d| d.data.iter().copied()) {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if hi <= lo {
            hi = lo + 1.0;
        }
        (lo, hi)
    }

    /// Chart.js configuration object for this chart.
    pub fn to_chartjs_config(&self) -> Value {
        let legend = json!({ "position": "top" });
        match self.kind {
            ChartKind::Bar | ChartKind::MultiBar { .. } => {
                let datasets: Vec<Value> = self
                    .datasets
                    .iter()
                    .map(|d| json!({ "label": d.label, "data": d.data, "borderWidth": 1 }))
                    .collect();
                let scales = match self.kind {
                    ChartKind::MultiBar { stacked } => json!({
                        "x": { "stacked": stacked },
                        "y": { "beginAtZero": true, "stacked": stacked }
                    }),
                    _ => json!({ "y": { "beginAtZero": true } }),
                };
                json!({
                    "type": "bar",
                    "data": { "labels": self.labels, "datasets": datasets },
                    "options": {
                        "responsive": true,
                        "maintainAspectRatio": false,
                        "scales": scales,
                        "plugins": {
                            "legend": legend,
                            "tooltip": { "mode": "index", "intersect": false }
                        }
                    }
                })
            }
            ChartKind::Radar => {
                let datasets: Vec<Value> = self
                    .datasets
                    .iter()
                    .map(|d| {
                        json!({ "label": d.label, "data": d.data, "borderWidth": 1, "fill": true })
                    })
                    .collect();
                json!({
                    "type": "radar",
                    "data": { "labels": self.labels, "datasets": datasets },
                    "options": {
                        "responsive": true,
                        "maintainAspectRatio": false,
                        "plugins": { "legend": legend },
                        "scales": {
                            "r": {
                                "beginAtZero": true,
                                "suggestedMax": self.suggested_max().unwrap_or(1.0),
                                "ticks": { "showLabelBackdrop": false }
                            }
                        }
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(value: Value) -> ChartBundle {
        ChartBundle::from_value(value)
    }

    #[test]
    fn short_series_are_zero_padded() {
        let b = bundle(json!({ "labels": ["a", "b", "c", "d"], "be_inv_total": [1, 2] }));
        assert_eq!(b.series("be_inv_total"), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn long_series_are_truncated() {
        let b = bundle(json!({ "labels": ["a", "b"], "idx_mun": [5, 6, 7, 8] }));
        assert_eq!(b.series("idx_mun"), vec![5.0, 6.0]);
    }

    #[test]
    fn non_numeric_entries_become_zero() {
        let b = bundle(json!({ "labels": [1, 2, 3], "ar_af": ["x", null, "2.5"] }));
        assert_eq!(b.series("ar_af"), vec![0.0, 0.0, 2.5]);
        assert_eq!(b.labels(), &["1", "2", "3"]);
    }

    #[test]
    fn missing_or_non_array_series_is_all_zero() {
        let b = bundle(json!({ "labels": ["a", "b"], "bs_acces": "nope" }));
        assert_eq!(b.series("bs_acces"), vec![0.0, 0.0]);
        assert_eq!(b.series("idx_bc"), vec![0.0, 0.0]);
    }

    #[test]
    fn layout_reads_only_known_series() {
        for layout in LAYOUT {
            for (_, key) in layout.series {
                assert!(SERIES_KEYS.contains(key), "{key}");
            }
        }
        let b = bundle(json!({ "labels": ["a"], "idx_mun": [1], "extra": [2] }));
        assert_eq!(b.unknown_keys(), vec!["extra"]);
    }

    #[test]
    fn empty_labels_build_no_charts() {
        let b = bundle(json!({ "labels": [], "be_inv_total": [1, 2, 3] }));
        assert!(matches!(comparison_charts(&b), Err(GaleriaError::EmptyLabels)));
        let not_object = ChartBundle::from_json("[1, 2]").unwrap();
        assert!(comparison_charts(&not_object).is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            ChartBundle::from_json("{labels: ["),
            Err(GaleriaError::Json(_))
        ));
        assert!(ChartBundle::from_json("").unwrap().labels().is_empty());
    }

    #[test]
    fn layout_covers_every_canvas() {
        let b = bundle(json!({ "labels": ["G1", "G2"] }));
        let specs = comparison_charts(&b).unwrap();
        let ids: Vec<&str> = specs.iter().map(|s| s.canvas_id).collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.contains(&"chartInvTotal"));
        assert!(ids.contains(&"chartIndices"));
        for spec in &specs {
            for ds in &spec.datasets {
                assert_eq!(ds.data.len(), 2, "{} / {}", spec.canvas_id, ds.label);
            }
        }
        let egr = specs.iter().find(|s| s.canvas_id == "chartEgrDesglose").unwrap();
        assert_eq!(egr.datasets.len(), 7);
        assert!(egr.is_stacked());
    }

    #[test]
    fn radar_suggested_max_uses_first_two_datasets() {
        let b = bundle(json!({
            "labels": ["a", "b"],
            "idx_mun": [0.2, 0.4],
            "idx_bc": [3.5, 0.1],
            "idx_bs_idx": [99, 99]
        }));
        let specs = comparison_charts(&b).unwrap();
        let indices = specs.iter().find(|s| s.canvas_id == "chartIndices").unwrap();
        assert_eq!(indices.suggested_max(), Some(3.5));

        let acc = specs.iter().find(|s| s.canvas_id == "chartAccCal").unwrap();
        assert_eq!(acc.suggested_max(), Some(1.0));

        let bar = specs.iter().find(|s| s.canvas_id == "chartInvTotal").unwrap();
        assert_eq!(bar.suggested_max(), None);
    }

    #[test]
    fn stacking_is_only_a_rendering_option() {
        let b = bundle(json!({
            "labels": ["a"],
            "be_inv_loc": [10],
            "be_inv_parq": [5],
            "be_inv_zonas": [1]
        }));
        let specs = comparison_charts(&b).unwrap();
        let inv = specs.iter().find(|s| s.canvas_id == "chartInvDesglose").unwrap();
        assert_eq!(inv.datasets[0].data, vec![10.0]);
        assert_eq!(inv.datasets[1].data, vec![5.0]);
        assert_eq!(inv.value_range(), (0.0, 16.0));

        let config = inv.to_chartjs_config();
        assert_eq!(config["type"], "bar");
        assert_eq!(config["options"]["scales"]["y"]["stacked"], true);
        assert_eq!(config["options"]["scales"]["x"]["stacked"], true);
    }

    #[test]
    fn value_range_spans_negatives() {
        let b = bundle(json!({ "labels": ["a", "b"], "be_ing_total": [-4, 3], "be_egr_total": [2, 8] }));
        let specs = comparison_charts(&b).unwrap();
        let totals = specs.iter().find(|s| s.canvas_id == "chartIngEgrTotal").unwrap();
        assert_eq!(totals.value_range(), (-4.0, 8.0));

        let empty = bundle(json!({ "labels": ["a"] }));
        let specs = comparison_charts(&empty).unwrap();
        assert_eq!(specs[0].value_range(), (0.0, 1.0));
    }

    #[test]
    fn radar_config_carries_scale_hint() {
        let b = bundle(json!({ "labels": ["a"], "bs_acces": [4.0] }));
        let specs = comparison_charts(&b).unwrap();
        let acc = specs.iter().find(|s| s.canvas_id == "chartAccCal").unwrap();
        let config = acc.to_chartjs_config();
        assert_eq!(config["type"], "radar");
        assert_eq!(config["options"]["scales"]["r"]["suggestedMax"], 4.0);
        assert_eq!(config["data"]["datasets"][0]["fill"], true);
    }
}
