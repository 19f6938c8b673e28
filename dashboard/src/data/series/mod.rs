//! Series engine: turns the selected rows and the current view into plot or
//! map series, one set per panel.
//!
//! Each call is independent. Rows are grouped by the view's line variables
//! (year when plotting all years, then color, then symbol) or by country on
//! maps, every metric is reduced per group according to its field's
//! aggregation kind, and the groups are split into series per color and
//! symbol level.

mod regression;
mod stats;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

pub use regression::{fit, Fit};
pub use stats::AxisRange;

use crate::core::error::{EngineError, Result};
use crate::core::{format, metadata};
use crate::data::country::CountryTable;
use crate::data::levels::Levels;
use crate::data::observation::{AggregationKind, Column, Observation};
use crate::data::variable::{Denominator, Formula, Variable, RATIO_EPSILON};
use crate::data::view::{Regression, TimeAgg, ViewDef};

/// Columns behind the view's split roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitRefs {
    pub panel_x: Option<Column>,
    pub panel_y: Option<Column>,
    pub color: Option<Column>,
    pub symbol: Option<Column>,
}

impl SplitRefs {
    /// Map role names to columns. Demographic segments live in the `level`
    /// column; symbol is dropped when there is no color or when it names the
    /// same column as color.
    pub fn resolve(view: &ViewDef, levels: &Levels) -> Result<Self> {
        let column = |name: &str| -> Result<Option<Column>> {
            if name.is_empty() {
                Ok(None)
            } else if levels.is_demo_segment(name) {
                Ok(Some(Column::Level))
            } else {
                Column::resolve(name).map(Some)
            }
        };
        let refs = Self {
            panel_x: column(&view.x_panels)?,
            panel_y: column(&view.y_panels)?,
            color: column(&view.color)?,
            symbol: column(&view.symbol)?,
        };
        Ok(refs.color_wins())
    }

    fn color_wins(mut self) -> Self {
        if self.color.is_none() || self.symbol == self.color {
            self.symbol = None;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if let (Some(x), Some(y)) = (self.panel_x, self.panel_y) {
            if x == y {
                return Err(EngineError::MalformedGrouping(format!(
                    "both panel directions split on `{x}`"
                )));
            }
        }
        for column in [self.color, self.symbol].into_iter().flatten() {
            if column == Column::Year {
                return Err(EngineError::MalformedGrouping(
                    "year cannot drive color or symbol".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub id: String,
    pub name: String,
    /// Grid position of the owning panel.
    pub panel: usize,
    pub color: String,
    pub symbol: String,
    pub opacity: f64,
    pub color_level: Option<String>,
    pub symbol_level: Option<String>,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapValue {
    pub country: String,
    pub value: f64,
    /// Tooltip text for `value`.
    pub display: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub id: String,
    pub name: String,
    pub panel: usize,
    pub values: Vec<MapValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSeries {
    pub panel: usize,
    pub color: &'static str,
    pub fit: Fit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub label: String,
    pub x_index: usize,
    pub y_index: usize,
    pub n_x: usize,
    pub n_y: usize,
    pub n_countries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranges {
    pub x: AxisRange,
    pub y: AxisRange,
    /// Panel grid size as (columns, rows).
    pub panels: (usize, usize),
}

/// Everything a renderer needs for one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSet {
    pub lines: Vec<LineSeries>,
    pub layers: Vec<MapLayer>,
    pub fits: Vec<FitSeries>,
    pub panels: Vec<Panel>,
    pub range: Ranges,
    /// Position of each named column in a point record.
    pub var_indices: BTreeMap<String, usize>,
}

impl SeriesSet {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.layers.is_empty()
    }
}

type Key = Vec<String>;

fn key(row: &Observation, columns: &[Column]) -> Key {
    columns
        .iter()
        .map(|column| row.category(*column).into_owned())
        .collect()
}

fn distinct(rows: &[&Observation], column: Column) -> Vec<String> {
    rows.iter()
        .map(|row| row.category(column).into_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Grouping decisions derived once per call.
struct Layout {
    plot: bool,
    mean_time: bool,
    /// Normalization scope for percentages.
    scope: Vec<Column>,
    groups: Vec<Column>,
    has_year: bool,
    center: bool,
}

impl Layout {
    fn new(view: &ViewDef, refs: &SplitRefs) -> Self {
        let time_agg = view.effective_time_agg();
        let plot = view.as_plot;
        let has_year = plot && time_agg == TimeAgg::All;

        let mut scope = Vec::new();
        if has_year {
            scope.push(Column::Year);
        }
        if refs.color == Some(Column::Country) || refs.symbol == Some(Column::Country) {
            scope.push(Column::Country);
        }

        let groups: Vec<Column> = if plot {
            let mut groups = Vec::new();
            if has_year {
                groups.push(Column::Year);
            }
            groups.extend(refs.color);
            groups.extend(refs.symbol);
            groups
        } else {
            vec![Column::Country]
        };
        let center = plot
            && view.country_center
            && time_agg == TimeAgg::All
            && groups.contains(&Column::Country);

        Self {
            plot,
            mean_time: time_agg == TimeAgg::Mean,
            scope,
            groups,
            has_year,
            center,
        }
    }

    fn position(&self, column: Option<Column>) -> Option<usize> {
        let column = column?;
        self.groups.iter().position(|c| *c == column)
    }
}

/// Per-metric denominators.
#[derive(Clone)]
struct MetricPlan<'a> {
    variable: &'a Variable,
    scope: &'a [Column],
    summary_scope: Vec<Column>,
    totals: BTreeMap<Key, f64>,
    summary_totals: BTreeMap<Key, f64>,
}

impl<'a> MetricPlan<'a> {
    fn new(variable: &'a Variable, scope: &'a [Column], rows: &[&Observation]) -> Self {
        let mut summary_scope = scope.to_vec();
        summary_scope.extend(variable.summary_column());
        let mut plan = Self {
            variable,
            scope,
            summary_scope,
            totals: BTreeMap::new(),
            summary_totals: BTreeMap::new(),
        };
        if let Formula::Percent(denominator) = variable.formula() {
            plan.totals = plan.sum_by(rows, scope);
            if denominator == Denominator::SummaryLevel {
                plan.summary_totals = plan.sum_by(rows, &plan.summary_scope);
            }
        }
        plan
    }

    /// Same plan with summary-level totals taken over one panel's rows.
    fn within(&self, rows: &[&Observation]) -> Self {
        let mut plan = self.clone();
        if self.variable.formula() == Formula::Percent(Denominator::SummaryLevel) {
            plan.summary_totals = self.sum_by(rows, &self.summary_scope);
        }
        plan
    }

    fn sum_by(&self, rows: &[&Observation], columns: &[Column]) -> BTreeMap<Key, f64> {
        let base = self.variable.base();
        let mut totals = BTreeMap::new();
        for row in rows {
            *totals.entry(key(row, columns)).or_insert(0.0) += row.value(base);
        }
        totals
    }

    /// `weight` times the row's subset-restricted value, as a percentage of
    /// its denominator when the metric is a share.
    fn contribution(&self, row: &Observation, weight: f64) -> f64 {
        let value = self.variable.base_formula(row) * weight;
        let total = match self.variable.formula() {
            Formula::Percent(Denominator::Total) => self.totals.get(&key(row, self.scope)),
            Formula::Percent(Denominator::SummaryLevel) => {
                self.summary_totals.get(&key(row, &self.summary_scope))
            }
            _ => return value,
        };
        match total {
            Some(total) if *total != 0.0 => value / total * 100.0,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    off: f64,
    /// Per-year maxima for max-per-row fields; the key set doubles as the
    /// distinct years seen.
    by_year: BTreeMap<i32, f64>,
}

impl Accumulator {
    fn add(&mut self, plan: &MetricPlan<'_>, row: &Observation) {
        let variable = plan.variable;
        match variable.base().aggregation() {
            AggregationKind::MaxPerRow => {
                let value = row.value(variable.base());
                let slot = self.by_year.entry(row.year).or_insert(f64::NAN);
                *slot = slot.max(value);
            }
            AggregationKind::Sum => {
                self.by_year.entry(row.year).or_insert(0.0);
                self.sum += plan.contribution(row, variable.summary_formula(row));
                if variable.is_ratio() {
                    self.off += plan.contribution(row, variable.off_level_formula(row));
                }
            }
        }
    }

    fn finish(&self, variable: &Variable, mean_time: bool) -> f64 {
        match variable.base().aggregation() {
            AggregationKind::MaxPerRow => {
                let value = if mean_time && !variable.base().is_year() {
                    let finite: Vec<f64> =
                        self.by_year.values().copied().filter(|v| v.is_finite()).collect();
                    if finite.is_empty() {
                        f64::NAN
                    } else {
                        stats::mean(&finite)
                    }
                } else {
                    self.by_year.values().fold(f64::NAN, |acc, v| acc.max(*v))
                };
                match variable.formula() {
                    Formula::Log if value > 0.0 => value.ln(),
                    Formula::Log => f64::NAN,
                    _ => value,
                }
            }
            AggregationKind::Sum => {
                if variable.is_ratio() {
                    return if self.off.abs() < RATIO_EPSILON {
                        0.0
                    } else {
                        self.sum / self.off
                    };
                }
                if mean_time && !variable.percent() {
                    self.sum / self.by_year.len().max(1) as f64
                } else {
                    self.sum
                }
            }
        }
    }
}

struct GroupRow {
    key: Key,
    x: f64,
    y: f64,
    year: i32,
}

fn aggregate(
    rows: &[&Observation],
    layout: &Layout,
    x: Option<&MetricPlan<'_>>,
    y: &MetricPlan<'_>,
) -> Vec<GroupRow> {
    let mut groups: BTreeMap<Key, (Accumulator, Accumulator, i32)> = BTreeMap::new();
    for row in rows {
        let (x_acc, y_acc, year) = groups
            .entry(key(row, &layout.groups))
            .or_insert_with(|| (Accumulator::default(), Accumulator::default(), i32::MIN));
        if let Some(plan) = x {
            x_acc.add(plan, row);
        }
        y_acc.add(y, row);
        *year = (*year).max(row.year);
    }
    groups
        .into_iter()
        .map(|(key, (x_acc, y_acc, year))| GroupRow {
            key,
            x: x.map_or(f64::NAN, |plan| x_acc.finish(plan.variable, layout.mean_time)),
            y: y_acc.finish(y.variable, layout.mean_time),
            year,
        })
        .collect()
}

/// Subtract each country's mean so series share an origin.
fn center_by_country(groups: &mut [GroupRow], country: usize) {
    let mut values: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for group in groups.iter() {
        let (xs, ys) = values.entry(group.key[country].clone()).or_default();
        if group.x.is_finite() {
            xs.push(group.x);
        }
        if group.y.is_finite() {
            ys.push(group.y);
        }
    }
    let means: BTreeMap<String, (f64, f64)> = values
        .into_iter()
        .map(|(code, (xs, ys))| (code, (stats::mean(&xs), stats::mean(&ys))))
        .collect();
    for group in groups.iter_mut() {
        if let Some((mx, my)) = means.get(&group.key[country]) {
            group.x -= mx;
            group.y -= my;
        }
    }
}

/// `x_panels: sex` + `Female` -> `Gender: Female`, first letters capitalized.
fn panel_label(view: &ViewDef, x_level: &str, y_level: &str) -> String {
    let mut parts = Vec::new();
    if !x_level.is_empty() {
        parts.push(format!("{}: {x_level}", metadata::label(&view.x_panels)));
    }
    if !y_level.is_empty() {
        parts.push(format!("{}: {y_level}", metadata::label(&view.y_panels)));
    }
    capitalize_words(&parts.join(", ").replace('_', " "))
}

fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        let word_char = c.is_alphanumeric() || c == '_';
        if word_char && !in_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        in_word = word_char;
    }
    out
}

struct SeriesStyle {
    name: String,
    color: String,
    symbol: String,
    opacity: f64,
}

/// Color and symbol assignment shared by every panel.
struct Styler<'a> {
    view: &'a ViewDef,
    refs: &'a SplitRefs,
    countries: &'a CountryTable,
    color_index: BTreeMap<String, usize>,
    symbol_index: BTreeMap<String, usize>,
}

impl<'a> Styler<'a> {
    fn new(
        rows: &[&Observation],
        view: &'a ViewDef,
        refs: &'a SplitRefs,
        countries: &'a CountryTable,
    ) -> Self {
        let index = |column: Option<Column>| -> BTreeMap<String, usize> {
            column
                .map(|column| {
                    distinct(rows, column)
                        .into_iter()
                        .enumerate()
                        .map(|(i, level)| (level, i))
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            view,
            refs,
            countries,
            color_index: index(refs.color),
            symbol_index: index(refs.symbol),
        }
    }

    fn style(&self, color_level: Option<&str>, symbol_level: Option<&str>, label: &str) -> SeriesStyle {
        let Some(color_level) = color_level else {
            return SeriesStyle {
                name: "series".into(),
                color: metadata::UNCOLORED_SERIES_COLOR.into(),
                symbol: metadata::DEFAULT_SYMBOL.into(),
                opacity: 1.0,
            };
        };

        let (mut name, color) = if self.refs.color == Some(Column::Country) {
            let source = self.view.color_source;
            match self.countries.get(color_level) {
                Some(info) => (
                    info.legend_name(source).to_string(),
                    info.color(source).unwrap_or(metadata::FALLBACK_COLOR).to_string(),
                ),
                None => (
                    if color_level.is_empty() { label } else { color_level }.to_string(),
                    metadata::FALLBACK_COLOR.to_string(),
                ),
            }
        } else {
            let palette = &metadata::CATEGORY_COLORS;
            let index = self.color_index.get(color_level).copied().unwrap_or(0);
            (color_level.to_string(), palette[index % palette.len()].to_string())
        };

        match symbol_level {
            Some(symbol_level) => {
                name.push_str(", ");
                name.push_str(symbol_level);
                let index = self.symbol_index.get(symbol_level).copied().unwrap_or(0);
                SeriesStyle {
                    name,
                    color,
                    symbol: metadata::SYMBOLS[index % metadata::SYMBOLS.len()].into(),
                    opacity: 0.8,
                }
            }
            None => SeriesStyle {
                name,
                color,
                symbol: metadata::DEFAULT_SYMBOL.into(),
                opacity: 1.0,
            },
        }
    }
}

/// Build the series for `rows` (already filtered) under `view`.
pub fn make_series(
    rows: &[&Observation],
    view: &ViewDef,
    refs: &SplitRefs,
    countries: &CountryTable,
) -> Result<SeriesSet> {
    let refs = &refs.color_wins();
    refs.validate()?;
    let layout = Layout::new(view, refs);

    let panel_levels = |column: Option<Column>| match column {
        Some(column) => distinct(rows, column),
        None => vec![String::new()],
    };
    let x_levels = panel_levels(refs.panel_x);
    let y_levels = panel_levels(refs.panel_y);
    let (n_x, n_y) = (x_levels.len(), y_levels.len());

    let y_plan = MetricPlan::new(&view.y, &layout.scope, rows);
    let x_plan = layout
        .plot
        .then(|| MetricPlan::new(&view.x, &layout.scope, rows));
    let styler = Styler::new(rows, view, refs, countries);

    let color_pos = layout.position(refs.color);
    let symbol_pos = layout.position(refs.symbol);
    let country_pos = layout.position(Some(Column::Country));

    let mut set = SeriesSet {
        lines: Vec::new(),
        layers: Vec::new(),
        fits: Vec::new(),
        panels: Vec::new(),
        range: Ranges {
            x: AxisRange::default(),
            y: AxisRange::default(),
            panels: (n_x, n_y),
        },
        var_indices: var_indices(&layout),
    };

    for (xi, x_level) in x_levels.iter().enumerate() {
        for (yi, y_level) in y_levels.iter().enumerate() {
            let index = xi * n_y + yi;
            let in_panel = |row: &&Observation| {
                refs.panel_x.map_or(true, |c| row.category(c) == x_level.as_str())
                    && refs.panel_y.map_or(true, |c| row.category(c) == y_level.as_str())
            };
            let panel_rows: Vec<&Observation> = rows.iter().copied().filter(in_panel).collect();
            if panel_rows.is_empty() {
                continue;
            }
            let label = panel_label(view, x_level, y_level);

            let (y_panel_plan, x_panel_plan) = if view.within_split {
                (
                    y_plan.within(&panel_rows),
                    x_plan.as_ref().map(|plan| plan.within(&panel_rows)),
                )
            } else {
                (y_plan.clone(), x_plan.clone())
            };
            let mut groups = aggregate(&panel_rows, &layout, x_panel_plan.as_ref(), &y_panel_plan);
            if layout.center {
                if let Some(country) = country_pos {
                    center_by_country(&mut groups, country);
                }
            }

            set.range.y.merge(&AxisRange::of(groups.iter().map(|g| g.y)));
            let year_of = |group: &GroupRow| (!layout.mean_time).then_some(group.year);
            set.panels.push(Panel {
                label: label.clone(),
                x_index: xi,
                y_index: yi,
                n_x,
                n_y,
                n_countries: distinct(&panel_rows, Column::Country).len(),
            });

            if !layout.plot {
                set.layers.push(MapLayer {
                    id: format!("{x_level}{y_level}"),
                    name: label,
                    panel: index,
                    values: groups
                        .iter()
                        .map(|group| MapValue {
                            country: group.key[0].clone(),
                            value: group.y,
                            display: format::format_value(group.y, Some(&view.y)),
                            year: year_of(group),
                        })
                        .collect(),
                });
                continue;
            }

            set.range.x.merge(&AxisRange::of(groups.iter().map(|g| g.x)));

            let mut partitions: BTreeMap<(Option<String>, Option<String>), Vec<Point>> =
                BTreeMap::new();
            for group in &groups {
                let color_level = color_pos.map(|i| group.key[i].clone());
                let symbol_level = symbol_pos.map(|i| group.key[i].clone());
                partitions
                    .entry((color_level, symbol_level))
                    .or_default()
                    .push(Point {
                        x: group.x,
                        y: group.y,
                        year: year_of(group),
                    });
            }

            for ((color_level, symbol_level), mut points) in partitions {
                if layout.has_year {
                    points.sort_by_key(|point| point.year);
                }
                let style = styler.style(color_level.as_deref(), symbol_level.as_deref(), &label);
                set.lines.push(LineSeries {
                    id: format!(
                        "{x_level}{y_level}{}{}",
                        color_level.as_deref().unwrap_or_default(),
                        symbol_level.as_deref().unwrap_or_default()
                    ),
                    name: style.name,
                    panel: index,
                    color: style.color,
                    symbol: style.symbol,
                    opacity: style.opacity,
                    color_level,
                    symbol_level,
                    points,
                });
            }

            if view.regression != Regression::None {
                let data: Vec<[f64; 2]> = groups.iter().map(|g| [g.x, g.y]).collect();
                if let Some(fit) = regression::fit(view.regression, &data) {
                    set.fits.push(FitSeries {
                        panel: index,
                        color: metadata::FIT_COLOR,
                        fit,
                    });
                }
            }
        }
    }

    debug!(
        rows = rows.len(),
        panels = set.panels.len(),
        lines = set.lines.len(),
        layers = set.layers.len(),
        fits = set.fits.len(),
        "built series"
    );
    Ok(set)
}

fn var_indices(layout: &Layout) -> BTreeMap<String, usize> {
    let names: Vec<&str> = if layout.plot {
        let mut names = vec!["x", "y"];
        names.extend(layout.groups.iter().map(|column| column.name()));
        if !layout.has_year && !layout.mean_time {
            names.push("year");
        }
        names
    } else {
        let mut names = vec!["country", "value"];
        if !layout.mean_time {
            names.push("year");
        }
        names
    };
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), i))
        .collect()
}
