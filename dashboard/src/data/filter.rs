//! Filter state and the row selection it drives.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::data::levels::Levels;
use crate::data::observation::Observation;
use crate::data::view::{TimeAgg, ViewDef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDef {
    pub demo_seg: String,
    pub countries: BTreeSet<String>,
    pub sectors: Vec<String>,
    pub sexes: Vec<String>,
    pub min_year: i32,
    pub max_year: i32,
}

impl FilterDef {
    /// Everything selected over the full year range.
    pub fn from_levels(levels: &Levels) -> Self {
        Self {
            demo_seg: "total".into(),
            countries: levels.countries.iter().cloned().collect(),
            sectors: levels.sectors.clone(),
            sexes: levels.sexes.clone(),
            min_year: levels.base_year_range.0,
            max_year: levels.base_year_range.1,
        }
    }

    fn sanitized(mut self, levels: &Levels) -> Self {
        self.sectors = known_only(self.sectors, &levels.sectors, "sector");
        self.sexes = known_only(self.sexes, &levels.sexes, "sex");
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    Reset,
    Replace(FilterDef),
    DemoSeg(String),
    MinYear(i32),
    MaxYear(i32),
    Countries(BTreeSet<String>),
    Sectors(Vec<String>),
    Sexes(Vec<String>),
}

pub fn reduce_filter(state: &FilterDef, action: FilterAction, levels: &Levels) -> FilterDef {
    trace!(?action, "filter action");
    let mut next = state.clone();
    match action {
        FilterAction::Reset => next = FilterDef::from_levels(levels),
        FilterAction::Replace(filter) => next = filter.sanitized(levels),
        FilterAction::DemoSeg(value) => next.demo_seg = value,
        FilterAction::MinYear(year) => next.min_year = year,
        FilterAction::MaxYear(year) => next.max_year = year,
        FilterAction::Countries(countries) => next.countries = countries,
        FilterAction::Sectors(sectors) => next.sectors = known_only(sectors, &levels.sectors, "sector"),
        FilterAction::Sexes(sexes) => next.sexes = known_only(sexes, &levels.sexes, "sex"),
    }
    next
}

/// Drop values outside the catalog; the rest come back sorted.
fn known_only(mut values: Vec<String>, known: &[String], what: &str) -> Vec<String> {
    values.retain(|value| {
        let ok = known.contains(value);
        if !ok {
            warn!(what, value = %value, "dropping unknown filter value");
        }
        ok
    });
    values.sort();
    values.dedup();
    values
}

/// Rows the current filter and time handling admit, in input order.
pub fn select_rows<'a>(
    rows: &'a [Observation],
    filter: &FilterDef,
    view: &ViewDef,
    levels: &Levels,
) -> Vec<&'a Observation> {
    let segment = view
        .active_segment(levels)
        .unwrap_or(filter.demo_seg.as_str());
    let time_agg = view.effective_time_agg();
    let in_years = |year: i32| {
        if time_agg == TimeAgg::Specified {
            year == view.select_year
        } else {
            (filter.min_year..=filter.max_year).contains(&year)
        }
    };

    let selected: Vec<&Observation> = rows
        .iter()
        .filter(|row| row.variable == segment)
        .filter(|row| filter.countries.contains(&row.country))
        .filter(|row| filter.sexes.contains(&row.sex))
        .filter(|row| filter.sectors.contains(&row.main_activity))
        .filter(|row| in_years(row.year))
        .collect();

    let selected = match time_agg {
        TimeAgg::First | TimeAgg::Last => {
            let mut extreme: BTreeMap<&str, i32> = BTreeMap::new();
            for row in selected.iter().copied() {
                extreme
                    .entry(row.country.as_str())
                    .and_modify(|year| {
                        *year = if time_agg == TimeAgg::First {
                            (*year).min(row.year)
                        } else {
                            (*year).max(row.year)
                        }
                    })
                    .or_insert(row.year);
            }
            selected
                .into_iter()
                .filter(|row| extreme.get(row.country.as_str()) == Some(&row.year))
                .collect()
        }
        _ => selected,
    };

    debug!(
        segment,
        ?time_agg,
        rows = rows.len(),
        selected = selected.len(),
        "selected rows"
    );
    selected
}
