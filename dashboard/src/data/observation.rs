//! Survey rows and the static vocabulary used to address them.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::metadata::{self, FieldInfo};

/// One aggregated survey cell: a (country, year, segment, level, activity,
/// sex) combination joined with that country-year's macro indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub country: String,
    pub year: i32,
    /// Demographic segment name, or `"total"` for unsegmented rows.
    pub variable: String,
    #[serde(default)]
    pub level: String,
    pub main_activity: String,
    pub sex: String,
    pub count: f64,
    pub weight: f64,
    #[serde(default = "missing")]
    pub gdp: f64,
    #[serde(default = "missing")]
    pub gdp_ppp: f64,
    #[serde(default = "missing")]
    pub population: f64,
}

fn missing() -> f64 {
    f64::NAN
}

impl Observation {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Year => self.year as f64,
            Field::Count => self.count,
            Field::Weight => self.weight,
            Field::Gdp => self.gdp,
            Field::GdpPpp => self.gdp_ppp,
            Field::Population => self.population,
        }
    }

    pub fn category(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::Country => Cow::Borrowed(self.country.as_str()),
            Column::Year => Cow::Owned(self.year.to_string()),
            Column::Variable => Cow::Borrowed(self.variable.as_str()),
            Column::Level => Cow::Borrowed(self.level.as_str()),
            Column::MainActivity => Cow::Borrowed(self.main_activity.as_str()),
            Column::Sex => Cow::Borrowed(self.sex.as_str()),
        }
    }
}

/// Columns that can drive grouping, faceting or level restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Country,
    Year,
    Variable,
    Level,
    MainActivity,
    Sex,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Country,
        Column::Year,
        Column::Variable,
        Column::Level,
        Column::MainActivity,
        Column::Sex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Country => "country",
            Column::Year => "year",
            Column::Variable => "variable",
            Column::Level => "level",
            Column::MainActivity => "main_activity",
            Column::Sex => "sex",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.name() == name)
    }

    /// Like [`Column::from_name`], for names that must exist.
    pub fn resolve(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| EngineError::UnknownColumn(name.to_string()))
    }

    /// String-valued columns, i.e. the ones with a level catalog.
    pub fn is_categorical(self) -> bool {
        !matches!(self, Column::Year)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a field collapses when several rows fall into one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// Counts and weights add up across demographic rows.
    Sum,
    /// Already one value per country-year, duplicated on every row.
    MaxPerRow,
}

/// Numeric fields a metric can be based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    #[default]
    Year,
    Count,
    Weight,
    Gdp,
    GdpPpp,
    Population,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Year,
        Field::Count,
        Field::Weight,
        Field::Gdp,
        Field::GdpPpp,
        Field::Population,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Year => "year",
            Field::Count => "count",
            Field::Weight => "weight",
            Field::Gdp => "gdp",
            Field::GdpPpp => "gdp_ppp",
            Field::Population => "population",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Global fields carry no per-category subdivision.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            Field::Year | Field::Gdp | Field::GdpPpp | Field::Population
        )
    }

    pub fn is_year(self) -> bool {
        self == Field::Year
    }

    pub fn aggregation(self) -> AggregationKind {
        match self {
            Field::Count | Field::Weight => AggregationKind::Sum,
            Field::Year | Field::Gdp | Field::GdpPpp | Field::Population => {
                AggregationKind::MaxPerRow
            }
        }
    }

    pub fn info(self) -> Option<&'static FieldInfo> {
        metadata::field_info(self.name())
    }

    pub fn label(self) -> String {
        metadata::label(self.name())
    }

    pub fn long_label(self) -> String {
        metadata::long_label(self.name())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Observation;

    /// A `total` row with macro indicators filled in.
    pub fn row(country: &str, year: i32, activity: &str, sex: &str, count: f64) -> Observation {
        Observation {
            country: country.into(),
            year,
            variable: "total".into(),
            level: String::new(),
            main_activity: activity.into(),
            sex: sex.into(),
            count,
            weight: count,
            gdp: 1000.0 + year as f64,
            gdp_ppp: 2000.0 + year as f64,
            population: 5e6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_both_ways() {
        for column in Column::ALL {
            assert_eq!(Column::from_name(column.name()), Some(column));
        }
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
            assert!(field.info().is_some());
        }
        assert_eq!(
            Column::resolve("colour"),
            Err(EngineError::UnknownColumn("colour".into()))
        );
    }

    #[test]
    fn aggregation_kind_follows_field_shape() {
        assert_eq!(Field::Weight.aggregation(), AggregationKind::Sum);
        assert_eq!(Field::Gdp.aggregation(), AggregationKind::MaxPerRow);
        assert!(Field::Population.is_global());
        assert!(!Field::Count.is_global());
    }

    #[test]
    fn rows_expose_values_and_categories() {
        let row = fixtures::row("MEX", 2018, "Industry", "Female", 20.0);
        assert_eq!(row.value(Field::Year), 2018.0);
        assert_eq!(row.category(Column::Year), "2018");
        assert_eq!(row.category(Column::Sex), "Female");

        let parsed: Observation = serde_json::from_str(
            r#"{"country":"MEX","year":2018,"variable":"total","main_activity":"Industry",
                "sex":"Male","count":3,"weight":2.5}"#,
        )
        .unwrap();
        assert!(parsed.gdp.is_nan());
        assert_eq!(parsed.level, "");
    }
}
