//! Level catalogs derived from the loaded rows.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::country::CountryTable;
use crate::data::observation::{Column, Observation};

/// Sorted distinct values of every categorical column. Level indices in the
/// compact metric encoding are offsets into these lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableLevels {
    levels: BTreeMap<Column, Vec<String>>,
}

impl VariableLevels {
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut sets: BTreeMap<Column, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            for column in Column::ALL.into_iter().filter(|c| c.is_categorical()) {
                sets.entry(column)
                    .or_default()
                    .insert(row.category(column).into_owned());
            }
        }
        Self {
            levels: sets
                .into_iter()
                .map(|(column, set)| (column, set.into_iter().collect()))
                .collect(),
        }
    }

    /// Builder used when levels are known up front.
    pub fn with<S: Into<String>>(mut self, column: Column, levels: impl IntoIterator<Item = S>) -> Self {
        let mut levels: Vec<String> = levels.into_iter().map(Into::into).collect();
        levels.sort();
        levels.dedup();
        self.levels.insert(column, levels);
        self
    }

    pub fn get(&self, column: Column) -> &[String] {
        self.levels.get(&column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn index_of(&self, column: Column, level: &str) -> Option<usize> {
        self.get(column).iter().position(|l| l == level)
    }

    pub fn level_at(&self, column: Column, index: usize) -> Option<&str> {
        self.get(column).get(index).map(String::as_str)
    }
}

/// Selection catalog backing the filter defaults and split menus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Levels {
    /// ISO3 codes ordered by region, then name.
    pub countries: Vec<String>,
    /// Demographic segment names (the `variable` column minus `total`).
    pub demo_segments: Vec<String>,
    pub years: Vec<i32>,
    pub sectors: Vec<String>,
    pub sexes: Vec<String>,
    pub base_year_range: (i32, i32),
    /// Names usable as split roles.
    pub selectable: Vec<String>,
}

/// Split names that are always available regardless of segments.
pub const SELECTABLE_COLUMNS: [&str; 4] = ["country", "year", "main_activity", "sex"];

impl Levels {
    pub fn from_rows(rows: &[Observation], countries: &CountryTable) -> Self {
        let mut country_set = BTreeSet::new();
        let mut segment_set = BTreeSet::new();
        let mut year_set = BTreeSet::new();
        let mut sector_set = BTreeSet::new();
        let mut sex_set = BTreeSet::new();
        for row in rows {
            country_set.insert(row.country.clone());
            if row.variable != "total" {
                segment_set.insert(row.variable.clone());
            }
            year_set.insert(row.year);
            sector_set.insert(row.main_activity.clone());
            sex_set.insert(row.sex.clone());
        }

        let mut ordered: Vec<String> = country_set.into_iter().collect();
        ordered.sort_by_cached_key(|code| countries.ordering_key(code));

        let years: Vec<i32> = year_set.into_iter().collect();
        let base_year_range = match (years.first(), years.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => (0, 0),
        };
        let demo_segments: Vec<String> = segment_set.into_iter().collect();
        let selectable = SELECTABLE_COLUMNS
            .iter()
            .map(|name| name.to_string())
            .chain(demo_segments.iter().cloned())
            .collect();

        Self {
            countries: ordered,
            demo_segments,
            years,
            sectors: sector_set.into_iter().collect(),
            sexes: sex_set.into_iter().collect(),
            base_year_range,
            selectable,
        }
    }

    pub fn is_demo_segment(&self, name: &str) -> bool {
        self.demo_segments.iter().any(|segment| segment == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::country::CountryInfo;
    use crate::data::observation::fixtures::row;

    #[test]
    fn variable_levels_are_sorted_and_indexed() {
        let rows = vec![
            row("MEX", 2018, "Services", "Male", 1.0),
            row("ARG", 2017, "Agriculture", "Female", 1.0),
        ];
        let levels = VariableLevels::from_rows(&rows);
        assert_eq!(levels.get(Column::Sex), ["Female", "Male"]);
        assert_eq!(levels.index_of(Column::MainActivity, "Services"), Some(1));
        assert_eq!(levels.level_at(Column::Country, 5), None);
        assert!(levels.get(Column::Year).is_empty());
    }

    #[test]
    fn catalog_orders_countries_by_region() {
        let mut rows = vec![
            row("MEX", 2018, "Services", "Male", 1.0),
            row("DEU", 2010, "Services", "Male", 1.0),
        ];
        let mut segmented = row("MEX", 2018, "Services", "Male", 1.0);
        segmented.variable = "age".into();
        segmented.level = "35+".into();
        rows.push(segmented);

        let table = CountryTable::new()
            .with(
                "MEX",
                CountryInfo {
                    name: "Mexico".into(),
                    region: "Americas".into(),
                    ..CountryInfo::default()
                },
            )
            .with(
                "DEU",
                CountryInfo {
                    name: "Germany".into(),
                    region: "Europe".into(),
                    ..CountryInfo::default()
                },
            );
        let levels = Levels::from_rows(&rows, &table);
        assert_eq!(levels.countries, ["MEX", "DEU"]);
        assert_eq!(levels.demo_segments, ["age"]);
        assert_eq!(levels.base_year_range, (2010, 2018));
        assert!(levels.is_demo_segment("age"));
        assert_eq!(levels.selectable.last().map(String::as_str), Some("age"));
    }
}
