//! Read-only country reference table used for labeling and coloring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which country attribute drives legend names and colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSource {
    Gdp,
    #[default]
    Region,
    Income,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountryInfo {
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub income: String,
    /// Color on the GDP gradient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_color: Option<String>,
}

impl CountryInfo {
    pub fn legend_name(&self, source: ColorSource) -> &str {
        match source {
            ColorSource::Gdp => &self.name,
            ColorSource::Region => &self.region,
            ColorSource::Income => &self.income,
        }
    }

    pub fn color(&self, source: ColorSource) -> Option<&str> {
        match source {
            ColorSource::Gdp => self.color.as_deref(),
            ColorSource::Region => self.region_color.as_deref(),
            ColorSource::Income => self.income_color.as_deref(),
        }
    }
}

/// ISO3 code -> country attributes. Passed into the engine explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryTable {
    countries: BTreeMap<String, CountryInfo>,
}

impl CountryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, code: impl Into<String>, info: CountryInfo) -> Self {
        self.countries.insert(code.into(), info);
        self
    }

    pub fn get(&self, code: &str) -> Option<&CountryInfo> {
        self.countries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.countries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Sort key placing countries by region, then name. Unknown codes sort
    /// under an `Unknown` region with their code as name.
    pub fn ordering_key(&self, code: &str) -> (String, String) {
        match self.get(code) {
            Some(info) => (info.region.clone(), info.name.clone()),
            None => ("Unknown".to_string(), code.to_string()),
        }
    }
}

impl FromIterator<(String, CountryInfo)> for CountryTable {
    fn from_iter<T: IntoIterator<Item = (String, CountryInfo)>>(iter: T) -> Self {
        Self {
            countries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mexico() -> CountryInfo {
        CountryInfo {
            name: "Mexico".into(),
            region: "Latin America & Caribbean".into(),
            income: "Upper middle income".into(),
            color: Some("#111111".into()),
            region_color: Some("#222222".into()),
            income_color: None,
        }
    }

    #[test]
    fn legend_and_color_follow_source() {
        let info = mexico();
        assert_eq!(info.legend_name(ColorSource::Gdp), "Mexico");
        assert_eq!(info.legend_name(ColorSource::Income), "Upper middle income");
        assert_eq!(info.color(ColorSource::Region), Some("#222222"));
        assert_eq!(info.color(ColorSource::Income), None);
    }

    #[test]
    fn table_deserializes_from_code_map() {
        let table: CountryTable = serde_json::from_str(
            r##"{"MEX": {"name": "Mexico", "region": "Latin America & Caribbean", "color": "#111111"}}"##,
        )
        .unwrap();
        assert!(table.contains("MEX"));
        assert_eq!(table.ordering_key("MLT"), ("Unknown".into(), "MLT".into()));
    }
}
