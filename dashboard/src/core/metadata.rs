//! Static descriptions of fields, split dimensions and categorical levels.
//!
//! Labels here feed menus, tooltips and panel captions, so they are part of
//! the visible contract. Unknown names fall back to a prettified form of the
//! raw identifier instead of failing.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

/// Display metadata for a field or split dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub label: &'static str,
    pub label_long: Option<&'static str>,
    pub full_name: Option<&'static str>,
    pub source: Option<&'static str>,
    pub source_url: Option<&'static str>,
}

impl FieldInfo {
    const fn plain(label: &'static str) -> Self {
        Self {
            label,
            label_long: None,
            full_name: None,
            source: None,
            source_url: None,
        }
    }

    /// Long label when one exists, else the short one.
    pub fn long_label(&self) -> &'static str {
        self.label_long.unwrap_or(self.label)
    }
}

static FIELD_INFO: Lazy<BTreeMap<&'static str, FieldInfo>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    map.insert("country", FieldInfo::plain("Country"));
    map.insert(
        "year",
        FieldInfo {
            full_name: Some("Year the survey was conducted."),
            ..FieldInfo::plain("Year")
        },
    );
    map.insert(
        "count",
        FieldInfo {
            full_name: Some("Number of survey participants within segments."),
            ..FieldInfo::plain("Participant Count")
        },
    );
    map.insert(
        "weight",
        FieldInfo {
            full_name: Some("Sum of survey weights within segments."),
            ..FieldInfo::plain("Weight Sum")
        },
    );
    map.insert(
        "gdp",
        FieldInfo {
            label: "GDP per capita (current US$)",
            label_long: None,
            full_name: Some("Gross Domestic Product Per Capita (in current US$)"),
            source: Some("World Bank"),
            source_url: Some("https://data.worldbank.org/indicator/NY.GDP.PCAP.CD"),
        },
    );
    map.insert(
        "gdp_ppp",
        FieldInfo {
            label: "GDP per capita (PPP, current international $)",
            label_long: Some("GDP per capita (purchasing power parity, current international $)"),
            full_name: Some(
                "Gross Domestic Product Per Capita (Purchasing Power Parity, current international $)",
            ),
            source: Some("World Bank"),
            source_url: Some("https://data.worldbank.org/indicator/NY.GDP.PCAP.PP.CD"),
        },
    );
    map.insert(
        "population",
        FieldInfo {
            label: "Total Population",
            label_long: None,
            full_name: Some("Total Population (World Bank)"),
            source: Some("World Bank"),
            source_url: Some("https://data.worldbank.org/indicator/SP.POP.TOTL"),
        },
    );
    map.insert("main_activity", FieldInfo::plain("Main Activity"));
    map.insert("sex", FieldInfo::plain("Gender"));
    map.insert("age", FieldInfo::plain("Age"));
    map.insert("children_under_5", FieldInfo::plain("Children Under 5"));
    map.insert("education", FieldInfo::plain("Education"));
    map.insert("marital_status", FieldInfo::plain("Marital Status"));
    map.insert("rural", FieldInfo::plain("Rural / Urban"));
    map
});

static ACTIVITY_LABELS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("Agriculture", "Agriculture"),
        ("Industry", "Industry"),
        ("Services", "Services"),
        ("Unemployed", "Unemployed"),
        ("Out of Workforce", "Out of Labor Force"),
    ])
});

pub fn field_info(name: &str) -> Option<&'static FieldInfo> {
    FIELD_INFO.get(name)
}

/// Short label for a field or split dimension.
pub fn label(name: &str) -> String {
    match field_info(name) {
        Some(info) => info.label.to_string(),
        None => prettify(name),
    }
}

pub fn long_label(name: &str) -> String {
    match field_info(name) {
        Some(info) => info.long_label().to_string(),
        None => prettify(name),
    }
}

/// Label of a main-activity level; unknown levels are shown verbatim.
pub fn activity_label(level: &str) -> String {
    ACTIVITY_LABELS
        .get(level)
        .map(|label| label.to_string())
        .unwrap_or_else(|| level.to_string())
}

/// Label of a sex contrast keyed by level and operator (e.g. `Female` + `-`).
pub fn sex_summary_label(level: &str, adjust: &str) -> Option<&'static str> {
    match (level, adjust) {
        ("Male", "-") => Some("Gap (Male - Female)"),
        ("Female", "-") => Some("Gap (Female - Male)"),
        ("Female", "/") => Some("Ratio (Female / Male)"),
        ("Male", "/") => Some("Ratio (Male / Female)"),
        ("Female", "") => Some("Share of women"),
        ("Male", "") => Some("Share of men"),
        _ => None,
    }
}

/// Categorical palette, indexed by a level's position among the color levels.
pub const CATEGORY_COLORS: [&str; 7] = [
    "#A3651E", "#2F8CBF", "#C4AB4B", "#72CED5", "#C8E9B6", "#7E1700", "#1549A2",
];

/// Symbol palette, cycled over the sorted symbol levels.
pub const SYMBOLS: [&str; 7] = [
    "triangle", "diamond", "rect", "roundRect", "pin", "arrow", "circle",
];

pub const DEFAULT_SYMBOL: &str = "circle";
pub const FALLBACK_COLOR: &str = "#898989";
pub const UNCOLORED_SERIES_COLOR: &str = "#a5cdff";
pub const FIT_COLOR: &str = "#898989";

/// `children_under_5` -> `Children under 5`.
fn prettify(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
