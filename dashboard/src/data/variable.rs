//! Metric specifications: which field to plot and how to derive it.
//!
//! A [`Variable`] names a base field plus optional percent/log transforms, a
//! `subset` restricting the population to one categorical level, and a
//! `summary` contrasting one level against the rest (difference, ratio or
//! share). Values are immutable; every edit returns a new, normalized value,
//! and the display name and description are computed from the fields on
//! demand.
//!
//! The compact string form is used in shareable links:
//!
//! ```text
//! [%]base[:subset:summary]      e.g. %weight:main_activity.0:!sex.1
//! base[:log]                    e.g. gdp:log
//! ```
//!
//! where each level part is `[op]column.index[t]`, `op` being empty, `!`
//! (negate / subtract) or `|` (ratio), and `t` marking overall
//! normalization. Parsing never fails: unknown pieces fall back to defaults.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::core::metadata;
use crate::data::levels::VariableLevels;
use crate::data::observation::{Column, Field, Observation};

/// Below this magnitude a ratio denominator is treated as zero.
pub const RATIO_EPSILON: f64 = 1e-6;

/// Comparison operator carried by a level spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Adjust {
    #[serde(rename = "")]
    None,
    /// Negates a subset; subtracts the other levels in a summary.
    #[default]
    #[serde(rename = "-")]
    Subtract,
    /// Divides by the other levels in a summary.
    #[serde(rename = "/")]
    Ratio,
}

impl Adjust {
    pub fn symbol(self) -> &'static str {
        match self {
            Adjust::None => "",
            Adjust::Subtract => "-",
            Adjust::Ratio => "/",
        }
    }

    fn compact_prefix(self) -> &'static str {
        match self {
            Adjust::None => "",
            Adjust::Subtract => "!",
            Adjust::Ratio => "|",
        }
    }
}

/// A categorical level selection. `level_index` mirrors the position of
/// `level` in the column's sorted level list; `-1` marks a level that could
/// not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub variable: Option<Column>,
    pub level: String,
    pub level_index: i32,
    pub adjust: Adjust,
    #[serde(default)]
    pub overall: bool,
}

impl Default for LevelSpec {
    fn default() -> Self {
        Self {
            variable: None,
            level: String::new(),
            level_index: 0,
            adjust: Adjust::Subtract,
            overall: false,
        }
    }
}

impl LevelSpec {
    pub fn is_set(&self) -> bool {
        self.variable.is_some()
    }

    fn matches(&self, row: &Observation) -> bool {
        match self.variable {
            Some(column) => row.category(column) == self.level.as_str(),
            None => false,
        }
    }

    fn to_compact(&self) -> String {
        match self.variable {
            Some(column) => format!(
                "{}{}.{}{}",
                self.adjust.compact_prefix(),
                column.name(),
                self.level_index,
                if self.overall { "t" } else { "" }
            ),
            None => String::new(),
        }
    }

    fn parse_compact(part: &str, levels: &VariableLevels) -> Self {
        let (adjust, rest) = match part.chars().next() {
            Some('!') => (Adjust::Subtract, &part[1..]),
            Some('|') => (Adjust::Ratio, &part[1..]),
            _ => (Adjust::None, part),
        };
        let Some((name, index_part)) = rest.split_once('.') else {
            warn!(part, "level spec without index; ignoring");
            return Self::default();
        };
        let column = match Column::from_name(name) {
            Some(column) if column.is_categorical() => column,
            _ => {
                warn!(name, "unknown level variable; ignoring");
                return Self::default();
            }
        };
        let overall = index_part.ends_with('t');
        let index = index_part.trim_end_matches('t').parse::<usize>().ok();
        match index.and_then(|i| levels.level_at(column, i).map(|level| (i, level))) {
            Some((index, level)) => Self {
                variable: Some(column),
                level: level.to_string(),
                level_index: index as i32,
                adjust,
                overall,
            },
            None => {
                warn!(part, "level index out of range; ignoring");
                Self::default()
            }
        }
    }
}

/// Structured level selection used to describe a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSelection {
    pub variable: Column,
    pub level: String,
    #[serde(default)]
    pub adjust: Adjust,
    #[serde(default)]
    pub overall: bool,
}

impl LevelSelection {
    pub fn new(variable: Column, level: impl Into<String>, adjust: Adjust) -> Self {
        Self {
            variable,
            level: level.into(),
            adjust,
            overall: false,
        }
    }

    pub fn overall(mut self, overall: bool) -> Self {
        self.overall = overall;
        self
    }
}

/// Structured descriptor a [`Variable`] is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub base: Field,
    #[serde(default = "enabled")]
    pub percent: bool,
    #[serde(default = "enabled")]
    pub log: bool,
    #[serde(default)]
    pub subset: Option<LevelSelection>,
    #[serde(default)]
    pub summary: Option<LevelSelection>,
}

fn enabled() -> bool {
    true
}

impl Default for VariableSpec {
    fn default() -> Self {
        Self {
            base: Field::Year,
            percent: true,
            log: true,
            subset: None,
            summary: None,
        }
    }
}

/// Which level spec an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Which {
    Subset,
    Summary,
}

/// Edit of one scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    Base(Field),
    Percent(bool),
    Log(bool),
}

/// Edit of a level spec. `levels` is the sorted level list of the column the
/// spec refers to (after the edit, for `Variable`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelUpdate<'a> {
    Remove,
    Variable { value: Column, levels: &'a [String] },
    Level { value: String, levels: &'a [String] },
    Adjust(Adjust),
    Overall(bool),
}

/// How the aggregated value of a metric is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    /// Value used as aggregated (year, linear globals).
    Raw,
    /// Natural log of the aggregated value.
    Log,
    /// Share of a group total, times 100.
    Percent(Denominator),
    /// Plain sum within the group.
    Sum,
}

/// Which total a percentage is taken of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denominator {
    /// Everything in the normalization scope.
    Total,
    /// Only the rows sharing the row's summary level.
    SummaryLevel,
}

/// One derived quantity to plot or tabulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    base: Field,
    percent: bool,
    log: bool,
    subset: LevelSpec,
    summary: LevelSpec,
}

impl Default for Variable {
    fn default() -> Self {
        Self::new(&VariableSpec::default(), &VariableLevels::default())
    }
}

impl Variable {
    /// Build from a descriptor, resolving level indices. A level that is not
    /// in its column's level list drops that spec.
    pub fn new(spec: &VariableSpec, levels: &VariableLevels) -> Self {
        let resolve = |selection: &Option<LevelSelection>| -> LevelSpec {
            let Some(selection) = selection else {
                return LevelSpec::default();
            };
            match levels.index_of(selection.variable, &selection.level) {
                Some(index) => LevelSpec {
                    variable: Some(selection.variable),
                    level: selection.level.clone(),
                    level_index: index as i32,
                    adjust: selection.adjust,
                    overall: selection.overall,
                },
                None => LevelSpec::default(),
            }
        };
        Self {
            base: spec.base,
            percent: spec.percent,
            log: spec.log,
            subset: resolve(&spec.subset),
            summary: resolve(&spec.summary),
        }
        .normalized()
    }

    /// Parse the compact form. Unknown base fields fall back to `year`.
    pub fn parse(encoded: &str, levels: &VariableLevels) -> Self {
        let trimmed = encoded.strip_prefix('[').unwrap_or(encoded);
        let trimmed = trimmed.strip_suffix(')').unwrap_or(trimmed);
        let parts: Vec<&str> = trimmed.split(':').collect();

        let raw_base = parts.first().copied().unwrap_or_default();
        let (percent, base_name) = match raw_base.strip_prefix('%') {
            Some(rest) => (true, rest),
            None => (false, raw_base),
        };
        let base = Field::from_name(base_name).unwrap_or_else(|| {
            warn!(base = base_name, "unknown metric base; using year");
            Field::Year
        });

        let mut variable = Self {
            base,
            percent,
            log: false,
            subset: LevelSpec::default(),
            summary: LevelSpec::default(),
        };
        if base.is_global() {
            variable.log = parts.len() > 1;
        } else {
            variable.log = true;
            if let Some(part) = parts.get(1).filter(|p| !p.is_empty()) {
                variable.subset = LevelSpec::parse_compact(part, levels);
            }
            if let Some(part) = parts.get(2).filter(|p| !p.is_empty()) {
                variable.summary = LevelSpec::parse_compact(part, levels);
            }
        }
        variable.normalized()
    }

    /// Global fields ignore percent, subset and summary; year is never
    /// logged. Non-global metrics keep `log` so it survives a later switch
    /// to a global base, but nothing reads it while they stay non-global.
    fn normalized(mut self) -> Self {
        if self.base.is_global() {
            self.percent = true;
            self.subset = LevelSpec::default();
            self.summary = LevelSpec::default();
            if self.base.is_year() {
                self.log = false;
            }
        }
        self
    }

    pub fn base(&self) -> Field {
        self.base
    }

    pub fn percent(&self) -> bool {
        self.percent
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn subset(&self) -> &LevelSpec {
        &self.subset
    }

    pub fn summary(&self) -> &LevelSpec {
        &self.summary
    }

    pub fn is_global(&self) -> bool {
        self.base.is_global()
    }

    pub fn update(&self, update: FieldUpdate) -> Self {
        let mut next = self.clone();
        match update {
            FieldUpdate::Base(base) => next.base = base,
            FieldUpdate::Percent(percent) => next.percent = percent,
            FieldUpdate::Log(log) => next.log = log,
        }
        next.normalized()
    }

    pub fn update_level(&self, which: Which, update: LevelUpdate<'_>) -> Self {
        let mut next = self.clone();
        let spec = match which {
            Which::Subset => &mut next.subset,
            Which::Summary => &mut next.summary,
        };
        match update {
            LevelUpdate::Remove => *spec = LevelSpec::default(),
            LevelUpdate::Variable { value, levels } => {
                spec.variable = Some(value);
                match levels.first() {
                    Some(first) => {
                        spec.level = first.clone();
                        spec.level_index = 0;
                    }
                    None => {
                        spec.level = String::new();
                        spec.level_index = -1;
                    }
                }
            }
            LevelUpdate::Level { value, levels } => {
                spec.level_index = levels
                    .iter()
                    .position(|level| *level == value)
                    .map_or(-1, |index| index as i32);
                spec.level = value;
            }
            LevelUpdate::Adjust(adjust) => spec.adjust = adjust,
            LevelUpdate::Overall(overall) => spec.overall = overall,
        }
        next.normalized()
    }

    /// Column the summary contrasts across, if any.
    pub fn summary_column(&self) -> Option<Column> {
        self.summary.variable
    }

    pub fn is_ratio(&self) -> bool {
        self.summary.is_set() && self.summary.adjust == Adjust::Ratio
    }

    /// 0/1 indicator for the subset restriction (always 1 without one).
    pub fn subset_formula(&self, row: &Observation) -> f64 {
        if !self.subset.is_set() {
            return 1.0;
        }
        let hit = self.subset.matches(row);
        let keep = if self.subset.adjust == Adjust::Subtract {
            !hit
        } else {
            hit
        };
        if keep {
            1.0
        } else {
            0.0
        }
    }

    /// Row value of the base field, restricted to the subset.
    pub fn base_formula(&self, row: &Observation) -> f64 {
        let value = row.value(self.base);
        if self.is_global() || !self.subset.is_set() {
            value
        } else {
            value * self.subset_formula(row)
        }
    }

    pub fn formula(&self) -> Formula {
        if self.base.is_year() {
            return Formula::Raw;
        }
        if self.is_global() {
            return if self.log { Formula::Log } else { Formula::Raw };
        }
        if self.percent {
            if self.summary.is_set() && !self.summary.overall {
                Formula::Percent(Denominator::SummaryLevel)
            } else {
                Formula::Percent(Denominator::Total)
            }
        } else {
            Formula::Sum
        }
    }

    /// Signed weight of a row in the summary contrast: +1/-1 when
    /// subtracting, a 0/1 mask for shares and ratio numerators.
    pub fn summary_formula(&self, row: &Observation) -> f64 {
        if !self.summary.is_set() {
            return 1.0;
        }
        let on_level = self.summary.matches(row);
        match (self.summary.adjust, on_level) {
            (_, true) => 1.0,
            (Adjust::Subtract, false) => -1.0,
            (_, false) => 0.0,
        }
    }

    /// 0/1 mask of the complementary levels, the ratio denominator.
    pub fn off_level_formula(&self, row: &Observation) -> f64 {
        if self.summary.is_set() && !self.summary.matches(row) {
            1.0
        } else {
            0.0
        }
    }

    /// Menu label, e.g. `Agriculture: Gap (Female - Male), %`.
    pub fn name(&self) -> String {
        let mut name = self.base.long_label();
        if self.is_global() {
            if !self.base.is_year() && self.log {
                name.push_str(", log");
            }
            return name;
        }
        if !self.subset.is_set() && !self.summary.is_set() {
            if self.percent {
                name.push_str(", %");
            }
            return name;
        }

        if self.subset.is_set() {
            name = subset_label(&self.subset);
        }
        let mut value_type = String::new();
        if self.percent {
            value_type.push_str(if self.summary.is_set() && self.summary.overall {
                "overall %"
            } else {
                "%"
            });
        }
        if self.base != Field::Weight {
            if !value_type.is_empty() {
                value_type.push(' ');
            }
            value_type.push_str(self.base.name());
        }
        if self.summary.is_set() {
            name.push_str(": ");
            name.push_str(&summary_label(&self.summary));
        }
        if !value_type.is_empty() {
            name.push_str(", ");
            name.push_str(&value_type);
        }
        name
    }

    /// Tooltip sentence describing what the value measures.
    pub fn description(&self) -> String {
        if self.is_global() {
            let prefix = if self.base.is_year() || !self.log {
                ""
            } else {
                "Log of "
            };
            return format!("{prefix}{}", self.base.long_label());
        }

        let base = self.base.name();
        let mut people = vec![format!("{} ({base})", group_noun(&self.summary, true))];
        if self.summary.is_set() && self.summary.adjust != Adjust::None {
            people.push(format!("{} ({base})", group_noun(&self.summary, false)));
        }
        let subset_ref = subset_phrase(&self.subset);

        let clauses: Vec<String> = people
            .iter()
            .map(|who| {
                let mut parts: Vec<String> = Vec::new();
                if self.summary.overall {
                    if self.percent {
                        parts.push(format!("percent of people ({base})"));
                    }
                    if let Some(subset_ref) = &subset_ref {
                        parts.push(subset_ref.clone());
                    }
                    if self.percent {
                        parts.push("and are".into());
                    }
                    parts.push(who.clone());
                } else {
                    if self.percent {
                        parts.push("percent of".into());
                    }
                    parts.push(who.clone());
                    if let Some(subset_ref) = &subset_ref {
                        parts.push(subset_ref.clone());
                    }
                }
                parts.join(" ")
            })
            .collect();

        let joiner = match self.summary.adjust {
            Adjust::Subtract => " minus ",
            Adjust::Ratio => " divided by ",
            Adjust::None => " ",
        };
        let mut sentence = capitalize(&clauses.join(joiner));
        sentence.push('.');
        sentence
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_global() && self.percent {
            f.write_str("%")?;
        }
        f.write_str(self.base.name())?;
        if self.base.is_year() {
            return Ok(());
        }
        if self.is_global() {
            if self.log {
                f.write_str(":log")?;
            }
            return Ok(());
        }
        write!(
            f,
            ":{}:{}",
            self.subset.to_compact(),
            self.summary.to_compact()
        )
    }
}

impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Metrics offered before any customization.
pub fn presets(levels: &VariableLevels) -> Vec<Variable> {
    let agriculture = LevelSelection::new(Column::MainActivity, "Agriculture", Adjust::None);
    let specs = [
        VariableSpec::default(),
        VariableSpec {
            base: Field::Population,
            log: false,
            ..VariableSpec::default()
        },
        VariableSpec {
            base: Field::Gdp,
            ..VariableSpec::default()
        },
        VariableSpec {
            base: Field::GdpPpp,
            ..VariableSpec::default()
        },
        VariableSpec {
            base: Field::Weight,
            ..VariableSpec::default()
        },
        VariableSpec {
            base: Field::Weight,
            subset: Some(agriculture.clone()),
            ..VariableSpec::default()
        },
        VariableSpec {
            base: Field::Weight,
            subset: Some(agriculture),
            summary: Some(LevelSelection::new(Column::Sex, "Female", Adjust::Subtract)),
            ..VariableSpec::default()
        },
    ];
    specs.iter().map(|spec| Variable::new(spec, levels)).collect()
}

fn subset_label(spec: &LevelSpec) -> String {
    match spec.adjust {
        Adjust::Subtract if spec.level == "Out of Workforce" => "Labor Force Participation".into(),
        Adjust::Subtract => format!("Not {}", metadata::activity_label(&spec.level)),
        Adjust::Ratio => format!("{} Proportion", metadata::activity_label(&spec.level)),
        Adjust::None => metadata::activity_label(&spec.level),
    }
}

fn summary_label(spec: &LevelSpec) -> String {
    if spec.variable == Some(Column::Sex) {
        if let Some(label) = metadata::sex_summary_label(&spec.level, spec.adjust.symbol()) {
            return label.to_string();
        }
    }
    match spec.adjust {
        Adjust::Subtract => format!("Gap ({} - other)", spec.level),
        Adjust::Ratio => format!("Ratio ({} / other)", spec.level),
        Adjust::None => format!("Share of {}", spec.level),
    }
}

/// Who a clause talks about: the summary level (`on_level`) or its
/// complement.
fn group_noun(summary: &LevelSpec, on_level: bool) -> String {
    match summary.variable {
        None => "people".into(),
        Some(Column::Sex) => {
            let men = summary.level == "Male";
            (if men == on_level { "men" } else { "women" }).into()
        }
        Some(_) if on_level => format!("people in {}", summary.level),
        Some(_) => format!("people not in {}", summary.level),
    }
}

fn subset_phrase(subset: &LevelSpec) -> Option<String> {
    let column = subset.variable?;
    let negated = subset.adjust == Adjust::Subtract;
    let phrase = match (column, subset.level.as_str()) {
        (Column::MainActivity, "Unemployed") if negated => "employed or not looking for work".into(),
        (Column::MainActivity, "Unemployed") => "unemployed and looking for work".into(),
        (Column::MainActivity, "Out of Workforce") if negated => "employed or looking for work".into(),
        (Column::MainActivity, "Out of Workforce") => "not employed or looking for work".into(),
        (Column::MainActivity, level) => format!(
            "{}employed in {}",
            if negated { "not " } else { "" },
            level.to_lowercase()
        ),
        (column, level) => format!(
            "{} {} {}",
            if negated { "without" } else { "with" },
            metadata::label(column.name()).to_lowercase(),
            level.to_lowercase()
        ),
    };
    Some(phrase)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> VariableLevels {
        VariableLevels::default()
            .with(
                Column::MainActivity,
                ["Agriculture", "Industry", "Out of Workforce", "Services", "Unemployed"],
            )
            .with(Column::Sex, ["Female", "Male"])
    }

    fn gap(activity: &str, subset_adjust: Adjust, sex: &str, adjust: Adjust) -> Variable {
        Variable::new(
            &VariableSpec {
                base: Field::Weight,
                subset: Some(LevelSelection::new(Column::MainActivity, activity, subset_adjust)),
                summary: Some(LevelSelection::new(Column::Sex, sex, adjust)),
                ..VariableSpec::default()
            },
            &levels(),
        )
    }

    #[test]
    fn compact_form_round_trips() {
        let levels = levels();
        let mut variables = presets(&levels);
        variables.push(gap("Industry", Adjust::None, "Male", Adjust::Ratio));
        variables.push(
            gap("Out of Workforce", Adjust::Subtract, "Female", Adjust::Subtract)
                .update_level(Which::Summary, LevelUpdate::Overall(true))
                .update(FieldUpdate::Base(Field::Count)),
        );
        for variable in variables {
            let encoded = variable.to_string();
            assert_eq!(Variable::parse(&encoded, &levels), variable, "{encoded}");
        }
    }

    #[test]
    fn compact_form_matches_link_format() {
        let variable = gap("Agriculture", Adjust::None, "Male", Adjust::Subtract);
        assert_eq!(variable.to_string(), "%weight:main_activity.0:!sex.1");

        let overall = variable.update_level(Which::Summary, LevelUpdate::Overall(true));
        assert_eq!(overall.to_string(), "%weight:main_activity.0:!sex.1t");

        let gdp = Variable::new(
            &VariableSpec {
                base: Field::Gdp,
                ..VariableSpec::default()
            },
            &levels(),
        );
        assert_eq!(gdp.to_string(), "gdp:log");
        assert_eq!(Variable::default().to_string(), "year");
    }

    #[test]
    fn parsing_untrusted_input_falls_back() {
        let levels = levels();
        assert_eq!(Variable::parse("%salary::", &levels).base(), Field::Year);

        let out_of_range = Variable::parse("%weight:main_activity.9:sex.0", &levels);
        assert!(!out_of_range.subset().is_set());
        assert_eq!(out_of_range.summary().level, "Female");

        let bad_column = Variable::parse("%weight:colour.0:", &levels);
        assert!(!bad_column.subset().is_set());

        let wrapped = Variable::parse("[%count:!main_activity.2:)", &levels);
        assert_eq!(wrapped.base(), Field::Count);
        assert_eq!(wrapped.subset().level, "Out of Workforce");
        assert_eq!(wrapped.subset().adjust, Adjust::Subtract);
    }

    #[test]
    fn names_and_descriptions_follow_fields() {
        let variable = gap("Agriculture", Adjust::None, "Male", Adjust::Subtract);
        assert_eq!(variable.name(), "Agriculture: Gap (Male - Female), %");
        assert_eq!(
            variable.description(),
            "Percent of men (weight) employed in agriculture minus percent of women (weight) employed in agriculture."
        );

        let lfp = Variable::new(
            &VariableSpec {
                base: Field::Count,
                subset: Some(LevelSelection::new(
                    Column::MainActivity,
                    "Out of Workforce",
                    Adjust::Subtract,
                )),
                ..VariableSpec::default()
            },
            &levels(),
        );
        assert_eq!(lfp.name(), "Labor Force Participation, % count");
        assert_eq!(
            lfp.description(),
            "Percent of people (count) employed or looking for work."
        );

        let gdp = Variable::new(
            &VariableSpec {
                base: Field::Gdp,
                ..VariableSpec::default()
            },
            &levels(),
        );
        assert_eq!(gdp.name(), "GDP per capita (current US$), log");
        assert_eq!(gdp.description(), "Log of GDP per capita (current US$)");
    }

    #[test]
    fn overall_summary_changes_labels() {
        let variable = gap("Industry", Adjust::None, "Female", Adjust::Ratio)
            .update_level(Which::Summary, LevelUpdate::Overall(true));
        assert_eq!(variable.name(), "Industry: Ratio (Female / Male), overall %");
        assert_eq!(
            variable.description(),
            "Percent of people (weight) employed in industry and are women (weight) divided by percent of people (weight) employed in industry and are men (weight)."
        );
    }

    #[test]
    fn switching_to_global_base_clears_levels() {
        let variable = gap("Industry", Adjust::None, "Female", Adjust::Subtract);
        let global = variable.update(FieldUpdate::Base(Field::Population));
        assert!(!global.subset().is_set());
        assert!(!global.summary().is_set());
        assert!(global.percent());
        assert_eq!(global.name(), "Total Population, log");

        let unlogged = global.update(FieldUpdate::Log(false));
        assert_eq!(unlogged.name(), "Total Population");
    }

    #[test]
    fn base_switch_changes_only_the_base() {
        let variable = gap("Industry", Adjust::None, "Female", Adjust::Subtract);
        assert!(variable.log());
        assert_eq!(variable.formula(), Formula::Percent(Denominator::SummaryLevel));

        let counted = variable.update(FieldUpdate::Base(Field::Count));
        assert_eq!(counted.base(), Field::Count);
        assert_eq!(counted.percent(), variable.percent());
        assert_eq!(counted.log(), variable.log());
        assert_eq!(counted.subset(), variable.subset());
        assert_eq!(counted.summary(), variable.summary());
        assert_eq!(counted.to_string(), "%count:main_activity.1:!sex.0");

        let gdp = counted.update(FieldUpdate::Base(Field::Gdp));
        assert!(gdp.log());
        assert_eq!(gdp.formula(), Formula::Log);
        assert_eq!(gdp.to_string(), "gdp:log");
    }

    #[test]
    fn level_edits_keep_index_in_sync() {
        let levels = levels();
        let sexes = levels.get(Column::Sex);
        let activities = levels.get(Column::MainActivity);
        let base = Variable::new(
            &VariableSpec {
                base: Field::Weight,
                ..VariableSpec::default()
            },
            &levels,
        );

        let with_sex = base.update_level(
            Which::Summary,
            LevelUpdate::Variable {
                value: Column::Sex,
                levels: sexes,
            },
        );
        assert_eq!(with_sex.summary().level, "Female");
        assert_eq!(with_sex.summary().level_index, 0);

        let male = with_sex.update_level(
            Which::Summary,
            LevelUpdate::Level {
                value: "Male".into(),
                levels: sexes,
            },
        );
        assert_eq!(male.summary().level_index, 1);

        let missing = base.update_level(
            Which::Subset,
            LevelUpdate::Level {
                value: "Fishing".into(),
                levels: activities,
            },
        );
        assert_eq!(missing.subset().level_index, -1);

        let removed = male.update_level(Which::Summary, LevelUpdate::Remove);
        assert_eq!(removed.summary(), &LevelSpec::default());
        assert_eq!(removed.name(), "Weight Sum, %");
    }

    #[test]
    fn formulas_encode_subset_and_summary() {
        use crate::data::observation::fixtures::row;

        let variable = gap("Industry", Adjust::None, "Female", Adjust::Subtract);
        let female_industry = row("MEX", 2018, "Industry", "Female", 4.0);
        let male_industry = row("MEX", 2018, "Industry", "Male", 6.0);
        let female_services = row("MEX", 2018, "Services", "Female", 8.0);

        assert_eq!(variable.base_formula(&female_industry), 4.0);
        assert_eq!(variable.base_formula(&female_services), 0.0);
        assert_eq!(variable.summary_formula(&female_industry), 1.0);
        assert_eq!(variable.summary_formula(&male_industry), -1.0);
        assert_eq!(variable.off_level_formula(&male_industry), 1.0);
        assert_eq!(
            variable.formula(),
            Formula::Percent(Denominator::SummaryLevel)
        );

        let share = variable.update_level(Which::Summary, LevelUpdate::Adjust(Adjust::None));
        assert_eq!(share.summary_formula(&male_industry), 0.0);

        let negated = variable.update_level(Which::Subset, LevelUpdate::Adjust(Adjust::Subtract));
        assert_eq!(negated.base_formula(&female_industry), 0.0);
        assert_eq!(negated.base_formula(&female_services), 8.0);

        let counts = variable.update(FieldUpdate::Percent(false));
        assert_eq!(counts.formula(), Formula::Sum);
        assert_eq!(Variable::default().formula(), Formula::Raw);
    }
}
