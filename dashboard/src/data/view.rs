//! View state: what to plot and how to arrange it, plus its reducer.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::data::country::ColorSource;
use crate::data::levels::{Levels, VariableLevels};
use crate::data::observation::{Column, Field};
use crate::data::variable::{Adjust, FieldUpdate, LevelSelection, Variable, VariableSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeAgg {
    All,
    First,
    Specified,
    #[default]
    Last,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regression {
    None,
    Linear,
    Exponential,
    Logarithmic,
    #[default]
    Polynomial,
}

/// The four mutually exclusive split roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRole {
    Color,
    Symbol,
    XPanels,
    YPanels,
}

impl SplitRole {
    pub const ALL: [SplitRole; 4] = [
        SplitRole::Color,
        SplitRole::Symbol,
        SplitRole::XPanels,
        SplitRole::YPanels,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDef {
    pub as_plot: bool,
    pub lock_range: bool,
    pub x: Variable,
    pub y: Variable,
    pub color: String,
    pub symbol: String,
    pub x_panels: String,
    pub y_panels: String,
    pub time_agg: TimeAgg,
    pub select_year: i32,
    pub country_center: bool,
    pub color_source: ColorSource,
    pub advanced: bool,
    pub regression: Regression,
    /// Compute summary denominators per panel rather than over all rows.
    pub within_split: bool,
}

/// Levels of the standard survey extract, used to resolve default metrics.
static STANDARD_LEVELS: Lazy<VariableLevels> = Lazy::new(|| {
    VariableLevels::default()
        .with(
            Column::MainActivity,
            ["Agriculture", "Industry", "Out of Workforce", "Services", "Unemployed"],
        )
        .with(Column::Sex, ["Female", "Male"])
});

impl Default for ViewDef {
    fn default() -> Self {
        Self::with_levels(&STANDARD_LEVELS)
    }
}

impl ViewDef {
    /// Dashboard defaults with metrics resolved against `levels`.
    pub fn with_levels(levels: &VariableLevels) -> Self {
        let x = Variable::new(
            &VariableSpec {
                base: Field::Gdp,
                ..VariableSpec::default()
            },
            levels,
        );
        let y = Variable::new(
            &VariableSpec {
                base: Field::Weight,
                subset: Some(LevelSelection::new(Column::MainActivity, "Agriculture", Adjust::None)),
                summary: Some(LevelSelection::new(Column::Sex, "Male", Adjust::Subtract)),
                ..VariableSpec::default()
            },
            levels,
        );
        Self {
            as_plot: true,
            lock_range: true,
            x,
            y,
            color: "country".into(),
            symbol: String::new(),
            x_panels: String::new(),
            y_panels: String::new(),
            time_agg: TimeAgg::Last,
            select_year: 2018,
            country_center: false,
            color_source: ColorSource::Region,
            advanced: false,
            regression: Regression::Polynomial,
            within_split: true,
        }
    }

    /// Maps have no time axis, so `all` collapses to `mean` there.
    pub fn effective_time_agg(&self) -> TimeAgg {
        if !self.as_plot && self.time_agg == TimeAgg::All {
            TimeAgg::Mean
        } else {
            self.time_agg
        }
    }

    pub fn role(&self, role: SplitRole) -> &str {
        match role {
            SplitRole::Color => &self.color,
            SplitRole::Symbol => &self.symbol,
            SplitRole::XPanels => &self.x_panels,
            SplitRole::YPanels => &self.y_panels,
        }
    }

    fn role_mut(&mut self, role: SplitRole) -> &mut String {
        match role {
            SplitRole::Color => &mut self.color,
            SplitRole::Symbol => &mut self.symbol,
            SplitRole::XPanels => &mut self.x_panels,
            SplitRole::YPanels => &mut self.y_panels,
        }
    }

    /// The demographic segment held by a split role, if any.
    pub fn active_segment<'a>(&'a self, levels: &Levels) -> Option<&'a str> {
        SplitRole::ALL
            .into_iter()
            .map(|role| self.role(role))
            .find(|value| levels.is_demo_segment(value))
    }

    fn assign_role(&mut self, role: SplitRole, value: String, levels: &Levels) {
        let previous = self.role(role).to_string();
        if !value.is_empty() {
            let assigning_segment = levels.is_demo_segment(&value);
            for other in SplitRole::ALL.into_iter().filter(|r| *r != role) {
                let held = self.role(other);
                if held == value {
                    *self.role_mut(other) = previous.clone();
                } else if assigning_segment && levels.is_demo_segment(held) {
                    self.role_mut(other).clear();
                }
            }
        }
        *self.role_mut(role) = value;
        if role == SplitRole::Color && self.color.is_empty() {
            self.symbol.clear();
        }
        self.promote_symbol();
    }

    fn promote_symbol(&mut self) {
        if self.color.is_empty() && !self.symbol.is_empty() {
            self.color = std::mem::take(&mut self.symbol);
        }
    }

    /// Enforce role exclusivity on a view that came from outside.
    fn sanitized(mut self, levels: &Levels) -> Self {
        let mut seen: Vec<String> = Vec::new();
        let mut segment_seen = false;
        for role in SplitRole::ALL {
            let value = self.role(role).to_string();
            if value.is_empty() {
                continue;
            }
            let is_segment = levels.is_demo_segment(&value);
            if seen.contains(&value) || (is_segment && segment_seen) {
                warn!(?role, value = %value, "dropping conflicting split role");
                self.role_mut(role).clear();
                continue;
            }
            segment_seen |= is_segment;
            seen.push(value);
        }
        self.promote_symbol();
        self
    }
}

/// Everything the reducer needs besides the state itself.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub defaults: &'a ViewDef,
    pub levels: &'a Levels,
    pub variable_levels: &'a VariableLevels,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    Reset,
    Replace(Box<ViewDef>),
    X(Variable),
    Y(Variable),
    Color(String),
    Symbol(String),
    XPanels(String),
    YPanels(String),
    TimeAgg(TimeAgg),
    SelectYear(i32),
    ColorSource(ColorSource),
    AsPlot(bool),
    LockRange(bool),
    CountryCenter(bool),
    Advanced(bool),
    Regression(Regression),
    WithinSplit(bool),
    StepYear { forward: bool },
    SwapAxes,
    SwapPanels,
}

pub fn reduce(state: &ViewDef, action: ViewAction, ctx: &ViewContext<'_>) -> ViewDef {
    trace!(?action, "view action");
    let mut next = state.clone();
    match action {
        ViewAction::Reset => {
            next = ViewDef {
                as_plot: state.as_plot,
                advanced: state.advanced,
                ..ctx.defaults.clone()
            };
        }
        ViewAction::Replace(view) => next = view.sanitized(ctx.levels),
        ViewAction::X(variable) => next.x = variable,
        ViewAction::Y(variable) => next.y = variable,
        ViewAction::Color(value) => next.assign_role(SplitRole::Color, value, ctx.levels),
        ViewAction::Symbol(value) => next.assign_role(SplitRole::Symbol, value, ctx.levels),
        ViewAction::XPanels(value) => next.assign_role(SplitRole::XPanels, value, ctx.levels),
        ViewAction::YPanels(value) => next.assign_role(SplitRole::YPanels, value, ctx.levels),
        ViewAction::TimeAgg(time_agg) => next.time_agg = time_agg,
        ViewAction::SelectYear(year) => next.select_year = year,
        ViewAction::ColorSource(source) => next.color_source = source,
        ViewAction::AsPlot(value) => next.as_plot = value,
        ViewAction::LockRange(value) => next.lock_range = value,
        ViewAction::CountryCenter(value) => next.country_center = value,
        ViewAction::Advanced(value) => next.advanced = value,
        ViewAction::Regression(regression) => next.regression = regression,
        ViewAction::WithinSplit(value) => next.within_split = value,
        ViewAction::StepYear { forward } => step_year(&mut next, forward, ctx.levels.base_year_range),
        ViewAction::SwapAxes => std::mem::swap(&mut next.x, &mut next.y),
        ViewAction::SwapPanels => std::mem::swap(&mut next.x_panels, &mut next.y_panels),
    }
    next
}

fn step_year(view: &mut ViewDef, forward: bool, (first, last): (i32, i32)) {
    let specified = view.time_agg == TimeAgg::Specified;
    if forward {
        if view.time_agg == TimeAgg::Last {
            return;
        }
        if view.select_year >= last {
            view.time_agg = TimeAgg::Last;
            return;
        }
        if specified {
            view.select_year += 1;
        }
    } else {
        if view.select_year <= first {
            view.time_agg = TimeAgg::First;
            return;
        }
        if specified {
            view.select_year -= 1;
        }
    }
    view.time_agg = TimeAgg::Specified;
    view.select_year = view.select_year.clamp(first, last.max(first));
}

/// Project a view onto what the basic menu can express. The flag reports
/// whether anything outside the basic menu had to change.
pub fn restrict_to_basic(view: &ViewDef, ctx: &ViewContext<'_>) -> (ViewDef, bool) {
    let mut basic = view.clone();
    let mut advanced = false;

    let y = &view.y;
    let basic_y = || {
        Variable::new(
            &VariableSpec {
                base: Field::Weight,
                subset: Some(LevelSelection::new(Column::MainActivity, "Agriculture", Adjust::None)),
                summary: Some(LevelSelection::new(Column::Sex, "Female", Adjust::Subtract)),
                ..VariableSpec::default()
            },
            ctx.variable_levels,
        )
    };
    if y.base() != Field::Weight
        || y.subset().variable != Some(Column::MainActivity)
        || y.summary().variable != Some(Column::Sex)
    {
        advanced = true;
        basic.y = basic_y();
    } else if y.subset().adjust != Adjust::None || y.subset().level == "Out of Workforce" {
        basic.y = basic_y();
    }

    if !matches!(view.x.base(), Field::Year | Field::Gdp | Field::GdpPpp) {
        advanced = true;
        basic.x = view.x.update(FieldUpdate::Base(Field::Gdp));
    }
    if view.color != "country" {
        advanced = true;
        basic.color = "country".into();
    }
    if !view.x_panels.is_empty() {
        advanced = true;
        basic.x_panels.clear();
    }
    if !view.symbol.is_empty() {
        advanced = true;
        basic.symbol.clear();
    }
    if !view.y_panels.is_empty() && !ctx.levels.is_demo_segment(&view.y_panels) {
        advanced = true;
        basic.y_panels.clear();
    }
    if view.country_center {
        advanced = true;
        basic.country_center = false;
    }
    if !view.within_split {
        advanced = true;
        basic.within_split = true;
    }
    if !view.lock_range {
        advanced = true;
        basic.lock_range = true;
    }
    basic.advanced = false;
    (basic, advanced)
}

pub fn is_advanced(view: &ViewDef, ctx: &ViewContext<'_>) -> bool {
    restrict_to_basic(view, ctx).1
}

/// Persisted form of a view with metrics in their compact encoding. Missing
/// entries fall back to the defaults when resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_plot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_panels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_panels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_agg: Option<TimeAgg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_center: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_source: Option<ColorSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression: Option<Regression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within_split: Option<bool>,
}

impl SavedView {
    /// Record only what differs from `defaults`.
    pub fn diff(view: &ViewDef, defaults: &ViewDef) -> Self {
        fn changed<T: PartialEq + Clone>(value: &T, default: &T) -> Option<T> {
            (value != default).then(|| value.clone())
        }
        Self {
            as_plot: changed(&view.as_plot, &defaults.as_plot),
            lock_range: changed(&view.lock_range, &defaults.lock_range),
            x: (view.x != defaults.x).then(|| view.x.to_string()),
            y: (view.y != defaults.y).then(|| view.y.to_string()),
            color: changed(&view.color, &defaults.color),
            symbol: changed(&view.symbol, &defaults.symbol),
            x_panels: changed(&view.x_panels, &defaults.x_panels),
            y_panels: changed(&view.y_panels, &defaults.y_panels),
            time_agg: changed(&view.time_agg, &defaults.time_agg),
            select_year: changed(&view.select_year, &defaults.select_year),
            country_center: changed(&view.country_center, &defaults.country_center),
            color_source: changed(&view.color_source, &defaults.color_source),
            advanced: changed(&view.advanced, &defaults.advanced),
            regression: changed(&view.regression, &defaults.regression),
            within_split: changed(&view.within_split, &defaults.within_split),
        }
    }

    /// Overlay onto `defaults`, parsing metrics against `levels`.
    pub fn resolve(self, defaults: &ViewDef, levels: &VariableLevels) -> ViewDef {
        let d = defaults.clone();
        ViewDef {
            as_plot: self.as_plot.unwrap_or(d.as_plot),
            lock_range: self.lock_range.unwrap_or(d.lock_range),
            x: self.x.map_or(d.x, |x| Variable::parse(&x, levels)),
            y: self.y.map_or(d.y, |y| Variable::parse(&y, levels)),
            color: self.color.unwrap_or(d.color),
            symbol: self.symbol.unwrap_or(d.symbol),
            x_panels: self.x_panels.unwrap_or(d.x_panels),
            y_panels: self.y_panels.unwrap_or(d.y_panels),
            time_agg: self.time_agg.unwrap_or(d.time_agg),
            select_year: self.select_year.unwrap_or(d.select_year),
            country_center: self.country_center.unwrap_or(d.country_center),
            color_source: self.color_source.unwrap_or(d.color_source),
            advanced: self.advanced.unwrap_or(d.advanced),
            regression: self.regression.unwrap_or(d.regression),
            within_split: self.within_split.unwrap_or(d.within_split),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::variable::{LevelUpdate, Which};

    fn catalog() -> Levels {
        Levels {
            countries: vec!["ARG".into(), "MEX".into()],
            demo_segments: vec!["age".into(), "education".into()],
            years: (2010..=2018).collect(),
            sectors: vec!["Agriculture".into(), "Industry".into()],
            sexes: vec!["Female".into(), "Male".into()],
            base_year_range: (2010, 2018),
            selectable: Vec::new(),
        }
    }

    fn run(state: &ViewDef, actions: impl IntoIterator<Item = ViewAction>) -> ViewDef {
        let defaults = ViewDef::default();
        let levels = catalog();
        let ctx = ViewContext {
            defaults: &defaults,
            levels: &levels,
            variable_levels: &STANDARD_LEVELS,
        };
        actions
            .into_iter()
            .fold(state.clone(), |view, action| reduce(&view, action, &ctx))
    }

    #[test]
    fn defaults_match_dashboard() {
        let view = ViewDef::default();
        assert_eq!(view.y.to_string(), "%weight:main_activity.0:!sex.1");
        assert_eq!(view.x.to_string(), "gdp:log");
        assert_eq!(view.time_agg, TimeAgg::Last);
        assert!(view.within_split);
    }

    #[test]
    fn assigning_held_value_swaps_roles() {
        let start = ViewDef {
            symbol: "sex".into(),
            ..ViewDef::default()
        };
        let view = run(&start, [ViewAction::Color("sex".into())]);
        assert_eq!(view.color, "sex");
        assert_eq!(view.symbol, "country");

        let panels = run(
            &ViewDef::default(),
            [
                ViewAction::XPanels("main_activity".into()),
                ViewAction::YPanels("main_activity".into()),
            ],
        );
        assert_eq!(panels.y_panels, "main_activity");
        assert_eq!(panels.x_panels, "");
    }

    #[test]
    fn only_one_segment_is_active() {
        let view = run(
            &ViewDef::default(),
            [
                ViewAction::YPanels("age".into()),
                ViewAction::XPanels("education".into()),
            ],
        );
        assert_eq!(view.x_panels, "education");
        assert_eq!(view.y_panels, "");
    }

    #[test]
    fn clearing_color_clears_symbol_and_orphans_are_promoted() {
        let with_symbol = run(&ViewDef::default(), [ViewAction::Symbol("sex".into())]);
        assert_eq!(with_symbol.symbol, "sex");

        let cleared = run(&with_symbol, [ViewAction::Color(String::new())]);
        assert_eq!(cleared.color, "");
        assert_eq!(cleared.symbol, "");

        let orphan = run(
            &ViewDef {
                color: String::new(),
                ..ViewDef::default()
            },
            [ViewAction::Symbol("sex".into())],
        );
        assert_eq!(orphan.color, "sex");
        assert_eq!(orphan.symbol, "");
    }

    #[test]
    fn replace_sanitizes_roles() {
        let incoming = ViewDef {
            color: "age".into(),
            symbol: "age".into(),
            y_panels: "education".into(),
            ..ViewDef::default()
        };
        let view = run(&ViewDef::default(), [ViewAction::Replace(Box::new(incoming))]);
        assert_eq!(view.color, "age");
        assert_eq!(view.symbol, "");
        assert_eq!(view.y_panels, "");
    }

    #[test]
    fn reset_keeps_display_mode() {
        let changed = ViewDef {
            as_plot: false,
            advanced: true,
            color: "sex".into(),
            regression: Regression::Linear,
            ..ViewDef::default()
        };
        let view = run(&changed, [ViewAction::Reset]);
        assert!(!view.as_plot);
        assert!(view.advanced);
        assert_eq!(view.color, "country");
        assert_eq!(view.regression, Regression::Polynomial);
    }

    #[test]
    fn axis_and_panel_flips() {
        let start = ViewDef {
            x_panels: "sex".into(),
            ..ViewDef::default()
        };
        let view = run(&start, [ViewAction::SwapAxes, ViewAction::SwapPanels]);
        assert_eq!(view.x, start.y);
        assert_eq!(view.y, start.x);
        assert_eq!(view.y_panels, "sex");
        assert_eq!(view.x_panels, "");
    }

    #[test]
    fn map_mode_averages_all_years() {
        let view = ViewDef {
            as_plot: false,
            time_agg: TimeAgg::All,
            ..ViewDef::default()
        };
        assert_eq!(view.effective_time_agg(), TimeAgg::Mean);
        let plot = ViewDef {
            as_plot: true,
            ..view
        };
        assert_eq!(plot.effective_time_agg(), TimeAgg::All);
    }

    #[test]
    fn basic_restriction_flags_advanced_settings() {
        let defaults = ViewDef::default();
        let levels = catalog();
        let ctx = ViewContext {
            defaults: &defaults,
            levels: &levels,
            variable_levels: &STANDARD_LEVELS,
        };
        assert!(!is_advanced(&defaults, &ctx));

        let segmented = ViewDef {
            y_panels: "age".into(),
            ..ViewDef::default()
        };
        assert!(!is_advanced(&segmented, &ctx));

        let custom = ViewDef {
            symbol: "sex".into(),
            x: defaults.x.update(FieldUpdate::Base(Field::Population)),
            within_split: false,
            advanced: true,
            ..ViewDef::default()
        };
        let (basic, advanced) = restrict_to_basic(&custom, &ctx);
        assert!(advanced);
        assert_eq!(basic.symbol, "");
        assert_eq!(basic.x.base(), Field::Gdp);
        assert!(basic.within_split);
        assert!(!basic.advanced);

        let lfp = ViewDef {
            y: defaults
                .y
                .update_level(Which::Subset, LevelUpdate::Adjust(Adjust::Subtract)),
            ..ViewDef::default()
        };
        let (basic, advanced) = restrict_to_basic(&lfp, &ctx);
        assert!(!advanced);
        assert_eq!(basic.y.subset().adjust, Adjust::None);
        assert_eq!(basic.y.summary().level, "Female");
    }

    #[test]
    fn saved_view_stores_only_changes() {
        let defaults = ViewDef::default();
        let view = ViewDef {
            color: "sex".into(),
            y: defaults.y.update(FieldUpdate::Percent(false)),
            ..ViewDef::default()
        };
        let saved = SavedView::diff(&view, &defaults);
        let json = serde_json::to_string(&saved).unwrap();
        assert_eq!(
            json,
            r#"{"y":"weight:main_activity.0:!sex.1","color":"sex"}"#
        );

        let parsed: SavedView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.resolve(&defaults, &STANDARD_LEVELS), view);
    }
}
