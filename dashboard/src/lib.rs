//! Aggregation core for the gender-gap dashboard. Metric specifications, the
//! filter and view reducers, and the series engine live here; rendering and
//! data loading stay with the host application.

pub mod core;
pub mod data;

pub use crate::core::error::{EngineError, Result};
pub use data::country::{ColorSource, CountryInfo, CountryTable};
pub use data::filter::{reduce_filter, select_rows, FilterAction, FilterDef};
pub use data::levels::{Levels, VariableLevels};
pub use data::observation::{Column, Field, Observation};
pub use data::series::{make_series, SeriesSet, SplitRefs};
pub use data::variable::{
    Adjust, FieldUpdate, LevelSelection, LevelSpec, LevelUpdate, Variable, VariableSpec, Which,
};
pub use data::view::{reduce, Regression, SavedView, TimeAgg, ViewAction, ViewContext, ViewDef};
