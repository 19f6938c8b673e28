//! Formatting helpers for presenting aggregated values.

use crate::data::variable::Variable;

/// Format a value for tooltips and tables. Years print verbatim; log-scaled
/// globals show the back-transformed value followed by the logged one; shares
/// get a percent sign.
pub fn format_value(value: f64, variable: Option<&Variable>) -> String {
    if let Some(variable) = variable {
        if variable.base().is_year() {
            return format!("{value}");
        }
        if !variable.is_global() && variable.percent() && !variable.is_ratio() {
            return format_percent(value);
        }
        if variable.is_global() && variable.log() {
            return format!(
                "{} ({})",
                format_number(value.exp().round()),
                format_number(value)
            );
        }
    }
    format_number(value)
}

/// Whole numbers get thousands separators, large fractional numbers are
/// rounded to two places with separators, small ones keep two decimals.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "—".into();
    }
    if value.fract() == 0.0 {
        return group_thousands(&format!("{value:.0}"));
    }
    if value.abs() > 1e3 {
        let fixed = format!("{value:.2}");
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        return group_thousands(trimmed);
    }
    format!("{value:.2}")
}

pub fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.1}%")
    } else {
        "—".into()
    }
}

fn group_thousands(raw: &str) -> String {
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::levels::VariableLevels;
    use crate::data::observation::Field;
    use crate::data::variable::{Variable, VariableSpec};

    #[test]
    fn numbers_follow_dashboard_conventions() {
        assert_eq!(format_number(1234567.0), "1,234,567");
        assert_eq!(format_number(-1200.0), "-1,200");
        assert_eq!(format_number(1234.5), "1,234.5");
        assert_eq!(format_number(12.3456), "12.35");
        assert_eq!(format_number(f64::NAN), "—");
        assert_eq!(format_percent(12.345), "12.3%");
    }

    #[test]
    fn log_globals_show_back_transformed_value() {
        let levels = VariableLevels::default();
        let gdp = Variable::new(
            &VariableSpec {
                base: Field::Gdp,
                log: true,
                ..VariableSpec::default()
            },
            &levels,
        );
        assert_eq!(format_value(1000f64.ln(), Some(&gdp)), "1,000 (6.91)");

        let year = Variable::new(&VariableSpec::default(), &levels);
        assert_eq!(format_value(2018.0, Some(&year)), "2018");

        let share = Variable::new(
            &VariableSpec {
                base: Field::Weight,
                ..VariableSpec::default()
            },
            &levels,
        );
        assert_eq!(format_value(42.04, Some(&share)), "42.0%");
        assert_eq!(format_value(1234.0, None), "1,234");
    }
}
