//! Registry of named match-mode predicates used by column filters

use crate::data::datatable::DataValue;
use crate::data::datavalue_compare::{compare_datavalues, fold_accents, locale_lowercase};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Built-in match mode identifiers
pub mod match_modes {
    pub const STARTS_WITH: &str = "startsWith";
    pub const CONTAINS: &str = "contains";
    pub const NOT_CONTAINS: &str = "notContains";
    pub const ENDS_WITH: &str = "endsWith";
    pub const EQUALS: &str = "equals";
    pub const NOT_EQUALS: &str = "notEquals";
    pub const IN: &str = "in";
    pub const BETWEEN: &str = "between";
    pub const LESS_THAN: &str = "lt";
    pub const LESS_THAN_OR_EQUAL_TO: &str = "lte";
    pub const GREATER_THAN: &str = "gt";
    pub const GREATER_THAN_OR_EQUAL_TO: &str = "gte";
    pub const IS: &str = "is";
    pub const IS_NOT: &str = "isNot";
    pub const BEFORE: &str = "before";
    pub const AFTER: &str = "after";
    pub const DATE_IS: &str = "dateIs";
    pub const DATE_IS_NOT: &str = "dateIsNot";
    pub const DATE_BEFORE: &str = "dateBefore";
    pub const DATE_AFTER: &str = "dateAfter";
}

/// `(field value, filter value, locale) -> matches`.
/// A missing field and an explicit null both arrive as `None`.
pub type MatchPredicate = Box<dyn Fn(Option<&DataValue>, &DataValue, Option<&str>) -> bool>;

fn present(value: Option<&DataValue>) -> Option<&DataValue> {
    value.filter(|v| !v.is_null())
}

fn normalize(value: &DataValue, locale: Option<&str>) -> String {
    locale_lowercase(&fold_accents(&value.to_string()), locale)
}

fn text_match(
    value: Option<&DataValue>,
    filter: &DataValue,
    locale: Option<&str>,
    test: impl Fn(&str, &str) -> bool,
) -> bool {
    if filter.is_blank() {
        return true;
    }
    match present(value) {
        Some(value) => test(&normalize(value, locale), &normalize(filter, locale)),
        None => false,
    }
}

fn equals(value: Option<&DataValue>, filter: &DataValue, locale: Option<&str>) -> bool {
    if filter.is_blank() {
        return true;
    }
    let Some(value) = present(value) else {
        return false;
    };
    match (value, filter) {
        (DataValue::DateTime(a), DataValue::DateTime(b)) => a == b,
        _ => value == filter || normalize(value, locale) == normalize(filter, locale),
    }
}

fn not_equals(value: Option<&DataValue>, filter: &DataValue, locale: Option<&str>) -> bool {
    if filter.is_blank() {
        return false;
    }
    let Some(value) = present(value) else {
        return true;
    };
    match (value, filter) {
        (DataValue::DateTime(a), DataValue::DateTime(b)) => a != b,
        _ => value != filter && normalize(value, locale) != normalize(filter, locale),
    }
}

/// Relational comparison with numeric coercion of numeric-looking strings
fn relational(value: &DataValue, filter: &DataValue) -> Ordering {
    match (value, filter) {
        (DataValue::String(s), other) if other.as_f64().is_some() => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| n.partial_cmp(&other.as_f64().unwrap_or(f64::NAN)))
            .unwrap_or_else(|| compare_datavalues(value, filter)),
        (other, DataValue::String(s)) if other.as_f64().is_some() => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| other.as_f64().unwrap_or(f64::NAN).partial_cmp(&n))
            .unwrap_or_else(|| compare_datavalues(value, filter)),
        _ => compare_datavalues(value, filter),
    }
}

fn compare_with(
    value: Option<&DataValue>,
    filter: &DataValue,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    if filter.is_null() {
        return true;
    }
    match present(value) {
        Some(value) => accept(relational(value, filter)),
        None => false,
    }
}

fn between(value: Option<&DataValue>, filter: &DataValue) -> bool {
    let bounds = match filter.as_array() {
        Some([low, high]) if !low.is_null() && !high.is_null() => (low, high),
        _ => return true,
    };
    match present(value) {
        Some(value) => {
            relational(value, bounds.0) != Ordering::Less
                && relational(value, bounds.1) != Ordering::Greater
        }
        None => false,
    }
}

fn date_compare(
    value: Option<&DataValue>,
    filter: &DataValue,
    test: impl Fn(&chrono::DateTime<chrono::Utc>, &chrono::DateTime<chrono::Utc>) -> bool,
) -> bool {
    if filter.is_null() {
        return true;
    }
    match (present(value).and_then(DataValue::as_datetime), filter.as_datetime()) {
        (Some(value), Some(filter)) => test(value, filter),
        _ => false,
    }
}

/// Match-mode predicate table. Hosts may register additional modes or
/// replace built-in ones.
pub struct FilterService {
    predicates: HashMap<String, MatchPredicate>,
}

impl FilterService {
    pub fn new() -> Self {
        use match_modes::*;

        let mut service = Self {
            predicates: HashMap::new(),
        };

        service.register(STARTS_WITH, |v, f, l| text_match(v, f, l, |s, p| s.starts_with(p)));
        service.register(CONTAINS, |v, f, l| text_match(v, f, l, |s, p| s.contains(p)));
        service.register(NOT_CONTAINS, |v, f, l| {
            text_match(v, f, l, |s, p| !s.contains(p))
        });
        service.register(ENDS_WITH, |v, f, l| text_match(v, f, l, |s, p| s.ends_with(p)));
        service.register(EQUALS, equals);
        service.register(NOT_EQUALS, not_equals);
        service.register(IN, |v, f, l| match f {
            DataValue::Null => true,
            DataValue::Array(items) if items.is_empty() => true,
            DataValue::Array(items) => items.iter().any(|item| equals(v, item, l)),
            single => equals(v, single, l),
        });
        service.register(BETWEEN, |v, f, _| between(v, f));
        service.register(LESS_THAN, |v, f, _| compare_with(v, f, |o| o == Ordering::Less));
        service.register(LESS_THAN_OR_EQUAL_TO, |v, f, _| {
            compare_with(v, f, |o| o != Ordering::Greater)
        });
        service.register(GREATER_THAN, |v, f, _| {
            compare_with(v, f, |o| o == Ordering::Greater)
        });
        service.register(GREATER_THAN_OR_EQUAL_TO, |v, f, _| {
            compare_with(v, f, |o| o != Ordering::Less)
        });
        service.register(IS, equals);
        service.register(IS_NOT, not_equals);
        service.register(BEFORE, |v, f, _| compare_with(v, f, |o| o == Ordering::Less));
        service.register(AFTER, |v, f, _| compare_with(v, f, |o| o == Ordering::Greater));
        service.register(DATE_IS, |v, f, _| {
            date_compare(v, f, |a, b| a.date_naive() == b.date_naive())
        });
        service.register(DATE_IS_NOT, |v, f, _| {
            date_compare(v, f, |a, b| a.date_naive() != b.date_naive())
        });
        service.register(DATE_BEFORE, |v, f, _| date_compare(v, f, |a, b| a < b));
        service.register(DATE_AFTER, |v, f, _| date_compare(v, f, |a, b| a > b));

        service
    }

    /// Add or replace a match mode
    pub fn register<F>(&mut self, match_mode: impl Into<String>, predicate: F)
    where
        F: Fn(Option<&DataValue>, &DataValue, Option<&str>) -> bool + 'static,
    {
        self.predicates.insert(match_mode.into(), Box::new(predicate));
    }

    pub fn has(&self, match_mode: &str) -> bool {
        self.predicates.contains_key(match_mode)
    }

    /// Evaluate a match mode. Unknown modes match nothing.
    pub fn evaluate(
        &self,
        match_mode: &str,
        value: Option<&DataValue>,
        filter: &DataValue,
        locale: Option<&str>,
    ) -> bool {
        match self.predicates.get(match_mode) {
            Some(predicate) => predicate(value, filter, locale),
            None => {
                warn!("Unknown filter match mode: {}", match_mode);
                false
            }
        }
    }
}

impl Default for FilterService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes: Vec<&String> = self.predicates.keys().collect();
        modes.sort();
        f.debug_struct("FilterService").field("modes", &modes).finish()
    }
}
