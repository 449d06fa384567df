use crate::data::datatable::DataValue;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Rank used to order values of different types.
/// Order: Null < Boolean < Integer/Float < String < DateTime < Array < Object
fn type_rank(value: &DataValue) -> u8 {
    match value {
        DataValue::Null => 0,
        DataValue::Boolean(_) => 1,
        DataValue::Integer(_) | DataValue::Float(_) => 2,
        DataValue::String(_) => 3,
        DataValue::DateTime(_) => 4,
        DataValue::Array(_) => 5,
        DataValue::Object(_) => 6,
    }
}

/// Relational comparison of two DataValues.
///
/// Strings compare by code point here; use `compare_for_sort` for the
/// locale-aware ordering used by column sorting.
pub fn compare_datavalues(a: &DataValue, b: &DataValue) -> Ordering {
    match (a, b) {
        (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
        (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),

        // Compare actual numeric values, not types
        (DataValue::Integer(i), DataValue::Float(f)) => {
            (*i as f64).partial_cmp(f).unwrap_or(Ordering::Equal)
        }
        (DataValue::Float(f), DataValue::Integer(i)) => {
            f.partial_cmp(&(*i as f64)).unwrap_or(Ordering::Equal)
        }

        (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
        (DataValue::Boolean(a), DataValue::Boolean(b)) => a.cmp(b),
        (DataValue::DateTime(a), DataValue::DateTime(b)) => a.cmp(b),

        (DataValue::Array(a), DataValue::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ord = compare_datavalues(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }

        // Objects have no natural order
        (DataValue::Object(_), DataValue::Object(_)) => Ordering::Equal,

        (DataValue::Null, DataValue::Null) => Ordering::Equal,

        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare DataValues with optional values (handling None)
pub fn compare_optional_datavalues(a: Option<&DataValue>, b: Option<&DataValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_datavalues(a, b),
    }
}

/// Ascending sort comparison of two resolved field values.
///
/// Missing and null values sort before everything else; two strings use
/// locale-aware collation; anything else falls back to `compare_datavalues`.
pub fn compare_for_sort(
    a: Option<&DataValue>,
    b: Option<&DataValue>,
    locale: Option<&str>,
) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (Some(DataValue::String(x)), Some(DataValue::String(y))) => locale_compare(x, y, locale),
        _ => compare_optional_datavalues(a, b),
    }
}

/// Locale-aware string collation with numeric awareness ("item2" < "item10").
///
/// Letters compare case- and accent-insensitively first; accents and then
/// case (lowercase first) only break ties.
pub fn locale_compare(a: &str, b: &str, locale: Option<&str>) -> Ordering {
    let lower_a = locale_lowercase(a, locale);
    let lower_b = locale_lowercase(b, locale);

    natural_compare(&fold_accents(&lower_a), &fold_accents(&lower_b))
        .then_with(|| natural_compare(&lower_a, &lower_b))
        .then_with(|| case_order(a, b))
}

/// Lowercase honouring the dotted/dotless I of Turkish and Azeri.
pub fn locale_lowercase(s: &str, locale: Option<&str>) -> String {
    let turkic = locale
        .map(|l| {
            let l = l.to_ascii_lowercase();
            l.starts_with("tr") || l.starts_with("az")
        })
        .unwrap_or(false);

    if turkic {
        s.chars()
            .map(|c| match c {
                'I' => "ı".to_string(),
                'İ' => "i".to_string(),
                other => other.to_lowercase().to_string(),
            })
            .collect()
    } else {
        s.to_lowercase()
    }
}

/// Replace Latin-1 accented letters with their unaccented base letters.
pub fn fold_accents(s: &str) -> String {
    if !s.chars().any(|c| ('\u{C0}'..='\u{FF}').contains(&c)) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let folded = match c {
            'À'..='Å' => "A",
            'Æ' => "AE",
            'Ç' => "C",
            'È'..='Ë' => "E",
            'Ì'..='Ï' => "I",
            'Ð' => "D",
            'Ñ' => "N",
            'Ò'..='Ö' | 'Ø' => "O",
            'Ù'..='Ü' => "U",
            'Ý' => "Y",
            'Þ' => "P",
            'à'..='å' => "a",
            'æ' => "ae",
            'ç' => "c",
            'è'..='ë' => "e",
            'ì'..='ï' => "i",
            'ñ' => "n",
            'ò'..='ö' | 'ø' => "o",
            'ù'..='ü' => "u",
            'þ' => "p",
            'ý' | 'ÿ' => "y",
            _ => {
                out.push(c);
                continue;
            }
        };
        out.push_str(folded);
    }
    out
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Compare strings char by char, treating runs of ASCII digits as numbers.
fn natural_compare(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = take_digits(&mut left);
                let run_b = take_digits(&mut right);
                let trimmed_a = run_a.trim_start_matches('0');
                let trimmed_b = run_b.trim_start_matches('0');
                let ord = trimmed_a
                    .len()
                    .cmp(&trimmed_b.len())
                    .then_with(|| trimmed_a.cmp(trimmed_b));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

/// Tertiary tie-break: at the first case difference, lowercase wins.
fn case_order(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x != y {
            match (x.is_lowercase(), y.is_lowercase()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => return x.cmp(&y),
            }
        }
    }
    a.chars().count().cmp(&b.chars().count())
}
