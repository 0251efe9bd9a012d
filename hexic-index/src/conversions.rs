//! Conversion of value literals to their sortable index-word form.
//!
//! Numeric literals (plain numbers and numeric XSD literals) are not stored
//! in the vocabulary verbatim: they are converted to index words whose
//! lexicographic order equals numeric order, so range filters can binary
//! search the vocabulary. Negative magnitudes are nine's-complemented to
//! invert their digit order.

/// Prefix of numeric index words.
pub const NUMERIC_WORD_PREFIX: &str = ":v:num:";

const INT_DIGITS: usize = 20;
const FRAC_DIGITS: usize = 10;

/// Whether `s` is a typed XSD value literal (`"lexical"^^<...XMLSchema#...>`).
pub fn is_xsd_value(s: &str) -> bool {
    s.starts_with('"') && s.contains("\"^^<") && s.contains("XMLSchema#")
}

/// Whether `s` parses as a plain number.
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.parse::<f64>().is_ok()
}

/// Convert a typed XSD value literal to its index-word form. Numeric types
/// map to numeric index words; other types pass through unchanged.
pub fn convert_value_literal_to_index_word(s: &str) -> String {
    let Some((lexical, datatype)) = split_xsd_literal(s) else {
        return s.to_string();
    };
    const NUMERIC_TYPES: &[&str] = &[
        "int", "integer", "long", "short", "byte", "nonNegativeInteger", "positiveInteger",
        "negativeInteger", "nonPositiveInteger", "unsignedInt", "unsignedLong", "unsignedShort",
        "unsignedByte", "decimal", "float", "double",
    ];
    if NUMERIC_TYPES.contains(&datatype) && is_numeric(lexical) {
        convert_numeric_to_index_word(lexical)
    } else {
        s.to_string()
    }
}

/// Convert a plain numeric token to its index-word form.
///
/// Layout: prefix, sign class (`N` before `P`), twenty integer digits, a
/// dot, ten fraction digits; negative magnitudes nine's-complemented.
pub fn convert_numeric_to_index_word(s: &str) -> String {
    let value: f64 = s.parse().unwrap_or(0.0);
    let negative = value < 0.0;
    let magnitude = value.abs();
    let int_part = magnitude.trunc().min(1e19) as u64;
    let frac_part = ((magnitude.fract() * 10f64.powi(FRAC_DIGITS as i32)).round() as u64)
        .min(10u64.pow(FRAC_DIGITS as u32) - 1);

    let mut digits = format!(
        "{int_part:0int_width$}.{frac_part:0frac_width$}",
        int_width = INT_DIGITS,
        frac_width = FRAC_DIGITS
    );
    if negative {
        digits = digits
            .chars()
            .map(|c| match c {
                '0'..='9' => (b'9' - (c as u8 - b'0')) as char,
                other => other,
            })
            .collect();
    }
    format!(
        "{NUMERIC_WORD_PREFIX}{}{}",
        if negative { 'N' } else { 'P' },
        digits
    )
}

fn split_xsd_literal(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix('"')?;
    let (lexical, tail) = rest.split_once("\"^^<")?;
    let datatype_iri = tail.strip_suffix('>')?;
    let datatype = datatype_iri.rsplit('#').next()?;
    Some((lexical, datatype))
}
