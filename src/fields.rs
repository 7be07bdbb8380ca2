//! Display formatting for the free-text listing and agent fields.
//!
//! Every function here is total: malformed input is passed through (trimmed)
//! rather than rejected, so a sign always renders what the agent typed.

/// `"549900"` becomes `"$549,900"`. Anything containing letters (`"$500k"`,
/// `"Call for price"`) is returned as typed.
pub fn format_price(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.chars().any(|ch| ch.is_alphabetic()) {
        return trimmed.to_string();
    }
    let whole = trimmed.split('.').next().unwrap_or(trimmed);
    let digits: String = whole.chars().filter(|ch| ch.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return trimmed.to_string();
    }
    format!("${}", group_thousands(digits))
}

pub fn format_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|ch| ch.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10]),
        11 if digits.starts_with('1') => format!(
            "1 ({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        _ => trimmed.to_string(),
    }
}

/// `"4 Bed | 3 Bath | 2,500 sqft"`, skipping blank or non-numeric parts.
pub fn format_features_line(beds: Option<&str>, baths: Option<&str>, sqft: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(beds) = parse_number(beds) {
        parts.push(format!("{} Bed", beds.trunc() as i64));
    }
    if let Some(baths) = parse_number(baths) {
        if baths.fract() == 0.0 {
            parts.push(format!("{} Bath", baths as i64));
        } else {
            parts.push(format!("{} Bath", baths));
        }
    }
    if let Some(sqft) = parse_number(sqft.map(|v| v.replace(',', "")).as_deref()) {
        let whole = sqft.trunc() as i64;
        parts.push(format!("{} sqft", group_thousands(&whole.to_string())));
    }
    parts.join(" | ")
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    let value = raw?.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().find(|ch| ch.is_alphanumeric()))
        .flat_map(|ch| ch.to_uppercase())
        .collect()
}

pub fn license_line(number: Option<&str>, state: Option<&str>) -> Option<String> {
    let number = number.map(str::trim).filter(|v| !v.is_empty())?;
    let is_california = state
        .map(|s| s.trim().eq_ignore_ascii_case("CA"))
        .unwrap_or(false);
    let label = if is_california { "DRE #" } else { "Lic #" };
    Some(format!("{} {}", label, number))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_format_or_pass_through() {
        assert_eq!(format_price("549900"), "$549,900");
        assert_eq!(format_price("$549,900"), "$549,900");
        assert_eq!(format_price("1250000.00"), "$1,250,000");
        assert_eq!(format_price("$500k"), "$500k");
        assert_eq!(format_price("  Call for price "), "Call for price");
        assert_eq!(format_price(""), "");
        assert_eq!(format_price("--"), "--");
    }

    #[test]
    fn phones_format_us_numbers() {
        assert_eq!(format_phone("555.123.4567"), "(555) 123-4567");
        assert_eq!(format_phone("+1 555 123 4567"), "1 (555) 123-4567");
        assert_eq!(format_phone(" 12345 "), "12345");
    }

    #[test]
    fn features_skip_missing_parts() {
        assert_eq!(
            format_features_line(Some("4"), Some("3.0"), Some("2500")),
            "4 Bed | 3 Bath | 2,500 sqft"
        );
        assert_eq!(format_features_line(None, Some("2.5"), Some("abc")), "2.5 Bath");
        assert_eq!(format_features_line(Some(""), None, Some("1,200")), "1,200 sqft");
        assert_eq!(format_features_line(None, None, None), "");
    }

    #[test]
    fn initials_and_license() {
        assert_eq!(initials("jane q public"), "JQ");
        assert_eq!(initials("Cher"), "C");
        assert_eq!(initials("   "), "");
        assert_eq!(license_line(Some("0123"), Some("ca")).as_deref(), Some("DRE # 0123"));
        assert_eq!(license_line(Some("77"), None).as_deref(), Some("Lic # 77"));
        assert_eq!(license_line(Some(" "), Some("CA")), None);
    }
}
