/// Country calling code applied to local `0XXXXXXXXX` numbers.
pub const DEFAULT_COUNTRY_CODE: &str = "233";

/// Normalises a mobile-money number to E.164 for SMS delivery.
///
/// Local numbers (`0241234567`) get the country code, bare international
/// numbers (`233241234567`) get a `+`. Inputs that match neither rule are
/// returned trimmed.
pub fn normalize_msisdn(phone: &str, country_code: &str) -> String {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let national_len = 9;

    if digits.starts_with('0') && digits.len() == national_len + 1 {
        return format!("+{}{}", country_code, &digits[1..]);
    }
    if digits.starts_with(country_code) && digits.len() == country_code.len() + national_len {
        return format!("+{}", digits);
    }
    if digits.len() >= national_len && !trimmed.starts_with('+') {
        return format!("+{}", digits);
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_number() {
        assert_eq!(normalize_msisdn("0241234567", DEFAULT_COUNTRY_CODE), "+233241234567");
        assert_eq!(normalize_msisdn("024 123 4567", DEFAULT_COUNTRY_CODE), "+233241234567");
    }

    #[test]
    fn test_international_without_plus() {
        assert_eq!(normalize_msisdn("233241234567", DEFAULT_COUNTRY_CODE), "+233241234567");
        assert_eq!(normalize_msisdn("447911123456", DEFAULT_COUNTRY_CODE), "+447911123456");
    }

    #[test]
    fn test_already_formatted_and_short() {
        assert_eq!(normalize_msisdn("+233241234567", DEFAULT_COUNTRY_CODE), "+233241234567");
        assert_eq!(normalize_msisdn("12345", DEFAULT_COUNTRY_CODE), "12345");
        assert_eq!(normalize_msisdn("  ", DEFAULT_COUNTRY_CODE), "");
    }
}
