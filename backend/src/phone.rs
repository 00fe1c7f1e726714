//! Phone number normalization for password sign-up.

const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("Phone number is empty")]
    Empty,
    #[error("Phone number contains invalid character: {0:?}")]
    InvalidCharacter(char),
    #[error("Phone number must have between 8 and 15 digits, got {0}")]
    InvalidLength(usize),
}

/// Normalize a phone number to E.164.
///
/// Numbers in local format (leading `0`) or without any prefix get
/// `default_country_code` applied; `+` and `00` prefixes are kept as
/// international.
pub fn normalize_phone(input: &str, default_country_code: &str) -> Result<String, PhoneError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PhoneError::Empty);
    }

    let (international, body) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let mut digits = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            other => return Err(PhoneError::InvalidCharacter(other)),
        }
    }
    if digits.is_empty() {
        return Err(PhoneError::Empty);
    }

    let country_code = default_country_code.trim_start_matches('+');
    let national = if international {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{country_code}{rest}")
    } else if digits.starts_with(country_code) && digits.len() > MIN_DIGITS {
        digits
    } else {
        format!("{country_code}{digits}")
    };

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&national.len()) {
        return Err(PhoneError::InvalidLength(national.len()));
    }

    Ok(format!("+{national}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0244123456", "+233244123456")]
    #[case("024 412 3456", "+233244123456")]
    #[case("024-412-3456", "+233244123456")]
    #[case("(024) 412.3456", "+233244123456")]
    #[case("+233244123456", "+233244123456")]
    #[case("+233 24 412 3456", "+233244123456")]
    #[case("00233244123456", "+233244123456")]
    #[case("233244123456", "+233244123456")]
    #[case("244123456", "+233244123456")]
    #[case("+4420 7946 0958", "+442079460958")]
    fn test_normalize_phone(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_phone(input, "233").unwrap(), expected);
    }

    #[test]
    fn test_country_code_with_plus_prefix() {
        assert_eq!(normalize_phone("0244123456", "+233").unwrap(), "+233244123456");
    }

    #[rstest]
    #[case("", PhoneError::Empty)]
    #[case("   ", PhoneError::Empty)]
    #[case("+", PhoneError::Empty)]
    #[case("0244abc456", PhoneError::InvalidCharacter('a'))]
    #[case("+12", PhoneError::InvalidLength(2))]
    #[case("+1234567890123456", PhoneError::InvalidLength(16))]
    fn test_normalize_phone_rejects(#[case] input: &str, #[case] expected: PhoneError) {
        assert_eq!(normalize_phone(input, "233").unwrap_err(), expected);
    }
}
