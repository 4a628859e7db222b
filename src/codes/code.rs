//! Code normalization and validation
//!
//! A code is exactly four alphabetic ASCII letters, stored uppercase.

/// Number of letters in a code
pub const CODE_LEN: usize = 4;

/// Why a candidate is not a valid code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeFormatError {
    #[error("required")]
    Empty,

    #[error("must be 4 letters, got {0}")]
    WrongLength(usize),

    #[error("letters only")]
    NonAlphabetic,
}

/// Trim and uppercase a candidate code
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalize a candidate and check it is a valid code
pub fn parse_code(raw: &str) -> Result<String, CodeFormatError> {
    let code = normalize(raw);
    let len = code.chars().count();

    if len == 0 {
        return Err(CodeFormatError::Empty);
    }
    if len != CODE_LEN {
        return Err(CodeFormatError::WrongLength(len));
    }
    if !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CodeFormatError::NonAlphabetic);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes() {
        assert_eq!(parse_code("robi"), Ok("ROBI".to_string()));
        assert_eq!(parse_code("  AmRo\n"), Ok("AMRO".to_string()));
    }

    #[test]
    fn test_invalid_codes() {
        assert_eq!(parse_code(""), Err(CodeFormatError::Empty));
        assert_eq!(parse_code(" \t "), Err(CodeFormatError::Empty));
        assert_eq!(parse_code("abc"), Err(CodeFormatError::WrongLength(3)));
        assert_eq!(parse_code("robin"), Err(CodeFormatError::WrongLength(5)));
        assert_eq!(parse_code("ab1d"), Err(CodeFormatError::NonAlphabetic));
        assert_eq!(parse_code("ab d"), Err(CodeFormatError::NonAlphabetic));
    }

    #[test]
    fn test_length_counts_characters() {
        assert_eq!(parse_code("éééé"), Err(CodeFormatError::NonAlphabetic));
    }
}
