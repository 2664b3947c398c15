//! リテラルのパース

use crate::errors::ExprError;

/// 10進数リテラルを u32 にパース
///
/// # Examples
/// ```
/// use hozuki_core::parse::parse_decimal;
///
/// assert_eq!(parse_decimal("26").unwrap(), 26);
/// assert!(parse_decimal("4294967296").is_err());
/// ```
pub fn parse_decimal(s: &str) -> Result<u32, ExprError> {
    s.parse::<u32>()
        .map_err(|_| ExprError::InvalidLiteral(s.to_string()))
}

/// 16進数リテラル（`0x`/`0X` プレフィックス付き）を u32 にパース
///
/// # Examples
/// ```
/// use hozuki_core::parse::parse_hex;
///
/// assert_eq!(parse_hex("0x1A").unwrap(), 26);
/// assert_eq!(parse_hex("0XfF").unwrap(), 255);
/// ```
pub fn parse_hex(s: &str) -> Result<u32, ExprError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| ExprError::InvalidLiteral(s.to_string()))?;

    u32::from_str_radix(digits, 16).map_err(|_| ExprError::InvalidLiteral(s.to_string()))
}
