use common::Money;

use crate::error::ValidationError;

/// A customer's claim that an M-Pesa transfer was made, with the phone
/// number and receipt code normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentClaim {
    pub amount: Money,
    pub phone: String,
    pub transaction_code: String,
}

impl PaymentClaim {
    pub fn parse(amount: Money, phone: &str, transaction_code: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            amount,
            phone: normalize_phone(phone)?,
            transaction_code: normalize_transaction_code(transaction_code)?,
        })
    }
}

/// Normalizes a Kenyan mobile number to its 12-digit MSISDN form.
///
/// Accepts `0712345678`, `712345678`, `254712345678` and `+254 712 345 678`
/// (and the `01..` Safaricom range); returns `254712345678`.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let invalid = || ValidationError::InvalidPhone(raw.to_string());

    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let national = if digits.len() == 12 {
        digits.strip_prefix("254").ok_or_else(invalid)?
    } else if digits.len() == 10 {
        digits.strip_prefix('0').ok_or_else(invalid)?
    } else {
        digits
    };

    if national.len() == 9 && (national.starts_with('7') || national.starts_with('1')) {
        Ok(format!("254{national}"))
    } else {
        Err(invalid())
    }
}

/// Normalizes an M-Pesa receipt code: ten letters and digits, starting with
/// a letter, upper-cased.
pub fn normalize_transaction_code(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_ascii_uppercase();
    let well_formed = code.len() == 10
        && code.chars().all(|c| c.is_ascii_alphanumeric())
        && code.starts_with(|c: char| c.is_ascii_alphabetic());

    if well_formed {
        Ok(code)
    } else {
        Err(ValidationError::InvalidTransactionCode(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_formats_normalize_to_msisdn() {
        for raw in [
            "0712345678",
            "712345678",
            "254712345678",
            "+254712345678",
            "+254 712 345 678",
            "0712-345-678",
        ] {
            assert_eq!(normalize_phone(raw).unwrap(), "254712345678", "{raw}");
        }
        assert_eq!(normalize_phone("0110123456").unwrap(), "254110123456");
    }

    #[test]
    fn malformed_phones_are_rejected() {
        for raw in ["", "12345", "0812345678", "255712345678", "07123456789", "07123abc78"] {
            assert!(
                matches!(normalize_phone(raw), Err(ValidationError::InvalidPhone(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn transaction_codes_are_upper_cased() {
        assert_eq!(
            normalize_transaction_code(" qgh7xk2l9p ").unwrap(),
            "QGH7XK2L9P"
        );
    }

    #[test]
    fn malformed_transaction_codes_are_rejected() {
        for raw in ["", "QGH7XK2L9", "QGH7XK2L9PX", "QGH7XK-L9P", "1GH7XK2L9P"] {
            assert!(normalize_transaction_code(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn parse_builds_a_normalized_claim() {
        let claim =
            PaymentClaim::parse(Money::from_shillings(1300), "0712 345 678", "qgh7xk2l9p").unwrap();
        assert_eq!(claim.phone, "254712345678");
        assert_eq!(claim.transaction_code, "QGH7XK2L9P");
    }
}
