use crate::status::RecordStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One SIM extraction for a modem. Rows are append-only: a new extraction
/// inserts a new row instead of touching the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Sim {
    pub id: i32,
    pub modem_id: i32,
    pub phone_number: Option<String>,
    pub balance: Option<Decimal>,
    pub info_extracted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: RecordStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Sim {
    /// Phone number with surrounding whitespace removed, `None` when blank.
    pub fn known_phone_number(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .map(str::trim)
            .filter(|number| !number.is_empty())
    }
}

/// Parses a balance as reported by the operator, e.g. `"100.00"`, `"100,50"`
/// or `"250.00 DA"`. Returns `None` when no amount can be read.
pub fn parse_balance(text: &str) -> Option<Decimal> {
    let amount: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    amount.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_balance("100.00"), Decimal::from_str("100.00").ok());
        assert_eq!(parse_balance("100,50"), Decimal::from_str("100.50").ok());
        assert_eq!(parse_balance(" 250.00 DA"), Decimal::from_str("250.00").ok());
        assert_eq!(parse_balance("N/A"), None);
        assert_eq!(parse_balance(""), None);
    }

    #[test]
    fn test_known_phone_number_ignores_blank() {
        let mut sim = Sim {
            id: 1,
            modem_id: 1,
            phone_number: Some("   ".to_string()),
            balance: None,
            info_extracted_at: None,
            status: RecordStatus::Active,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(sim.known_phone_number(), None);

        sim.phone_number = Some(" 0550123456 ".to_string());
        assert_eq!(sim.known_phone_number(), Some("0550123456"));
    }
}
