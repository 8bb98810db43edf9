use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::{Regex, RegexSet};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, warn};
use utoipa::ToSchema;

pub mod route;

pub const DEFAULT_MARGIN_MINUTES: i64 = 1;
pub const MAX_MARGIN_MINUTES: i64 = 24 * 60;

/// Operator messages that mention an amount but are not a recharge
/// (bonuses, promotional balance, customer care).
static REJECT_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)Sama Mix",
        r"(?i)valable",
        r"(?i)Bonus",
        r"(?i)est ajoutée",
        r"(?i)Cher\s+(?:Mr|Mrs)",
        r"(?i)contactez le service client",
    ])
    .expect("reject patterns are valid")
});

/// `Vous avez rechargé <amount> DA ... le <date> <time>`
static RECHARGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Vous avez rechargé.*?(\d+(?:[.,]\d+)?)\s*(?:DZD|DA).*?le\s*(\d{2}[/\-]\d{2}[/\-]\d{4})\s*(\d{2}:\d{2}:\d{2})",
    )
    .expect("recharge pattern is valid")
});

const SMS_DATETIME_FORMATS: [&str; 2] = ["%d/%m/%Y %H:%M:%S", "%d-%m-%Y %H:%M:%S"];

const USER_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const USER_TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p"];

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RechargeInfo {
    pub amount: Decimal,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verification {
    /// The SMS is not a recharge confirmation.
    NotRecharge,
    /// The claimed date or time could not be read.
    InvalidClaim,
    Mismatch { recharge: RechargeInfo },
    Matched { recharge: RechargeInfo },
}

/// Checks recharge SMS against what a user says they recharged.
#[derive(Debug, Clone)]
pub struct RechargeVerifier {
    margin: TimeDelta,
}

impl Default for RechargeVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_MINUTES)
    }
}

impl RechargeVerifier {
    /// `margin_minutes` is clamped to `0..=MAX_MARGIN_MINUTES`.
    pub fn new(margin_minutes: i64) -> Self {
        Self {
            margin: TimeDelta::minutes(margin_minutes.clamp(0, MAX_MARGIN_MINUTES)),
        }
    }

    /// Reject markers win over anything amount-like in the text.
    pub fn is_valid_recharge_sms(&self, sms: &str) -> bool {
        if REJECT_PATTERNS.is_match(sms) {
            debug!("SMS rejected by a non-recharge marker");
            return false;
        }
        let valid = RECHARGE_PATTERN.is_match(sms);
        if !valid {
            debug!("SMS does not match the recharge template");
        }
        valid
    }

    pub fn extract_recharge_info(&self, sms: &str) -> Option<RechargeInfo> {
        let Some(captures) = RECHARGE_PATTERN.captures(sms) else {
            warn!("Could not extract recharge info from: {sms}");
            return None;
        };

        let amount = Decimal::from_str(&captures[1].replace(',', ".")).ok()?;
        let datetime = format!("{} {}", &captures[2], &captures[3]);
        let timestamp = SMS_DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&datetime, format).ok())?;

        Some(RechargeInfo { amount, timestamp })
    }

    pub fn parse_user_datetime(&self, date: &str, time: &str) -> Option<NaiveDateTime> {
        let date = date.trim();
        let time = time.trim();

        let Some(date) = USER_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        else {
            debug!("Could not parse date: {date}");
            return None;
        };
        let Some(time) = USER_TIME_FORMATS
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(time, format).ok())
        else {
            debug!("Could not parse time: {time}");
            return None;
        };

        Some(date.and_time(time))
    }

    pub fn is_datetime_match(&self, sms: NaiveDateTime, claimed: NaiveDateTime) -> bool {
        (sms - claimed).abs() <= self.margin
    }

    /// Whole units only; cents are ignored on both sides.
    pub fn is_amount_match(&self, sms: Decimal, claimed: Decimal) -> bool {
        sms.trunc() == claimed.trunc()
    }

    pub fn verify(&self, sms: &str, amount: Decimal, date: &str, time: &str) -> Verification {
        if !self.is_valid_recharge_sms(sms) {
            return Verification::NotRecharge;
        }
        let Some(recharge) = self.extract_recharge_info(sms) else {
            return Verification::NotRecharge;
        };
        let Some(claimed) = self.parse_user_datetime(date, time) else {
            return Verification::InvalidClaim;
        };

        if self.is_amount_match(recharge.amount, amount)
            && self.is_datetime_match(recharge.timestamp, claimed)
        {
            Verification::Matched { recharge }
        } else {
            Verification::Mismatch { recharge }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RECHARGE_SMS: &str = "Vous avez rechargé 100 DA avec succès le 01/01/2025 10:00:00. Merci.";

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_extract_canonical_recharge() {
        let verifier = RechargeVerifier::default();
        assert!(verifier.is_valid_recharge_sms(RECHARGE_SMS));

        let info = verifier.extract_recharge_info(RECHARGE_SMS).unwrap();
        assert_eq!(info.amount, Decimal::from(100));
        assert_eq!(info.timestamp, at("2025-01-01 10:00:00"));
    }

    #[test]
    fn test_extract_decimal_comma_and_dashed_date() {
        let verifier = RechargeVerifier::default();
        let info = verifier
            .extract_recharge_info("Vous avez rechargé 250,50 DZD le 18-07-2025 14:30:05")
            .unwrap();
        assert_eq!(info.amount, Decimal::from_str("250.50").unwrap());
        assert_eq!(info.timestamp, at("2025-07-18 14:30:05"));
    }

    #[rstest]
    #[case("Sama Mix: vous avez rechargé 100 DA le 01/01/2025 10:00:00")]
    #[case("Vous avez rechargé 100 DA le 01/01/2025 10:00:00, valable 30 jours")]
    #[case("BONUS de 500 DA est ajoutée à votre compte")]
    #[case("Cher Mr, contactez le service client")]
    #[case("Votre solde est de 100 DA")]
    fn test_rejects_non_recharge_sms(#[case] sms: &str) {
        assert!(!RechargeVerifier::default().is_valid_recharge_sms(sms));
    }

    #[rstest]
    #[case("2025-07-18", "14:30", "2025-07-18 14:30:00")]
    #[case("18/07/2025", "14:30:15", "2025-07-18 14:30:15")]
    #[case("18-07-2025", "2:30 PM", "2025-07-18 14:30:00")]
    #[case("2025/07/18", "02:30:10 AM", "2025-07-18 02:30:10")]
    #[case(" 2025-07-18 ", " 09:05 ", "2025-07-18 09:05:00")]
    fn test_parse_user_datetime(#[case] date: &str, #[case] time: &str, #[case] expected: &str) {
        let parsed = RechargeVerifier::default().parse_user_datetime(date, time);
        assert_eq!(parsed, Some(at(expected)));
    }

    #[rstest]
    #[case("July 18", "14:30")]
    #[case("2025-07-18", "half past two")]
    fn test_parse_user_datetime_rejects_unknown_formats(#[case] date: &str, #[case] time: &str) {
        assert_eq!(RechargeVerifier::default().parse_user_datetime(date, time), None);
    }

    #[test]
    fn test_datetime_margin() {
        let verifier = RechargeVerifier::default();
        let sms = at("2025-01-01 10:00:00");
        assert!(verifier.is_datetime_match(sms, at("2025-01-01 10:01:00")));
        assert!(verifier.is_datetime_match(sms, at("2025-01-01 09:59:00")));
        assert!(!verifier.is_datetime_match(sms, at("2025-01-01 10:01:01")));
        assert!(RechargeVerifier::new(5).is_datetime_match(sms, at("2025-01-01 10:04:00")));
    }

    #[test]
    fn test_margin_out_of_range_is_clamped() {
        let sms = at("2025-01-01 10:00:00");

        let negative = RechargeVerifier::new(-5);
        assert!(negative.is_datetime_match(sms, sms));
        assert!(!negative.is_datetime_match(sms, at("2025-01-01 10:00:01")));

        let huge = RechargeVerifier::new(i64::MAX);
        assert!(huge.is_datetime_match(sms, at("2025-01-01 23:59:59")));
        assert!(!huge.is_datetime_match(sms, at("2025-01-02 10:00:01")));
    }

    #[test]
    fn test_amount_match_ignores_cents() {
        let verifier = RechargeVerifier::default();
        let amount = |s: &str| Decimal::from_str(s).unwrap();
        assert!(verifier.is_amount_match(amount("100.75"), amount("100")));
        assert!(!verifier.is_amount_match(amount("101"), amount("100.99")));
    }

    #[test]
    fn test_verify_outcomes() {
        let verifier = RechargeVerifier::default();
        let hundred = Decimal::from(100);

        assert_eq!(
            verifier.verify(RECHARGE_SMS, hundred, "2025-01-01", "10:00"),
            Verification::Matched {
                recharge: RechargeInfo {
                    amount: hundred,
                    timestamp: at("2025-01-01 10:00:00"),
                }
            }
        );
        assert!(matches!(
            verifier.verify(RECHARGE_SMS, Decimal::from(200), "2025-01-01", "10:00"),
            Verification::Mismatch { .. }
        ));
        assert!(matches!(
            verifier.verify(RECHARGE_SMS, hundred, "2025-01-01", "10:05"),
            Verification::Mismatch { .. }
        ));
        assert_eq!(
            verifier.verify(RECHARGE_SMS, hundred, "yesterday", "10:00"),
            Verification::InvalidClaim
        );
        assert_eq!(
            verifier.verify("Bonus 100 DA", hundred, "2025-01-01", "10:00"),
            Verification::NotRecharge
        );
    }
}
