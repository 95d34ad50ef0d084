use crate::error::{Result, VendError};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique transaction identifier, at most 30 characters.
///
/// Composed of a 14 digit UTC timestamp (`YYYYMMDDHHMMSS`) followed by 64 bits
/// from the thread-local CSPRNG rendered as 16 hex digits. The random half keeps
/// ids unique across concurrent callers and across restarts without any shared
/// counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub const MAX_LEN: usize = 30;

    pub fn generate() -> Self {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let random: u64 = rand::random();
        Self(format!("{timestamp}{random:016X}"))
    }

    /// Accepts an externally supplied id (e.g. from a lookup request).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(VendError::Validation(format!(
                "transaction id must be 1..={} characters",
                Self::MAX_LEN
            )));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VendError::Validation(
                "transaction id must be alphanumeric".to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A meter number as accepted by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterNumber(String);

impl MeterNumber {
    pub const MAX_LEN: usize = 32;

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(VendError::Validation("meter number is required".to_string()));
        }
        if value.len() > Self::MAX_LEN || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VendError::Validation(format!(
                "invalid meter number: {value}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A strictly positive vend amount.
///
/// The wire form is the decimal's own string rendering, so `50.00` stays
/// `50.00` on the wire and in the signature.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(VendError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_wire(&self) -> String {
        self.0.to_string()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = VendError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Hub protocol actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Check,
    Purchase,
    Balance,
    GetTrans,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Check, Action::Purchase, Action::Balance, Action::GetTrans];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Check => "CHECK",
            Action::Purchase => "PURCHASE",
            Action::Balance => "BALANCE",
            Action::GetTrans => "GETTRANS",
        }
    }

    /// Whether the wire request carries the signed vend fields.
    pub fn is_vend(&self) -> bool {
        matches!(self, Action::Check | Action::Purchase)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_CALC_MODE: &str = "M";
/// Tells the hub to skip customer-side confirmation on single-step vends.
pub const SKIP_VERIFY_DATA: &str = "DONOTVERIFYDATA";

/// A single logical request against the hub, consumed once by the orchestrator.
///
/// A request with [`Action::Check`] is executed as a two-step vend (CHECK then
/// PURCHASE under the same transaction id).
#[derive(Debug, Clone, PartialEq)]
pub struct VendRequest {
    pub transaction_id: TransactionId,
    pub action: Action,
    pub meter_number: Option<MeterNumber>,
    pub amount: Option<Amount>,
    pub calc_mode: String,
    pub verify_data: String,
}

impl VendRequest {
    fn new(action: Action, meter_number: Option<MeterNumber>, amount: Option<Amount>) -> Self {
        Self {
            transaction_id: TransactionId::generate(),
            action,
            meter_number,
            amount,
            calc_mode: DEFAULT_CALC_MODE.to_string(),
            verify_data: SKIP_VERIFY_DATA.to_string(),
        }
    }

    pub fn purchase(meter_number: MeterNumber, amount: Amount) -> Self {
        Self::new(Action::Purchase, Some(meter_number), Some(amount))
    }

    pub fn check(meter_number: MeterNumber, amount: Amount) -> Self {
        let mut request = Self::new(Action::Check, Some(meter_number), Some(amount));
        request.verify_data = String::new();
        request
    }

    pub fn balance() -> Self {
        Self::new(Action::Balance, None, None)
    }

    pub fn last_transactions(meter_number: MeterNumber) -> Self {
        Self::new(Action::GetTrans, Some(meter_number), None)
    }

    pub fn with_calc_mode(mut self, calc_mode: impl Into<String>) -> Self {
        self.calc_mode = calc_mode.into();
        self
    }

    pub fn with_verify_data(mut self, verify_data: impl Into<String>) -> Self {
        self.verify_data = verify_data.into();
        self
    }

    /// Checks that the fields the action's wire format needs are present.
    pub fn validate(&self) -> Result<()> {
        match self.action {
            Action::Check | Action::Purchase => {
                if self.meter_number.is_none() {
                    return Err(VendError::Validation("meter number is required".to_string()));
                }
                if self.amount.is_none() {
                    return Err(VendError::Validation("amount is required".to_string()));
                }
                if self.calc_mode.trim().is_empty() {
                    return Err(VendError::Validation("calc mode is required".to_string()));
                }
            }
            Action::GetTrans => {
                if self.meter_number.is_none() {
                    return Err(VendError::Validation("meter number is required".to_string()));
                }
            }
            Action::Balance => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_generated_id_shape() {
        let id = TransactionId::generate();
        assert_eq!(id.as_str().len(), 30);
        assert!(id.as_str().len() <= TransactionId::MAX_LEN);
        assert!(id.as_str()[..14].chars().all(|c| c.is_ascii_digit()));
        assert!(TransactionId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_transaction_id_parse_rejects_bad_input() {
        assert!(TransactionId::parse("").is_err());
        assert!(TransactionId::parse(&"9".repeat(31)).is_err());
        assert!(TransactionId::parse("abc-123").is_err());
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(VendError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(VendError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_keeps_exact_scale() {
        let amount = Amount::new(dec!(50.00)).unwrap();
        assert_eq!(amount.to_wire(), "50.00");
        let amount = Amount::new(dec!(0.0001)).unwrap();
        assert_eq!(amount.to_wire(), "0.0001");
    }

    #[test]
    fn test_meter_number_validation() {
        assert_eq!(MeterNumber::parse(" 0123456789 ").unwrap().as_str(), "0123456789");
        assert!(MeterNumber::parse("").is_err());
        assert!(MeterNumber::parse("12 34").is_err());
        assert!(MeterNumber::parse("12\"/>").is_err());
    }

    #[test]
    fn test_request_validation_per_action() {
        let meter = MeterNumber::parse("01234").unwrap();
        let amount = Amount::new(dec!(10)).unwrap();

        assert!(VendRequest::purchase(meter.clone(), amount).validate().is_ok());
        assert!(VendRequest::balance().validate().is_ok());
        assert!(VendRequest::last_transactions(meter.clone()).validate().is_ok());

        let mut missing_amount = VendRequest::purchase(meter, amount);
        missing_amount.amount = None;
        assert!(matches!(
            missing_amount.validate(),
            Err(VendError::Validation(_))
        ));
    }

    #[test]
    fn test_request_defaults() {
        let meter = MeterNumber::parse("01234").unwrap();
        let amount = Amount::new(dec!(10)).unwrap();

        let purchase = VendRequest::purchase(meter.clone(), amount);
        assert_eq!(purchase.calc_mode, DEFAULT_CALC_MODE);
        assert_eq!(purchase.verify_data, SKIP_VERIFY_DATA);

        let check = VendRequest::check(meter, amount);
        assert_eq!(check.verify_data, "");
    }
}
