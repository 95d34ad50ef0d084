use crate::domain::signer::SignatureBundle;
use crate::domain::transaction::{Action, VendRequest};
use crate::error::{Result, VendError};
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};

/// Element name of every request sent to the hub.
pub const REQUEST_ROOT: &str = "xml";

/// Serializes a request as a single attribute-only element.
///
/// BALANCE carries only the credentials, GETTRANS adds the meter number, and
/// CHECK/PURCHASE carry the full signed vend field set.
pub fn encode(request: &VendRequest, username: &str, signature: &SignatureBundle) -> Result<Vec<u8>> {
    let mut element = BytesStart::new(REQUEST_ROOT);
    element.push_attribute(("userName", username));
    element.push_attribute(("userPass", signature.user_pass_hash()));

    match request.action {
        Action::Check | Action::Purchase => {
            let meter = request
                .meter_number
                .as_ref()
                .ok_or_else(|| VendError::Validation("meter number is required".to_string()))?;
            let amount = request
                .amount
                .ok_or_else(|| VendError::Validation("amount is required".to_string()))?;
            let amount = amount.to_wire();

            element.push_attribute(("transID", request.transaction_id.as_str()));
            element.push_attribute(("meterNum", meter.as_str()));
            element.push_attribute(("calcMode", request.calc_mode.as_str()));
            element.push_attribute(("amount", amount.as_str()));
            element.push_attribute(("verifyCode", signature.verify_code.as_str()));
            element.push_attribute(("verifyData", request.verify_data.as_str()));
        }
        Action::GetTrans => {
            let meter = request
                .meter_number
                .as_ref()
                .ok_or_else(|| VendError::Validation("meter number is required".to_string()))?;
            element.push_attribute(("meterNum", meter.as_str()));
        }
        Action::Balance => {}
    }

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Empty(element))
        .map_err(|e| VendError::Encode(e.to_string()))?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{Amount, MeterNumber};
    use rust_decimal_macros::dec;

    fn bundle() -> SignatureBundle {
        SignatureBundle {
            hashed_password: "f".repeat(32),
            verify_code: "a".repeat(32),
        }
    }

    fn render(request: &VendRequest) -> String {
        String::from_utf8(encode(request, "vendor01", &bundle()).unwrap()).unwrap()
    }

    #[test]
    fn test_purchase_field_set() {
        let request = VendRequest::purchase(
            MeterNumber::parse("0123456789").unwrap(),
            Amount::new(dec!(50.00)).unwrap(),
        );
        let xml = render(&request);

        assert!(xml.starts_with("<xml "));
        assert!(xml.ends_with("/>"));
        assert!(xml.contains("userName=\"vendor01\""));
        assert!(xml.contains(&format!("userPass=\"{}\"", "f".repeat(32))));
        assert!(xml.contains(&format!("transID=\"{}\"", request.transaction_id)));
        assert!(xml.contains("meterNum=\"0123456789\""));
        assert!(xml.contains("calcMode=\"M\""));
        assert!(xml.contains("amount=\"50.00\""));
        assert!(xml.contains(&format!("verifyCode=\"{}\"", "a".repeat(32))));
        assert!(xml.contains("verifyData=\"DONOTVERIFYDATA\""));
    }

    #[test]
    fn test_balance_is_auth_only() {
        let xml = render(&VendRequest::balance());
        assert!(xml.contains("userName="));
        assert!(xml.contains("userPass="));
        assert!(!xml.contains("transID="));
        assert!(!xml.contains("meterNum="));
        assert!(!xml.contains("verifyCode="));
    }

    #[test]
    fn test_gettrans_adds_meter_only() {
        let xml = render(&VendRequest::last_transactions(
            MeterNumber::parse("0123456789").unwrap(),
        ));
        assert!(xml.contains("meterNum=\"0123456789\""));
        assert!(!xml.contains("amount="));
        assert!(!xml.contains("transID="));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let request = VendRequest::purchase(
            MeterNumber::parse("0123456789").unwrap(),
            Amount::new(dec!(1)).unwrap(),
        )
        .with_verify_data("a\"b<c");
        let xml = render(&request);
        assert!(!xml.contains("a\"b<c"));
        assert!(xml.contains("verifyData=\"a&quot;b&lt;c\""));
    }

    #[test]
    fn test_vend_without_amount_is_rejected() {
        let mut request = VendRequest::purchase(
            MeterNumber::parse("0123456789").unwrap(),
            Amount::new(dec!(1)).unwrap(),
        );
        request.amount = None;
        assert!(matches!(
            encode(&request, "vendor01", &bundle()),
            Err(VendError::Validation(_))
        ));
    }
}
