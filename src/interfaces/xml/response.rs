use crate::domain::hub::{HubResult, HubTransactionEntry};
use crate::error::{Result, VendError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

/// Minimal element tree; hub responses are a handful of elements.
#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> std::result::Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err("multiple root elements".to_string())
    }
}

fn parse_tree(text: &str) -> std::result::Result<Element, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err("multiple root elements".to_string());
                }
                stack.push(Element::from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("unexpected closing tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            // Declarations, comments and text carry nothing the protocol uses.
            Ok(_) => {}
            Err(e) => return Err(format!("{e} at byte {}", reader.buffer_position())),
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "no root element".to_string())
}

/// The element carrying `state`: the root itself, or one level down for
/// actions whose result is wrapped.
fn find_result(root: &Element) -> Option<&Element> {
    if root.attr("state").is_some() {
        return Some(root);
    }
    root.children.iter().find(|child| child.attr("state").is_some())
}

/// Blank is absent; anything else must be a decimal.
fn parse_decimal(value: &str) -> std::result::Result<Option<Decimal>, ()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(value).map(Some).map_err(|_| ())
}

/// Index of a numbered attribute such as `transID12`.
fn indexed(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)
        .filter(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .and_then(|rest| rest.parse().ok())
}

#[derive(Default)]
struct Listing {
    ids: BTreeMap<u32, String>,
    times: BTreeMap<u32, String>,
}

/// Keeps an auxiliary value that did not parse as its expected type.
fn keep_raw(result: &mut HubResult, name: &str, value: String) {
    warn!(field = name, value = %value, "Unreadable hub field kept as raw text");
    result.extra_fields.insert(name.to_string(), value);
}

fn apply_field(result: &mut HubResult, listing: &mut Listing, name: &str, value: String) {
    match name {
        "code" => result.error_code = Some(value),
        "invoice" => result.invoice_number = Some(value),
        "token" => result.raw_token = Some(value),
        "vendQty" | "feeAMT" | "balance" => match parse_decimal(&value) {
            Ok(parsed) => {
                let slot = match name {
                    "vendQty" => &mut result.vended_amount,
                    "feeAMT" => &mut result.fee_amount,
                    _ => &mut result.balance,
                };
                *slot = parsed;
            }
            Err(()) => keep_raw(result, name, value),
        },
        "username" | "userName" => result.username = Some(value),
        "transID" => result.transaction_id = Some(value),
        "count" => match value.trim().parse() {
            Ok(count) => result.count = Some(count),
            Err(_) => keep_raw(result, name, value),
        },
        _ => {
            if let Some(index) = indexed(name, "transID") {
                listing.ids.insert(index, value);
            } else if let Some(index) = indexed(name, "time") {
                listing.times.insert(index, value);
            } else {
                result.extra_fields.insert(name.to_string(), value);
            }
        }
    }
}

fn build_result(root: &Element) -> std::result::Result<HubResult, String> {
    let element = find_result(root).ok_or("missing state attribute")?;
    let state_raw = element.attr("state").unwrap_or_default();
    let state = state_raw
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("state is not an integer: {state_raw:?}"))?;

    let mut result = HubResult {
        root: element.name.clone(),
        state,
        ..HubResult::default()
    };
    let mut listing = Listing::default();

    for (name, value) in &element.attributes {
        if name != "state" {
            apply_field(&mut result, &mut listing, name, value.clone());
        }
    }

    for child in &element.children {
        if !child.name.eq_ignore_ascii_case("property") {
            continue;
        }
        let Some(name) = child.attr("name") else {
            continue;
        };
        let value = child.attr("value").unwrap_or_default().to_string();
        apply_field(&mut result, &mut listing, name, value);
    }

    let mut times = listing.times;
    result.transactions = listing
        .ids
        .into_iter()
        .map(|(index, transaction_id)| HubTransactionEntry {
            transaction_id,
            time: times.remove(&index),
        })
        .collect();

    Ok(result)
}

/// Parses a hub response into a [`HubResult`].
///
/// Malformed XML, or a `state` that is missing or not an integer, becomes
/// [`VendError::Parse`] carrying the raw payload. Optional fields that fail
/// to parse stay `None` and keep their text in `extra_fields`.
pub fn decode(raw: &[u8]) -> Result<HubResult> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| VendError::parse(format!("response is not UTF-8: {e}"), String::from_utf8_lossy(raw)))?;
    parse_tree(text)
        .and_then(|root| build_result(&root))
        .map_err(|reason| VendError::parse(reason, text))
}
