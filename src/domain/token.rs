use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Credit,
    KeyChange,
    CreditComplex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Tokens in the order they must be shown to the customer.
pub type TokenSet = Vec<Token>;

/// Splits a raw hub token string into typed tokens.
///
/// One part is a credit token. Two parts are a key-change token followed by a
/// credit token; key-change tokens must be entered first. Anything longer is
/// passed through untouched as a single complex credit token.
pub fn normalize(raw: Option<&str>) -> TokenSet {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let parts: Vec<&str> = raw.split_whitespace().collect();
    match parts.as_slice() {
        [] => Vec::new(),
        [credit] => vec![Token::new(TokenKind::Credit, *credit)],
        [key_change, credit] => vec![
            Token::new(TokenKind::KeyChange, *key_change),
            Token::new(TokenKind::Credit, *credit),
        ],
        _ => vec![Token::new(TokenKind::CreditComplex, raw)],
    }
}
