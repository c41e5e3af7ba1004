// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Tokenizer for C++ expressions.

use crate::{
    backend::BasicType,
    bail,
    error::Result,
    eval::ast::{FloatSuffix, IntegerSuffix, Span},
};

/// Punctuators, longest first so that the first match is the longest one.
const PUNCTUATORS: &[&str] = &[
    "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "::", "+", "-", "*", "/", "%", "<", ">", "=", "!", "&",
    "|", "^", "~", "?", ":", "(", ")", "[", "]", ".", ",",
];

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword
    Word(String),
    /// Integer literal
    Integer {
        /// Value
        value: u128,
        /// Suffix
        suffix: IntegerSuffix,
        /// Written in decimal
        decimal: bool,
    },
    /// Floating point literal
    Float {
        /// Value
        value: f64,
        /// Suffix
        suffix: FloatSuffix,
    },
    /// Character literal
    Char {
        /// Code unit
        value: u32,
        /// Type selected by the prefix
        ty: BasicType,
    },
    /// Operator or punctuation
    Punct(&'static str),
    /// End of input
    Eof,
}

/// A token and its location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Kind and payload
    pub kind: TokenKind,
    /// Location in the source
    pub span: Span,
}

impl Token {
    /// Whether this is the punctuator `punct`
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    /// Whether this is the word `word`
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Split `source` into tokens, always ending with [`TokenKind::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let starts_number =
            c.is_ascii_digit() || (c == '.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit));

        let kind = if starts_number {
            pos = scan_number(bytes, pos);
            lex_number(&source[start..pos], start)?
        } else if is_identifier_start(c) {
            while pos < bytes.len() && is_identifier_continue(bytes[pos] as char) {
                pos += 1;
            }
            let word = &source[start..pos];
            let char_type = match word {
                "L" => Some(BasicType::WChar),
                "u" => Some(BasicType::Char16),
                "U" => Some(BasicType::Char32),
                "u8" => Some(BasicType::Char),
                _ => None,
            };
            match char_type {
                Some(ty) if bytes.get(pos) == Some(&b'\'') => {
                    let (value, end) = lex_char(source, pos)?;
                    pos = end;
                    TokenKind::Char { value, ty }
                }
                _ => TokenKind::Word(word.to_string()),
            }
        } else if c == '\'' {
            let (value, end) = lex_char(source, pos)?;
            pos = end;
            TokenKind::Char { value, ty: BasicType::Char }
        } else if c == '"' {
            bail!(ParseError, "string literals are not supported (at position {})", start);
        } else {
            let rest = &source[pos..];
            match PUNCTUATORS.iter().find(|punct| rest.starts_with(**punct)) {
                Some(punct) => {
                    pos += punct.len();
                    TokenKind::Punct(punct)
                }
                None => bail!(ParseError, "unexpected character '{}' at position {}", c, start),
            }
        };

        tokens.push(Token { kind, span: Span::new(start, pos) });
    }

    tokens.push(Token { kind: TokenKind::Eof, span: Span::new(source.len(), source.len()) });
    Ok(tokens)
}

/// End of the numeric literal starting at `pos` (pp-number rules)
fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() {
        let c = bytes[pos];
        let exponent_sign = (c == b'+' || c == b'-')
            && pos > 0
            && matches!(bytes[pos - 1], b'e' | b'E' | b'p' | b'P');
        if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || c == b'\'' || exponent_sign {
            pos += 1;
        } else {
            break;
        }
    }
    pos
}

fn lex_number(text: &str, start: usize) -> Result<TokenKind> {
    let cleaned: String = text.chars().filter(|c| *c != '\'').collect();
    let lower = cleaned.to_ascii_lowercase();
    let is_hex = lower.starts_with("0x");
    let is_float = if is_hex {
        lower.contains('.') || lower.contains('p')
    } else {
        lower.contains('.') || lower.contains('e')
    };

    if is_float {
        if is_hex {
            bail!(ParseError, "hexadecimal floating literals are not supported (at position {})", start);
        }
        let (digits, suffix) = match lower.chars().last() {
            Some('f') => (&cleaned[..cleaned.len() - 1], FloatSuffix::Float),
            Some('l') => (&cleaned[..cleaned.len() - 1], FloatSuffix::Long),
            _ => (cleaned.as_str(), FloatSuffix::None),
        };
        return match digits.parse::<f64>() {
            Ok(value) => Ok(TokenKind::Float { value, suffix }),
            Err(_) => bail!(ParseError, "invalid floating literal '{}' at position {}", text, start),
        };
    }

    let digits_end = lower.trim_end_matches(['u', 'l']).len();
    let (digits, suffix_text) = cleaned.split_at(digits_end);
    let suffix = parse_integer_suffix(suffix_text)
        .ok_or_else(|| crate::eval_err!(ParseError, "invalid suffix '{}' on integer literal at position {}", suffix_text, start))?;

    let (radix, body, decimal) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex, false)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin, false)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..], false)
    } else {
        (10, digits, true)
    };

    if body.is_empty() {
        bail!(ParseError, "invalid integer literal '{}' at position {}", text, start);
    }
    match u128::from_str_radix(body, radix) {
        Ok(value) => Ok(TokenKind::Integer { value, suffix, decimal }),
        Err(err) if matches!(err.kind(), std::num::IntErrorKind::PosOverflow) => {
            bail!(ParseError, "integer literal '{}' is too large (at position {})", text, start)
        }
        Err(_) => bail!(ParseError, "invalid digit in integer literal '{}' at position {}", text, start),
    }
}

fn parse_integer_suffix(text: &str) -> Option<IntegerSuffix> {
    let mut suffix = IntegerSuffix::default();
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(['u', 'U']) {
            if suffix.unsigned {
                return None;
            }
            suffix.unsigned = true;
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("ll").or_else(|| rest.strip_prefix("LL")) {
            if suffix.longs != 0 {
                return None;
            }
            suffix.longs = 2;
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(['l', 'L']) {
            if suffix.longs != 0 {
                return None;
            }
            suffix.longs = 1;
            rest = tail;
        } else {
            return None;
        }
    }
    Some(suffix)
}

/// Lex a character literal whose opening quote is at `quote`. Returns the
/// code unit and the position after the closing quote.
fn lex_char(source: &str, quote: usize) -> Result<(u32, usize)> {
    let mut chars = source[quote + 1..].char_indices();
    let unterminated = || crate::eval_err!(ParseError, "unterminated character literal at position {}", quote);

    let (_, first) = chars.next().ok_or_else(unterminated)?;
    let value = match first {
        '\'' => bail!(ParseError, "empty character literal at position {}", quote),
        '\\' => {
            let (_, escape) = chars.next().ok_or_else(unterminated)?;
            match escape {
                'n' => 0x0a,
                't' => 0x09,
                'r' => 0x0d,
                'a' => 0x07,
                'b' => 0x08,
                'f' => 0x0c,
                'v' => 0x0b,
                '0'..='7' => {
                    let mut value = escape.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match chars.clone().next() {
                            Some((_, digit @ '0'..='7')) => {
                                value = value * 8 + digit.to_digit(8).unwrap_or(0);
                                chars.next();
                            }
                            _ => break,
                        }
                    }
                    value
                }
                'x' => {
                    let mut value: u32 = 0;
                    let mut seen = false;
                    while let Some((_, digit)) = chars.clone().next() {
                        let Some(d) = digit.to_digit(16) else { break };
                        value = value.wrapping_mul(16).wrapping_add(d);
                        seen = true;
                        chars.next();
                    }
                    if !seen {
                        bail!(ParseError, "\\x used with no following hex digits at position {}", quote);
                    }
                    value
                }
                '\\' | '\'' | '"' | '?' => escape as u32,
                other => bail!(ParseError, "unknown escape sequence '\\{}' at position {}", other, quote),
            }
        }
        other => other as u32,
    };

    match chars.next() {
        Some((offset, '\'')) => Ok((value, quote + 1 + offset + 1)),
        Some(_) => bail!(ParseError, "multi-character literals are not supported (at position {})", quote),
        None => Err(unterminated()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn test_punctuators_longest_match() {
        assert_eq!(
            kinds("a<<=b->c"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Punct("<<="),
                TokenKind::Word("b".into()),
                TokenKind::Punct("->"),
                TokenKind::Word("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_literals() {
        let int = |value, unsigned, longs, decimal| TokenKind::Integer {
            value,
            suffix: IntegerSuffix { unsigned, longs },
            decimal,
        };
        assert_eq!(kinds("42")[0], int(42, false, 0, true));
        assert_eq!(kinds("0x2aUL")[0], int(42, true, 1, false));
        assert_eq!(kinds("052")[0], int(42, false, 0, false));
        assert_eq!(kinds("0b101010ll")[0], int(42, false, 2, false));
        assert_eq!(kinds("1'000'000u")[0], int(1_000_000, true, 0, true));
        assert_eq!(kinds("0")[0], int(0, false, 0, true));

        assert_eq!(tokenize("12lul").unwrap_err().kind(), ErrorKind::ParseError);
        assert_eq!(tokenize("09").unwrap_err().kind(), ErrorKind::ParseError);
        assert_eq!(
            tokenize("0x1ffffffffffffffffffffffffffffffff").unwrap_err().kind(),
            ErrorKind::ParseError
        );
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(kinds("1.5")[0], TokenKind::Float { value: 1.5, suffix: FloatSuffix::None });
        assert_eq!(kinds(".5f")[0], TokenKind::Float { value: 0.5, suffix: FloatSuffix::Float });
        assert_eq!(kinds("1e-3")[0], TokenKind::Float { value: 1e-3, suffix: FloatSuffix::None });
        assert_eq!(kinds("2.0L")[0], TokenKind::Float { value: 2.0, suffix: FloatSuffix::Long });
    }

    #[test]
    fn test_char_literals() {
        assert_eq!(kinds("'a'")[0], TokenKind::Char { value: 97, ty: BasicType::Char });
        assert_eq!(kinds("'\\n'")[0], TokenKind::Char { value: 10, ty: BasicType::Char });
        assert_eq!(kinds("'\\x41'")[0], TokenKind::Char { value: 0x41, ty: BasicType::Char });
        assert_eq!(kinds("'\\101'")[0], TokenKind::Char { value: 0o101, ty: BasicType::Char });
        assert_eq!(kinds("L'z'")[0], TokenKind::Char { value: 122, ty: BasicType::WChar });
        assert_eq!(kinds("U'z'")[0], TokenKind::Char { value: 122, ty: BasicType::Char32 });
        assert_eq!(tokenize("'ab'").unwrap_err().kind(), ErrorKind::ParseError);
        assert_eq!(tokenize("'a").unwrap_err().kind(), ErrorKind::ParseError);
    }

    #[test]
    fn test_identifiers_and_spans() {
        let tokens = tokenize("  $var + x_1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Word("$var".into()));
        assert_eq!(tokens[0].span, Span::new(2, 6));
        assert!(tokens[1].is_punct("+"));
        assert!(tokens[2].is_word("x_1"));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_rejected_input() {
        assert_eq!(tokenize("\"str\"").unwrap_err().kind(), ErrorKind::ParseError);
        assert_eq!(tokenize("a # b").unwrap_err().kind(), ErrorKind::ParseError);
    }
}
