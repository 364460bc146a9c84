//! Rison: the compact JSON-equivalent notation the dashboards use in URL
//! hash parameters.
//!
//! ```text
//! (key:value,list:!(a,b))   ==  {"key":"value","list":["a","b"]}
//! !t !f !n                  ==  true false null
//! 'two words' 'it!'s'       ==  "two words" "it's"
//! ```
//!
//! Object keys are written in insertion order; nothing is sorted.

use super::value::{Number, Object, Value};
use crate::error::RisonError;

/// Characters that may not appear in a bare identifier
const NOT_IDCHAR: &str = " '!:(),*@$";

/// Characters that may not start a bare identifier
const NOT_IDSTART: &str = "-0123456789";

/// Parse a complete rison expression. Trailing input is an error.
pub fn parse(input: &str) -> Result<Value, RisonError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let value = parser.read_value()?;
    if parser.pos < parser.chars.len() {
        return Err(RisonError::TrailingInput { pos: parser.pos });
    }
    Ok(value)
}

/// Encode a value as rison
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn read_value(&mut self) -> Result<Value, RisonError> {
        let start = self.pos;
        let Some(c) = self.next() else {
            return Err(RisonError::Empty { pos: start });
        };
        match c {
            '!' => self.read_bang(start),
            '(' => self.read_object(start),
            '\'' => self.read_string(start).map(Value::String),
            '-' | '0'..='9' => self.read_number(start),
            c if NOT_IDCHAR.contains(c) => Err(RisonError::InvalidCharacter { ch: c, pos: start }),
            _ => Ok(Value::String(self.read_id(start))),
        }
    }

    fn read_bang(&mut self, start: usize) -> Result<Value, RisonError> {
        match self.next() {
            Some('t') => Ok(Value::Bool(true)),
            Some('f') => Ok(Value::Bool(false)),
            Some('n') => Ok(Value::Null),
            Some('(') => self.read_array(start),
            Some(ch) => Err(RisonError::UnknownLiteral { ch, pos: start }),
            None => Err(RisonError::Empty { pos: self.pos }),
        }
    }

    fn read_array(&mut self, start: usize) -> Result<Value, RisonError> {
        let mut items = Vec::new();
        loop {
            match self.next() {
                None => return Err(RisonError::Unterminated { kind: "sequence", pos: start }),
                Some(')') => return Ok(Value::Array(items)),
                Some(c) => {
                    self.expect_separator(c, !items.is_empty())?;
                    items.push(self.read_value()?);
                }
            }
        }
    }

    fn read_object(&mut self, start: usize) -> Result<Value, RisonError> {
        let mut map = Object::new();
        loop {
            match self.next() {
                None => return Err(RisonError::Unterminated { kind: "object", pos: start }),
                Some(')') => return Ok(Value::Object(map)),
                Some(c) => {
                    self.expect_separator(c, !map.is_empty())?;
                    let key_pos = self.pos;
                    let key = match self.read_value()? {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        _ => return Err(RisonError::BadKey { pos: key_pos }),
                    };
                    if self.next() != Some(':') {
                        return Err(RisonError::MissingColon { pos: self.pos.saturating_sub(1) });
                    }
                    let value = self.read_value()?;
                    map.insert(key, value);
                }
            }
        }
    }

    /// Between items a ',' is required; before the first item it is not allowed.
    /// `c` has already been consumed.
    fn expect_separator(&mut self, c: char, has_items: bool) -> Result<(), RisonError> {
        let pos = self.pos - 1;
        if has_items {
            if c != ',' {
                return Err(RisonError::MissingComma { pos });
            }
        } else if c == ',' {
            return Err(RisonError::ExtraComma { pos });
        } else {
            self.pos -= 1;
        }
        Ok(())
    }

    fn read_string(&mut self, start: usize) -> Result<String, RisonError> {
        let mut s = String::new();
        loop {
            match self.next() {
                None => return Err(RisonError::UnterminatedString { pos: start }),
                Some('\'') => return Ok(s),
                Some('!') => match self.next() {
                    Some(c @ ('!' | '\'')) => s.push(c),
                    _ => return Err(RisonError::InvalidEscape { pos: self.pos - 1 }),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Value, RisonError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Part {
            Int,
            Frac,
            Exp,
        }

        self.pos = start;
        let mut part = Part::Int;
        let mut sign_allowed = true;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
                continue;
            }
            if c == '-' && sign_allowed {
                sign_allowed = false;
                self.pos += 1;
                continue;
            }
            part = match (part, c.to_ascii_lowercase()) {
                (Part::Int, '.') => Part::Frac,
                (Part::Int | Part::Frac, 'e') => {
                    sign_allowed = true;
                    Part::Exp
                }
                _ => break,
            };
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        let invalid = RisonError::InvalidNumber { pos: start };
        if part == Part::Int {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Number(Number::Int(i)));
            }
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Number(Number::Float(f))),
            _ => Err(invalid),
        }
    }

    fn read_id(&mut self, start: usize) -> String {
        while let Some(c) = self.peek() {
            if NOT_IDCHAR.contains(c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("!n"),
        Value::Bool(true) => out.push_str("!t"),
        Value::Bool(false) => out.push_str("!f"),
        Value::Number(n) if n.is_finite() => out.push_str(&n.to_string().replace('+', "")),
        Value::Number(_) => out.push_str("!n"),
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push_str("!(");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(')');
        }
        Value::Object(map) => {
            out.push('(');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_str(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push(')');
        }
    }
}

fn write_str(out: &mut String, s: &str) {
    if is_id(s) {
        out.push_str(s);
        return;
    }
    out.push('\'');
    for c in s.chars() {
        if c == '!' || c == '\'' {
            out.push('!');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Strings that can be written without quotes
fn is_id(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        None => false,
        Some(first) if NOT_IDSTART.contains(first) || NOT_IDCHAR.contains(first) => false,
        Some(_) => chars.all(|c| !NOT_IDCHAR.contains(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Value {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse("!t").unwrap(), Value::Bool(true));
        assert_eq!(parse("!f").unwrap(), Value::Bool(false));
        assert_eq!(parse("!n").unwrap(), Value::Null);
        assert_eq!(parse("60000").unwrap(), Value::from(60000));
        assert_eq!(parse("-1.5e3").unwrap(), Value::from(-1500.0));
        assert_eq!(parse("now-15m").unwrap(), Value::from("now-15m"));
        assert_eq!(parse("''").unwrap(), Value::from(""));
    }

    #[test]
    fn test_parse_quoted_string_escapes() {
        assert_eq!(parse("'it!'s'").unwrap(), Value::from("it's"));
        assert_eq!(parse("'wow!!'").unwrap(), Value::from("wow!"));
        assert_eq!(
            parse(r#"'host:"server-1"'"#).unwrap(),
            Value::from(r#"host:"server-1""#)
        );
    }

    #[test]
    fn test_parse_nested_global_state() {
        let value = parse("(refreshInterval:(pause:!t,value:60000),time:(from:now-15m,to:now))").unwrap();
        let expected = obj(&[
            (
                "refreshInterval",
                obj(&[("pause", Value::from(true)), ("value", Value::from(60000))]),
            ),
            (
                "time",
                obj(&[("from", Value::from("now-15m")), ("to", Value::from("now"))]),
            ),
        ]);
        assert_eq!(value, expected);
    }

    #[test]
    fn test_parse_arrays() {
        assert_eq!(parse("!()").unwrap(), Value::Array(vec![]));
        assert_eq!(
            parse("!(message,'@timestamp',!(1,2))").unwrap(),
            Value::Array(vec![
                Value::from("message"),
                Value::from("@timestamp"),
                Value::Array(vec![Value::from(1), Value::from(2)]),
            ])
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(RisonError::Empty { pos: 0 }));
        assert_eq!(parse("!x"), Err(RisonError::UnknownLiteral { ch: 'x', pos: 0 }));
        assert_eq!(parse("'open"), Err(RisonError::UnterminatedString { pos: 0 }));
        assert_eq!(parse("'bad!x'"), Err(RisonError::InvalidEscape { pos: 5 }));
        assert_eq!(parse("(a:1"), Err(RisonError::Unterminated { kind: "object", pos: 0 }));
        assert_eq!(parse("!(1"), Err(RisonError::Unterminated { kind: "sequence", pos: 0 }));
        assert_eq!(parse("(,a:1)"), Err(RisonError::ExtraComma { pos: 1 }));
        assert_eq!(parse("(a:1 b:2)"), Err(RisonError::MissingComma { pos: 4 }));
        assert_eq!(parse(")"), Err(RisonError::InvalidCharacter { ch: ')', pos: 0 }));
        assert_eq!(parse("(a)"), Err(RisonError::MissingColon { pos: 2 }));
        assert_eq!(parse("(!t:1)"), Err(RisonError::BadKey { pos: 1 }));
        assert_eq!(parse("-"), Err(RisonError::InvalidNumber { pos: 0 }));
        assert_eq!(parse("abc)"), Err(RisonError::TrailingInput { pos: 3 }));
        assert_eq!(parse("123abc"), Err(RisonError::TrailingInput { pos: 3 }));
    }

    #[test]
    fn test_encode_quotes_only_when_needed() {
        assert_eq!(to_string(&Value::from("kuery")), "kuery");
        assert_eq!(to_string(&Value::from("now-15m")), "now-15m");
        assert_eq!(to_string(&Value::from("")), "''");
        assert_eq!(to_string(&Value::from("500")), "'500'");
        assert_eq!(to_string(&Value::from("-x")), "'-x'");
        assert_eq!(to_string(&Value::from("a b")), "'a b'");
        assert_eq!(to_string(&Value::from("it's!")), "'it!'s!!'");
        assert_eq!(
            to_string(&Value::from(r#"status_code:"500""#)),
            r#"'status_code:"500"'"#
        );
    }

    #[test]
    fn test_encode_preserves_key_order() {
        let value = obj(&[
            ("query", obj(&[("query", Value::from("x")), ("language", Value::from("kuery"))])),
            ("columns", Value::Array(vec![Value::from("message")])),
            ("filters", Value::Array(vec![])),
        ]);
        assert_eq!(
            to_string(&value),
            "(query:(query:x,language:kuery),columns:!(message),filters:!())"
        );
    }

    #[test]
    fn test_encode_literals_and_numbers() {
        let value = Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::from(-3),
            Value::from(0.25),
            Value::from(f64::NAN),
        ]);
        assert_eq!(to_string(&value), "!(!n,!t,!f,-3,0.25,!n)");
    }

    #[test]
    fn test_numeric_object_keys_become_strings() {
        let value = parse("(1:a)").unwrap();
        assert_eq!(value.get("1"), Some(&Value::from("a")));
    }
}
