//! Parser for the engine's textual reply syntax.
//!
//! Replies are Modelica-flavoured literals: booleans, numbers, quoted strings,
//! `{...}` arrays, `(...)` tuples, `SOME(x)`/`NONE()` options, dotted names and
//! `record Name field = value, ... end Name;` records.

use crate::error::{OmcError, OmcResult};

use super::value::Value;

/// Parse a complete reply. Whitespace-only replies are void (`Value::None`).
pub fn parse_reply(src: &str) -> OmcResult<Value> {
    let mut p = Parser { src, pos: 0 };
    p.skip_ws();
    if p.at_end() {
        return Ok(Value::None);
    }
    let value = p.value()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> OmcError {
        OmcError::Parse { offset: self.pos, message: message.into() }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> OmcResult<()> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{want}', found '{c}'"))),
            None => Err(self.error(format!("expected '{want}', found end of input"))),
        }
    }

    fn value(&mut self) -> OmcResult<Value> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("expected a value, found end of input")),
            Some('"') => self.string().map(Value::String),
            Some('{') => self.sequence('{', '}').map(Value::Array),
            Some('(') => self.sequence('(', ')').map(Value::Tuple),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if is_ident_start(c) || c == '\'' => self.named(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> OmcResult<Vec<Value>> {
        self.expect(open)?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(items);
        }
        loop {
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(items),
                Some(c) => return Err(self.error(format!("expected ',' or '{close}', found '{c}'"))),
                None => return Err(self.error(format!("unterminated sequence, expected '{close}'"))),
            }
        }
    }

    fn string(&mut self) -> OmcResult<String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c @ ('"' | '\\' | '\'' | '?')) => out.push(c),
                    // Unknown escapes are kept as written.
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> OmcResult<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_real = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_real = true,
                'e' | 'E' => {
                    is_real = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let parsed = if is_real {
            text.parse::<f64>().ok().map(Value::Real)
        } else {
            text.parse::<i64>()
                .ok()
                .map(Value::Integer)
                .or_else(|| text.parse::<f64>().ok().map(Value::Real))
        };
        parsed.ok_or_else(|| OmcError::Parse { offset: start, message: format!("invalid number '{text}'") })
    }

    fn ident(&mut self) -> OmcResult<String> {
        self.skip_ws();
        let start = self.pos;
        loop {
            match self.peek() {
                Some('\'') => {
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('\\') => {
                                self.bump();
                            }
                            Some('\'') => break,
                            Some(_) => {}
                            None => return Err(self.error("unterminated quoted identifier")),
                        }
                    }
                }
                Some(c) if is_ident_start(c) => {
                    while matches!(self.peek(), Some(c) if is_ident_char(c)) {
                        self.bump();
                    }
                }
                _ => return Err(self.error("expected an identifier")),
            }
            if self.peek() == Some('.') {
                self.bump();
            } else {
                break;
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn named(&mut self) -> OmcResult<Value> {
        let name = self.ident()?;
        match name.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "record" => return self.record(),
            "NONE" => {
                self.expect('(')?;
                self.expect(')')?;
                return Ok(Value::None);
            }
            "SOME" => {
                self.expect('(')?;
                let inner = self.value()?;
                self.expect(')')?;
                return Ok(inner);
            }
            _ => {}
        }
        Ok(Value::Ident(name))
    }

    fn record(&mut self) -> OmcResult<Value> {
        let name = self.ident()?;
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            let key = self.ident()?;
            if key == "end" {
                break;
            }
            self.expect('=')?;
            let value = self.value()?;
            fields.push((key, value));
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            }
        }
        let closing = self.ident()?;
        if closing != name {
            return Err(self.error(format!("record '{name}' closed by 'end {closing}'")));
        }
        self.expect(';')?;
        Ok(Value::Record { name, fields })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
