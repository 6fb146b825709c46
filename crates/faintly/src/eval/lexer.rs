/*
 * lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer for `utils:eval` code.

use crate::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    String(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// Punctuators, longest first so that prefixes never shadow longer forms.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "=>", "(", ")", "[", "]",
    "{", "}", ",", ".", ":", "?", "+", "-", "*", "/", "%", "<", ">", "!",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(char::is_ascii_digit))
        {
            let (number, next) = read_number(&chars, pos)?;
            tokens.push(Token::Number(number));
            pos = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (string, next) = read_string(&chars, pos)?;
            tokens.push(Token::String(string));
            pos = next;
            continue;
        }

        if is_ident_start(c) {
            let start = pos;
            while pos < chars.len() && is_ident_part(chars[pos]) {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            continue;
        }

        let punct = PUNCTUATORS.iter().find(|p| {
            let len = p.chars().count();
            pos + len <= chars.len() && p.chars().eq(chars[pos..pos + len].iter().copied())
        });
        match punct {
            // `a?.5:1` is a conditional, not optional chaining
            Some(&"?.") if chars.get(pos + 2).is_some_and(char::is_ascii_digit) => {
                tokens.push(Token::Punct("?"));
                pos += 1;
            }
            Some(p) => {
                tokens.push(Token::Punct(p));
                pos += p.len();
            }
            None => {
                return Err(EvalError::Syntax(format!("Invalid or unexpected token '{c}'")));
            }
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), EvalError> {
    let mut pos = start;

    if chars[pos] == '0' && matches!(chars.get(pos + 1), Some('x' | 'X')) {
        pos += 2;
        let digits_start = pos;
        while pos < chars.len() && chars[pos].is_ascii_hexdigit() {
            pos += 1;
        }
        let digits: String = chars[digits_start..pos].iter().collect();
        return u64::from_str_radix(&digits, 16)
            .map(|n| (n as f64, pos))
            .map_err(|_| EvalError::Syntax("Invalid hexadecimal literal".to_string()));
    }

    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if chars.get(pos) == Some(&'.') {
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if matches!(chars.get(pos), Some('e' | 'E')) {
        let mut exp = pos + 1;
        if matches!(chars.get(exp), Some('+' | '-')) {
            exp += 1;
        }
        if chars.get(exp).is_some_and(char::is_ascii_digit) {
            pos = exp;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    if chars.get(pos).is_some_and(|c| is_ident_start(*c)) {
        return Err(EvalError::Syntax(
            "Invalid or unexpected token after number".to_string(),
        ));
    }

    let text: String = chars[start..pos].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, pos))
        .map_err(|_| EvalError::Syntax(format!("Invalid number literal '{text}'")))
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), EvalError> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut out = String::new();

    while pos < chars.len() {
        let c = chars[pos];
        if c == quote {
            return Ok((out, pos + 1));
        }
        if c == '\n' {
            break;
        }
        if c == '\\' {
            pos += 1;
            let Some(&escaped) = chars.get(pos) else {
                break;
            };
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                'u' => {
                    let hex: String = chars.iter().skip(pos + 1).take(4).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            EvalError::Syntax("Invalid Unicode escape sequence".to_string())
                        })?;
                    out.push(decoded);
                    pos += 4;
                }
                other => out.push(other),
            }
            pos += 1;
            continue;
        }
        out.push(c);
        pos += 1;
    }

    Err(EvalError::Syntax("Invalid or unexpected token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn punct(p: &'static str) -> Token {
        Token::Punct(p)
    }

    #[test]
    fn test_tokenize_expression() {
        let tokens = tokenize("a.b === 'x' ? 1.5 : -2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                punct("."),
                Token::Ident("b".into()),
                punct("==="),
                Token::String("x".into()),
                punct("?"),
                Token::Number(1.5),
                punct(":"),
                punct("-"),
                Token::Number(2.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_optional_chaining_vs_conditional() {
        assert_eq!(tokenize("a?.b").unwrap()[1], punct("?."));
        assert_eq!(tokenize("a?.5:1").unwrap()[1], punct("?"));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#""a\"b\nA""#).unwrap();
        assert_eq!(tokens[0], Token::String("a\"b\nA".into()));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("0x1F").unwrap()[0], Token::Number(31.0));
        assert_eq!(tokenize(".5").unwrap()[0], Token::Number(0.5));
        assert_eq!(tokenize("2e3").unwrap()[0], Token::Number(2000.0));
        assert!(tokenize("3abc").is_err());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize("'open"), Err(EvalError::Syntax(_))));
        assert!(matches!(tokenize("a # b"), Err(EvalError::Syntax(_))));
    }
}
