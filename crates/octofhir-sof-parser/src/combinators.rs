//! Common parser combinators for path expressions

use octofhir_sof_ast::Literal;
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::opt;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parser input type
pub type Input<'a> = &'a str;

/// Parser result type
pub type PResult<T> = winnow::ModalResult<T>;

/// Consume optional whitespace
pub fn ws(input: &mut Input<'_>) -> PResult<()> {
    multispace0.void().parse_next(input)
}

/// Backtracking error at the current position
pub fn backtrack<T>() -> PResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// Parse an identifier: a letter or underscore followed by alphanumerics
pub fn identifier(input: &mut Input<'_>) -> PResult<String> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(str::to_string)
        .parse_next(input)
}

/// Parse an unsigned integer (array index)
pub fn index_literal(input: &mut Input<'_>) -> PResult<u64> {
    digit1.try_map(str::parse::<u64>).parse_next(input)
}

/// Parse a numeric literal, keeping decimal lexemes verbatim
pub fn number_literal(input: &mut Input<'_>) -> PResult<Literal> {
    let raw = (digit1, opt(('.', digit1))).take().parse_next(input)?;
    if raw.contains('.') {
        Ok(Literal::Decimal(raw.to_string()))
    } else {
        match raw.parse::<i64>() {
            Ok(value) => Ok(Literal::Integer(value)),
            Err(_) => backtrack(),
        }
    }
}

/// Parse a single-quoted string literal with `''` escaping
pub fn string_literal(input: &mut Input<'_>) -> PResult<String> {
    '\''.parse_next(input)?;

    let mut out = String::new();
    loop {
        let rest = *input;
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, '\'')) => {
                // Either an escaped quote or the terminator
                if rest[1..].starts_with('\'') {
                    out.push('\'');
                    *input = &rest[2..];
                } else {
                    *input = &rest[1..];
                    return Ok(out);
                }
            }
            Some((i, c)) => {
                out.push(c);
                *input = &rest[i + c.len_utf8()..];
            }
            None => return backtrack(),
        }
    }
}

/// Parse a literal value: string, number or boolean
pub fn literal(input: &mut Input<'_>) -> PResult<Literal> {
    if input.starts_with('\'') {
        return string_literal(input).map(Literal::String);
    }
    if input.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return number_literal(input);
    }

    let checkpoint = *input;
    let word = identifier(input)?;
    match word.as_str() {
        "true" => Ok(Literal::Boolean(true)),
        "false" => Ok(Literal::Boolean(false)),
        _ => {
            *input = checkpoint;
            backtrack()
        }
    }
}
