use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{eof, opt},
    error::{Error, ErrorKind},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

/// `name(args) [as alias]` split into its parts. Arguments are raw text,
/// separated at top-level commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallSyntax<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
    /// Alias with surrounding quotes removed
    pub alias: Option<&'a str>,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(is_word_char).parse(input)
}

fn alias_token(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('`'), identifier, char('`')),
        delimited(char('"'), identifier, char('"')),
        identifier,
    ))
    .parse(input)
}

fn alias_clause(input: &str) -> IResult<&str, &str> {
    preceded((multispace1, tag_no_case("as"), multispace1), alias_token).parse(input)
}

// Everything up to the parenthesis closing the call, tracking nesting and quotes.
fn balanced_args(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&input[i..], &input[..i])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::TakeUntil)))
}

fn function_call(input: &str) -> IResult<&str, (&str, &str, Option<&str>)> {
    terminated(
        (
            identifier,
            delimited(char('('), balanced_args, char(')')),
            opt(alias_clause),
        ),
        (multispace0, eof),
    )
    .parse(input)
}

/// Parse a complete function-call expression. The whole input must be
/// consumed; trailing text after the call or its alias is a failure.
pub fn parse_function_call(input: &str) -> Option<FunctionCallSyntax<'_>> {
    let (_, (name, args, alias)) = function_call(input.trim()).ok()?;
    let args = if args.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(args, ',')
            .into_iter()
            .map(str::trim)
            .collect()
    };
    Some(FunctionCallSyntax { name, args, alias })
}

/// Split on `sep` wherever it is outside parentheses and quotes
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Byte offset of the first top-level occurrence of any token, preferring
/// the longest token at a position. With `last`, the final occurrence wins.
pub fn find_top_level_operator<'t>(
    input: &str,
    tokens: &[&'t str],
    last: bool,
) -> Option<(usize, &'t str)> {
    let mut found = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut resume_at = 0;
    for (i, c) in input.char_indices() {
        if i < resume_at {
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                let rest = &input[i..];
                let token = tokens
                    .iter()
                    .filter(|t| rest.starts_with(**t))
                    .max_by_key(|t| t.len());
                if let Some(token) = token {
                    resume_at = i + token.len();
                    // an operator needs an operand on its left
                    if !input[..i].trim().is_empty() {
                        found = Some((i, *token));
                        if !last {
                            return found;
                        }
                    }
                }
            }
            _ => {}
        }
    }
    found
}
