use crate::query_ast::Dialect;

/// Remove SQL comments from a field expression.
///
/// `/* ... */` blocks and `-- ...` line comments are removed on every
/// dialect; `# ...` line comments only on MariaDB. Comment markers inside
/// single-quoted, double-quoted or backticked text are left alone. An
/// unterminated block comment swallows the rest of the input.
pub fn strip_comments(input: &str, dialect: Dialect) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                // keep tokens on either side apart
                out.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => skip_line(&mut chars, &mut out),
            '#' if dialect.has_hash_comments() => skip_line(&mut chars, &mut out),
            _ => out.push(c),
        }
    }

    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    for c in chars.by_ref() {
        if c == '\n' {
            out.push('\n');
            break;
        }
    }
}
