//! Parsing of Makefile syntax as found in `.d` files emitted by C compilers.

use crate::scanner::{ParseResult, Scanner};

/// One `target: prerequisites` rule from a depfile.
#[derive(Debug, PartialEq)]
pub struct DepRule {
    pub target: String,
    pub deps: Vec<String>,
}

/// Skip spaces and backslashed newlines between tokens.
fn skip_spaces(scanner: &mut Scanner) -> ParseResult<()> {
    loop {
        match scanner.read() {
            ' ' | '\r' => {}
            '\\' => match scanner.read() {
                '\n' => {}
                '\r' => {
                    if !scanner.skip('\n') {
                        return scanner.parse_error("invalid backslash escape");
                    }
                }
                _ => return scanner.parse_error("invalid backslash escape"),
            },
            _ => {
                scanner.back();
                break;
            }
        }
    }
    Ok(())
}

/// Read one path token, unescaping `\ ` and `$$`.  Returns None at the end
/// of a dependency list (newline or end of input).  Note: a colon is a
/// valid path character because of Windows drive letters, so a `target:`
/// token comes back with its trailing colon attached.
fn read_path(scanner: &mut Scanner) -> ParseResult<Option<String>> {
    skip_spaces(scanner)?;
    let mut path = String::new();
    loop {
        match scanner.read() {
            '\0' | ' ' | '\n' | '\r' => {
                scanner.back();
                break;
            }
            '\\' => match scanner.peek() {
                '\n' | '\r' | '\0' => {
                    scanner.back();
                    break;
                }
                ' ' => {
                    scanner.next();
                    path.push(' ');
                }
                _ => path.push('\\'),
            },
            '$' => {
                // `$$` is a literal dollar sign.
                scanner.skip('$');
                path.push('$');
            }
            c => path.push(c),
        }
    }
    if path.is_empty() {
        return Ok(None);
    }
    Ok(Some(path))
}

/// Parse a depfile into its target rules, in file order.  Callers that
/// splice dependencies into an edge use only the first rule.
pub fn parse(scanner: &mut Scanner) -> ParseResult<Vec<DepRule>> {
    let mut rules = Vec::new();
    loop {
        while matches!(scanner.peek(), ' ' | '\n' | '\r') {
            scanner.next();
        }
        let target = match read_path(scanner)? {
            None => break,
            Some(t) => t,
        };
        scanner.skip_spaces();
        let target = match target.strip_suffix(':') {
            None => {
                scanner.expect(':')?;
                target
            }
            Some(target) => target.to_owned(),
        };
        let mut deps = Vec::new();
        while let Some(p) = read_path(scanner)? {
            deps.push(p);
        }
        rules.push(DepRule { target, deps });
    }
    scanner.expect('\0')?;

    Ok(rules)
}
