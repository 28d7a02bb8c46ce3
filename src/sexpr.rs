use std::fmt;

/// An S-expression. This is the surface syntax for theory scripts, and also
/// the wire form we send to the SMT solver, so formulas never need a second
/// representation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SExpr {
    /// A bare symbol or numeral, like `forall` or `1911`.
    Atom(String),

    /// A double-quoted string literal. Only used for descriptions; formulas
    /// sent to the solver never contain these.
    String(String),

    /// A parenthesized list of subexpressions.
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn atom(s: impl Into<String>) -> SExpr {
        SExpr::Atom(s.into())
    }

    pub fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::List(items)
    }

    /// The symbol, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            SExpr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is a list whose head is the given symbol.
    pub fn has_head(&self, head: &str) -> bool {
        match self.as_list() {
            Some([first, ..]) => first.as_atom() == Some(head),
            _ => false,
        }
    }

    /// Wraps the expression in a negation.
    pub fn negated(&self) -> SExpr {
        SExpr::List(vec![SExpr::atom("not"), self.clone()])
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SExpr::Atom(s) => write!(f, "{}", s),
            SExpr::String(s) => {
                // SMT-LIB style: double quotes are escaped by doubling.
                write!(f, "\"{}\"", s.replace('"', "\"\""))
            }
            SExpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// How deep lists may nest. Everything downstream of the reader walks the
/// tree recursively (symbol checking, printing, drop), so the reader is the
/// one place depth gets bounded. Real encodings nest a handful of levels.
pub const MAX_DEPTH: usize = 200;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Input ended in the middle of a list.
    UnexpectedEof,

    /// A close paren with no matching open paren, at this byte offset.
    UnbalancedClose(usize),

    /// A string literal that was never closed, starting at this byte offset.
    UnterminatedString(usize),

    /// Lists nested past MAX_DEPTH, at this byte offset.
    TooDeep(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseError::UnbalancedClose(pos) => {
                write!(f, "unbalanced ')' at offset {}", pos)
            }
            ParseError::UnterminatedString(pos) => {
                write!(f, "unterminated string starting at offset {}", pos)
            }
            ParseError::TooDeep(pos) => {
                write!(f, "nesting exceeds {} levels at offset {}", MAX_DEPTH, pos)
            }
        }
    }
}

/// Reads every top-level S-expression in the input.
/// Comments run from ';' to the end of the line.
pub fn parse_all(input: &str) -> Result<Vec<SExpr>, ParseError> {
    let mut chars = input.char_indices().peekable();
    let mut top = Vec::new();
    // Each open paren pushes a frame; atoms go into the innermost frame.
    let mut stack: Vec<Vec<SExpr>> = Vec::new();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                while let Some(&(_, c)) = chars.peek() {
                    chars.next();
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                chars.next();
                if stack.len() >= MAX_DEPTH {
                    return Err(ParseError::TooDeep(pos));
                }
                stack.push(Vec::new());
            }
            ')' => {
                chars.next();
                let Some(items) = stack.pop() else {
                    return Err(ParseError::UnbalancedClose(pos));
                };
                let expr = SExpr::List(items);
                match stack.last_mut() {
                    Some(frame) => frame.push(expr),
                    None => top.push(expr),
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => {
                            // A doubled quote is an escaped quote.
                            if let Some(&(_, '"')) = chars.peek() {
                                chars.next();
                                s.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, c)) => s.push(c),
                        None => return Err(ParseError::UnterminatedString(pos)),
                    }
                }
                let expr = SExpr::String(s);
                match stack.last_mut() {
                    Some(frame) => frame.push(expr),
                    None => top.push(expr),
                }
            }
            _ => {
                let mut s = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == ';' || c == '"' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                let expr = SExpr::Atom(s);
                match stack.last_mut() {
                    Some(frame) => frame.push(expr),
                    None => top.push(expr),
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::UnexpectedEof);
    }
    Ok(top)
}

/// Parses input that should contain exactly one S-expression.
pub fn parse_one(input: &str) -> Result<SExpr, ParseError> {
    let mut all = parse_all(input)?;
    if all.len() != 1 {
        // Zero expressions reads as a truncated input.
        return Err(ParseError::UnexpectedEof);
    }
    Ok(all.pop().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atoms_and_lists() {
        let exprs = parse_all("(and (p a) (q b)) foo").unwrap();
        assert_eq!(exprs.len(), 2);
        assert!(exprs[0].has_head("and"));
        assert_eq!(exprs[1].as_atom(), Some("foo"));
    }

    #[test]
    fn test_parse_comments_and_strings() {
        let exprs = parse_all("; header\n(claims ((p a) \"a claim\"))\n").unwrap();
        assert_eq!(exprs.len(), 1);
        let items = exprs[0].as_list().unwrap();
        let pair = items[1].as_list().unwrap();
        assert_eq!(pair[1].as_string(), Some("a claim"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_all("(p a"), Err(ParseError::UnexpectedEof));
        assert_eq!(parse_all("p) q"), Err(ParseError::UnbalancedClose(1)));
        assert!(matches!(
            parse_all("\"oops"),
            Err(ParseError::UnterminatedString(0))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        let text = "(forall ((x Person)) (=> (mortal x) (not (god x))))";
        let expr = parse_one(text).unwrap();
        assert_eq!(expr.to_string(), text);
        assert_eq!(parse_one(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn test_escaped_quote() {
        let expr = parse_one("\"say \"\"hi\"\"\"").unwrap();
        assert_eq!(expr.as_string(), Some("say \"hi\""));
        assert_eq!(expr.to_string(), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_nesting_depth_cap() {
        let deep = format!("{}p{}", "(not ".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse_all(&deep), Err(ParseError::TooDeep(_))));

        let fine = format!("{}p{}", "(not ".repeat(64), ")".repeat(64));
        assert_eq!(parse_all(&fine).unwrap().len(), 1);
    }

    #[test]
    fn test_negated() {
        let expr = parse_one("(p a)").unwrap();
        assert_eq!(expr.negated().to_string(), "(not (p a))");
    }
}
