use std::collections::HashSet;
use std::fmt;

use crate::sexpr::{self, ParseError, SExpr};
use crate::theory::{Declaration, Theory, TheoryError, TheoryOptions};

/// Everything that can go wrong between raw generated text and a populated
/// theory. All of these classify as generation failures: the generator
/// produced code that does not meet the contract.
#[derive(Debug)]
pub enum ScriptError {
    Parse(ParseError),

    /// The script has no top-level function definition.
    NoFunction,

    /// The script has more than one top-level function definition.
    MultipleFunctions(usize),

    /// A top-level form that is not a function definition.
    StrayForm(String),

    /// A define form whose header is not (name args...).
    BadFunctionHeader(String),

    /// A body form with an unrecognized head.
    UnknownForm(String),

    /// A malformed declare form.
    BadDeclaration(String),

    /// A malformed quantifier.
    BadQuantifier(String),

    /// A symbol redeclared within one script.
    DuplicateSymbol(String),

    /// A formula mentions a symbol that was never declared.
    UndefinedSymbol(String),

    Theory(TheoryError),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptError::Parse(e) => write!(f, "syntax error: {}", e),
            ScriptError::NoFunction => {
                write!(f, "expected a top-level (define ...) form, found none")
            }
            ScriptError::MultipleFunctions(n) => {
                write!(f, "expected exactly one top-level function, found {}", n)
            }
            ScriptError::StrayForm(form) => {
                write!(f, "unexpected top-level form: {}", form)
            }
            ScriptError::BadFunctionHeader(header) => {
                write!(f, "bad function header: {}", header)
            }
            ScriptError::UnknownForm(head) => write!(f, "unknown form: {}", head),
            ScriptError::BadDeclaration(form) => write!(f, "bad declaration: {}", form),
            ScriptError::BadQuantifier(form) => write!(f, "bad quantifier: {}", form),
            ScriptError::DuplicateSymbol(name) => {
                write!(f, "symbol '{}' is declared twice", name)
            }
            ScriptError::UndefinedSymbol(name) => write!(f, "undefined symbol: {}", name),
            ScriptError::Theory(e) => write!(f, "{}", e),
        }
    }
}

impl From<ParseError> for ScriptError {
    fn from(e: ParseError) -> ScriptError {
        ScriptError::Parse(e)
    }
}

impl From<TheoryError> for ScriptError {
    fn from(e: TheoryError) -> ScriptError {
        ScriptError::Theory(e)
    }
}

/// Builtin operators and constants that formulas may use without declaring.
const BUILTINS: &[&str] = &[
    "and", "or", "not", "=>", "=", "distinct", "ite", "xor", "true", "false", "+", "-", "*",
    "div", "mod", "abs", "<=", "<", ">=", ">",
];

/// Builtin sorts.
const BUILTIN_SORTS: &[&str] = &["Bool", "Int", "Real"];

fn is_builtin(s: &str) -> bool {
    BUILTINS.contains(&s)
}

fn is_numeral(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => {}
        Some('-') => {
            if !chars.next().is_some_and(|c| c.is_ascii_digit()) {
                return false;
            }
        }
        _ => return false,
    }
    s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok()
}

/// The single top-level function of a generated script, located but not yet
/// called.
pub struct Script {
    pub name: String,
    body: Vec<SExpr>,
}

impl Script {
    /// Parses source text and locates the function. The contract is strict:
    /// exactly one top-level (define (name args...) body...) and nothing
    /// else.
    pub fn parse(source: &str) -> Result<Script, ScriptError> {
        let forms = sexpr::parse_all(source)?;

        let mut script = None;
        let mut count = 0;
        for form in &forms {
            if !form.has_head("define") {
                return Err(ScriptError::StrayForm(form.to_string()));
            }
            count += 1;
            if count > 1 {
                continue;
            }

            let items = form.as_list().unwrap();
            let Some(header) = items.get(1).and_then(|h| h.as_list()) else {
                return Err(ScriptError::BadFunctionHeader(
                    items.get(1).map(|h| h.to_string()).unwrap_or_default(),
                ));
            };
            let Some(name) = header.first().and_then(|n| n.as_atom()) else {
                return Err(ScriptError::BadFunctionHeader(items[1].to_string()));
            };
            script = Some(Script {
                name: name.to_string(),
                body: items[2..].to_vec(),
            });
        }

        match count {
            0 => Err(ScriptError::NoFunction),
            1 => Ok(script.unwrap()),
            n => Err(ScriptError::MultipleFunctions(n)),
        }
    }

    /// Calls the function with the given options, evaluating its body into a
    /// populated theory. Declarations are processed in order; formula groups
    /// are validated by the theory's setters and checked against the declared
    /// signature.
    pub fn call(&self, options: TheoryOptions) -> Result<Theory, ScriptError> {
        tracing::debug!(function = %self.name, "executing");
        let mut theory = Theory::new(options);
        let mut symbols: HashSet<String> = HashSet::new();
        let mut sorts: HashSet<String> =
            BUILTIN_SORTS.iter().map(|s| s.to_string()).collect();

        for form in &self.body {
            let head = match form.as_list().and_then(|items| items.first()) {
                Some(head) => head.as_atom().unwrap_or_default(),
                None => return Err(ScriptError::UnknownForm(form.to_string())),
            };
            match head {
                "declare-sort" | "declare-const" | "declare-fun" | "declare-enum" => {
                    let decl = parse_declaration(form, &sorts)?;
                    for symbol in decl.symbols() {
                        if !symbols.insert(symbol.to_string()) {
                            return Err(ScriptError::DuplicateSymbol(symbol.to_string()));
                        }
                    }
                    if let Declaration::Sort(name) | Declaration::Enum(name, _) = &decl {
                        sorts.insert(name.clone());
                    }
                    theory.add_declaration(decl);
                }
                "definitions" | "claims" | "world-knowledge" | "assertions" => {
                    let items = &form.as_list().unwrap()[1..];
                    match head {
                        "definitions" => theory.set_definitions(items)?,
                        "claims" => theory.set_claims(items)?,
                        "world-knowledge" => theory.set_world_knowledge(items)?,
                        _ => theory.set_assertions(items)?,
                    }
                    let group = match head {
                        "definitions" => theory.definitions(),
                        "claims" => theory.claims(),
                        "world-knowledge" => theory.world_knowledge(),
                        _ => theory.assertions(),
                    };
                    for formula in group {
                        let mut bound = Vec::new();
                        check_term(&formula.term, &symbols, &sorts, &mut bound)?;
                    }
                }
                _ => return Err(ScriptError::UnknownForm(form.to_string())),
            }
        }
        Ok(theory)
    }
}

/// Parses one source of generated text into a theory: locate the function,
/// call it.
pub fn run_script(source: &str, options: TheoryOptions) -> Result<Theory, ScriptError> {
    Script::parse(source)?.call(options)
}

fn parse_declaration(form: &SExpr, sorts: &HashSet<String>) -> Result<Declaration, ScriptError> {
    let bad = || ScriptError::BadDeclaration(form.to_string());
    let items = form.as_list().unwrap();
    let head = items[0].as_atom().unwrap();

    let check_sort = |sort: &str| -> Result<(), ScriptError> {
        if sorts.contains(sort) {
            Ok(())
        } else {
            Err(ScriptError::UndefinedSymbol(sort.to_string()))
        }
    };

    match head {
        "declare-sort" => match items {
            [_, name] => Ok(Declaration::Sort(
                name.as_atom().ok_or_else(bad)?.to_string(),
            )),
            _ => Err(bad()),
        },
        "declare-const" => match items {
            [_, name, sort] => {
                let sort = sort.as_atom().ok_or_else(bad)?;
                check_sort(sort)?;
                Ok(Declaration::Const(
                    name.as_atom().ok_or_else(bad)?.to_string(),
                    sort.to_string(),
                ))
            }
            _ => Err(bad()),
        },
        "declare-fun" => match items {
            [_, name, args, ret] => {
                let args = args
                    .as_list()
                    .ok_or_else(bad)?
                    .iter()
                    .map(|a| a.as_atom().map(|s| s.to_string()).ok_or_else(bad))
                    .collect::<Result<Vec<_>, _>>()?;
                for arg in &args {
                    check_sort(arg)?;
                }
                let ret = ret.as_atom().ok_or_else(bad)?;
                check_sort(ret)?;
                Ok(Declaration::Fun(
                    name.as_atom().ok_or_else(bad)?.to_string(),
                    args,
                    ret.to_string(),
                ))
            }
            _ => Err(bad()),
        },
        "declare-enum" => match items {
            [_, name, variants] => {
                let variants = variants
                    .as_list()
                    .ok_or_else(bad)?
                    .iter()
                    .map(|v| v.as_atom().map(|s| s.to_string()).ok_or_else(bad))
                    .collect::<Result<Vec<_>, _>>()?;
                if variants.is_empty() {
                    return Err(bad());
                }
                Ok(Declaration::Enum(
                    name.as_atom().ok_or_else(bad)?.to_string(),
                    variants,
                ))
            }
            _ => Err(bad()),
        },
        _ => Err(bad()),
    }
}

/// Checks that every symbol in a formula is declared, bound by an enclosing
/// quantifier, a builtin, or a numeral. The original surfaced these as
/// runtime name errors; catching them here keeps the failure on the
/// generation side without ever involving the solver.
fn check_term(
    term: &SExpr,
    symbols: &HashSet<String>,
    sorts: &HashSet<String>,
    bound: &mut Vec<String>,
) -> Result<(), ScriptError> {
    match term {
        SExpr::Atom(s) => {
            if is_builtin(s)
                || is_numeral(s)
                || symbols.contains(s)
                || bound.iter().any(|b| b == s)
            {
                Ok(())
            } else {
                Err(ScriptError::UndefinedSymbol(s.clone()))
            }
        }
        SExpr::String(s) => {
            // A stray string inside a formula is never meaningful.
            Err(ScriptError::UndefinedSymbol(format!("\"{}\"", s)))
        }
        SExpr::List(items) => {
            let head = items.first().and_then(|h| h.as_atom());
            if head == Some("forall") || head == Some("exists") {
                let [_, binders, body] = items.as_slice() else {
                    return Err(ScriptError::BadQuantifier(term.to_string()));
                };
                let binders = binders
                    .as_list()
                    .ok_or_else(|| ScriptError::BadQuantifier(term.to_string()))?;
                let depth = bound.len();
                for binder in binders {
                    let Some([name, sort]) = binder.as_list() else {
                        return Err(ScriptError::BadQuantifier(term.to_string()));
                    };
                    let (Some(name), Some(sort)) = (name.as_atom(), sort.as_atom()) else {
                        return Err(ScriptError::BadQuantifier(term.to_string()));
                    };
                    if !sorts.contains(sort) {
                        return Err(ScriptError::UndefinedSymbol(sort.to_string()));
                    }
                    bound.push(name.to_string());
                }
                check_term(body, symbols, sorts, bound)?;
                bound.truncate(depth);
                Ok(())
            } else {
                for item in items {
                    check_term(item, symbols, sorts, bound)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const SAMPLE: &str = indoc! {r#"
        ; Premises: every person who works hard succeeds. Ava works hard.
        (define (encode opts)
          (declare-sort Person)
          (declare-const ava Person)
          (declare-fun works-hard (Person) Bool)
          (declare-fun succeeds (Person) Bool)
          (claims
            ((forall ((x Person)) (=> (works-hard x) (succeeds x))) "hard work pays off")
            ((works-hard ava) "Ava works hard"))
          (assertions
            ((succeeds ava) "Ava succeeds")))
    "#};

    #[test]
    fn test_parse_and_call() {
        let script = Script::parse(SAMPLE).unwrap();
        assert_eq!(script.name, "encode");
        let theory = script.call(TheoryOptions::default()).unwrap();
        assert_eq!(theory.signature().len(), 4);
        assert_eq!(theory.claims().len(), 2);
        assert_eq!(theory.assertions().len(), 1);
        assert_eq!(theory.assertions()[0].description, "Ava succeeds");
    }

    #[test]
    fn test_no_function() {
        assert!(matches!(
            Script::parse("; just a comment\n"),
            Err(ScriptError::NoFunction)
        ));
    }

    #[test]
    fn test_multiple_functions() {
        let source = "(define (a) (claims)) (define (b) (claims))";
        assert!(matches!(
            Script::parse(source),
            Err(ScriptError::MultipleFunctions(2))
        ));
    }

    #[test]
    fn test_stray_form() {
        assert!(matches!(
            Script::parse("(declare-sort Person)"),
            Err(ScriptError::StrayForm(_))
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            Script::parse("(define (f) (claims"),
            Err(ScriptError::Parse(_))
        ));
    }

    #[test]
    fn test_undefined_symbol() {
        let source = indoc! {r#"
            (define (f)
              (declare-sort P)
              (declare-const a P)
              (claims ((mystery a) "uses an undeclared predicate")))
        "#};
        let err = run_script(source, TheoryOptions::default()).unwrap_err();
        match err {
            ScriptError::UndefinedSymbol(name) => assert_eq!(name, "mystery"),
            other => panic!("expected undefined symbol, got {}", other),
        }
    }

    #[test]
    fn test_undefined_sort_in_declaration() {
        let source = "(define (f) (declare-const a Nowhere))";
        assert!(matches!(
            run_script(source, TheoryOptions::default()),
            Err(ScriptError::UndefinedSymbol(s)) if s == "Nowhere"
        ));
    }

    #[test]
    fn test_duplicate_symbol() {
        let source = indoc! {r#"
            (define (f)
              (declare-sort P)
              (declare-const a P)
              (declare-const a P))
        "#};
        assert!(matches!(
            run_script(source, TheoryOptions::default()),
            Err(ScriptError::DuplicateSymbol(s)) if s == "a"
        ));
    }

    #[test]
    fn test_quantifier_binders_are_scoped() {
        let source = indoc! {r#"
            (define (f)
              (declare-sort P)
              (declare-fun p (P) Bool)
              (claims
                ((forall ((x P)) (p x)) "quantified")
                ((p x) "x has escaped its scope")))
        "#};
        assert!(matches!(
            run_script(source, TheoryOptions::default()),
            Err(ScriptError::UndefinedSymbol(s)) if s == "x"
        ));
    }

    #[test]
    fn test_enum_variants_usable() {
        let source = indoc! {r#"
            (define (f)
              (declare-enum Color (red blue yellow))
              (declare-const shirt Color)
              (claims ((not (= shirt red)) "the shirt is not red"))
              (assertions ((or (= shirt blue) (= shirt yellow)) "blue or yellow")))
        "#};
        let theory = run_script(source, TheoryOptions::default()).unwrap();
        assert_eq!(theory.signature().len(), 2);
    }

    #[test]
    fn test_restated_assertion_propagates() {
        let source = indoc! {r#"
            (define (f)
              (declare-sort P)
              (declare-const a P)
              (declare-fun p (P) Bool)
              (definitions ((p a) "definition"))
              (assertions ((p a) "same thing again")))
        "#};
        assert!(matches!(
            run_script(source, TheoryOptions::default()),
            Err(ScriptError::Theory(TheoryError::AssertionInDefinitions(0, _)))
        ));
    }

    #[test]
    fn test_numerals_allowed() {
        let source = indoc! {r#"
            (define (f)
              (declare-const year Int)
              (claims ((= year 1911) "the year is 1911"))
              (assertions ((> year 1900) "after 1900")))
        "#};
        run_script(source, TheoryOptions::default()).unwrap();
    }
}
