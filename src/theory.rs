use std::fmt;

use crate::sexpr::SExpr;

/// Ablation switches for a judgment run. Generated functions receive these,
/// and the judgment procedure reads them back off the theory.
#[derive(Clone, Copy, Debug)]
pub struct TheoryOptions {
    /// Whether the definitions group is part of the premise set.
    pub use_definitions: bool,

    /// Whether the world-knowledge group is part of the premise set.
    pub use_common_knowledge: bool,
}

impl Default for TheoryOptions {
    fn default() -> Self {
        TheoryOptions {
            use_definitions: true,
            use_common_knowledge: true,
        }
    }
}

/// A logical expression paired with the human-readable sentence it encodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    pub term: SExpr,
    pub description: String,
}

impl Formula {
    pub fn new(term: SExpr, description: impl Into<String>) -> Formula {
        Formula {
            term,
            description: description.into(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.term)
    }
}

/// A symbol declaration in the theory's signature.
#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    /// An uninterpreted sort, like Person.
    Sort(String),

    /// A constant with its sort.
    Const(String, String),

    /// A function with argument sorts and a return sort.
    Fun(String, Vec<String>, String),

    /// A finite sort with named, pairwise-distinct variants.
    Enum(String, Vec<String>),
}

impl Declaration {
    /// The symbols this declaration introduces. An enum introduces its sort
    /// name plus every variant.
    pub fn symbols(&self) -> Vec<&str> {
        match self {
            Declaration::Sort(name) => vec![name],
            Declaration::Const(name, _) => vec![name],
            Declaration::Fun(name, _, _) => vec![name],
            Declaration::Enum(name, variants) => {
                let mut symbols = vec![name.as_str()];
                symbols.extend(variants.iter().map(|v| v.as_str()));
                symbols
            }
        }
    }

    /// The SMT-LIB command that declares this symbol.
    pub fn to_sexpr(&self) -> SExpr {
        match self {
            Declaration::Sort(name) => SExpr::list(vec![
                SExpr::atom("declare-sort"),
                SExpr::atom(name.clone()),
                SExpr::atom("0"),
            ]),
            Declaration::Const(name, sort) => SExpr::list(vec![
                SExpr::atom("declare-const"),
                SExpr::atom(name.clone()),
                SExpr::atom(sort.clone()),
            ]),
            Declaration::Fun(name, args, ret) => SExpr::list(vec![
                SExpr::atom("declare-fun"),
                SExpr::atom(name.clone()),
                SExpr::list(args.iter().map(|a| SExpr::atom(a.clone())).collect()),
                SExpr::atom(ret.clone()),
            ]),
            Declaration::Enum(name, variants) => SExpr::list(vec![
                SExpr::atom("declare-datatypes"),
                SExpr::list(vec![SExpr::list(vec![
                    SExpr::atom(name.clone()),
                    SExpr::atom("0"),
                ])]),
                SExpr::list(vec![SExpr::list(
                    variants
                        .iter()
                        .map(|v| SExpr::list(vec![SExpr::atom(v.clone())]))
                        .collect(),
                )]),
            ]),
        }
    }
}

/// The four formula groups of a theory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Group {
    Definitions,
    Claims,
    WorldKnowledge,
    Assertions,
}

impl Group {
    pub fn name(&self) -> &'static str {
        match self {
            Group::Definitions => "definitions",
            Group::Claims => "claims",
            Group::WorldKnowledge => "world-knowledge",
            Group::Assertions => "assertions",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, PartialEq)]
pub enum TheoryError {
    /// A group item that is neither a (formula "description") pair nor a bare
    /// formula.
    BadItem(Group, usize, String),

    /// A pair whose second element is not a string.
    BadDescription(Group, usize, String),

    /// An assertion restates a definition. Definitions exist to give meaning
    /// to predicates; one that restates the target begs the question.
    AssertionInDefinitions(usize, String),

    /// An assertion restates an enabled world-knowledge formula.
    AssertionInWorldKnowledge(usize, String),
}

impl fmt::Display for TheoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TheoryError::BadItem(group, i, detail) => {
                write!(f, "expected {}[{}] to be a (formula \"description\") pair, got {}", group, i, detail)
            }
            TheoryError::BadDescription(group, i, detail) => {
                write!(f, "expected {}[{}] to have a string description, got {}", group, i, detail)
            }
            TheoryError::AssertionInDefinitions(i, term) => {
                write!(f, "definitions should not include assertions: assertion #{} is {}", i, term)
            }
            TheoryError::AssertionInWorldKnowledge(i, term) => {
                write!(f, "world knowledge should not include assertions: assertion #{} is {}", i, term)
            }
        }
    }
}

/// The container a generated function populates: a signature plus four
/// ordered formula groups. Setters validate on write and fail fast; the
/// judgment procedure only reads.
#[derive(Clone, Debug, Default)]
pub struct Theory {
    pub options: TheoryOptions,
    signature: Vec<Declaration>,
    definitions: Vec<Formula>,
    claims: Vec<Formula>,
    world_knowledge: Vec<Formula>,
    assertions: Vec<Formula>,
}

impl Theory {
    pub fn new(options: TheoryOptions) -> Theory {
        Theory {
            options,
            ..Theory::default()
        }
    }

    pub fn add_declaration(&mut self, decl: Declaration) {
        self.signature.push(decl);
    }

    pub fn signature(&self) -> &[Declaration] {
        &self.signature
    }

    pub fn definitions(&self) -> &[Formula] {
        &self.definitions
    }

    pub fn claims(&self) -> &[Formula] {
        &self.claims
    }

    pub fn world_knowledge(&self) -> &[Formula] {
        &self.world_knowledge
    }

    pub fn assertions(&self) -> &[Formula] {
        &self.assertions
    }

    pub fn set_definitions(&mut self, items: &[SExpr]) -> Result<(), TheoryError> {
        self.definitions = preprocess(Group::Definitions, items)?;
        Ok(())
    }

    pub fn set_claims(&mut self, items: &[SExpr]) -> Result<(), TheoryError> {
        self.claims = preprocess(Group::Claims, items)?;
        Ok(())
    }

    pub fn set_world_knowledge(&mut self, items: &[SExpr]) -> Result<(), TheoryError> {
        self.world_knowledge = preprocess(Group::WorldKnowledge, items)?;
        Ok(())
    }

    /// Sets the target assertions, and cross-checks that none of them is a
    /// verbatim restatement of another group. A definition restatement is
    /// always fatal; a world-knowledge restatement is fatal only while world
    /// knowledge is enabled; a claim restatement is allowed with a warning,
    /// since source texts may literally state what is later asked about.
    pub fn set_assertions(&mut self, items: &[SExpr]) -> Result<(), TheoryError> {
        let assertions = preprocess(Group::Assertions, items)?;
        for (i, assertion) in assertions.iter().enumerate() {
            if self.definitions.iter().any(|f| f.term == assertion.term) {
                tracing::error!(index = i, term = %assertion.term, "assertion restates a definition");
                return Err(TheoryError::AssertionInDefinitions(
                    i,
                    assertion.term.to_string(),
                ));
            }
            if self.world_knowledge.iter().any(|f| f.term == assertion.term) {
                if self.options.use_common_knowledge {
                    tracing::error!(index = i, term = %assertion.term, "assertion restates world knowledge");
                    return Err(TheoryError::AssertionInWorldKnowledge(
                        i,
                        assertion.term.to_string(),
                    ));
                }
            } else if self.claims.iter().any(|f| f.term == assertion.term) {
                tracing::warn!(index = i, term = %assertion.term, "assertion restates a claim");
            }
        }
        self.assertions = assertions;
        Ok(())
    }
}

/// Whether an expression could be a formula: a symbol or a list, but not a
/// string literal.
fn is_formula_shaped(expr: &SExpr) -> bool {
    expr.as_string().is_none()
}

fn is_pair_shaped(expr: &SExpr) -> bool {
    match expr.as_list() {
        Some([term, desc]) => is_formula_shaped(term) && desc.as_string().is_some(),
        _ => false,
    }
}

/// Validates the raw items of one group into formulas.
///
/// The normal shape is a sequence of (formula "description") pairs. Two
/// legacy caller conventions are still accepted, each with a logged warning:
/// a single unwrapped pair, and a sequence of bare formulas without
/// descriptions.
fn preprocess(group: Group, items: &[SExpr]) -> Result<Vec<Formula>, TheoryError> {
    // A single unwrapped (formula "description") pair.
    if let [term, desc] = items {
        if is_formula_shaped(term) {
            if let Some(desc) = desc.as_string() {
                tracing::warn!(group = group.name(), description = desc, "unwrapped pair");
                return Ok(vec![Formula::new(term.clone(), desc)]);
            }
        }
    }

    if items.iter().all(is_pair_shaped) {
        return Ok(items
            .iter()
            .map(|item| {
                let pair = item.as_list().unwrap();
                Formula::new(pair[0].clone(), pair[1].as_string().unwrap())
            })
            .collect());
    }

    // Mixed shapes: diagnose intended pairs with a non-string description
    // before falling back to the bare-formula convention. A two-element list
    // whose head is itself a list cannot be a formula (formulas are in prefix
    // notation), so it must have been meant as a pair.
    for (i, item) in items.iter().enumerate() {
        if let Some([term, desc]) = item.as_list() {
            if term.as_list().is_some() && desc.as_string().is_none() {
                return Err(TheoryError::BadDescription(group, i, desc.to_string()));
            }
        }
    }

    // All items must then be bare formulas.
    let mut formulas = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if !is_formula_shaped(item) {
            return Err(TheoryError::BadItem(group, i, item.to_string()));
        }
        formulas.push(Formula::new(item.clone(), ""));
    }
    tracing::warn!(group = group.name(), "bare formulas without descriptions");
    Ok(formulas)
}
