/* Context-free grammars as handed over by the grammar editor, plus the checks and rewrites that
 * run before CYK: validation, CNF detection, a simplified CNF conversion and FIRST sets. Random
 * derivation trees give a quick look at the strings a grammar produces. */

use color_eyre::eyre::Result;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const EPSILON: &str = "ε";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("Start symbol is required")]
    MissingStartSymbol,
    #[error("Start symbol must be a non-terminal")]
    StartNotNonTerminal(String),
    #[error("Each production must have \"from\" and \"to\" properties")]
    IncompleteProduction,
    #[error("Production \"from\" must be a non-terminal: {0}")]
    FromNotNonTerminal(String),
    #[error("Unknown symbol in production: {0}")]
    UnknownSymbol(String),
    #[error("Symbol {0} is declared both as a terminal and as a non-terminal")]
    AmbiguousSymbol(String),
}

/// `from -> to`. An empty body is the epsilon production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub from: String,
    #[serde(serialize_with = "serialize_body", deserialize_with = "deserialize_body")]
    pub to: Vec<String>,
}

impl Production {
    /// One symbol per character of `body`; `"ε"` or `""` is the empty body.
    pub fn parse(from: &str, body: &str) -> Self {
        Production {
            from: from.to_string(),
            to: split_body(body),
        }
    }

    pub fn is_epsilon(&self) -> bool {
        self.to.is_empty()
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.to.is_empty() {
            write!(f, "{} → {}", self.from, EPSILON)
        } else {
            write!(f, "{} → {}", self.from, self.to.join(" "))
        }
    }
}

fn split_body(body: &str) -> Vec<String> {
    if body == EPSILON {
        return Vec::new();
    }
    body.chars().map(|ch| ch.to_string()).collect()
}

// Bodies made of one-character symbols are written as a plain string ("AB"), the editor's
// format. Longer symbol names (produced by CNF conversion) need the list form.
fn serialize_body<S>(body: &[String], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if body.is_empty() {
        serializer.serialize_str(EPSILON)
    } else if body.iter().all(|symbol| symbol.chars().count() == 1) {
        serializer.serialize_str(&body.concat())
    } else {
        serializer.collect_seq(body)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBody {
    Text(String),
    Symbols(Vec<String>),
}

fn deserialize_body<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawBody::deserialize(deserializer)? {
        RawBody::Text(text) => split_body(&text),
        RawBody::Symbols(symbols) => symbols.into_iter().filter(|s| s != EPSILON).collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grammar {
    pub non_terminals: Vec<String>,
    pub terminals: Vec<String>,
    pub productions: Vec<Production>,
    pub start_symbol: String,
}

impl Grammar {
    pub fn new(
        non_terminals: &[&str],
        terminals: &[&str],
        productions: &[(&str, &str)],
        start_symbol: &str,
    ) -> Self {
        Grammar {
            non_terminals: non_terminals.iter().map(ToString::to_string).collect(),
            terminals: terminals.iter().map(ToString::to_string).collect(),
            productions: productions
                .iter()
                .map(|(from, to)| Production::parse(from, to))
                .collect(),
            start_symbol: start_symbol.to_string(),
        }
    }

    pub fn is_non_terminal(&self, symbol: &str) -> bool {
        self.non_terminals.iter().any(|nt| nt == symbol)
    }

    pub fn is_terminal(&self, symbol: &str) -> bool {
        self.terminals.iter().any(|t| t == symbol)
    }
}

pub fn load_grammar<P: AsRef<Path>>(file_name: P) -> Result<Grammar> {
    let file = File::open(file_name)?;
    let buf_reader = BufReader::new(file);
    let grammar: Grammar = serde_json::from_reader(buf_reader)?;
    Ok(grammar)
}

/// Check that the start symbol and every production only use declared symbols.
pub fn validate_grammar(grammar: &Grammar) -> Result<(), GrammarError> {
    if grammar.start_symbol.is_empty() {
        return Err(GrammarError::MissingStartSymbol);
    }
    if !grammar.is_non_terminal(&grammar.start_symbol) {
        return Err(GrammarError::StartNotNonTerminal(grammar.start_symbol.clone()));
    }
    if let Some(symbol) = grammar
        .terminals
        .iter()
        .find(|t| grammar.is_non_terminal(t))
    {
        return Err(GrammarError::AmbiguousSymbol(symbol.clone()));
    }

    for production in &grammar.productions {
        if production.from.is_empty() {
            return Err(GrammarError::IncompleteProduction);
        }
        if !grammar.is_non_terminal(&production.from) {
            return Err(GrammarError::FromNotNonTerminal(production.from.clone()));
        }
        if let Some(symbol) = production
            .to
            .iter()
            .find(|s| !grammar.is_non_terminal(s) && !grammar.is_terminal(s))
        {
            return Err(GrammarError::UnknownSymbol(symbol.clone()));
        }
    }

    Ok(())
}

/// True when every production is either `A → BC` or `A → a`.
pub fn is_chomsky_normal_form(grammar: &Grammar) -> bool {
    grammar.productions.iter().all(|production| {
        grammar.is_non_terminal(&production.from)
            && match production.to.as_slice() {
                [terminal] => grammar.is_terminal(terminal),
                [left, right] => grammar.is_non_terminal(left) && grammar.is_non_terminal(right),
                _ => false,
            }
    })
}

fn fresh_symbol(grammar: &Grammar, taken: &BTreeSet<String>, candidate: String) -> Option<String> {
    if grammar.is_terminal(&candidate) || taken.contains(&candidate) {
        None
    } else {
        Some(candidate)
    }
}

/// A simplified conversion towards CNF.
///
/// Epsilon productions are dropped, long bodies are split with fresh `Y<n>` symbols and terminals
/// inside two-symbol bodies are lifted into `T_<a>` symbols. Unit productions `A → B` are left
/// alone, so the result is not guaranteed to be in CNF.
pub fn convert_to_cnf(grammar: &Grammar) -> Grammar {
    let mut result = grammar.clone();
    let mut taken: BTreeSet<String> = grammar.non_terminals.iter().cloned().collect();
    let mut next_index = 1;

    let mut binarized = Vec::new();
    for production in grammar.productions.iter().filter(|p| !p.is_epsilon()) {
        if production.to.len() <= 2 {
            binarized.push(production.clone());
            continue;
        }

        let mut left = production.from.clone();
        let last = production.to.len() - 2;
        for symbol in &production.to[..last] {
            let fresh = loop {
                let candidate = format!("Y{}", next_index);
                next_index += 1;
                if let Some(fresh) = fresh_symbol(grammar, &taken, candidate) {
                    break fresh;
                }
            };
            taken.insert(fresh.clone());
            result.non_terminals.push(fresh.clone());
            binarized.push(Production {
                from: left,
                to: vec![symbol.clone(), fresh.clone()],
            });
            left = fresh;
        }
        binarized.push(Production {
            from: left,
            to: production.to[last..].to_vec(),
        });
    }

    let mut lifted: BTreeMap<String, String> = BTreeMap::new();
    let mut productions = Vec::new();
    for production in binarized {
        if production.to.len() != 2 {
            productions.push(production);
            continue;
        }

        let mut body = Vec::with_capacity(2);
        for symbol in &production.to {
            if !grammar.is_terminal(symbol) {
                body.push(symbol.clone());
                continue;
            }
            let name = match lifted.get(symbol) {
                Some(name) => name.clone(),
                None => {
                    let mut name = format!("T_{}", symbol);
                    while taken.contains(&name) || grammar.is_terminal(&name) {
                        name.push('\'');
                    }
                    taken.insert(name.clone());
                    result.non_terminals.push(name.clone());
                    productions.push(Production {
                        from: name.clone(),
                        to: vec![symbol.clone()],
                    });
                    lifted.insert(symbol.clone(), name.clone());
                    name
                }
            };
            body.push(name);
        }
        productions.push(Production {
            from: production.from,
            to: body,
        });
    }

    result.productions = productions;
    result
}

/// FIRST sets of every non-terminal. Nullable non-terminals carry `ε`.
pub fn compute_first_sets(grammar: &Grammar) -> BTreeMap<String, BTreeSet<String>> {
    let mut first: BTreeMap<String, BTreeSet<String>> = grammar
        .non_terminals
        .iter()
        .map(|nt| (nt.clone(), BTreeSet::new()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;

        for production in &grammar.productions {
            let mut additions = BTreeSet::new();
            let mut nullable = true;

            for symbol in &production.to {
                if grammar.is_terminal(symbol) || !first.contains_key(symbol) {
                    additions.insert(symbol.clone());
                    nullable = false;
                    break;
                }
                let symbol_first = &first[symbol];
                additions.extend(symbol_first.iter().filter(|s| *s != EPSILON).cloned());
                if !symbol_first.contains(EPSILON) {
                    nullable = false;
                    break;
                }
            }
            if nullable {
                additions.insert(EPSILON.to_string());
            }

            let entry = first.entry(production.from.clone()).or_default();
            for symbol in additions {
                changed |= entry.insert(symbol);
            }
        }
    }

    first
}

pub const DEFAULT_DERIVATION_DEPTH: usize = 4;

/// One node of a derivation tree. Leaves are terminals, `ε`, or non-terminals cut off by the
/// depth bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationNode {
    pub symbol: String,
    pub children: Vec<DerivationNode>,
}

impl DerivationNode {
    fn leaf(symbol: &str) -> Self {
        DerivationNode {
            symbol: symbol.to_string(),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of edges on the longest root to leaf path.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// The leaves read left to right, without `ε`.
    pub fn frontier(&self) -> String {
        if self.is_leaf() {
            if self.symbol == EPSILON {
                return String::new();
            }
            return self.symbol.clone();
        }
        self.children.iter().map(DerivationNode::frontier).collect()
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.symbol, indent = indent * 2)?;
        for child in &self.children {
            child.write_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DerivationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Expand `symbol` by picking a random production for every non-terminal, at most `max_depth`
/// levels deep. An epsilon production yields a single `ε` leaf.
pub fn random_derivation<R: Rng + ?Sized>(
    grammar: &Grammar,
    symbol: &str,
    max_depth: usize,
    rng: &mut R,
) -> DerivationNode {
    if max_depth == 0 || grammar.is_terminal(symbol) {
        return DerivationNode::leaf(symbol);
    }

    let candidates: Vec<&Production> = grammar
        .productions
        .iter()
        .filter(|production| production.from == symbol)
        .collect();
    if candidates.is_empty() {
        return DerivationNode::leaf(symbol);
    }

    let production = candidates[rng.random_range(0..candidates.len())];
    let children = if production.is_epsilon() {
        vec![DerivationNode::leaf(EPSILON)]
    } else {
        production
            .to
            .iter()
            .map(|child| random_derivation(grammar, child, max_depth - 1, rng))
            .collect()
    };

    DerivationNode {
        symbol: symbol.to_string(),
        children,
    }
}
