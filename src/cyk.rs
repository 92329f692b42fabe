/* CYK membership test. The chart is built bottom-up: cell [i][j] holds every non-terminal that
 * derives input[i..=j]. Each cell is a bit vector indexed by non-terminal position and only turned
 * into names when the result is handed out. */

use bitvec::prelude::*;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::grammar::{Grammar, Production};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CykResult {
    pub accepted: bool,
    /// `table[i][j]` lists the non-terminals deriving positions `i..=j`, empty below the diagonal.
    pub table: Vec<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CykError {
    #[error("Production {0} is not in Chomsky Normal Form")]
    NotInCnf(String),
}

struct IndexedGrammar {
    non_terminals: Vec<String>,
    /// (lhs, terminal)
    unit_rules: Vec<(usize, String)>,
    /// (lhs, left, right)
    binary_rules: Vec<(usize, usize, usize)>,
    skipped: Vec<Production>,
}

impl IndexedGrammar {
    fn new(grammar: &Grammar) -> Self {
        let mut non_terminals: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut intern = |name: &str, non_terminals: &mut Vec<String>| -> usize {
            *index.entry(name.to_string()).or_insert_with(|| {
                non_terminals.push(name.to_string());
                non_terminals.len() - 1
            })
        };

        for nt in &grammar.non_terminals {
            intern(nt, &mut non_terminals);
        }

        let mut unit_rules = Vec::new();
        let mut binary_rules = Vec::new();
        let mut skipped = Vec::new();

        for production in &grammar.productions {
            let lhs = intern(&production.from, &mut non_terminals);
            match production.to.as_slice() {
                [terminal] => unit_rules.push((lhs, terminal.clone())),
                [left, right] => {
                    let left = intern(left, &mut non_terminals);
                    let right = intern(right, &mut non_terminals);
                    binary_rules.push((lhs, left, right));
                }
                _ => skipped.push(production.clone()),
            }
        }

        IndexedGrammar {
            non_terminals,
            unit_rules,
            binary_rules,
            skipped,
        }
    }
}

fn run(grammar: &Grammar, indexed: &IndexedGrammar, input: &str) -> CykResult {
    let chars: Vec<char> = input.chars().collect();
    let n = chars.len();
    if n == 0 {
        return CykResult {
            accepted: false,
            table: Vec::new(),
        };
    }

    let width = indexed.non_terminals.len();
    let mut table: Vec<Vec<BitVec>> = vec![vec![BitVec::repeat(false, width); n]; n];

    for (i, ch) in chars.iter().enumerate() {
        let mut buf = [0u8; 4];
        let symbol: &str = ch.encode_utf8(&mut buf);
        for (lhs, terminal) in &indexed.unit_rules {
            if terminal == symbol {
                table[i][i].set(*lhs, true);
            }
        }
    }

    for length in 2..=n {
        for i in 0..=(n - length) {
            let j = i + length - 1;
            for k in i..j {
                for &(lhs, left, right) in &indexed.binary_rules {
                    if table[i][k][left] && table[k + 1][j][right] {
                        table[i][j].set(lhs, true);
                    }
                }
            }
        }
    }

    let accepted = indexed
        .non_terminals
        .iter()
        .position(|nt| *nt == grammar.start_symbol)
        .is_some_and(|start| table[0][n - 1][start]);

    let table = table
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| {
                    cell.iter_ones()
                        .map(|nt| indexed.non_terminals[nt].clone())
                        .collect()
                })
                .collect()
        })
        .collect();

    debug!("CYK on {:?}: accepted = {}", input, accepted);
    CykResult { accepted, table }
}

/// Run CYK on a pre-validated grammar.
///
/// Only `A → a` and `A → BC` shaped productions take part. Anything else is skipped, so a grammar
/// that is not in CNF yields an approximate chart.
pub fn parse_cyk(grammar: &Grammar, input: &str) -> CykResult {
    let indexed = IndexedGrammar::new(grammar);
    if !indexed.skipped.is_empty() {
        warn!(
            "CYK skipped {} production(s) that are neither A → a nor A → BC",
            indexed.skipped.len()
        );
    }
    run(grammar, &indexed, input)
}

/// Like `parse_cyk`, but refuses grammars with productions CYK cannot use.
pub fn parse_cyk_strict(grammar: &Grammar, input: &str) -> Result<CykResult, CykError> {
    let indexed = IndexedGrammar::new(grammar);
    if let Some(production) = indexed.skipped.first() {
        return Err(CykError::NotInCnf(production.to_string()));
    }
    Ok(run(grammar, &indexed, input))
}

#[cfg(test)]
mod cyk_tests {
    use super::*;

    fn ab_grammar() -> Grammar {
        Grammar::new(
            &["S", "A", "B"],
            &["a", "b"],
            &[("S", "AB"), ("A", "a"), ("B", "b")],
            "S",
        )
    }

    // Balanced a^n b^n, n >= 1, in CNF
    fn anbn_grammar() -> Grammar {
        Grammar::new(
            &["S", "T", "A", "B"],
            &["a", "b"],
            &[
                ("S", "AB"),
                ("S", "AT"),
                ("T", "SB"),
                ("A", "a"),
                ("B", "b"),
            ],
            "S",
        )
    }

    #[test]
    fn test_empty_input_rejected() {
        for grammar in [ab_grammar(), anbn_grammar()] {
            let result = parse_cyk(&grammar, "");
            assert_eq!(
                result,
                CykResult {
                    accepted: false,
                    table: Vec::new()
                }
            );
        }
    }

    #[test]
    fn test_ab() {
        let result = parse_cyk(&ab_grammar(), "ab");
        assert!(result.accepted);
        assert!(result.table[0][1].contains(&"S".to_string()));
        assert_eq!(result.table[0][0], vec!["A".to_string()]);
        assert_eq!(result.table[1][1], vec!["B".to_string()]);
        assert!(result.table[1][0].is_empty());

        let result = parse_cyk(&ab_grammar(), "ba");
        assert!(!result.accepted);
        assert!(result.table[0][1].is_empty());
    }

    #[test]
    fn test_diagonal_is_unit_productions() {
        let grammar = Grammar::new(
            &["S", "A", "B", "C"],
            &["a", "b"],
            &[("S", "AB"), ("A", "a"), ("C", "a"), ("B", "b")],
            "S",
        );
        let result = parse_cyk(&grammar, "aab");
        assert_eq!(result.table[0][0], vec!["A".to_string(), "C".to_string()]);
        assert_eq!(result.table[1][1], vec!["A".to_string(), "C".to_string()]);
        assert_eq!(result.table[2][2], vec!["B".to_string()]);
    }

    #[test]
    fn test_anbn() {
        let grammar = anbn_grammar();
        for accepted in ["ab", "aabb", "aaabbb"] {
            assert!(parse_cyk(&grammar, accepted).accepted, "{}", accepted);
        }
        for rejected in ["a", "abab", "aab", "ba", "abb"] {
            assert!(!parse_cyk(&grammar, rejected).accepted, "{}", rejected);
        }
        let result = parse_cyk(&grammar, "aabb");
        assert_eq!(result.table.len(), 4);
        assert!(result.table.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn test_unknown_characters_never_match() {
        let result = parse_cyk(&ab_grammar(), "axb");
        assert!(!result.accepted);
        assert!(result.table[1][1].is_empty());
    }

    #[test]
    fn test_non_cnf_productions() {
        // S → aSb is ignored, so only the S → AB base case survives
        let grammar = Grammar::new(
            &["S", "A", "B"],
            &["a", "b"],
            &[("S", "aSb"), ("S", "AB"), ("A", "a"), ("B", "b")],
            "S",
        );
        assert!(parse_cyk(&grammar, "ab").accepted);
        assert!(!parse_cyk(&grammar, "aabb").accepted);

        assert_eq!(
            parse_cyk_strict(&grammar, "ab"),
            Err(CykError::NotInCnf("S → a S b".to_string()))
        );
        assert!(parse_cyk_strict(&ab_grammar(), "ab").unwrap().accepted);
    }
}
