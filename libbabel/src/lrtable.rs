//
// lrtable.rs
// The Babel Compiler
//

//! Canonical LR(1) table construction. Starting from a `Grammar`, this
//! module builds the item-set closure table (`LRClosureTable`) and
//! from it the ACTION/GOTO table (`LRTable`) that drives the
//! shift-reduce parser. Grammars with shift/reduce or reduce/reduce
//! conflicts are rejected.

use std::collections::HashMap;
use std::fmt::{ self, Display, Formatter };
use error::{ Error, Result };
use grammar::{ EPSILON, END_MARKER, Grammar };
use util::{ add_unique, include_each_other };


/// An LR(1) item: a rule, a dot position within its development, and
/// the set of lookahead terminals under which the item may reduce.
#[derive(Debug, Clone)]
pub struct Item {
    /// Index of the rule this item ranges over.
    pub rule: usize,
    /// Position of the dot: 0 ≤ dot ≤ development length.
    pub dot: usize,
    /// The lookahead terminals (plus possibly `$`), insertion-ordered.
    pub lookaheads: Vec<String>,
}

impl Item {
    fn new(rule: usize, dot: usize) -> Item {
        Item {
            rule,
            dot,
            // The augmentation item is only ever reduced at end of input.
            lookaheads: if rule == 0 {
                vec![END_MARKER.to_owned()]
            } else {
                Vec::new()
            },
        }
    }

    /// Items agree on their core when rule and dot position match,
    /// regardless of lookaheads.
    pub fn super_equals(&self, other: &Item) -> bool {
        self.rule == other.rule && self.dot == other.dot
    }

    /// Full item equality: matching core and mutually inclusive
    /// lookahead sets.
    pub fn equals(&self, other: &Item) -> bool {
        self.super_equals(other) && include_each_other(&self.lookaheads, &other.lookaheads)
    }

    /// Adds this item to `items`. If an item with the same core is
    /// already present, the lookaheads are merged instead, and the
    /// return value tells whether that added any new lookahead.
    pub fn add_unique_to(&self, items: &mut Vec<Item>) -> bool {
        for item in items.iter_mut() {
            if item.super_equals(self) {
                let mut changed = false;
                for lookahead in &self.lookaheads {
                    changed |= add_unique(lookahead.clone(), &mut item.lookaheads);
                }
                return changed;
            }
        }

        items.push(self.clone());
        true
    }

    /// The closure step: if the symbol after the dot is a nonterminal
    /// B, produces the items `B -> . γ` for every production of B,
    /// with lookaheads FIRST(β L) where β is the rest of this item's
    /// development and L its lookahead set.
    fn expansions(&self, grammar: &Grammar) -> Vec<Item> {
        let rule = &grammar.rules[self.rule];
        let mut result: Vec<Item> = Vec::new();

        if self.dot < rule.development.len() {
            for nt_rule in grammar.rules_for_nonterminal(&rule.development[self.dot]) {
                let candidate = Item::new(nt_rule.index, 0);
                if !result.iter().any(|item| item.equals(&candidate)) {
                    result.push(candidate);
                }
            }
        }

        if result.is_empty() {
            return result;
        }

        let mut new_lookaheads = Vec::new();
        let mut epsilon_present = false;

        for first in grammar.sequence_firsts(&rule.development[self.dot + 1..]) {
            if first == EPSILON {
                epsilon_present = true;
            } else {
                add_unique(first, &mut new_lookaheads);
            }
        }

        if epsilon_present {
            for lookahead in &self.lookaheads {
                add_unique(lookahead.clone(), &mut new_lookaheads);
            }
        }

        for item in &mut result {
            item.lookaheads = new_lookaheads.clone();
        }

        result
    }

    /// The GOTO step: the item with the dot moved one symbol to the
    /// right, or `None` for complete and ε items.
    fn shifted(&self, grammar: &Grammar) -> Option<Item> {
        let rule = &grammar.rules[self.rule];

        if self.dot < rule.development.len() && rule.development[self.dot] != EPSILON {
            Some(Item {
                rule: self.rule,
                dot: self.dot + 1,
                lookaheads: self.lookaheads.clone(),
            })
        } else {
            None
        }
    }
}

/// A state of the LR automaton: its generating (kernel) items, their
/// closure, and the transitions discovered out of it.
#[derive(Debug, Clone)]
pub struct Kernel {
    /// Index of this kernel in the closure table.
    pub index: usize,
    /// The generator items.
    pub items: Vec<Item>,
    /// Closure of the generator items.
    pub closure: Vec<Item>,
    /// Transition targets by symbol.
    pub gotos: HashMap<String, usize>,
    /// The transition symbols, in discovery order.
    pub keys: Vec<String>,
}

fn item_sets_equal(lhs: &[Item], rhs: &[Item]) -> bool {
    lhs.iter().all(|l| rhs.iter().any(|r| r.equals(l)))
        && rhs.iter().all(|r| lhs.iter().any(|l| l.equals(r)))
}

/// The canonical LR(1) collection of item sets for a grammar.
#[derive(Debug)]
pub struct LRClosureTable<'g> {
    /// The grammar the collection was built from.
    pub grammar: &'g Grammar,
    /// The item sets; kernel 0 is generated by `(rule 0, dot 0, {$})`.
    pub kernels: Vec<Kernel>,
}

impl<'g> LRClosureTable<'g> {
    /// Builds the canonical collection. Kernels are discovered
    /// breadth-first; whenever a lookahead propagates into an already
    /// existing kernel, the construction restarts from kernel 0 so the
    /// propagation reaches closures and transitions computed earlier.
    pub fn new(grammar: &'g Grammar) -> LRClosureTable<'g> {
        let start = Item::new(0, 0);
        let mut kernels = vec![
            Kernel {
                index: 0,
                items: vec![start.clone()],
                closure: vec![start],
                gotos: HashMap::new(),
                keys: Vec::new(),
            }
        ];

        let mut i = 0;
        while i < kernels.len() {
            Self::update_closure(grammar, &mut kernels[i]);

            if Self::add_gotos(grammar, &mut kernels, i) {
                i = 0;
            } else {
                i += 1;
            }
        }

        LRClosureTable { grammar, kernels }
    }

    fn update_closure(grammar: &Grammar, kernel: &mut Kernel) {
        // Re-seed from the kernel items: lookaheads merged into them by
        // a previous pass must flow into the derived items too.
        for item in kernel.items.clone() {
            item.add_unique_to(&mut kernel.closure);
        }

        let mut i = 0;
        while i < kernel.closure.len() {
            let expansions = kernel.closure[i].expansions(grammar);
            for item in expansions {
                item.add_unique_to(&mut kernel.closure);
            }
            i += 1;
        }
    }

    fn add_gotos(grammar: &Grammar, kernels: &mut Vec<Kernel>, index: usize) -> bool {
        let mut lookaheads_propagated = false;
        let mut new_kernel_items: HashMap<String, Vec<Item>> = HashMap::new();
        let mut keys = kernels[index].keys.clone();

        for item in kernels[index].closure.clone() {
            if let Some(shifted) = item.shifted(grammar) {
                let symbol = grammar.rules[item.rule].development[item.dot].clone();
                add_unique(symbol.clone(), &mut keys);
                shifted.add_unique_to(new_kernel_items.entry(symbol).or_insert_with(Vec::new));
            }
        }

        kernels[index].keys = keys.clone();

        for key in &keys {
            let items = match new_kernel_items.get(key) {
                Some(items) => items.clone(),
                None => continue,
            };

            let target = kernels.iter().position(|k| item_sets_equal(&k.items, &items));
            let target = match target {
                Some(existing) => {
                    for item in &items {
                        lookaheads_propagated |= item.add_unique_to(&mut kernels[existing].items);
                    }
                    existing
                },
                None => {
                    let fresh = kernels.len();
                    kernels.push(Kernel {
                        index: fresh,
                        items: items.clone(),
                        closure: items,
                        gotos: HashMap::new(),
                        keys: Vec::new(),
                    });
                    fresh
                },
            };

            kernels[index].gotos.entry(key.clone()).or_insert(target);
        }

        lookaheads_propagated
    }
}

/// One entry of the ACTION/GOTO table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume the current terminal and enter the given state.
    Shift(usize),
    /// Reduce by the given rule. `Reduce(0)` is the accept action.
    Reduce(usize),
    /// After a reduction, enter the given state (nonterminal columns).
    Goto(usize),
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Action::Shift(state)  => write!(f, "s{}", state),
            Action::Reduce(rule)  => write!(f, "r{}", rule),
            Action::Goto(state)   => write!(f, "{}", state),
        }
    }
}

/// A row of the parse table: all actions of one parser state.
#[derive(Debug, Clone, Default)]
pub struct State {
    /// The state's index, equal to its kernel's index.
    pub index: usize,
    /// Action per grammar symbol.
    pub mapping: HashMap<String, Action>,
}

/// The complete ACTION/GOTO table. This is what the parser driver
/// consumes; it owns the grammar so that diagnostics can consult
/// FIRST sets and symbol classifications.
#[derive(Debug)]
pub struct LRTable {
    /// The grammar the table was generated from.
    pub grammar: Grammar,
    /// One state per kernel of the closure table.
    pub states: Vec<State>,
}

impl LRTable {
    /// Builds the closure table and the parse table for `grammar`.
    /// Returns an error if the grammar is not LR(1), i.e. if any
    /// (state, symbol) pair ends up with two distinct actions.
    pub fn new(grammar: Grammar) -> Result<LRTable> {
        let states = {
            let closure_table = LRClosureTable::new(&grammar);
            Self::build_states(&grammar, &closure_table)?
        };

        Ok(LRTable { grammar, states })
    }

    fn build_states(grammar: &Grammar, closure_table: &LRClosureTable) -> Result<Vec<State>> {
        let mut states = Vec::with_capacity(closure_table.kernels.len());

        for kernel in &closure_table.kernels {
            let mut state = State {
                index: kernel.index,
                mapping: HashMap::new(),
            };

            for key in &kernel.keys {
                let next = match kernel.gotos.get(key) {
                    Some(&next) => next,
                    None => bug!("kernel {} has no goto for key '{}'", kernel.index, key),
                };
                let action = if grammar.terminals.iter().any(|t| t == key) {
                    Action::Shift(next)
                } else {
                    Action::Goto(next)
                };
                Self::insert_action(&mut state, key, action)?;
            }

            for item in &kernel.closure {
                let rule = &grammar.rules[item.rule];
                let complete =
                    item.dot == rule.development.len() || rule.development[0] == EPSILON;

                if complete {
                    for lookahead in &item.lookaheads {
                        Self::insert_action(&mut state, lookahead, Action::Reduce(item.rule))?;
                    }
                }
            }

            states.push(state);
        }

        Ok(states)
    }

    fn insert_action(state: &mut State, symbol: &str, action: Action) -> Result<()> {
        match state.mapping.get(symbol) {
            None => {
                state.mapping.insert(symbol.to_owned(), action);
                Ok(())
            },
            Some(&existing) if existing == action => Ok(()),
            Some(&existing) => Err(Error::Semantic {
                message: format!(
                    "Grammar conflict in state {} on symbol '{}': {} vs {}",
                    state.index, symbol, existing, action,
                ),
                range: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammar::Grammar;

    fn right_recursive() -> Grammar {
        Grammar::new("A' -> A\nA -> a A\nA -> a").unwrap()
    }

    fn parenthesized() -> Grammar {
        Grammar::new("A' -> A\nA -> B\nA -> ''\nB -> ( A )").unwrap()
    }

    #[test]
    fn closure_and_kernel_counts() {
        let grammar = right_recursive();
        let closure_table = LRClosureTable::new(&grammar);
        assert_eq!(closure_table.kernels[0].closure.len(), 3);
        assert_eq!(closure_table.kernels.len(), 4);
    }

    #[test]
    fn epsilon_grammar_closure_and_kernel_counts() {
        let grammar = parenthesized();
        let closure_table = LRClosureTable::new(&grammar);
        assert_eq!(closure_table.kernels[0].closure.len(), 4);
        assert_eq!(closure_table.kernels.len(), 10);
    }

    #[test]
    fn state_count_matches_kernels() {
        let table = LRTable::new(right_recursive()).unwrap();
        assert_eq!(table.states.len(), 4);
    }

    #[test]
    fn epsilon_grammar_action_table() {
        let table = LRTable::new(parenthesized()).unwrap();
        assert_eq!(table.states.len(), 10);
        assert_eq!(table.states[0].mapping["("].to_string(), "s3");
        assert_eq!(table.states[0].mapping["$"].to_string(), "r2");
        assert_eq!(table.states[1].mapping["$"].to_string(), "r0");
        assert_eq!(table.states[3].mapping["A"].to_string(), "4");
        assert_eq!(table.states[9].mapping[")"].to_string(), "r3");
    }

    #[test]
    fn every_state_is_deterministic() {
        // LRTable::new() would have failed on a conflict; spot-check
        // that both sample grammars make it through.
        assert!(LRTable::new(right_recursive()).is_ok());
        assert!(LRTable::new(parenthesized()).is_ok());
    }

    #[test]
    fn ambiguous_grammars_are_rejected() {
        // S -> S S has a classic shift/reduce conflict on 'a'.
        let grammar = Grammar::new("S' -> S\nS -> S S\nS -> a").unwrap();
        let result = LRTable::new(grammar);
        match result {
            Err(error) => {
                let message = error.to_string();
                assert!(message.contains("conflict"), "unexpected message: {}", message);
            },
            Ok(_) => panic!("ambiguous grammar must be rejected"),
        }
    }

    #[test]
    fn item_merge_semantics() {
        let mut items = vec![
            Item { rule: 1, dot: 1, lookaheads: vec!["$".to_owned()] },
        ];
        let incoming = Item { rule: 1, dot: 1, lookaheads: vec![")".to_owned()] };

        // Same core: merging adds the new lookahead.
        assert!(incoming.add_unique_to(&mut items));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].lookaheads, vec!["$".to_owned(), ")".to_owned()]);

        // Merging again changes nothing.
        assert!(!incoming.add_unique_to(&mut items));

        // A different core is appended as a new item.
        let other = Item { rule: 1, dot: 2, lookaheads: vec!["$".to_owned()] };
        assert!(other.add_unique_to(&mut items));
        assert_eq!(items.len(), 2);
    }
}
