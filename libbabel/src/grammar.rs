//
// grammar.rs
// The Babel Compiler
//

//! The grammar model behind the parser generator. A `Grammar` is read
//! from a newline-separated list of productions in the form
//! `NT -> sym1 sym2 …`, where `''` denotes the empty production. From
//! the rule list it derives the terminal and nonterminal sets and the
//! FIRST and FOLLOW sets of every symbol, which the LR(1) table
//! construction in `lrtable` builds upon.

use std::collections::HashMap;
use std::fmt::{ self, Display, Formatter };
use error::{ Result, semantic_error };
use util::add_unique;


/// The spelling of the empty production in grammar text.
pub const EPSILON: &str = "''";

/// The end-of-input marker. It never appears in productions; it only
/// shows up in FOLLOW sets, lookaheads and the parser's ACTION table.
pub const END_MARKER: &str = "$";

/// A single production of a grammar.
#[derive(Debug, Clone, Eq)]
pub struct Rule {
    /// Index of this rule within the grammar. Rule 0 derives the axiom.
    pub index: usize,
    /// The left-hand side.
    pub nonterminal: String,
    /// The right-hand side: a sequence of symbols, or `[ε]`.
    pub development: Vec<String>,
}

/// Rules compare by their shape; the index does not participate, so
/// identical productions at different positions are considered equal.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.nonterminal == other.nonterminal && self.development == other.development
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.nonterminal, self.development.join(" "))
    }
}

/// A context-free grammar with its FIRST and FOLLOW sets.
///
/// All symbol collections preserve insertion order; diagnostics and
/// the table construction depend on that determinism.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    /// Every symbol of the grammar, nonterminals first.
    pub alphabet: Vec<String>,
    /// Symbols that appear on a left-hand side.
    pub nonterminals: Vec<String>,
    /// Symbols that only ever appear on right-hand sides.
    pub terminals: Vec<String>,
    /// The productions, in source order.
    pub rules: Vec<Rule>,
    /// FIRST(X) for every symbol X that has one.
    pub firsts: HashMap<String, Vec<String>>,
    /// FOLLOW(N) for every nonterminal N.
    pub follows: HashMap<String, Vec<String>>,
    /// The start symbol: the LHS of the first rule.
    pub axiom: String,
}

impl Grammar {
    /// Parses a grammar description and computes its FIRST and FOLLOW
    /// sets. Both the plain `->` form and the compact `:`/`|` form are
    /// accepted; the latter is rewritten by `desugar()` first.
    pub fn new(text: &str) -> Result<Grammar> {
        let text = desugar(text);
        let mut grammar = Grammar::default();

        grammar.initialize_rules_and_nonterminals(&text)?;
        grammar.initialize_terminals();
        grammar.initialize_firsts();
        grammar.initialize_follows();

        Ok(grammar)
    }

    /// All rules whose left-hand side is `nonterminal`, in order.
    pub fn rules_for_nonterminal<'a>(&'a self, nonterminal: &str) -> Vec<&'a Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.nonterminal == nonterminal)
            .collect()
    }

    /// FIRST of a symbol sequence: the terminals that may begin a
    /// sentence derived from `sequence`, plus ε if the whole sequence
    /// is nullable (in particular, if it is empty).
    pub fn sequence_firsts(&self, sequence: &[String]) -> Vec<String> {
        let mut result = Vec::new();
        let mut epsilon_in_symbol_firsts = true;

        for symbol in sequence {
            epsilon_in_symbol_firsts = false;

            if self.terminals.iter().any(|t| t == symbol) {
                add_unique(symbol.clone(), &mut result);
                break;
            }

            match self.firsts.get(symbol) {
                Some(symbol_firsts) => {
                    for first in symbol_firsts {
                        epsilon_in_symbol_firsts |= first == EPSILON;
                        add_unique(first.clone(), &mut result);
                    }
                    epsilon_in_symbol_firsts |= symbol_firsts.is_empty();
                },
                // Unknown symbols contribute themselves, like terminals
                None => {
                    add_unique(symbol.clone(), &mut result);
                    break;
                },
            }

            if !epsilon_in_symbol_firsts {
                break;
            }
        }

        if epsilon_in_symbol_firsts {
            add_unique(EPSILON.to_owned(), &mut result);
        }

        result
    }

    fn initialize_rules_and_nonterminals(&mut self, text: &str) -> Result<()> {
        for raw_line in text.lines() {
            let line = raw_line.trim();

            if line.is_empty() {
                continue;
            }

            let rule = self.parse_rule(line)?;

            if self.axiom.is_empty() {
                self.axiom = rule.nonterminal.clone();
            }

            add_unique(rule.nonterminal.clone(), &mut self.alphabet);
            add_unique(rule.nonterminal.clone(), &mut self.nonterminals);
            self.rules.push(rule);
        }

        if self.rules.is_empty() {
            return semantic_error("Grammar contains no productions");
        }

        Ok(())
    }

    fn parse_rule(&self, line: &str) -> Result<Rule> {
        let mut split = line.splitn(2, "->");
        let lhs = split.next().unwrap_or("").trim();
        let rhs = match split.next() {
            Some(rhs) => rhs.trim(),
            None => return semantic_error(
                format!("Malformed grammar production '{}': missing '->'", line)
            ),
        };

        if lhs.is_empty() || lhs.contains(char::is_whitespace) {
            return semantic_error(
                format!("Malformed grammar production '{}': bad left-hand side", line)
            );
        }

        let development: Vec<String> = rhs.split_whitespace().map(str::to_owned).collect();

        if development.is_empty() {
            return semantic_error(
                format!("Malformed grammar production '{}': empty right-hand side", line)
            );
        }

        if development.iter().any(|symbol| symbol == END_MARKER) {
            return semantic_error(
                format!("Malformed grammar production '{}': '$' may not appear in productions", line)
            );
        }

        Ok(Rule {
            index: self.rules.len(),
            nonterminal: lhs.to_owned(),
            development,
        })
    }

    fn initialize_terminals(&mut self) {
        let mut terminals = Vec::new();

        for rule in &self.rules {
            for symbol in &rule.development {
                if symbol != EPSILON && !self.nonterminals.iter().any(|nt| nt == symbol) {
                    add_unique(symbol.clone(), &mut self.alphabet);
                    add_unique(symbol.clone(), &mut terminals);
                }
            }
        }

        self.terminals = terminals;
    }

    fn collect_development_firsts(&self, development: &[String], firsts: &mut Vec<String>) -> bool {
        let mut changed = false;
        let mut epsilon_in_symbol_firsts = true;

        for symbol in development {
            epsilon_in_symbol_firsts = false;

            if self.terminals.iter().any(|t| t == symbol) {
                changed |= add_unique(symbol.clone(), firsts);
                break;
            }

            if let Some(symbol_firsts) = self.firsts.get(symbol) {
                for first in symbol_firsts {
                    epsilon_in_symbol_firsts |= first == EPSILON;
                    changed |= add_unique(first.clone(), firsts);
                }
            }

            if !epsilon_in_symbol_firsts {
                break;
            }
        }

        if epsilon_in_symbol_firsts {
            changed |= add_unique(EPSILON.to_owned(), firsts);
        }

        changed
    }

    /// FIRST sets by fixed-point iteration over the rules.
    fn initialize_firsts(&mut self) {
        loop {
            let mut changed = false;

            for index in 0..self.rules.len() {
                let nonterminal = self.rules[index].nonterminal.clone();
                let development = self.rules[index].development.clone();
                let mut firsts = self.firsts.get(&nonterminal).cloned().unwrap_or_default();

                if development.len() == 1 && development[0] == EPSILON {
                    changed |= add_unique(EPSILON.to_owned(), &mut firsts);
                } else {
                    changed |= self.collect_development_firsts(&development, &mut firsts);
                }

                self.firsts.insert(nonterminal, firsts);
            }

            if !changed {
                break;
            }
        }
    }

    /// FOLLOW sets by fixed-point iteration. FOLLOW(axiom) is seeded
    /// with `$`; every occurrence `… N β` adds FIRST(β)∖{ε} to
    /// FOLLOW(N), plus FOLLOW(LHS) when β is nullable.
    fn initialize_follows(&mut self) {
        loop {
            let mut changed = false;

            for index in 0..self.rules.len() {
                let rule = self.rules[index].clone();

                if index == 0 {
                    let mut axiom_follows =
                        self.follows.get(&rule.nonterminal).cloned().unwrap_or_default();
                    changed |= add_unique(END_MARKER.to_owned(), &mut axiom_follows);
                    self.follows.insert(rule.nonterminal.clone(), axiom_follows);
                }

                for position in 0..rule.development.len() {
                    let symbol = &rule.development[position];

                    if !self.nonterminals.iter().any(|nt| nt == symbol) {
                        continue;
                    }

                    let mut symbol_follows =
                        self.follows.get(symbol).cloned().unwrap_or_default();
                    let after_symbol_firsts =
                        self.sequence_firsts(&rule.development[position + 1..]);

                    for first in &after_symbol_firsts {
                        if first == EPSILON {
                            let lhs_follows = self.follows
                                                  .get(&rule.nonterminal)
                                                  .cloned()
                                                  .unwrap_or_default();
                            for follow in lhs_follows {
                                changed |= add_unique(follow, &mut symbol_follows);
                            }
                        } else {
                            changed |= add_unique(first.clone(), &mut symbol_follows);
                        }
                    }

                    self.follows.insert(symbol.clone(), symbol_follows);
                }
            }

            if !changed {
                break;
            }
        }
    }
}

/// The grammar of the Babel language. Terminals are the token type
/// tags produced by the lexer. The first production augments the
/// grammar; reducing it is the accept action.
pub const BABEL_GRAMMAR: &str = "
program -> statement_list
statement_list -> statement_list SEMICOLON statement
statement_list -> statement
statement -> assignment
statement -> if_stmt
statement -> task_def
statement -> extern_task
statement -> return_stmt
statement -> goto_stmt
statement -> label_stmt
statement -> expression
statement -> ''
assignment -> LET VAR annotation ASSIGN expression
assignment -> CONST VAR annotation ASSIGN expression
assignment -> VAR COLON type_expr ASSIGN expression
assignment -> factor ASSIGN expression
assignment -> factor AUG_ASSIGN expression
annotation -> COLON type_expr
annotation -> ''
type_expr -> TYPE
type_expr -> type_expr STAR
return_stmt -> RETURN expression
return_stmt -> RETURN
goto_stmt -> GOTO VAR
label_stmt -> LABEL VAR
if_stmt -> IF expression THEN statement_list elif_chain END
elif_chain -> ELIF expression THEN statement_list elif_chain
elif_chain -> ELSE statement_list
elif_chain -> ''
task_def -> task_header SEMICOLON statement_list END
task_header -> TASK VAR LPAREN params RPAREN ARROW type_expr
task_header -> TASK VAR LPAREN params RPAREN
extern_task -> EXTERN task_header
params -> param_list
params -> ''
param_list -> param_list COMMA param
param_list -> param
param -> VAR COLON type_expr
expression -> contravalence
contravalence -> contravalence XOR_OP disjunction
contravalence -> disjunction
disjunction -> disjunction OR_OP conjunction
disjunction -> conjunction
conjunction -> conjunction AND_OP comparison
conjunction -> comparison
comparison -> comparison CMP_OP bitwise_or
comparison -> bitwise_or
bitwise_or -> bitwise_or PIPE bitwise_xor
bitwise_or -> bitwise_xor
bitwise_xor -> bitwise_xor CARET bitwise_and
bitwise_xor -> bitwise_and
bitwise_and -> bitwise_and AMP shift_expression
bitwise_and -> shift_expression
shift_expression -> shift_expression SHIFT_OP sum
shift_expression -> sum
sum -> sum SUM_OP term
sum -> term
term -> term STAR factor
term -> term MUL_OP factor
term -> factor
factor -> SUM_OP factor
factor -> STAR factor
factor -> AMP VAR
factor -> inversion
inversion -> NOT_OP inversion
inversion -> primary
primary -> primary LBRACKET expression RBRACKET
primary -> LPAREN expression RPAREN
primary -> function_call
primary -> class_construction
primary -> atom
function_call -> VAR LPAREN arguments RPAREN
class_construction -> CLASS LPAREN arguments RPAREN
arguments -> argument_list
arguments -> ''
argument_list -> argument_list COMMA expression
argument_list -> expression
atom -> BOOL
atom -> INTEGER
atom -> FLOATING_POINT
atom -> CHAR
atom -> STRING
atom -> VAR
";

/// The Babel grammar, parsed and analyzed.
pub fn babel_grammar() -> Result<Grammar> {
    Grammar::new(BABEL_GRAMMAR)
}

/// Rewrites the compact grammar form into the plain `->` form. In the
/// compact form a nonterminal is declared once with `:` and extended
/// with `|` continuation lines:
///
/// ```text
/// A : B
///   | C
/// ```
///
/// becomes `A -> B` and `A -> C`. Text already in the `->` form passes
/// through unchanged; consequently `:` and `|` cannot be used as
/// grammar symbols in textual form.
pub fn desugar(text: &str) -> String {
    let mut last_colon_part = String::new();
    let mut out = String::new();

    for line in text.lines() {
        let mut line = line.to_owned();

        if let Some(position) = line.rfind(':') {
            last_colon_part = line[..position].to_owned();
        }

        if let Some(position) = line.rfind('|') {
            line.insert_str(position, &last_colon_part);
        }

        out.push_str(&line);
        out.push('\n');
    }

    out.replace(':', "->").replace('|', "->")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axiom_and_rules() {
        let grammar = Grammar::new("A' -> A\nA -> a A\nA -> a").unwrap();
        assert_eq!(grammar.axiom, "A'");
        assert_eq!(grammar.rules.len(), 3);
        assert_eq!(grammar.firsts["A"], vec!["a".to_owned()]);
        assert_eq!(grammar.terminals, vec!["a".to_owned()]);
    }

    #[test]
    fn epsilon_first_sets() {
        let grammar = Grammar::new("A' -> A\nA -> B\nA -> ''\nB -> ( A )").unwrap();
        assert_eq!(grammar.axiom, "A'");
        assert_eq!(grammar.rules.len(), 4);
        assert_eq!(grammar.firsts["A"], vec![EPSILON.to_owned(), "(".to_owned()]);
    }

    #[test]
    fn follow_of_axiom_contains_end_marker() {
        let grammar = Grammar::new("A' -> A\nA -> a A\nA -> a").unwrap();
        assert!(grammar.follows["A'"].iter().any(|s| s == END_MARKER));
        assert!(grammar.follows["A"].iter().any(|s| s == END_MARKER));
    }

    #[test]
    fn compact_form_desugars() {
        let grammar = Grammar::new("A : B\n  | ''\nB : ( A )").unwrap();
        assert_eq!(grammar.rules.len(), 3);
        assert_eq!(grammar.rules[1].nonterminal, "A");
        assert_eq!(grammar.rules[1].development, vec![EPSILON.to_owned()]);
    }

    #[test]
    fn malformed_production_is_rejected() {
        assert!(Grammar::new("A' ->\nA -> a").is_err());
        assert!(Grammar::new("no arrow here").is_err());
        assert!(Grammar::new("A -> a $").is_err());
    }

    #[test]
    fn first_of_rhs_is_subset_of_first_of_lhs() {
        let grammar = Grammar::new("A' -> A\nA -> B\nA -> ''\nB -> ( A )").unwrap();
        for rule in &grammar.rules {
            let rhs_firsts = grammar.sequence_firsts(&rule.development);
            for first in rhs_firsts {
                assert!(
                    grammar.firsts[&rule.nonterminal].contains(&first),
                    "FIRST({}) is missing '{}'", rule.nonterminal, first
                );
            }
        }
    }
}
