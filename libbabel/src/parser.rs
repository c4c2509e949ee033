//
// parser.rs
// The Babel Compiler
//

//! The shift-reduce driver. It walks the token stream against an
//! `LRTable`, maintaining three stacks: parser states, concrete parse
//! nodes, and the reduction stack of AST fragments that `astgen`
//! builds on every reduction. The driver never panics on user input:
//! it returns either a parse (concrete tree plus, for the Babel
//! grammar, the program AST) or a syntax error enumerating the
//! expected tokens.

use std::fmt::{ self, Display, Formatter };
use ast::Node;
use astgen::{ self, Fragment };
use codegen::Codegen;
use error::{ Error, Result };
use grammar::{ EPSILON, END_MARKER };
use lexer::Token;
use lrtable::{ Action, LRTable, State };
use util::add_unique;


/// A node of the concrete syntax tree.
#[derive(Debug, Clone, Default)]
pub struct TreeNode {
    /// The grammar symbol this node represents.
    pub name: String,
    /// The lexeme, for token (leaf) nodes.
    pub data: Option<String>,
    /// Child nodes, for nonterminal nodes.
    pub children: Vec<TreeNode>,
}

impl Display for TreeNode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let mut stack: Vec<(&TreeNode, usize)> = vec![(self, 0)];

        while let Some((node, depth)) = stack.pop() {
            for _ in 0..depth {
                f.write_str("  ")?;
            }
            if depth > 0 {
                f.write_str("|_ ")?;
            }

            match node.data {
                Some(ref data) => writeln!(f, "{} '{}'", node.name, data)?,
                None => writeln!(f, "{}", node.name)?,
            }

            for child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        Ok(())
    }
}

/// The outcome of a successful parse.
#[derive(Debug)]
pub struct Parse {
    /// The concrete syntax tree, rooted at the axiom.
    pub tree: TreeNode,
    /// The program AST, when the grammar's reduction actions built
    /// one (the Babel grammar does; bare test grammars do not).
    pub root: Option<Node>,
}

/// The shift-reduce parser over one ACTION/GOTO table.
#[derive(Debug)]
pub struct Parser {
    /// The table driving this parser.
    pub table: LRTable,
}

impl Parser {
    /// Wraps an LR table into a driver.
    pub fn new(table: LRTable) -> Parser {
        Parser { table }
    }

    /// Parses a token stream to completion. The stream is extended
    /// with the synthetic end-of-input token internally. Reduction
    /// actions run against `cg`, registering symbols and building the
    /// AST as parsing proceeds.
    pub fn parse(&self, tokens: &[Token], cg: &mut Codegen) -> Result<Parse> {
        let mut tokens = tokens.to_vec();
        tokens.push(Token::new(END_MARKER, END_MARKER));

        let mut node_stack: Vec<TreeNode> = Vec::new();
        let mut frag_stack: Vec<Fragment> = Vec::new();
        let mut state_stack: Vec<usize> = vec![0];
        let mut token_index = 0;
        let mut pending_nonterminal: Option<String> = None;

        loop {
            let state_index = match state_stack.last() {
                Some(&index) => index,
                None => bug!("parser state stack underflow"),
            };
            let state = &self.table.states[state_index];

            let action = {
                let symbol: &str = match pending_nonterminal {
                    Some(ref nonterminal) => nonterminal,
                    None => tokens[token_index].kind,
                };
                match state.mapping.get(symbol) {
                    Some(&action) => action,
                    None => {
                        let token = &tokens[token_index];
                        return Err(Error::Syntax {
                            message: self.expectation_message(state, &token.value),
                            range: Some(token.range),
                        });
                    },
                }
            };

            match action {
                // r0, reducing the augmentation rule, accepts.
                Action::Reduce(0) => {
                    let root = collect_root(frag_stack);
                    let top = node_stack.pop().unwrap_or_default();
                    let tree = TreeNode {
                        name: self.table.grammar.axiom.clone(),
                        data: None,
                        children: vec![top],
                    };
                    return Ok(Parse { tree, root });
                },

                Action::Shift(next) => {
                    let token = &tokens[token_index];
                    node_stack.push(TreeNode {
                        name: token.kind.to_owned(),
                        data: Some(token.value.clone()),
                        children: Vec::new(),
                    });
                    frag_stack.push(Fragment::Token {
                        kind: token.kind,
                        value: token.value.clone(),
                    });
                    state_stack.push(next);
                    token_index += 1;
                },

                Action::Reduce(rule_index) => {
                    let rule = &self.table.grammar.rules[rule_index];
                    let count = if rule.development.iter().any(|s| s == EPSILON) {
                        0
                    } else {
                        rule.development.len()
                    };

                    let mut children = Vec::with_capacity(count);
                    let mut frags = Vec::with_capacity(count);
                    for _ in 0..count {
                        match (node_stack.pop(), frag_stack.pop(), state_stack.pop()) {
                            (Some(child), Some(frag), Some(_)) => {
                                children.insert(0, child);
                                frags.insert(0, frag);
                            },
                            _ => bug!("parser stacks underflow on reduce"),
                        }
                    }

                    let fragment = astgen::build(cg, &rule.nonterminal, frags)?;
                    frag_stack.push(fragment);
                    node_stack.push(TreeNode {
                        name: rule.nonterminal.clone(),
                        data: None,
                        children,
                    });

                    // The next lookup resolves the freshly reduced
                    // nonterminal through the GOTO part of the table.
                    pending_nonterminal = Some(rule.nonterminal.clone());
                },

                Action::Goto(next) => {
                    state_stack.push(next);
                    pending_nonterminal = None;
                },
            }
        }
    }

    /// Builds the "Expected … but found …" message for a stuck state:
    /// the sorted union of acceptable terminals (nonterminal columns
    /// contribute their FIRST sets), `$` rendered as `EOF` and moved
    /// to the end.
    fn expectation_message(&self, state: &State, found: &str) -> String {
        let mut expected: Vec<String> = Vec::new();

        for symbol in state.mapping.keys() {
            if self.table.grammar.nonterminals.iter().any(|nt| nt == symbol) {
                if let Some(firsts) = self.table.grammar.firsts.get(symbol) {
                    for first in firsts {
                        add_unique(first.clone(), &mut expected);
                    }
                }
            } else {
                add_unique(symbol.clone(), &mut expected);
            }
        }

        expected.retain(|symbol| symbol != EPSILON);
        expected.sort();
        expected.dedup();

        if let Some(position) = expected.iter().position(|symbol| symbol == END_MARKER) {
            let end = expected.remove(position);
            expected.push(end);
        }

        let mut message = String::from("Expected");
        for symbol in &expected {
            message.push_str(&format!(" '{}' or", symbol));
        }
        if let Some(position) = message.rfind(' ') {
            message.truncate(position);
        }
        message.push_str(&format!(" but found '{}'", found));

        message.replace("'$'", "EOF")
    }
}

fn collect_root(frag_stack: Vec<Fragment>) -> Option<Node> {
    let mut top_level = Vec::new();
    let mut any = false;

    for fragment in frag_stack {
        match fragment {
            Fragment::Node(node) => {
                top_level.push(node);
                any = true;
            },
            Fragment::Nodes(nodes) => {
                top_level.extend(nodes);
                any = true;
            },
            _ => {},
        }
    }

    if any {
        Some(Node::Root(top_level))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammar::Grammar;
    use lrtable::LRTable;

    fn parser_for(text: &str) -> Parser {
        Parser::new(LRTable::new(Grammar::new(text).unwrap()).unwrap())
    }

    fn toks(kinds: &[&'static str]) -> Vec<Token> {
        kinds.iter().map(|&k| Token::new(k, k)).collect()
    }

    #[test]
    fn right_recursive_grammar_accepts() {
        let parser = parser_for("A' -> A\nA -> a A\nA -> a");
        let mut cg = Codegen::new("test");

        let parse = parser.parse(&toks(&["a"]), &mut cg).unwrap();
        assert_eq!(parse.tree.name, "A'");
        assert!(parse.root.is_none());

        assert!(parser.parse(&toks(&["a", "a"]), &mut cg).is_ok());
    }

    #[test]
    fn right_recursive_grammar_rejects() {
        let parser = parser_for("A' -> A\nA -> a A\nA -> a");
        let mut cg = Codegen::new("test");

        match parser.parse(&toks(&["a", "b"]), &mut cg) {
            Err(Error::Syntax { message, .. }) => {
                assert_eq!(message, "Expected 'a' or EOF but found 'b'");
            },
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn epsilon_grammar_accepts_nested_parens() {
        let parser = parser_for("A' -> A\nA -> B\nA -> ''\nB -> ( A )");
        let mut cg = Codegen::new("test");

        assert!(parser.parse(&toks(&["(", ")"]), &mut cg).is_ok());
        assert!(parser.parse(&toks(&["(", "(", ")", ")"]), &mut cg).is_ok());
        // The empty input derives through the ε production.
        assert!(parser.parse(&toks(&[]), &mut cg).is_ok());
    }

    #[test]
    fn epsilon_grammar_rejects_juxtaposition() {
        let parser = parser_for("A' -> A\nA -> B\nA -> ''\nB -> ( A )");
        let mut cg = Codegen::new("test");

        match parser.parse(&toks(&["(", ")", "(", ")"]), &mut cg) {
            Err(Error::Syntax { message, .. }) => {
                assert_eq!(message, "Expected EOF but found '('");
            },
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn tree_display_indents_children() {
        let parser = parser_for("A' -> A\nA -> a A\nA -> a");
        let mut cg = Codegen::new("test");
        let parse = parser.parse(&toks(&["a", "a"]), &mut cg).unwrap();

        let printed = parse.tree.to_string();
        assert!(printed.starts_with("A'\n"));
        assert!(printed.contains("|_ A"));
        assert!(printed.contains("|_ a 'a'"));
    }
}
