//
// tests/babel_parser.rs
// The Babel Compiler
//

//! End-to-end tests of the Babel grammar through the LR(1) generator
//! and the shift-reduce driver: table construction, accepted
//! programs, rejection diagnostics, and the shape of the produced
//! AST.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate quickcheck;
extern crate babel;

use babel::ast::Node;
use babel::codegen::Codegen;
use babel::error::Error;
use babel::grammar::babel_grammar;
use babel::lexer;
use babel::lrtable::LRTable;
use babel::parser::{ Parse, Parser };


lazy_static! {
    // Table construction is the expensive step; share one parser.
    static ref PARSER: Parser = Parser::new(
        LRTable::new(babel_grammar().expect("Babel grammar must parse"))
            .expect("Babel grammar must be conflict-free")
    );
}

fn parse(source: &str) -> babel::error::Result<Parse> {
    let tokens = lexer::prepare(source);
    let mut cg = Codegen::new("test");
    PARSER.parse(&tokens, &mut cg)
}

fn parse_ok(source: &str) -> Parse {
    match parse(source) {
        Ok(parse) => parse,
        Err(error) => panic!("'{}' failed to parse: {}", source, error),
    }
}

fn root_nodes(parse: Parse) -> Vec<Node> {
    match parse.root {
        Some(Node::Root(nodes)) => nodes,
        other => panic!("expected a Root, got {:?}", other),
    }
}

#[test]
fn babel_grammar_is_conflict_free() {
    assert!(LRTable::new(babel_grammar().unwrap()).is_ok());
}

#[test]
fn empty_program_parses() {
    let nodes = root_nodes(parse_ok(""));
    assert!(nodes.is_empty());
}

#[test]
fn declarations_and_expressions() {
    let nodes = root_nodes(parse_ok("let x: int32 = 5\nx = x + 1\nx + 1"));
    assert_eq!(nodes.len(), 3);

    match nodes[0] {
        Node::Binary { ref op, ref lhs, .. } => {
            assert_eq!(op, "=");
            match **lhs {
                Node::Variable { ref name, is_decl, is_const, .. } => {
                    assert_eq!(name, "x");
                    assert!(is_decl);
                    assert!(!is_const);
                },
                ref other => panic!("expected a variable target, got {:?}", other),
            }
        },
        ref other => panic!("expected an assignment, got {:?}", other),
    }

    match nodes[2] {
        Node::Binary { ref op, .. } => assert_eq!(op, "+"),
        ref other => panic!("expected an addition, got {:?}", other),
    }
}

#[test]
fn compound_assignment_lowers_to_plain_assignment() {
    let nodes = root_nodes(parse_ok("let x = 1\nx += 2"));

    match nodes[1] {
        Node::Binary { ref op, ref rhs, .. } => {
            assert_eq!(op, "=");
            match **rhs {
                Node::Binary { ref op, .. } => assert_eq!(op, "+"),
                ref other => panic!("expected a lowered addition, got {:?}", other),
            }
        },
        ref other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn elif_chains_fold_right_to_left() {
    let source = "
if a == 1 then
    x = 1
elif a == 2 then
    x = 2
else
    x = 3
end
";
    let nodes = root_nodes(parse_ok(source));
    assert_eq!(nodes.len(), 1);

    match nodes[0] {
        Node::If { ref els, .. } => match **els.as_ref().expect("must have an else") {
            // The elif becomes a nested If in the else position.
            Node::If { ref els, .. } => assert!(els.is_some()),
            ref other => panic!("expected a nested if, got {:?}", other),
        },
        ref other => panic!("expected an if, got {:?}", other),
    }
}

#[test]
fn task_definitions_and_calls() {
    let source = "
task add(a: int32, b: int32) -> int32
    return a + b
end
add(1, 2)
";
    let nodes = root_nodes(parse_ok(source));
    assert_eq!(nodes.len(), 2);

    match nodes[0] {
        Node::Task { ref header, .. } => match **header {
            Node::TaskHeader { ref name, ref args, ref arg_types, .. } => {
                assert_eq!(name, "add");
                assert_eq!(args.len(), 2);
                assert_eq!(arg_types.len(), 2);
            },
            ref other => panic!("expected a task header, got {:?}", other),
        },
        ref other => panic!("expected a task, got {:?}", other),
    }

    match nodes[1] {
        Node::TaskCall { ref callee, ref args } => {
            assert_eq!(callee, "add");
            assert_eq!(args.len(), 2);
        },
        ref other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn extern_tasks_produce_bare_headers() {
    let nodes = root_nodes(parse_ok("extern task putd(x: int32) -> int32"));
    match nodes[0] {
        Node::TaskHeader { ref name, .. } => assert_eq!(name, "putd"),
        ref other => panic!("expected a header, got {:?}", other),
    }
}

#[test]
fn pointers_arrays_and_indexing() {
    let source = "let x = 1\nlet p = &x\nlet y = *p\nlet a = Array(1, 2)\na[0] = 7";
    let nodes = root_nodes(parse_ok(source));
    assert_eq!(nodes.len(), 5);

    match nodes[4] {
        Node::Binary { ref lhs, .. } => match **lhs {
            Node::Index { .. } => {},
            ref other => panic!("expected an index target, got {:?}", other),
        },
        ref other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn goto_label_and_return() {
    let source = "
task spin() -> int32
    goto out
    label out
    return 0
end
";
    let nodes = root_nodes(parse_ok(source));
    match nodes[0] {
        Node::Task { ref body, .. } => match **body {
            Node::Block(ref statements) => assert_eq!(statements.len(), 3),
            ref other => panic!("expected a block, got {:?}", other),
        },
        ref other => panic!("expected a task, got {:?}", other),
    }
}

#[test]
fn concrete_tree_is_rooted_at_the_axiom() {
    let parse = parse_ok("let x = 1");
    assert_eq!(parse.tree.name, "program");
    assert!(!parse.tree.children.is_empty());
}

#[test]
fn syntax_errors_enumerate_expectations() {
    match parse("let = 5") {
        Err(Error::Syntax { message, .. }) => {
            assert!(
                message.starts_with("Expected") && message.contains("but found '='"),
                "unexpected message: {}", message
            );
        },
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn end_of_input_renders_as_eof() {
    match parse("let x") {
        Err(Error::Syntax { message, .. }) => {
            assert!(message.contains("but found '$'") == false);
            assert!(
                message.contains("but found"),
                "unexpected message: {}", message
            );
        },
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn operator_precedence_shapes_the_tree() {
    let nodes = root_nodes(parse_ok("1 + 2 * 3"));
    match nodes[0] {
        Node::Binary { ref op, ref rhs, .. } => {
            assert_eq!(op, "+");
            match **rhs {
                Node::Binary { ref op, .. } => assert_eq!(op, "*"),
                ref other => panic!("multiplication must bind tighter, got {:?}", other),
            }
        },
        ref other => panic!("expected an addition, got {:?}", other),
    }
}

quickcheck! {
    // Parser totality: whatever the token stream, the driver returns
    // a parse or a syntax error; it never panics and always stops.
    fn parser_is_total(stream: Vec<u8>) -> bool {
        let vocabulary: &[(&'static str, &str)] = &[
            ("LET", "let"), ("CONST", "const"), ("VAR", "x"), ("INTEGER", "1"),
            ("FLOATING_POINT", "1.5"), ("ASSIGN", "="), ("SUM_OP", "+"),
            ("STAR", "*"), ("AMP", "&"), ("LPAREN", "("), ("RPAREN", ")"),
            ("LBRACKET", "["), ("RBRACKET", "]"), ("SEMICOLON", ";"),
            ("IF", "if"), ("THEN", "then"), ("ELSE", "else"), ("END", "end"),
            ("RETURN", "return"), ("COMMA", ","), ("COLON", ":"), ("TYPE", "int32"),
        ];

        let tokens: Vec<babel::lexer::Token> = stream
            .iter()
            .map(|&b| {
                let (kind, value) = vocabulary[b as usize % vocabulary.len()];
                babel::lexer::Token::new(kind, value)
            })
            .collect();

        let mut cg = Codegen::new("fuzz");
        let _ = PARSER.parse(&tokens, &mut cg);
        true
    }
}
