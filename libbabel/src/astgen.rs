//
// astgen.rs
// The Babel Compiler
//

//! Reduction actions: the bridge between the parser driver and the
//! AST. Every reduction pops the production's fragments off the
//! reduction stack and pushes back either an AST node or a raw parse
//! fragment for syntactic glue. Productions of grammars other than
//! Babel's fall through to an opaque fragment, which lets the driver
//! run bare test grammars with no semantic actions at all.

use ast::{ self, Node };
use codegen::Codegen;
use error::{ Result, semantic_error };
use symbols::TaskInfo;
use typing::{ BasicType, TypeId };
use util::unescape_string;


/// An entry of the reduction stack.
#[derive(Debug)]
pub enum Fragment {
    /// A shifted token.
    Token {
        /// The token's type tag.
        kind: &'static str,
        /// The lexeme.
        value: String,
    },
    /// A finished AST node.
    Node(Node),
    /// A sequence of AST nodes (statement and argument lists).
    Nodes(Vec<Node>),
    /// Task parameters: names and types, in order.
    Params {
        /// Parameter names.
        names: Vec<String>,
        /// Parameter types.
        types: Vec<TypeId>,
    },
    /// A type annotation.
    Type(TypeId),
    /// An absent optional piece (ε of a known production).
    Empty,
    /// Syntactic glue without semantic payload.
    Opaque,
}

fn pop(frags: &mut Vec<Fragment>) -> Result<Fragment> {
    frags.pop().ok_or_else(lazy_bug!("reduction stack underflow"))
}

fn node(frag: Fragment) -> Result<Node> {
    match frag {
        Fragment::Node(node) => Ok(node),
        other => bug!("expected an AST fragment, found {:?}", other),
    }
}

fn nodes(frag: Fragment) -> Result<Vec<Node>> {
    match frag {
        Fragment::Nodes(nodes) => Ok(nodes),
        Fragment::Empty => Ok(Vec::new()),
        other => bug!("expected a node sequence fragment, found {:?}", other),
    }
}

fn token(frag: Fragment) -> Result<(&'static str, String)> {
    match frag {
        Fragment::Token { kind, value } => Ok((kind, value)),
        other => bug!("expected a token fragment, found {:?}", other),
    }
}

fn params(frag: Fragment) -> Result<(Vec<String>, Vec<TypeId>)> {
    match frag {
        Fragment::Params { names, types } => Ok((names, types)),
        Fragment::Empty => Ok((Vec::new(), Vec::new())),
        other => bug!("expected a parameter fragment, found {:?}", other),
    }
}

fn type_id(frag: Fragment) -> Result<TypeId> {
    match frag {
        Fragment::Type(ty) => Ok(ty),
        other => bug!("expected a type fragment, found {:?}", other),
    }
}

fn optional_type(frag: Fragment) -> Result<Option<TypeId>> {
    match frag {
        Fragment::Type(ty) => Ok(Some(ty)),
        Fragment::Empty => Ok(None),
        other => bug!("expected an optional type fragment, found {:?}", other),
    }
}

/// Runs the reduction action of the production `lhs -> …` whose
/// right-hand side produced `frags` (empty for ε). Productions
/// without a specific constructor collapse into `Fragment::Opaque`.
pub fn build(cg: &mut Codegen, lhs: &str, mut frags: Vec<Fragment>) -> Result<Fragment> {
    match lhs {
        "program" | "expression" => passthrough(frags),

        "statement" => {
            if frags.is_empty() {
                Ok(Fragment::Empty)
            } else {
                passthrough(frags)
            }
        },

        "statement_list" => {
            if frags.len() == 1 {
                match pop(&mut frags)? {
                    Fragment::Node(node) => Ok(Fragment::Nodes(vec![node])),
                    Fragment::Empty => Ok(Fragment::Nodes(Vec::new())),
                    other => bug!("unexpected statement fragment {:?}", other),
                }
            } else {
                let statement = pop(&mut frags)?;
                let _semicolon = pop(&mut frags)?;
                let mut list = nodes(pop(&mut frags)?)?;
                if let Fragment::Node(node) = statement {
                    list.push(node);
                }
                Ok(Fragment::Nodes(list))
            }
        },

        "assignment" => build_assignment(cg, frags),

        "annotation" => {
            if frags.is_empty() {
                Ok(Fragment::Empty)
            } else {
                let ty = pop(&mut frags)?;
                let _colon = pop(&mut frags)?;
                Ok(Fragment::Type(type_id(ty)?))
            }
        },

        "type_expr" => {
            if frags.len() == 2 {
                let _star = pop(&mut frags)?;
                let to = type_id(pop(&mut frags)?)?;
                Ok(Fragment::Type(cg.types.pointer(to, false)))
            } else {
                let (_, name) = token(pop(&mut frags)?)?;
                match BasicType::from_name(&name) {
                    Some(basic) => Ok(Fragment::Type(cg.types.basic(basic))),
                    None => semantic_error(format!("Unknown type '{}'", name)),
                }
            }
        },

        "return_stmt" => {
            if frags.len() == 2 {
                let expr = node(pop(&mut frags)?)?;
                Ok(Fragment::Node(Node::Return(Some(Box::new(expr)))))
            } else {
                Ok(Fragment::Node(Node::Return(None)))
            }
        },

        "goto_stmt" => {
            let (_, target) = token(pop(&mut frags)?)?;
            Ok(Fragment::Node(Node::Goto(target)))
        },

        "label_stmt" => {
            let (_, name) = token(pop(&mut frags)?)?;
            Ok(Fragment::Node(Node::Label(name)))
        },

        "if_stmt" => {
            let _end = pop(&mut frags)?;
            let chain = pop(&mut frags)?;
            let body = nodes(pop(&mut frags)?)?;
            let _then = pop(&mut frags)?;
            let cond = node(pop(&mut frags)?)?;

            let els = match chain {
                Fragment::Node(node) => Some(Box::new(node)),
                Fragment::Empty => None,
                other => bug!("unexpected elif fragment {:?}", other),
            };

            Ok(Fragment::Node(Node::If {
                cond: Box::new(cond),
                then: Box::new(Node::Block(body)),
                els,
            }))
        },

        "elif_chain" => {
            match frags.len() {
                0 => Ok(Fragment::Empty),
                2 => {
                    let body = nodes(pop(&mut frags)?)?;
                    Ok(Fragment::Node(Node::Block(body)))
                },
                _ => {
                    let chain = pop(&mut frags)?;
                    let body = nodes(pop(&mut frags)?)?;
                    let _then = pop(&mut frags)?;
                    let cond = node(pop(&mut frags)?)?;

                    let els = match chain {
                        Fragment::Node(node) => Some(Box::new(node)),
                        Fragment::Empty => None,
                        other => bug!("unexpected elif fragment {:?}", other),
                    };

                    Ok(Fragment::Node(Node::If {
                        cond: Box::new(cond),
                        then: Box::new(Node::Block(body)),
                        els,
                    }))
                },
            }
        },

        "task_header" => {
            let ret = if frags.len() == 7 {
                let ty = type_id(pop(&mut frags)?)?;
                let _arrow = pop(&mut frags)?;
                ty
            } else {
                cg.types.void()
            };
            let _rparen = pop(&mut frags)?;
            let (names, types) = params(pop(&mut frags)?)?;
            let _lparen = pop(&mut frags)?;
            let (_, name) = token(pop(&mut frags)?)?;

            cg.syms.register_task(&name, TaskInfo {
                args: types.clone(),
                ret,
            });

            Ok(Fragment::Node(Node::TaskHeader {
                name,
                args: names,
                arg_types: types,
                ret,
            }))
        },

        "task_def" => {
            let _end = pop(&mut frags)?;
            let body = nodes(pop(&mut frags)?)?;
            let _semicolon = pop(&mut frags)?;
            let header = node(pop(&mut frags)?)?;

            Ok(Fragment::Node(Node::Task {
                header: Box::new(header),
                body: Box::new(Node::Block(body)),
            }))
        },

        "extern_task" => {
            let header = pop(&mut frags)?;
            let _extern = pop(&mut frags)?;
            Ok(header)
        },

        "params" => {
            if frags.is_empty() {
                Ok(Fragment::Params { names: Vec::new(), types: Vec::new() })
            } else {
                passthrough(frags)
            }
        },

        "param_list" => {
            if frags.len() == 1 {
                passthrough(frags)
            } else {
                let (mut tail_names, mut tail_types) = params(pop(&mut frags)?)?;
                let _comma = pop(&mut frags)?;
                let (mut names, mut types) = params(pop(&mut frags)?)?;
                names.append(&mut tail_names);
                types.append(&mut tail_types);
                Ok(Fragment::Params { names, types })
            }
        },

        "param" => {
            let ty = type_id(pop(&mut frags)?)?;
            let _colon = pop(&mut frags)?;
            let (_, name) = token(pop(&mut frags)?)?;
            Ok(Fragment::Params { names: vec![name], types: vec![ty] })
        },

        "contravalence" | "disjunction" | "conjunction" | "comparison"
        | "bitwise_or" | "bitwise_xor" | "bitwise_and"
        | "shift_expression" | "sum" | "term" => {
            if frags.len() == 1 {
                passthrough(frags)
            } else {
                let rhs = node(pop(&mut frags)?)?;
                let (_, op) = token(pop(&mut frags)?)?;
                let lhs = node(pop(&mut frags)?)?;
                Ok(Fragment::Node(Node::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }))
            }
        },

        "factor" => {
            if frags.len() == 1 {
                return passthrough(frags);
            }

            let operand = pop(&mut frags)?;
            let (kind, op) = token(pop(&mut frags)?)?;

            match kind {
                "STAR" => Ok(Fragment::Node(Node::Deref(Box::new(node(operand)?)))),
                "AMP" => {
                    let (_, name) = token(operand)?;
                    Ok(Fragment::Node(Node::AddressOf { name }))
                },
                _ => Ok(Fragment::Node(Node::Unary {
                    op,
                    operand: Box::new(node(operand)?),
                })),
            }
        },

        "inversion" => {
            if frags.len() == 1 {
                passthrough(frags)
            } else {
                let operand = node(pop(&mut frags)?)?;
                let (_, op) = token(pop(&mut frags)?)?;
                Ok(Fragment::Node(Node::Unary {
                    op,
                    operand: Box::new(operand),
                }))
            }
        },

        "primary" => match frags.len() {
            1 => passthrough(frags),
            3 => {
                let _rparen = pop(&mut frags)?;
                let inner = pop(&mut frags)?;
                let _lparen = pop(&mut frags)?;
                Ok(inner)
            },
            _ => {
                let _rbracket = pop(&mut frags)?;
                let index = node(pop(&mut frags)?)?;
                let _lbracket = pop(&mut frags)?;
                let container = node(pop(&mut frags)?)?;
                Ok(Fragment::Node(Node::Index {
                    container: Box::new(container),
                    index: Box::new(index),
                }))
            },
        },

        "function_call" => {
            let _rparen = pop(&mut frags)?;
            let args = nodes(pop(&mut frags)?)?;
            let _lparen = pop(&mut frags)?;
            let (_, callee) = token(pop(&mut frags)?)?;
            Ok(Fragment::Node(Node::TaskCall { callee, args }))
        },

        "class_construction" => {
            let _rparen = pop(&mut frags)?;
            let args = nodes(pop(&mut frags)?)?;
            let _lparen = pop(&mut frags)?;
            let (_, name) = token(pop(&mut frags)?)?;

            if name != "Array" {
                return semantic_error(format!("Unknown class '{}'", name));
            }

            build_array(cg, args)
        },

        "arguments" => {
            if frags.is_empty() {
                Ok(Fragment::Nodes(Vec::new()))
            } else {
                passthrough(frags)
            }
        },

        "argument_list" => {
            if frags.len() == 1 {
                let expr = node(pop(&mut frags)?)?;
                Ok(Fragment::Nodes(vec![expr]))
            } else {
                let expr = node(pop(&mut frags)?)?;
                let _comma = pop(&mut frags)?;
                let mut list = nodes(pop(&mut frags)?)?;
                list.push(expr);
                Ok(Fragment::Nodes(list))
            }
        },

        "atom" => build_atom(cg, pop(&mut frags)?),

        _ => Ok(Fragment::Opaque),
    }
}

fn passthrough(mut frags: Vec<Fragment>) -> Result<Fragment> {
    pop(&mut frags)
}

fn build_atom(cg: &mut Codegen, frag: Fragment) -> Result<Fragment> {
    let (kind, value) = token(frag)?;

    let node = match kind {
        "BOOL" => Node::Boolean(value == "true"),
        "INTEGER" => {
            let (value, ty) = ast::parse_integer_literal(&value, &mut cg.types)?;
            Node::Integer { value, ty }
        },
        "FLOATING_POINT" => {
            let (value, ty) = ast::parse_float_literal(&value, &mut cg.types)?;
            Node::Float { value, ty }
        },
        "CHAR" => {
            let body = &value[1..value.len() - 1];
            let decoded = unescape_string(body)?;
            let bytes = decoded.as_bytes();
            if bytes.len() != 1 {
                return semantic_error(format!("invalid character literal {}", value));
            }
            Node::Char(bytes[0])
        },
        "STRING" => {
            let body = &value[1..value.len() - 1];
            Node::CString(unescape_string(body)?)
        },
        "VAR" => Node::Variable {
            name: value,
            ty: None,
            is_const: false,
            is_decl: false,
            is_comptime: false,
        },
        _ => bug!("token '{}' cannot form an atom", kind),
    };

    Ok(Fragment::Node(node))
}

fn build_array(cg: &mut Codegen, elems: Vec<Node>) -> Result<Fragment> {
    // Empty arrays get an arbitrary element type.
    let inner = match elems.first() {
        Some(first) => cg.type_of(first)?,
        None => cg.types.int(),
    };

    for elem in &elems {
        if cg.type_of(elem)? != inner {
            return semantic_error("Array elements must share the same type");
        }
    }

    Ok(Fragment::Node(Node::Array { elems, inner }))
}

fn build_assignment(cg: &mut Codegen, mut frags: Vec<Fragment>) -> Result<Fragment> {
    if frags.len() == 3 {
        let rhs = node(pop(&mut frags)?)?;
        let (kind, op) = token(pop(&mut frags)?)?;
        let target = node(pop(&mut frags)?)?;

        let rhs = if kind == "AUG_ASSIGN" {
            // x += e lowers to x = x + e.
            let base_op = op[..op.len() - 1].to_owned();
            Node::Binary {
                op: base_op,
                lhs: Box::new(target.clone()),
                rhs: Box::new(rhs),
            }
        } else {
            rhs
        };

        return Ok(Fragment::Node(Node::Binary {
            op: "=".to_owned(),
            lhs: Box::new(target),
            rhs: Box::new(rhs),
        }));
    }

    // Declaration forms: `let|const name [: ty] = e` and `name : ty = e`.
    let rhs = node(pop(&mut frags)?)?;
    let _assign = pop(&mut frags)?;
    let annotation = pop(&mut frags)?;
    let second = pop(&mut frags)?;
    let first = pop(&mut frags)?;

    let (name, declared, is_const) = match (first, second) {
        (Fragment::Token { kind: "LET", .. }, name_tok) => {
            (token(name_tok)?.1, optional_type(annotation)?, false)
        },
        (Fragment::Token { kind: "CONST", .. }, name_tok) => {
            (token(name_tok)?.1, optional_type(annotation)?, true)
        },
        (name_tok, _colon) => {
            (token(name_tok)?.1, Some(type_id(annotation)?), false)
        },
    };

    // Inference against the symbol tables only resolves fully at
    // global scope; inside task bodies the locals are not populated
    // until emission, so the type stays open and the emitter infers
    // it from the right-hand side again.
    let ty = match declared {
        Some(ty) => Some(ty),
        None => cg.type_of(&rhs).ok(),
    };
    let is_comptime = cg.is_comptime_assignable(&rhs)?;

    if let Some(ty) = ty {
        cg.declare_placeholder(&name, ty, is_const, is_comptime);
    }

    let lhs = Node::Variable {
        name,
        ty,
        is_const,
        is_decl: true,
        is_comptime,
    };

    Ok(Fragment::Node(Node::Binary {
        op: "=".to_owned(),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }))
}
