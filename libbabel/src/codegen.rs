//
// codegen.rs
// The Babel Compiler
//

//! Lowering from the AST to the typed SSA IR. The `Codegen` context
//! owns the type arena, the symbol tables, the module under
//! construction and the builder; it is threaded explicitly through
//! AST construction (for symbol registration) and through emission.
//! All emission happens from `emit_root()`, after parsing completes.
//!
//! Every emission path returns a `Result`; user-facing failures are
//! `Error::Semantic`, structural impossibilities are ICEs via `bug!`.

use ast::Node;
use error::{ Result, semantic_error };
use ir::{ self, BinOp, CastOp, Const, IrType, Pred, Value };
use symbols::{ self, GlobalSymbol, LocalSymbol, SymbolTables, TaskInfo };
use typing::{ BasicType, Type, TypeArena, TypeId };


/// The name of the synthetic function that wraps top-level user code.
const GLOBAL_MAIN: &str = "__global_main";

/// The compilation context: one per compilation unit.
#[derive(Debug)]
pub struct Codegen {
    /// The type arena; append-only for the whole compilation.
    pub types: TypeArena,
    /// The symbol tables.
    pub syms: SymbolTables,
    /// The module being emitted.
    pub module: ir::Module,
    builder: ir::Builder,
}

impl Codegen {
    /// Makes a fresh context for one compilation unit.
    pub fn new<S: Into<String>>(module_name: S) -> Codegen {
        Codegen {
            types: TypeArena::new(),
            syms: SymbolTables::new(),
            module: ir::Module::new(module_name),
            builder: ir::Builder::new(),
        }
    }

    /// Answers whether emission is currently at global scope, i.e.
    /// inside the synthetic `__global_main` wrapper (or before any
    /// function exists at all).
    pub fn in_global_scope(&self) -> bool {
        match self.builder.current_function() {
            Some(func) => self.module.functions[func].name.starts_with(GLOBAL_MAIN),
            None => true,
        }
    }

    //
    // Per-node type and constness queries
    //

    /// The result type of an expression node.
    pub fn type_of(&mut self, node: &Node) -> Result<TypeId> {
        match *node {
            Node::Boolean(_) => Ok(self.types.boolean()),
            Node::Integer { ty, .. } => Ok(ty),
            Node::Float { ty, .. } => Ok(ty),
            Node::Char(_) => Ok(self.types.basic(BasicType::Character)),
            Node::CString(_) => Ok(self.types.basic(BasicType::CString)),
            Node::Variable { ref name, ty, .. } => match ty {
                Some(ty) => Ok(ty),
                None => self.variable_type(name),
            },
            Node::Array { ref elems, inner } => Ok(self.types.array(inner, elems.len())),
            Node::Binary { ref lhs, ref rhs, .. } => {
                let lhs_ty = self.type_of(lhs)?;
                let rhs_ty = self.type_of(rhs)?;

                if self.types.can_coerce(lhs_ty, rhs_ty) {
                    Ok(rhs_ty)
                } else if self.types.can_coerce(rhs_ty, lhs_ty) {
                    Ok(lhs_ty)
                } else {
                    semantic_error(format!(
                        "Cannot implicitly cast between {} and {}",
                        self.types.display(lhs_ty),
                        self.types.display(rhs_ty),
                    ))
                }
            },
            Node::Unary { ref operand, .. } => self.type_of(operand),
            Node::Index { ref container, .. } => {
                let container_ty = self.type_of(container)?;
                match self.types.get(container_ty) {
                    Type::Array { inner, .. } => Ok(inner),
                    _ => semantic_error(format!(
                        "'{}' object is not subscriptable",
                        self.types.display(container_ty),
                    )),
                }
            },
            Node::Deref(ref pointer) => {
                let pointer_ty = self.type_of(pointer)?;
                match self.types.get(pointer_ty) {
                    Type::Pointer { to, .. } => Ok(to),
                    _ => semantic_error("Cannot dereference non-pointer"),
                }
            },
            Node::AddressOf { ref name } => {
                let (ty, is_const) = self.variable_type_and_constness(name)?;
                Ok(self.types.pointer(ty, is_const))
            },
            Node::TaskCall { ref callee, ref args } => {
                let info = self.resolve_task_info(callee, args)?;
                Ok(info.ret)
            },
            _ => semantic_error("this construct has no result type"),
        }
    }

    /// Answers whether the node's value can be computed at compile
    /// time and used as a static initializer.
    pub fn is_comptime_assignable(&self, node: &Node) -> Result<bool> {
        match *node {
            Node::Boolean(_)
            | Node::Integer { .. }
            | Node::Float { .. }
            | Node::Char(_)
            | Node::CString(_) => Ok(true),
            Node::Variable { ref name, .. } => match self.syms.globals.get(name) {
                Some(global) => Ok(global.is_comptime),
                None => Ok(false),
            },
            Node::Array { ref elems, .. } => {
                for elem in elems {
                    if !self.is_comptime_assignable(elem)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
            Node::AddressOf { ref name } => match self.syms.globals.get(name) {
                Some(global) => Ok(global.is_comptime),
                None => Ok(false),
            },
            Node::Binary { ref lhs, ref rhs, ref op } => {
                if op == "=" {
                    return Ok(false);
                }
                Ok(self.is_comptime_assignable(lhs)? && self.is_comptime_assignable(rhs)?)
            },
            Node::Unary { ref operand, .. } => self.is_comptime_assignable(operand),
            _ => Ok(false),
        }
    }

    /// Registers a declaration-time placeholder in both symbol
    /// tables. Storage is filled in when the assignment is emitted;
    /// until then the slots stay `None`, which keeps redefinition
    /// checks working across the parse/emit phase boundary.
    pub fn declare_placeholder(
        &mut self,
        name: &str,
        ty: TypeId,
        is_const: bool,
        is_comptime: bool,
    ) {
        self.syms.globals.insert(name.to_owned(), GlobalSymbol {
            cell: None,
            ty,
            is_const,
            is_comptime,
            comptime_init: None,
        });
        self.syms.locals.insert(name.to_owned(), LocalSymbol {
            slot: None,
            ty,
            is_const,
        });
    }

    fn variable_type(&self, name: &str) -> Result<TypeId> {
        if let Some(local) = self.syms.locals.get(name) {
            return Ok(local.ty);
        }
        if let Some(global) = self.syms.globals.get(name) {
            return Ok(global.ty);
        }
        semantic_error(format!("Unknown variable '{}' referenced", name))
    }

    fn variable_type_and_constness(&self, name: &str) -> Result<(TypeId, bool)> {
        if let Some(local) = self.syms.locals.get(name) {
            return Ok((local.ty, local.is_const));
        }
        if let Some(global) = self.syms.globals.get(name) {
            return Ok((global.ty, global.is_const));
        }
        semantic_error(format!("Unknown variable '{}' referenced", name))
    }

    /// Resolves a callee name to its task signature, mangling the
    /// name by argument types when the base name is polymorphic.
    fn resolve_task_name(&mut self, callee: &str, args: &[Node]) -> Result<String> {
        if !self.syms.is_polymorphic(callee) {
            return Ok(callee.to_owned());
        }

        let mut type_names = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.type_of(arg)?;
            type_names.push(self.types.display(ty));
        }

        let mangled = symbols::polymorphic_name(callee, &type_names);

        if !self.syms.tasks.contains_key(&mangled) {
            let mut expected = String::new();
            for (_, info) in self.syms.polymorphic_signatures(callee) {
                let arg_names: Vec<String> =
                    info.args.iter().map(|&ty| self.types.display(ty)).collect();
                expected.push_str(&format!("({})\n", arg_names.join(", ")));
            }
            return semantic_error(format!(
                "Task '{}' was called with argument list {} but only the following were valid:\n{}",
                callee,
                type_names.join("_"),
                expected,
            ));
        }

        Ok(mangled)
    }

    fn resolve_task_info(&mut self, callee: &str, args: &[Node]) -> Result<TaskInfo> {
        // The base-name entry survives until the definition is
        // emitted and renamed, so try it first; calls emitted after
        // renaming resolve through the mangled name.
        if let Some(info) = self.syms.tasks.get(callee) {
            return Ok(info.clone());
        }

        let name = self.resolve_task_name(callee, args)?;
        match self.syms.tasks.get(&name) {
            Some(info) => Ok(info.clone()),
            None => semantic_error(format!("Unknown Task '{}' referenced", callee)),
        }
    }

    //
    // Compile-time (constant) emission
    //

    /// Emits the node as a compile-time constant. Only legal for
    /// comptime-assignable nodes; global initializers go through
    /// this.
    pub fn emit_const(&mut self, node: &Node) -> Result<Const> {
        match *node {
            Node::Boolean(value) => Ok(Const::Int {
                ty: IrType::I1,
                value: value as u128,
            }),
            Node::Integer { value, ty } => Ok(Const::Int {
                ty: self.types.ir_type_of(ty),
                value,
            }),
            Node::Float { value, ty } => Ok(Const::Float {
                ty: self.types.ir_type_of(ty),
                value,
            }),
            Node::Char(value) => Ok(Const::Int {
                ty: IrType::I8,
                value: value as u128,
            }),
            Node::CString(ref value) => {
                let index = self.module.intern_cstring(value);
                Ok(Const::Str(index))
            },
            Node::Variable { ref name, .. } => {
                match self.syms.globals.get(name).and_then(|g| g.comptime_init.clone()) {
                    Some(init) => Ok(init),
                    None => semantic_error(format!(
                        "Cannot use '{}' in a compile-time initializer", name
                    )),
                }
            },
            Node::Array { ref elems, inner } => {
                let elem_ty = self.types.ir_type_of(inner);
                let mut constants = Vec::with_capacity(elems.len());
                for elem in elems {
                    constants.push(self.emit_const(elem)?);
                }
                Ok(Const::Array { elem: elem_ty, elems: constants })
            },
            Node::AddressOf { ref name } => {
                match self.syms.globals.get(name).and_then(|g| g.cell.clone()) {
                    Some(cell) => Ok(Const::GlobalAddr(cell)),
                    None => semantic_error(format!(
                        "Cannot take the address of '{}' at compile time", name
                    )),
                }
            },
            Node::Binary { ref op, ref lhs, ref rhs } => self.fold_binary(op, lhs, rhs),
            Node::Unary { ref op, ref operand } => self.fold_unary(op, operand),
            _ => semantic_error("Cannot generate value at compile time"),
        }
    }

    fn fold_binary(&mut self, op: &str, lhs: &Node, rhs: &Node) -> Result<Const> {
        let lhs_ty = self.type_of(lhs)?;
        let rhs_ty = self.type_of(rhs)?;
        let common = if self.types.can_coerce(lhs_ty, rhs_ty) {
            rhs_ty
        } else if self.types.can_coerce(rhs_ty, lhs_ty) {
            lhs_ty
        } else {
            return semantic_error(format!(
                "Cannot implicitly cast between {} and {}",
                self.types.display(lhs_ty),
                self.types.display(rhs_ty),
            ));
        };

        let left = self.emit_const(lhs)?;
        let right = self.emit_const(rhs)?;
        let ty = self.types.ir_type_of(common);

        match (left, right) {
            (Const::Int { value: a, .. }, Const::Int { value: b, .. }) => {
                let (a, b) = (a as i128, b as i128);
                let folded: i128 = match op {
                    "+" => a.wrapping_add(b),
                    "-" => a.wrapping_sub(b),
                    "*" => a.wrapping_mul(b),
                    "//" if b != 0 => a.wrapping_div(b),
                    "%" if b != 0 => a.wrapping_rem(b),
                    "<<" => a.checked_shl(b as u32).unwrap_or(0),
                    ">>" => (a as u128).checked_shr(b as u32).unwrap_or(0) as i128,
                    "|" | "||" => a | b,
                    "&" | "&&" => a & b,
                    "^" | "^^" => a ^ b,
                    "/" => return Ok(Const::Float {
                        ty: IrType::F64,
                        value: a as f64 / b as f64,
                    }),
                    "==" | "!=" | "<" | ">" | "<=" | ">=" => {
                        let truth = match op {
                            "==" => a == b,
                            "!=" => a != b,
                            "<"  => a < b,
                            ">"  => a > b,
                            "<=" => a <= b,
                            _    => a >= b,
                        };
                        return Ok(Const::Int { ty: IrType::I1, value: truth as u128 });
                    },
                    _ => return semantic_error(
                        "expression is not a compile-time constant"
                    ),
                };
                Ok(Const::Int { ty, value: folded as u128 })
            },
            (left, right) => {
                let a = self.const_as_float(&left)?;
                let b = self.const_as_float(&right)?;
                let folded = match op {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    "/" => a / b,
                    "==" | "!=" | "<" | ">" | "<=" | ">=" => {
                        let truth = match op {
                            "==" => a == b,
                            "!=" => a != b,
                            "<"  => a < b,
                            ">"  => a > b,
                            "<=" => a <= b,
                            _    => a >= b,
                        };
                        return Ok(Const::Int { ty: IrType::I1, value: truth as u128 });
                    },
                    _ => return semantic_error(
                        "expression is not a compile-time constant"
                    ),
                };
                Ok(Const::Float { ty, value: folded })
            },
        }
    }

    fn fold_unary(&mut self, op: &str, operand: &Node) -> Result<Const> {
        let folded = self.emit_const(operand)?;

        match (op, folded) {
            ("+", constant) => Ok(constant),
            ("-", Const::Int { ty, value }) => {
                let negated = (value as i128).wrapping_neg();
                Ok(Const::Int { ty: ty.clone(), value: mask_to_width(negated as u128, &ty) })
            },
            ("-", Const::Float { ty, value }) => Ok(Const::Float { ty, value: -value }),
            ("!", Const::Int { ty, value }) => {
                let mask = all_ones(&ty);
                Ok(Const::Int { ty, value: (!value) & mask })
            },
            _ => semantic_error("expression is not a compile-time constant"),
        }
    }

    fn const_as_float(&self, constant: &Const) -> Result<f64> {
        match *constant {
            Const::Int { value, .. } => Ok(value as i128 as f64),
            Const::Float { value, .. } => Ok(value),
            _ => semantic_error("expression is not a compile-time constant"),
        }
    }

    /// Coerces a constant from one Babel type to another, per the
    /// implicit coercion table.
    fn coerce_const(&mut self, constant: Const, from: TypeId, to: TypeId) -> Result<Const> {
        if from == to {
            return Ok(constant);
        }

        if !self.types.can_coerce(from, to) {
            return semantic_error(format!(
                "Cannot implicitly cast between {} and {}",
                self.types.display(from),
                self.types.display(to),
            ));
        }

        let to_ir = self.types.ir_type_of(to);

        match constant {
            Const::Int { value, .. } => {
                if self.types.is_integer(to) {
                    Ok(Const::Int { ty: to_ir, value })
                } else {
                    Ok(Const::Float { ty: to_ir, value: value as i128 as f64 })
                }
            },
            Const::Float { value, .. } => Ok(Const::Float { ty: to_ir, value }),
            other => Ok(other),
        }
    }

    //
    // Runtime value emission
    //

    /// Emits the node. Expressions yield `Some((value, ir type))`;
    /// statements yield `None`.
    pub fn emit(&mut self, node: &Node) -> Result<Option<(Value, IrType)>> {
        match *node {
            Node::Boolean(_)
            | Node::Integer { .. }
            | Node::Float { .. }
            | Node::Char(_)
            | Node::CString(_) => {
                let constant = self.emit_const(node)?;
                let ty = constant.ty();
                Ok(Some((Value::Const(constant), ty)))
            },
            Node::Variable { ref name, .. } => {
                let (ptr, ty) = self.variable_slot(name)?;
                let ir_ty = self.types.ir_type_of(ty);
                let value = self.builder.build_load(&mut self.module, ir_ty.clone(), ptr)?;
                Ok(Some((value, ir_ty)))
            },
            Node::Array { ref elems, inner } => {
                let array_ty = {
                    let babel_ty = self.types.array(inner, elems.len());
                    self.types.ir_type_of(babel_ty)
                };
                let ptr = self.builder.build_entry_alloca(&mut self.module, array_ty.clone())?;

                for (position, elem) in elems.iter().enumerate() {
                    let index = Value::Const(Const::Int {
                        ty: IrType::I32,
                        value: position as u128,
                    });
                    let slot = self.builder.build_gep(
                        &mut self.module,
                        array_ty.clone(),
                        ptr.clone(),
                        IrType::I32,
                        index,
                    )?;
                    self.store_or_memcpy(elem, slot, inner)?;
                }

                Ok(Some((ptr, IrType::Ptr)))
            },
            Node::Binary { ref op, ref lhs, ref rhs } => self.emit_binary(op, lhs, rhs),
            Node::Unary { ref op, ref operand } => self.emit_unary(op, operand),
            Node::Index { ref container, ref index } => {
                self.emit_index(container, index, false).map(Some)
            },
            Node::Deref(ref pointer) => self.emit_deref(pointer, false).map(Some),
            Node::AddressOf { ref name } => {
                let (ptr, _) = self.variable_slot(name)?;
                Ok(Some((ptr, IrType::Ptr)))
            },
            Node::Return(ref expr) => {
                self.emit_return(expr.as_ref().map(|e| &**e))?;
                Ok(None)
            },
            Node::Goto(ref target) => {
                self.emit_goto(target)?;
                Ok(None)
            },
            Node::Label(ref name) => {
                self.emit_label(name)?;
                Ok(None)
            },
            Node::Block(ref statements) => {
                for statement in statements {
                    self.emit(statement)?;
                }
                Ok(None)
            },
            Node::If { ref cond, ref then, ref els } => {
                self.emit_if(cond, then, els.as_ref().map(|e| &**e))?;
                Ok(None)
            },
            Node::TaskCall { ref callee, ref args } => self.emit_call(callee, args),
            Node::TaskHeader { .. } => {
                self.emit_header(node)?;
                Ok(None)
            },
            Node::Task { ref header, ref body } => {
                self.emit_task(header, body)?;
                Ok(None)
            },
            Node::Root(_) => bug!("Root must be emitted through emit_root()"),
        }
    }

    fn emit_rvalue(&mut self, node: &Node) -> Result<(Value, IrType)> {
        match self.emit(node)? {
            Some(value) => Ok(value),
            None => semantic_error("expected a value, found a statement"),
        }
    }

    /// The address of a named variable's storage, locals first.
    fn variable_slot(&mut self, name: &str) -> Result<(Value, TypeId)> {
        if let Some(local) = self.syms.locals.get(name) {
            if let Some(ref slot) = local.slot {
                return Ok((slot.clone(), local.ty));
            }
        }

        if let Some(global) = self.syms.globals.get(name) {
            if let Some(ref cell) = global.cell {
                return Ok((Value::Global(cell.clone()), global.ty));
            }
        }

        semantic_error(format!("Unknown variable '{}' referenced", name))
    }

    /// The lvalue (address) of an assignable expression.
    pub fn emit_lvalue(&mut self, node: &Node) -> Result<(Value, TypeId)> {
        match *node {
            Node::Variable { ref name, .. } => self.variable_slot(name),
            Node::Index { ref container, ref index } => {
                let (value, _) = self.emit_index(container, index, true)?;
                let ty = self.type_of(node)?;
                Ok((value, ty))
            },
            Node::Deref(ref pointer) => {
                let (value, _) = self.emit_deref(pointer, true)?;
                let ty = self.type_of(node)?;
                Ok((value, ty))
            },
            _ => semantic_error("No lvalue available for this AST node"),
        }
    }

    fn emit_index(
        &mut self,
        container: &Node,
        index: &Node,
        lvalue: bool,
    ) -> Result<(Value, IrType)> {
        let index_ty = self.type_of(index)?;
        if !self.types.is_integer(index_ty) {
            return semantic_error("Element access must use integer index");
        }

        let container_ty = self.type_of(container)?;
        let inner = match self.types.get(container_ty) {
            Type::Array { inner, .. } => inner,
            _ => return semantic_error(format!(
                "'{}' object is not subscriptable",
                self.types.display(container_ty),
            )),
        };

        let (base, _) = self.emit_lvalue(container)?;
        let (index_value, index_ir) = self.emit_rvalue(index)?;
        let array_ir = self.types.ir_type_of(container_ty);

        let elem_ptr = self.builder.build_gep(
            &mut self.module,
            array_ir,
            base,
            index_ir,
            index_value,
        )?;

        if lvalue {
            if let Node::Variable { ref name, .. } = *container {
                let (_, is_const) = self.variable_type_and_constness(name)?;
                if is_const {
                    return semantic_error("The underlying array is constant");
                }
            }
            return Ok((elem_ptr, IrType::Ptr));
        }

        let inner_ir = self.types.ir_type_of(inner);
        let value = self.builder.build_load(&mut self.module, inner_ir.clone(), elem_ptr)?;
        Ok((value, inner_ir))
    }

    fn emit_deref(&mut self, pointer: &Node, lvalue: bool) -> Result<(Value, IrType)> {
        let pointer_ty = self.type_of(pointer)?;
        let (to, points_to_const) = match self.types.get(pointer_ty) {
            Type::Pointer { to, points_to_const } => (to, points_to_const),
            _ => return semantic_error("Cannot dereference non-pointer"),
        };

        if lvalue {
            if points_to_const {
                return semantic_error("The pointer points to constant data");
            }
            let (value, _) = self.emit_rvalue(pointer)?;
            return Ok((value, IrType::Ptr));
        }

        let (address, _) = self.emit_rvalue(pointer)?;
        let to_ir = self.types.ir_type_of(to);
        let value = self.builder.build_load(&mut self.module, to_ir.clone(), address)?;
        Ok((value, to_ir))
    }

    /// Coerces `value` from one Babel type to another, lowering to
    /// sign extension, signed-int-to-float, or float extension.
    fn implicit_cast(&mut self, value: Value, from: TypeId, to: TypeId) -> Result<Value> {
        if from == to {
            return Ok(value);
        }

        let from_ir = self.types.ir_type_of(from);
        let to_ir = self.types.ir_type_of(to);

        let op = if self.types.is_integer(from) && self.types.is_integer(to) {
            CastOp::SExt
        } else if self.types.is_integer(from) && self.types.is_float(to) {
            CastOp::SiToFp
        } else if self.types.is_float(from) && self.types.is_float(to) {
            CastOp::FpExt
        } else {
            return semantic_error("Cannot perform illegal type cast");
        };

        self.builder.build_cast(&mut self.module, op, from_ir, value, to_ir)
    }

    fn emit_binary(&mut self, op: &str, lhs: &Node, rhs: &Node) -> Result<Option<(Value, IrType)>> {
        if op == "=" {
            self.emit_assignment(lhs, rhs)?;
            return Ok(None);
        }

        let lhs_ty = self.type_of(lhs)?;
        let rhs_ty = self.type_of(rhs)?;
        let (mut left, _) = self.emit_rvalue(lhs)?;
        let (mut right, _) = self.emit_rvalue(rhs)?;

        let common = if self.types.can_coerce(lhs_ty, rhs_ty) {
            left = self.implicit_cast(left, lhs_ty, rhs_ty)?;
            rhs_ty
        } else if self.types.can_coerce(rhs_ty, lhs_ty) {
            right = self.implicit_cast(right, rhs_ty, lhs_ty)?;
            lhs_ty
        } else {
            return semantic_error(
                "Types dont match for binary operator; implicit cast failed or is not allowed"
            );
        };
        let common_ir = self.types.ir_type_of(common);

        // Real division always happens in float64, whatever the
        // operand types.
        if op == "/" {
            let left = self.widen_to_f64(left, common)?;
            let right = self.widen_to_f64(right, common)?;
            let value = self.builder.build_bin(
                &mut self.module, BinOp::FDiv, IrType::F64, left, right,
            )?;
            return Ok(Some((value, IrType::F64)));
        }

        if let Some(pred) = comparison_pred(op) {
            let value = self.builder.build_icmp(
                &mut self.module, pred, common_ir, left, right,
            )?;
            return Ok(Some((value, IrType::I1)));
        }

        let bin_op = match op {
            "+"         => BinOp::Add,
            "-"         => BinOp::Sub,
            "*"         => BinOp::Mul,
            "//"        => BinOp::SDiv,
            "%"         => BinOp::SRem,
            "<<"        => BinOp::Shl,
            ">>"        => BinOp::LShr,
            "|" | "||"  => BinOp::Or,
            "&" | "&&"  => BinOp::And,
            "^" | "^^"  => BinOp::Xor,
            _ => return semantic_error(format!("Invalid binary operator {}", op)),
        };

        let value = self.builder.build_bin(
            &mut self.module, bin_op, common_ir.clone(), left, right,
        )?;
        Ok(Some((value, common_ir)))
    }

    fn widen_to_f64(&mut self, value: Value, ty: TypeId) -> Result<Value> {
        if self.types.is_integer(ty) {
            let from_ir = self.types.ir_type_of(ty);
            return self.builder.build_cast(
                &mut self.module, CastOp::SiToFp, from_ir, value, IrType::F64,
            );
        }

        let from_ir = self.types.ir_type_of(ty);
        match from_ir {
            IrType::F16 | IrType::F32 => self.builder.build_cast(
                &mut self.module, CastOp::FpExt, from_ir, value, IrType::F64,
            ),
            _ => Ok(value),
        }
    }

    fn emit_unary(&mut self, op: &str, operand: &Node) -> Result<Option<(Value, IrType)>> {
        let (value, ir_ty) = self.emit_rvalue(operand)?;

        let result = match op {
            "!" => {
                let mask = Value::Const(Const::Int {
                    ty: ir_ty.clone(),
                    value: all_ones(&ir_ty),
                });
                self.builder.build_bin(
                    &mut self.module, BinOp::Xor, ir_ty.clone(), value, mask,
                )?
            },
            "-" => {
                let zero = Value::Const(Const::Int { ty: ir_ty.clone(), value: 0 });
                self.builder.build_bin(
                    &mut self.module, BinOp::Sub, ir_ty.clone(), zero, value,
                )?
            },
            // Unary plus is a no-op.
            "+" => value,
            _ => return semantic_error("Invalid unary operator"),
        };

        Ok(Some((result, ir_ty)))
    }

    //
    // Assignment
    //

    fn emit_assignment(&mut self, lhs: &Node, rhs: &Node) -> Result<()> {
        match *lhs {
            Node::Variable { ref name, ty, is_const, is_decl, is_comptime } => {
                let var_ty = match ty {
                    Some(ty) => ty,
                    None if is_decl => self.type_of(rhs)?,
                    None => self.variable_type(name)?,
                };
                let rhs_ty = self.type_of(rhs)?;
                self.handle_assignment(rhs, rhs_ty, var_ty, name, is_const, is_decl, is_comptime)
            },
            Node::Index { ref container, ref index } => {
                let (slot, _) = self.emit_index(container, index, true)?;
                let (value, ir_ty) = self.emit_rvalue(rhs)?;
                self.builder.build_store(&mut self.module, ir_ty, value, slot)
            },
            Node::Deref(ref pointer) => {
                let (slot, _) = self.emit_deref(pointer, true)?;
                let pointee = self.type_of(lhs)?;
                self.store_or_memcpy(rhs, slot, pointee)
            },
            _ => semantic_error("Destination of '=' must be assignable"),
        }
    }

    /// Stores the (coerced) value of `src` into `dest`, or copies it
    /// byte-wise when `src` is aggregate-typed. For aggregate
    /// variables the copy reads straight from the variable's own
    /// storage, skipping the temporary.
    fn store_or_memcpy(&mut self, src: &Node, dest: Value, dest_ty: TypeId) -> Result<()> {
        let src_ty = self.type_of(src)?;

        if let Type::Array { .. } = self.types.get(src_ty) {
            let ir_ty = self.types.ir_type_of(src_ty);
            let size = ir_ty.size_of();
            let align = ir_ty.align_of();

            let source = match *src {
                Node::Variable { .. } => self.emit_lvalue(src)?.0,
                _ => self.emit_rvalue(src)?.0,
            };

            return self.builder.build_memcpy(&mut self.module, dest, source, size, align);
        }

        let (value, _) = self.emit_rvalue(src)?;
        let value = if src_ty == dest_ty {
            value
        } else if self.types.can_coerce(src_ty, dest_ty) {
            self.implicit_cast(value, src_ty, dest_ty)?
        } else {
            return semantic_error(format!(
                "Cannot implicitly cast between {} and {}",
                self.types.display(src_ty),
                self.types.display(dest_ty),
            ));
        };

        let dest_ir = self.types.ir_type_of(dest_ty);
        self.builder.build_store(&mut self.module, dest_ir, value, dest)
    }

    fn handle_assignment(
        &mut self,
        rhs: &Node,
        rhs_ty: TypeId,
        var_ty: TypeId,
        name: &str,
        is_const: bool,
        is_decl: bool,
        is_comptime: bool,
    ) -> Result<()> {
        if self.in_global_scope() {
            return self.handle_global_assignment(
                rhs, rhs_ty, var_ty, name, is_const, is_decl, is_comptime,
            );
        }

        // Local scope. Assignment to a materialized global still
        // works from here; re-declaring its name does not, since all
        // locals of a task share one table.
        let local_slot = self.syms.locals.get(name).and_then(|l| l.slot.clone());

        match local_slot {
            None => {
                if let Some(global) = self.syms.globals.get(name).cloned() {
                    if let Some(cell) = global.cell {
                        if is_decl {
                            return semantic_error(format!(
                                "Redefinition of global variable '{}'", name
                            ));
                        }
                        if global.is_const {
                            return semantic_error(format!(
                                "Cannot assign to constant '{}'", name
                            ));
                        }
                        return self.store_or_memcpy(rhs, Value::Global(cell), global.ty);
                    }
                }

                if !is_decl {
                    return semantic_error(format!("Variable '{}' was never declared", name));
                }

                let ir_ty = self.types.ir_type_of(var_ty);
                let slot = self.builder.build_entry_alloca(&mut self.module, ir_ty)?;
                self.syms.locals.insert(name.to_owned(), LocalSymbol {
                    slot: Some(slot.clone()),
                    ty: var_ty,
                    is_const,
                });
                self.store_or_memcpy(rhs, slot, var_ty)
            },
            Some(slot) => {
                if is_decl {
                    return semantic_error(format!(
                        "Redefinition of local variable '{}'", name
                    ));
                }

                let local = self.syms.locals[name].clone();
                if local.is_const {
                    return semantic_error(format!("Cannot assign to constant '{}'", name));
                }

                self.store_or_memcpy(rhs, slot, local.ty)
            },
        }
    }

    fn handle_global_assignment(
        &mut self,
        rhs: &Node,
        rhs_ty: TypeId,
        var_ty: TypeId,
        name: &str,
        is_const: bool,
        is_decl: bool,
        is_comptime: bool,
    ) -> Result<()> {
        let materialized = self.syms.globals.get(name).and_then(|g| g.cell.clone());

        if let Some(cell) = materialized {
            if is_decl {
                return semantic_error(format!("Redefinition of global variable '{}'", name));
            }

            let existing = self.syms.globals[name].clone();
            if existing.is_const {
                return semantic_error(format!("Cannot assign to constant '{}'", name));
            }

            return self.store_or_memcpy(rhs, Value::Global(cell), existing.ty);
        }

        if !is_decl {
            return semantic_error(format!("Variable '{}' used before declaration", name));
        }

        let ir_ty = self.types.ir_type_of(var_ty);

        let init = if is_comptime {
            let constant = self.emit_const(rhs)?;
            self.coerce_const(constant, rhs_ty, var_ty)?
        } else {
            Const::Zero(ir_ty.clone())
        };

        self.module.add_global(ir::Global {
            name: name.to_owned(),
            ty: ir_ty,
            is_const,
            internal: false,
            init: init.clone(),
        });

        if !is_comptime {
            self.store_or_memcpy(rhs, Value::Global(name.to_owned()), var_ty)?;
        }

        self.syms.globals.insert(name.to_owned(), GlobalSymbol {
            cell: Some(name.to_owned()),
            ty: var_ty,
            is_const,
            is_comptime,
            comptime_init: if is_comptime { Some(init) } else { None },
        });

        Ok(())
    }

    //
    // Statements and control flow
    //

    fn emit_return(&mut self, expr: Option<&Node>) -> Result<()> {
        if self.in_global_scope() {
            return semantic_error("Return statements must be inside of a task");
        }

        let func = match self.builder.current_function() {
            Some(func) => func,
            None => bug!("return emitted outside of any function"),
        };
        let task_name = self.module.functions[func].name.clone();
        let ret_ty = match self.syms.tasks.get(&task_name) {
            Some(info) => info.ret,
            None => bug!("no task signature registered for '{}'", task_name),
        };

        match expr {
            Some(expr) => {
                let expr_ty = self.type_of(expr)?;
                let (mut value, _) = self.emit_rvalue(expr)?;
                if self.types.can_coerce(expr_ty, ret_ty) {
                    value = self.implicit_cast(value, expr_ty, ret_ty)?;
                }
                let ret_ir = self.types.ir_type_of(ret_ty);
                self.builder.build_ret(&mut self.module, Some((ret_ir, value)))?;
            },
            None => {
                self.builder.build_ret(&mut self.module, None)?;
            },
        }

        // Anything emitted after the return on this path is dead, but
        // it still needs a well-formed block to land in.
        self.open_continuation_block("after_return")
    }

    fn emit_goto(&mut self, target: &str) -> Result<()> {
        let func = match self.builder.current_function() {
            Some(func) => func,
            None => bug!("goto emitted outside of any function"),
        };

        let block = match self.syms.labels.get(target) {
            Some(&block) => block,
            None => {
                let block = self.module.functions[func].add_block(target);
                self.syms.labels.insert(target.to_owned(), block);
                block
            },
        };

        self.builder.build_br(&mut self.module, block)?;
        self.open_continuation_block("after_goto")
    }

    fn emit_label(&mut self, name: &str) -> Result<()> {
        let func = match self.builder.current_function() {
            Some(func) => func,
            None => bug!("label emitted outside of any function"),
        };

        let block = match self.syms.labels.get(name) {
            None => {
                let block = self.module.functions[func].add_block(name);
                self.module.functions[func].attach_block(block)?;
                self.syms.labels.insert(name.to_owned(), block);
                block
            },
            Some(&block) => {
                // Created ahead of time by a goto: place it now.
                if self.module.functions[func].blocks[block].attached {
                    return semantic_error(format!(
                        "Label '{}' was possibly inserted twice", name
                    ));
                }
                self.module.functions[func].attach_block(block)?;
                block
            },
        };

        self.builder.build_br(&mut self.module, block)?;
        self.builder.set_insert_point(func, block);
        Ok(())
    }

    fn emit_if(&mut self, cond: &Node, then: &Node, els: Option<&Node>) -> Result<()> {
        let (cond_value, cond_ty) = self.emit_rvalue(cond)?;

        if cond_ty != IrType::I1 {
            return semantic_error(
                "Condition of if statement does not meet requirement: Boolean Type"
            );
        }

        let func = match self.builder.current_function() {
            Some(func) => func,
            None => bug!("if emitted outside of any function"),
        };

        let then_block = self.module.functions[func].add_block("then");
        let else_block = self.module.functions[func].add_block("else");
        let merge_block = self.module.functions[func].add_block("ifcont");

        self.module.functions[func].attach_block(then_block)?;
        self.builder.build_cond_br(&mut self.module, cond_value, then_block, else_block)?;

        self.builder.set_insert_point(func, then_block);
        self.emit(then)?;
        self.builder.build_br(&mut self.module, merge_block)?;

        self.module.functions[func].attach_block(else_block)?;
        self.builder.set_insert_point(func, else_block);
        if let Some(els) = els {
            self.emit(els)?;
        }
        self.builder.build_br(&mut self.module, merge_block)?;

        self.module.functions[func].attach_block(merge_block)?;
        self.builder.set_insert_point(func, merge_block);
        Ok(())
    }

    fn emit_call(&mut self, callee: &str, args: &[Node]) -> Result<Option<(Value, IrType)>> {
        if callee == "main" {
            return semantic_error(
                "Calling main is not allowed, as the programs entry point it is invoked automatically"
            );
        }

        let name = self.resolve_task_name(callee, args)?;

        let info = match self.syms.tasks.get(&name) {
            Some(info) => info.clone(),
            None => return semantic_error(format!("Unknown Task '{}' referenced", callee)),
        };

        if self.module.function(&name).is_none() {
            return semantic_error(format!("Unknown Task '{}' referenced", name));
        }

        if info.args.len() != args.len() {
            return semantic_error(format!(
                "Passed incorrect number of arguments (expected {} but got {})",
                info.args.len(),
                args.len(),
            ));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (arg, &param_ty) in args.iter().zip(&info.args) {
            let arg_ty = self.type_of(arg)?;
            let (mut value, mut ir_ty) = self.emit_rvalue(arg)?;
            if arg_ty != param_ty && self.types.can_coerce(arg_ty, param_ty) {
                value = self.implicit_cast(value, arg_ty, param_ty)?;
                ir_ty = self.types.ir_type_of(param_ty);
            }
            lowered.push((ir_ty, value));
        }

        let ret_ir = self.types.ir_type_of(info.ret);
        let result = self.builder.build_call(&mut self.module, &name, ret_ir.clone(), lowered)?;

        Ok(result.map(|value| (value, ret_ir)))
    }

    //
    // Tasks
    //

    /// Applies polymorphic renaming to a header, returning the
    /// canonical (possibly mangled) task name. Re-running on an
    /// already mangled name is a no-op.
    fn updated_task_name(&mut self, header: &Node) -> Result<String> {
        let (name, arg_types, ret) = match *header {
            Node::TaskHeader { ref name, ref arg_types, ret, .. } => {
                (name.clone(), arg_types.clone(), ret)
            },
            _ => bug!("task header expected"),
        };

        if !self.syms.is_polymorphic(&name) {
            return Ok(name);
        }

        let type_names: Vec<String> =
            arg_types.iter().map(|&ty| self.types.display(ty)).collect();
        let mangled = symbols::polymorphic_name(&name, &type_names);

        self.syms.rename_task(&name, &mangled, TaskInfo { args: arg_types, ret });
        Ok(mangled)
    }

    /// Emits a task header as an external declaration with named
    /// parameters.
    fn emit_header(&mut self, header: &Node) -> Result<usize> {
        let name = self.updated_task_name(header)?;

        let (args, arg_types, ret) = match *header {
            Node::TaskHeader { ref args, ref arg_types, ret, .. } => (args, arg_types, ret),
            _ => bug!("task header expected"),
        };

        let params: Vec<(String, IrType)> = args
            .iter()
            .zip(arg_types)
            .map(|(name, &ty)| (name.clone(), self.types.ir_type_of(ty)))
            .collect();
        let ret_ir = self.types.ir_type_of(ret);

        let function = ir::Function::declaration(name, params, ret_ir);
        Ok(self.module.add_function(function))
    }

    /// Emits a task definition: entry block, one stack slot per
    /// parameter, the body, and an implicit `ret void` where the
    /// return type allows a fall-through exit.
    fn emit_task(&mut self, header: &Node, body: &Node) -> Result<()> {
        let name = self.updated_task_name(header)?;

        let (arg_names, arg_types, ret) = match *header {
            Node::TaskHeader { ref args, ref arg_types, ret, .. } => {
                (args.clone(), arg_types.clone(), ret)
            },
            _ => bug!("task header expected"),
        };

        let func = match self.module.function_index(&name) {
            Some(func) => {
                if !self.module.functions[func].is_empty() {
                    return semantic_error("Task cannot be redefined");
                }
                self.module.functions[func].is_declaration = false;
                func
            },
            None => {
                let params: Vec<(String, IrType)> = arg_names
                    .iter()
                    .zip(&arg_types)
                    .map(|(param, &ty)| (param.clone(), self.types.ir_type_of(ty)))
                    .collect();
                let ret_ir = self.types.ir_type_of(ret);
                self.module.add_function(ir::Function::new(&name, params, ret_ir, false))
            },
        };

        let saved_ip = self.builder.save_ip();
        let saved_labels = ::std::mem::replace(&mut self.syms.labels, Default::default());

        let entry = self.module.functions[func].add_block("entry");
        self.module.functions[func].attach_block(entry)?;
        self.builder.set_insert_point(func, entry);

        self.syms.clear_locals();
        for (position, (param, &ty)) in arg_names.iter().zip(&arg_types).enumerate() {
            let ir_ty = self.types.ir_type_of(ty);
            let slot = self.builder.build_entry_alloca(&mut self.module, ir_ty.clone())?;
            self.builder.build_store(
                &mut self.module, ir_ty, Value::Arg(position), slot.clone(),
            )?;
            self.syms.locals.insert(param.clone(), LocalSymbol {
                slot: Some(slot),
                ty,
                is_const: false,
            });
        }

        self.emit(body)?;
        self.terminate_current_block(ret)?;
        self.check_placed_labels(func)?;

        self.module.functions[func].verify()?;

        self.syms.labels = saved_labels;
        self.builder.restore_ip(saved_ip);
        Ok(())
    }

    fn terminate_current_block(&mut self, ret: TypeId) -> Result<()> {
        if self.builder.terminated(&self.module) {
            return Ok(());
        }

        let ret_ir = self.types.ir_type_of(ret);
        if ret_ir.is_void() {
            self.builder.build_ret(&mut self.module, None)
        } else {
            // Fall-through exit of a non-void task: the path is
            // unreachable by contract.
            self.builder.build_unreachable(&mut self.module)
        }
    }

    fn check_placed_labels(&self, func: usize) -> Result<()> {
        for (name, &block) in &self.syms.labels {
            if !self.module.functions[func].blocks[block].attached {
                return semantic_error(format!(
                    "Goto target '{}' was never labeled", name
                ));
            }
        }
        Ok(())
    }

    fn open_continuation_block(&mut self, name: &str) -> Result<()> {
        let func = match self.builder.current_function() {
            Some(func) => func,
            None => bug!("no function to continue in"),
        };

        let block = self.module.functions[func].add_block(name);
        self.module.functions[func].attach_block(block)?;
        self.builder.set_insert_point(func, block);
        Ok(())
    }

    //
    // Entry-point synthesis
    //

    /// Emits the whole program. Wraps top-level code into an internal
    /// `__global_main()`, synthesizes the real `main(argc, argv,
    /// envp)`, renames a user-defined `main` to `user.main` and calls
    /// it after top-level emission. Every emitted function is
    /// verified.
    pub fn emit_root(&mut self, root: &Node) -> Result<()> {
        let top_level = match *root {
            Node::Root(ref nodes) => nodes,
            _ => bug!("emit_root() requires a Root node"),
        };

        // The process-argument cells must exist before top-level code
        // runs, so that user code can reference them; the stores into
        // them happen at the entry of the real main, created below.
        self.register_process_globals();

        let global_main = self.module.add_function(
            ir::Function::new(GLOBAL_MAIN, vec![], IrType::I32, true)
        );
        let global_entry = self.module.functions[global_main].add_block("entry");
        self.module.functions[global_main].attach_block(global_entry)?;
        self.builder.set_insert_point(global_main, global_entry);

        for node in top_level {
            self.emit(node)?;
        }

        self.check_placed_labels(global_main)?;

        // A user-defined main materialized during top-level emission;
        // it cedes its name to the real entry point.
        if let Some(user_main) = self.module.function_index("main") {
            self.module.functions[user_main].name = "user.main".to_owned();
        }

        match self.module.function("user.main").map(|f| (f.ret.clone(), f.name.clone())) {
            Some((ret, name)) => {
                if ret.is_void() {
                    self.builder.build_call(&mut self.module, &name, IrType::Void, vec![])?;
                    self.build_ret_i32_zero()?;
                } else if ret == IrType::I32 {
                    let result = self.builder.build_call(
                        &mut self.module, &name, IrType::I32, vec![],
                    )?;
                    let result = match result {
                        Some(result) => result,
                        None => bug!("non-void call to user.main produced no value"),
                    };
                    self.builder.build_ret(&mut self.module, Some((IrType::I32, result)))?;
                } else {
                    return semantic_error("main method must return integer or void type");
                }
            },
            None => self.build_ret_i32_zero()?,
        }

        // The real entry point: capture the process arguments, run
        // the top-level wrapper and forward its result.
        let main_params = vec![
            ("argc".to_owned(), IrType::I32),
            ("argv".to_owned(), IrType::Ptr),
            ("envp".to_owned(), IrType::Ptr),
        ];
        let main = self.module.add_function(
            ir::Function::new("main", main_params, IrType::I32, false)
        );
        let main_entry = self.module.functions[main].add_block("entry");
        self.module.functions[main].attach_block(main_entry)?;
        self.builder.set_insert_point(main, main_entry);

        self.store_process_globals()?;

        let result = self.builder.build_call(
            &mut self.module, GLOBAL_MAIN, IrType::I32, vec![],
        )?;
        let result = match result {
            Some(result) => result,
            None => bug!("call to __global_main produced no value"),
        };
        self.builder.build_ret(&mut self.module, Some((IrType::I32, result)))?;

        self.module.verify()
    }

    fn build_ret_i32_zero(&mut self) -> Result<()> {
        let zero = Value::Const(Const::Int { ty: IrType::I32, value: 0 });
        self.builder.build_ret(&mut self.module, Some((IrType::I32, zero)))
    }

    fn register_process_globals(&mut self) {
        let cells = [
            ("__argc__", IrType::I32, Const::Int { ty: IrType::I32, value: 0 }),
            ("__argv__", IrType::Ptr, Const::Null),
            ("__envp__", IrType::Ptr, Const::Null),
        ];

        for &(name, ref ty, ref init) in &cells {
            self.module.add_global(ir::Global {
                name: name.to_owned(),
                ty: ty.clone(),
                is_const: false,
                internal: false,
                init: init.clone(),
            });
        }

        let int = self.types.int();
        let cstring = self.types.basic(BasicType::CString);

        for &(name, babel_ty) in &[
            ("__argc__", int),
            ("__argv__", cstring),
            ("__envp__", cstring),
        ] {
            self.syms.globals.insert(name.to_owned(), GlobalSymbol {
                cell: Some(name.to_owned()),
                ty: babel_ty,
                is_const: false,
                is_comptime: false,
                comptime_init: None,
            });
        }
    }

    fn store_process_globals(&mut self) -> Result<()> {
        let cells = [
            ("__argc__", IrType::I32),
            ("__argv__", IrType::Ptr),
            ("__envp__", IrType::Ptr),
        ];

        for (position, &(name, ref ty)) in cells.iter().enumerate() {
            self.builder.build_store(
                &mut self.module,
                ty.clone(),
                Value::Arg(position),
                Value::Global(name.to_owned()),
            )?;
        }

        Ok(())
    }
}

fn comparison_pred(op: &str) -> Option<Pred> {
    match op {
        "==" => Some(Pred::Eq),
        "!=" => Some(Pred::Ne),
        "<=" => Some(Pred::Sle),
        ">=" => Some(Pred::Sge),
        "<"  => Some(Pred::Slt),
        ">"  => Some(Pred::Sgt),
        _    => None,
    }
}

fn bit_width(ty: &IrType) -> u32 {
    match *ty {
        IrType::I1 => 1,
        IrType::I8 => 8,
        IrType::I16 => 16,
        IrType::I32 => 32,
        IrType::I64 => 64,
        _ => 128,
    }
}

fn all_ones(ty: &IrType) -> u128 {
    let width = bit_width(ty);
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

fn mask_to_width(value: u128, ty: &IrType) -> u128 {
    value & all_ones(ty)
}
