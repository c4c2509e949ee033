//
// ir.rs
// The Babel Compiler
//

//! The typed SSA intermediate representation that Babel programs are
//! lowered to. A `Module` holds globals, a C-string pool and
//! functions; functions hold basic blocks of instructions. Blocks are
//! created detached and attached explicitly, which is what the
//! goto/label protocol of the code generator builds on. The textual
//! form printed by `Display` is LLVM-flavored, with opaque pointers.

use std::fmt::{ self, Display, Formatter, Write as FmtWrite };
use error::Result;


/// The IR-level types. Arrays keep their shape; all pointers are the
/// single opaque `ptr` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    F16,
    F32,
    F64,
    F128,
    Ptr,
    Void,
    /// `[size x elem]`
    Array(Box<IrType>, usize),
}

impl IrType {
    /// The data-layout store size of a value of this type, in bytes.
    pub fn size_of(&self) -> u64 {
        match *self {
            IrType::I1 | IrType::I8 => 1,
            IrType::I16 | IrType::F16 => 2,
            IrType::I32 | IrType::F32 => 4,
            IrType::I64 | IrType::F64 | IrType::Ptr => 8,
            IrType::I128 | IrType::F128 => 16,
            IrType::Void => 0,
            IrType::Array(ref elem, size) => elem.size_of() * size as u64,
        }
    }

    /// The ABI alignment of this type, in bytes.
    pub fn align_of(&self) -> u64 {
        match *self {
            IrType::Array(ref elem, _) => elem.align_of(),
            IrType::Void => 1,
            _ => self.size_of(),
        }
    }

    /// Answers whether this is the void type.
    pub fn is_void(&self) -> bool {
        *self == IrType::Void
    }
}

impl Display for IrType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            IrType::I1   => f.write_str("i1"),
            IrType::I8   => f.write_str("i8"),
            IrType::I16  => f.write_str("i16"),
            IrType::I32  => f.write_str("i32"),
            IrType::I64  => f.write_str("i64"),
            IrType::I128 => f.write_str("i128"),
            IrType::F16  => f.write_str("half"),
            IrType::F32  => f.write_str("float"),
            IrType::F64  => f.write_str("double"),
            IrType::F128 => f.write_str("fp128"),
            IrType::Ptr  => f.write_str("ptr"),
            IrType::Void => f.write_str("void"),
            IrType::Array(ref elem, size) => write!(f, "[{} x {}]", size, elem),
        }
    }
}

/// A compile-time constant.
#[derive(Debug, Clone)]
pub enum Const {
    /// An integer (or boolean, or character) constant.
    Int {
        /// The integer type.
        ty: IrType,
        /// The bits of the value, zero-extended.
        value: u128,
    },
    /// A floating-point constant.
    Float {
        /// The float type.
        ty: IrType,
        /// The value, held in the widest carrier the front-end uses.
        value: f64,
    },
    /// The null pointer.
    Null,
    /// The zero initializer of an arbitrary type.
    Zero(IrType),
    /// A handle into the module's C-string pool.
    Str(usize),
    /// A constant aggregate.
    Array {
        /// Element type.
        elem: IrType,
        /// Element constants.
        elems: Vec<Const>,
    },
    /// The address of a global cell.
    GlobalAddr(String),
}

impl Const {
    /// The IR type of the constant.
    pub fn ty(&self) -> IrType {
        match *self {
            Const::Int { ref ty, .. } => ty.clone(),
            Const::Float { ref ty, .. } => ty.clone(),
            Const::Null | Const::Str(_) | Const::GlobalAddr(_) => IrType::Ptr,
            Const::Zero(ref ty) => ty.clone(),
            Const::Array { ref elem, ref elems } => {
                IrType::Array(Box::new(elem.clone()), elems.len())
            },
        }
    }

    fn render(&self) -> String {
        match *self {
            Const::Int { ref ty, value } => {
                // Print within the type's width, two's complement.
                let width = match *ty {
                    IrType::I1 => return format!("{}", value & 1),
                    IrType::I8 => 8,
                    IrType::I16 => 16,
                    IrType::I32 => 32,
                    IrType::I64 => 64,
                    _ => 128,
                };
                if width < 128 && (value >> (width - 1)) & 1 == 1 {
                    let extended = value | !((1u128 << width) - 1);
                    format!("{}", extended as i128)
                } else {
                    format!("{}", value as i128)
                }
            },
            Const::Float { value, .. } => format!("{:e}", value),
            Const::Null => "null".to_owned(),
            Const::Zero(_) => "zeroinitializer".to_owned(),
            Const::Str(index) => format!("@.cstr.{}", index),
            Const::GlobalAddr(ref name) => format!("@{}", name),
            Const::Array { ref elem, ref elems } => {
                let rendered: Vec<String> = elems
                    .iter()
                    .map(|c| format!("{} {}", elem, c.render()))
                    .collect();
                format!("[{}]", rendered.join(", "))
            },
        }
    }
}

/// An SSA value: a constant, a virtual register, or a global address.
#[derive(Debug, Clone)]
pub enum Value {
    /// An inline constant.
    Const(Const),
    /// The result of the instruction that defined register `N`.
    Reg(usize),
    /// The `N`th parameter of the containing function.
    Arg(usize),
    /// The address of a global.
    Global(String),
}

impl Value {
    fn render(&self, function: &Function) -> String {
        match *self {
            Value::Const(ref constant) => constant.render(),
            Value::Reg(index) => format!("%{}", index),
            Value::Arg(index) => format!("%{}", function.params[index].0),
            Value::Global(ref name) => format!("@{}", name),
        }
    }
}

/// Integer and float binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FDiv,
    Shl,
    LShr,
    Or,
    And,
    Xor,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match *self {
            BinOp::Add  => "add",
            BinOp::Sub  => "sub",
            BinOp::Mul  => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::SRem => "srem",
            BinOp::FDiv => "fdiv",
            BinOp::Shl  => "shl",
            BinOp::LShr => "lshr",
            BinOp::Or   => "or",
            BinOp::And  => "and",
            BinOp::Xor  => "xor",
        };
        f.write_str(name)
    }
}

/// Signed integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pred {
    Eq,
    Ne,
    Sle,
    Sge,
    Slt,
    Sgt,
}

impl Display for Pred {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match *self {
            Pred::Eq  => "eq",
            Pred::Ne  => "ne",
            Pred::Sle => "sle",
            Pred::Sge => "sge",
            Pred::Slt => "slt",
            Pred::Sgt => "sgt",
        };
        f.write_str(name)
    }
}

/// Value coercion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Integer sign extension.
    SExt,
    /// Signed integer to float.
    SiToFp,
    /// Float extension.
    FpExt,
}

impl Display for CastOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match *self {
            CastOp::SExt   => "sext",
            CastOp::SiToFp => "sitofp",
            CastOp::FpExt  => "fpext",
        };
        f.write_str(name)
    }
}

/// A single IR instruction.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Instr {
    Alloca { dst: usize, ty: IrType },
    Load { dst: usize, ty: IrType, ptr: Value },
    Store { ty: IrType, val: Value, ptr: Value },
    Gep { dst: usize, ty: IrType, ptr: Value, index_ty: IrType, index: Value },
    MemCpy { dst: Value, src: Value, size: u64, align: u64 },
    Bin { dst: usize, op: BinOp, ty: IrType, lhs: Value, rhs: Value },
    Cast { dst: usize, op: CastOp, from: IrType, val: Value, to: IrType },
    Icmp { dst: usize, pred: Pred, ty: IrType, lhs: Value, rhs: Value },
    Br { target: usize },
    CondBr { cond: Value, then_block: usize, else_block: usize },
    Ret { val: Option<(IrType, Value)> },
    Call { dst: Option<usize>, callee: String, ret: IrType, args: Vec<(IrType, Value)> },
    Unreachable,
}

impl Instr {
    /// Answers whether the instruction ends a basic block.
    pub fn is_terminator(&self) -> bool {
        match *self {
            Instr::Br { .. }
            | Instr::CondBr { .. }
            | Instr::Ret { .. }
            | Instr::Unreachable => true,
            _ => false,
        }
    }
}

/// A basic block. Blocks come into existence detached; attaching them
/// fixes their position in the function's layout.
#[derive(Debug, Clone)]
pub struct Block {
    /// Display name; made unique in the printed form by suffixing the
    /// block index.
    pub name: String,
    /// The instructions, terminator last.
    pub instrs: Vec<Instr>,
    /// Whether the block has been attached to the function layout.
    pub attached: bool,
}

/// A function of the module: a signature plus, unless it is only a
/// declaration, a list of basic blocks.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function's name.
    pub name: String,
    /// Parameter names and types.
    pub params: Vec<(String, IrType)>,
    /// The return type.
    pub ret: IrType,
    /// Whether the function has internal linkage.
    pub internal: bool,
    /// Whether this is a body-less external declaration.
    pub is_declaration: bool,
    /// All blocks ever created for this function, attached or not.
    pub blocks: Vec<Block>,
    /// Attachment order of the blocks.
    pub order: Vec<usize>,
    next_reg: usize,
}

impl Function {
    /// Makes an empty function with the given signature.
    pub fn new<S: Into<String>>(
        name: S,
        params: Vec<(String, IrType)>,
        ret: IrType,
        internal: bool,
    ) -> Function {
        Function {
            name: name.into(),
            params,
            ret,
            internal,
            is_declaration: false,
            blocks: Vec::new(),
            order: Vec::new(),
            next_reg: 0,
        }
    }

    /// Makes a body-less declaration with external linkage.
    pub fn declaration<S: Into<String>>(
        name: S,
        params: Vec<(String, IrType)>,
        ret: IrType,
    ) -> Function {
        Function {
            is_declaration: true,
            ..Function::new(name, params, ret, false)
        }
    }

    /// Creates a new, detached block. Returns its index.
    pub fn add_block<S: Into<String>>(&mut self, name: S) -> usize {
        let index = self.blocks.len();
        self.blocks.push(Block {
            name: name.into(),
            instrs: Vec::new(),
            attached: false,
        });
        index
    }

    /// Appends the block to the function layout. Attaching twice is a
    /// caller bug.
    pub fn attach_block(&mut self, block: usize) -> Result<()> {
        if self.blocks[block].attached {
            bug!("block '{}' of '{}' attached twice", self.blocks[block].name, self.name);
        }

        self.blocks[block].attached = true;
        self.order.push(block);
        Ok(())
    }

    /// Answers whether the function has any emitted body blocks.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Allocates a fresh virtual register index.
    pub fn fresh_reg(&mut self) -> usize {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    /// Answers whether the given block already ends in a terminator.
    pub fn block_terminated(&self, block: usize) -> bool {
        self.blocks[block]
            .instrs
            .last()
            .map_or(false, Instr::is_terminator)
    }

    /// Verifies the structural invariants of the function: an entry
    /// block exists, every attached block ends in exactly one
    /// terminator, no instruction follows a terminator, no detached
    /// block carries code, and every branch targets an attached block.
    pub fn verify(&self) -> Result<()> {
        if self.is_declaration {
            return Ok(());
        }

        if self.order.is_empty() {
            bug!("function '{}' has no entry block", self.name);
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if !block.attached {
                if !block.instrs.is_empty() {
                    bug!(
                        "detached block '{}' of '{}' contains instructions",
                        block.name, self.name
                    );
                }
                continue;
            }

            match block.instrs.last() {
                Some(last) if last.is_terminator() => {},
                _ => bug!(
                    "block '{}.{}' of '{}' does not end in a terminator",
                    block.name, index, self.name
                ),
            }

            for instr in &block.instrs[..block.instrs.len() - 1] {
                if instr.is_terminator() {
                    bug!(
                        "block '{}.{}' of '{}' has a terminator in mid-block",
                        block.name, index, self.name
                    );
                }
            }

            for instr in &block.instrs {
                let targets: Vec<usize> = match *instr {
                    Instr::Br { target } => vec![target],
                    Instr::CondBr { then_block, else_block, .. } => {
                        vec![then_block, else_block]
                    },
                    _ => continue,
                };

                for target in targets {
                    if !self.blocks[target].attached {
                        bug!(
                            "branch in '{}' targets detached block '{}'",
                            self.name, self.blocks[target].name
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// A global cell of the module.
#[derive(Debug, Clone)]
pub struct Global {
    /// The cell's name.
    pub name: String,
    /// The stored type.
    pub ty: IrType,
    /// Whether the cell is read-only.
    pub is_const: bool,
    /// Whether the cell has internal linkage.
    pub internal: bool,
    /// The static initializer.
    pub init: Const,
}

/// A whole compilation unit of IR.
#[derive(Debug, Default)]
pub struct Module {
    /// The module's name, usually the source file stem.
    pub name: String,
    /// Global cells, in emission order.
    pub globals: Vec<Global>,
    /// The C-string pool referenced by `Const::Str`.
    pub cstrings: Vec<String>,
    /// The functions, declarations included.
    pub functions: Vec<Function>,
}

impl Module {
    /// Makes an empty module.
    pub fn new<S: Into<String>>(name: S) -> Module {
        Module {
            name: name.into(),
            ..Module::default()
        }
    }

    /// Adds a function and returns its index.
    pub fn add_function(&mut self, function: Function) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    /// The index of the function with the given name, if any.
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }

    /// The function with the given name, if any.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Adds a global cell.
    pub fn add_global(&mut self, global: Global) {
        self.globals.push(global);
    }

    /// The global cell with the given name, if any.
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Interns a C-string into the pool, deduplicating exact repeats.
    pub fn intern_cstring(&mut self, value: &str) -> usize {
        if let Some(index) = self.cstrings.iter().position(|s| s == value) {
            return index;
        }

        self.cstrings.push(value.to_owned());
        self.cstrings.len() - 1
    }

    /// Verifies every function of the module.
    pub fn verify(&self) -> Result<()> {
        for function in &self.functions {
            function.verify()?;
        }

        Ok(())
    }
}

/// The builder tracks a single insertion point into a module. Task
/// body emission saves and restores it, which makes the insertion
/// point a stack of depth one, exactly like the emission model of the
/// code generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Builder {
    point: InsertPoint,
}

/// A saved insertion point.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertPoint {
    func: Option<usize>,
    block: Option<usize>,
}

impl Builder {
    /// Makes a builder with no insertion point.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Saves the current insertion point.
    pub fn save_ip(&self) -> InsertPoint {
        self.point
    }

    /// Restores a previously saved insertion point.
    pub fn restore_ip(&mut self, point: InsertPoint) {
        self.point = point;
    }

    /// Moves the insertion point to the end of `block` in `func`.
    pub fn set_insert_point(&mut self, func: usize, block: usize) {
        self.point = InsertPoint {
            func: Some(func),
            block: Some(block),
        };
    }

    /// The current function index, if any.
    pub fn current_function(&self) -> Option<usize> {
        self.point.func
    }

    /// The current block index, if any.
    pub fn current_block(&self) -> Option<usize> {
        self.point.block
    }

    fn insert_at(&self) -> Result<(usize, usize)> {
        match (self.point.func, self.point.block) {
            (Some(func), Some(block)) => Ok((func, block)),
            _ => bug!("IR emission without an insertion point"),
        }
    }

    fn push(&self, module: &mut Module, instr: Instr) -> Result<()> {
        let (func, block) = self.insert_at()?;
        module.functions[func].blocks[block].instrs.push(instr);
        Ok(())
    }

    fn fresh_reg(&self, module: &mut Module) -> Result<usize> {
        let (func, _) = self.insert_at()?;
        Ok(module.functions[func].fresh_reg())
    }

    /// Answers whether the current block already has a terminator.
    pub fn terminated(&self, module: &Module) -> bool {
        match (self.point.func, self.point.block) {
            (Some(func), Some(block)) => module.functions[func].block_terminated(block),
            _ => false,
        }
    }

    /// Emits an `alloca` into the entry block of the current function,
    /// before any non-alloca instruction, and returns the slot value.
    pub fn build_entry_alloca(&self, module: &mut Module, ty: IrType) -> Result<Value> {
        let (func, _) = self.insert_at()?;
        let dst = module.functions[func].fresh_reg();
        let function = &mut module.functions[func];
        let entry = match function.order.first() {
            Some(&entry) => entry,
            None => bug!("entry alloca emitted into a body-less function"),
        };

        let block = &mut function.blocks[entry];
        let position = block
            .instrs
            .iter()
            .position(|instr| match *instr {
                Instr::Alloca { .. } => false,
                _ => true,
            })
            .unwrap_or(block.instrs.len());
        block.instrs.insert(position, Instr::Alloca { dst, ty });

        Ok(Value::Reg(dst))
    }

    /// Emits a typed load.
    pub fn build_load(&self, module: &mut Module, ty: IrType, ptr: Value) -> Result<Value> {
        let dst = self.fresh_reg(module)?;
        self.push(module, Instr::Load { dst, ty, ptr })?;
        Ok(Value::Reg(dst))
    }

    /// Emits a store.
    pub fn build_store(&self, module: &mut Module, ty: IrType, val: Value, ptr: Value) -> Result<()> {
        self.push(module, Instr::Store { ty, val, ptr })
    }

    /// Emits an inbounds GEP over `[0, index]`, the element-pointer
    /// shape of array subscripts.
    pub fn build_gep(
        &self,
        module: &mut Module,
        ty: IrType,
        ptr: Value,
        index_ty: IrType,
        index: Value,
    ) -> Result<Value> {
        let dst = self.fresh_reg(module)?;
        self.push(module, Instr::Gep { dst, ty, ptr, index_ty, index })?;
        Ok(Value::Reg(dst))
    }

    /// Emits a memcpy of `size` bytes.
    pub fn build_memcpy(
        &self,
        module: &mut Module,
        dst: Value,
        src: Value,
        size: u64,
        align: u64,
    ) -> Result<()> {
        self.push(module, Instr::MemCpy { dst, src, size, align })
    }

    /// Emits a binary operation.
    pub fn build_bin(
        &self,
        module: &mut Module,
        op: BinOp,
        ty: IrType,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        let dst = self.fresh_reg(module)?;
        self.push(module, Instr::Bin { dst, op, ty, lhs, rhs })?;
        Ok(Value::Reg(dst))
    }

    /// Emits a value coercion.
    pub fn build_cast(
        &self,
        module: &mut Module,
        op: CastOp,
        from: IrType,
        val: Value,
        to: IrType,
    ) -> Result<Value> {
        let dst = self.fresh_reg(module)?;
        self.push(module, Instr::Cast { dst, op, from, val, to })?;
        Ok(Value::Reg(dst))
    }

    /// Emits a signed integer comparison.
    pub fn build_icmp(
        &self,
        module: &mut Module,
        pred: Pred,
        ty: IrType,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        let dst = self.fresh_reg(module)?;
        self.push(module, Instr::Icmp { dst, pred, ty, lhs, rhs })?;
        Ok(Value::Reg(dst))
    }

    /// Emits an unconditional branch.
    pub fn build_br(&self, module: &mut Module, target: usize) -> Result<()> {
        self.push(module, Instr::Br { target })
    }

    /// Emits a conditional branch.
    pub fn build_cond_br(
        &self,
        module: &mut Module,
        cond: Value,
        then_block: usize,
        else_block: usize,
    ) -> Result<()> {
        self.push(module, Instr::CondBr { cond, then_block, else_block })
    }

    /// Emits a return.
    pub fn build_ret(&self, module: &mut Module, val: Option<(IrType, Value)>) -> Result<()> {
        self.push(module, Instr::Ret { val })
    }

    /// Emits an `unreachable` terminator.
    pub fn build_unreachable(&self, module: &mut Module) -> Result<()> {
        self.push(module, Instr::Unreachable)
    }

    /// Emits a call. Void-returning calls produce no register.
    pub fn build_call(
        &self,
        module: &mut Module,
        callee: &str,
        ret: IrType,
        args: Vec<(IrType, Value)>,
    ) -> Result<Option<Value>> {
        let dst = if ret.is_void() {
            None
        } else {
            Some(self.fresh_reg(module)?)
        };

        self.push(module, Instr::Call {
            dst,
            callee: callee.to_owned(),
            ret,
            args,
        })?;

        Ok(dst.map(Value::Reg))
    }
}

//
// Textual output
//

fn render_cstring(value: &str) -> String {
    let mut out = String::new();

    for &byte in value.as_bytes() {
        match byte {
            b'"' | b'\\' => { let _ = write!(out, "\\{:02X}", byte); },
            0x20..=0x7e => out.push(byte as char),
            _ => { let _ = write!(out, "\\{:02X}", byte); },
        }
    }

    out.push_str("\\00");
    out
}

fn block_label(function: &Function, block: usize) -> String {
    format!("{}.{}", function.blocks[block].name, block)
}

fn render_instr(instr: &Instr, function: &Function) -> String {
    match *instr {
        Instr::Alloca { dst, ref ty } => {
            format!("%{} = alloca {}", dst, ty)
        },
        Instr::Load { dst, ref ty, ref ptr } => {
            format!("%{} = load {}, ptr {}", dst, ty, ptr.render(function))
        },
        Instr::Store { ref ty, ref val, ref ptr } => {
            format!("store {} {}, ptr {}", ty, val.render(function), ptr.render(function))
        },
        Instr::Gep { dst, ref ty, ref ptr, ref index_ty, ref index } => {
            format!(
                "%{} = getelementptr inbounds {}, ptr {}, i32 0, {} {}",
                dst, ty, ptr.render(function), index_ty, index.render(function)
            )
        },
        Instr::MemCpy { ref dst, ref src, size, align } => {
            format!(
                "call void @llvm.memcpy.p0.p0.i64(ptr align {} {}, ptr align {} {}, i64 {}, i1 false)",
                align, dst.render(function), align, src.render(function), size
            )
        },
        Instr::Bin { dst, op, ref ty, ref lhs, ref rhs } => {
            format!(
                "%{} = {} {} {}, {}",
                dst, op, ty, lhs.render(function), rhs.render(function)
            )
        },
        Instr::Cast { dst, op, ref from, ref val, ref to } => {
            format!(
                "%{} = {} {} {} to {}",
                dst, op, from, val.render(function), to
            )
        },
        Instr::Icmp { dst, pred, ref ty, ref lhs, ref rhs } => {
            format!(
                "%{} = icmp {} {} {}, {}",
                dst, pred, ty, lhs.render(function), rhs.render(function)
            )
        },
        Instr::Br { target } => {
            format!("br label %{}", block_label(function, target))
        },
        Instr::CondBr { ref cond, then_block, else_block } => {
            format!(
                "br i1 {}, label %{}, label %{}",
                cond.render(function),
                block_label(function, then_block),
                block_label(function, else_block)
            )
        },
        Instr::Ret { val: Some((ref ty, ref val)) } => {
            format!("ret {} {}", ty, val.render(function))
        },
        Instr::Ret { val: None } => "ret void".to_owned(),
        Instr::Call { dst, ref callee, ref ret, ref args } => {
            let rendered: Vec<String> = args
                .iter()
                .map(|&(ref ty, ref val)| format!("{} {}", ty, val.render(function)))
                .collect();
            let call = format!("call {} @{}({})", ret, callee, rendered.join(", "));
            match dst {
                Some(dst) => format!("%{} = {}", dst, call),
                None => call,
            }
        },
        Instr::Unreachable => "unreachable".to_owned(),
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;

        for (index, cstring) in self.cstrings.iter().enumerate() {
            writeln!(
                f,
                "@.cstr.{} = private unnamed_addr constant [{} x i8] c\"{}\"",
                index,
                cstring.len() + 1,
                render_cstring(cstring)
            )?;
        }

        for global in &self.globals {
            writeln!(
                f,
                "@{} = {}{} {} {}",
                global.name,
                if global.internal { "internal " } else { "" },
                if global.is_const { "constant" } else { "global" },
                global.ty,
                global.init.render()
            )?;
        }

        for function in &self.functions {
            writeln!(f)?;

            let params: Vec<String> = function.params
                .iter()
                .map(|&(ref name, ref ty)| format!("{} %{}", ty, name))
                .collect();

            if function.is_declaration {
                writeln!(f, "declare {} @{}({})", function.ret, function.name, params.join(", "))?;
                continue;
            }

            writeln!(
                f,
                "define {}{} @{}({}) {{",
                if function.internal { "internal " } else { "" },
                function.ret,
                function.name,
                params.join(", ")
            )?;

            for &block_index in &function.order {
                writeln!(f, "{}:", block_label(function, block_index))?;
                for instr in &function.blocks[block_index].instrs {
                    writeln!(f, "  {}", render_instr(instr, function))?;
                }
            }

            writeln!(f, "}}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_layout_sizes() {
        assert_eq!(IrType::I1.size_of(), 1);
        assert_eq!(IrType::I128.size_of(), 16);
        assert_eq!(IrType::Array(Box::new(IrType::I32), 4).size_of(), 16);
        assert_eq!(IrType::Array(Box::new(IrType::I32), 4).align_of(), 4);
    }

    #[test]
    fn verifier_accepts_terminated_blocks() {
        let mut function = Function::new("f", vec![], IrType::Void, false);
        let entry = function.add_block("entry");
        function.attach_block(entry).unwrap();
        function.blocks[entry].instrs.push(Instr::Ret { val: None });
        assert!(function.verify().is_ok());
    }

    #[test]
    fn verifier_rejects_unterminated_blocks() {
        let mut function = Function::new("f", vec![], IrType::Void, false);
        let entry = function.add_block("entry");
        function.attach_block(entry).unwrap();
        assert!(function.verify().is_err());
    }

    #[test]
    fn verifier_rejects_branches_to_detached_blocks() {
        let mut function = Function::new("f", vec![], IrType::Void, false);
        let entry = function.add_block("entry");
        let limbo = function.add_block("limbo");
        function.attach_block(entry).unwrap();
        function.blocks[entry].instrs.push(Instr::Br { target: limbo });
        assert!(function.verify().is_err());
    }

    #[test]
    fn entry_allocas_stay_grouped() {
        let mut module = Module::new("m");
        let mut function = Function::new("f", vec![], IrType::Void, false);
        let entry = function.add_block("entry");
        function.attach_block(entry).unwrap();
        let func = module.add_function(function);

        let mut builder = Builder::new();
        builder.set_insert_point(func, entry);

        let first = builder.build_entry_alloca(&mut module, IrType::I32).unwrap();
        builder
            .build_store(&mut module, IrType::I32,
                         Value::Const(Const::Int { ty: IrType::I32, value: 1 }), first)
            .unwrap();
        builder.build_entry_alloca(&mut module, IrType::I64).unwrap();

        let instrs = &module.functions[func].blocks[entry].instrs;
        match (&instrs[0], &instrs[1], &instrs[2]) {
            (&Instr::Alloca { .. }, &Instr::Alloca { .. }, &Instr::Store { .. }) => {},
            other => panic!("allocas not grouped at entry: {:?}", other),
        }
    }

    #[test]
    fn cstring_pool_interns() {
        let mut module = Module::new("m");
        assert_eq!(module.intern_cstring("hi"), 0);
        assert_eq!(module.intern_cstring("there"), 1);
        assert_eq!(module.intern_cstring("hi"), 0);
    }

    #[test]
    fn printed_module_mentions_blocks_and_globals() {
        let mut module = Module::new("demo");
        module.add_global(Global {
            name: "g".to_owned(),
            ty: IrType::I32,
            is_const: false,
            internal: false,
            init: Const::Int { ty: IrType::I32, value: 7 },
        });

        let mut function = Function::new("f", vec![], IrType::I32, false);
        let entry = function.add_block("entry");
        function.attach_block(entry).unwrap();
        function.blocks[entry].instrs.push(Instr::Ret {
            val: Some((IrType::I32, Value::Const(Const::Int { ty: IrType::I32, value: 0 }))),
        });
        module.add_function(function);

        let text = module.to_string();
        assert!(text.contains("@g = global i32 7"));
        assert!(text.contains("define i32 @f()"));
        assert!(text.contains("entry.0:"));
        assert!(text.contains("ret i32 0"));
    }
}
