//
// typing.rs
// The Babel Compiler
//

//! The Babel type universe: primitive types, fixed-size arrays and
//! pointers with const qualification, plus the implicit coercion
//! rules. Composite types nest, so all descriptors live in an
//! interning `TypeArena` that hands out stable `TypeId`s; structural
//! equality of interned types is id equality.

use std::collections::HashMap;
use ir::IrType;


/// The primitive types of the language. `int` and `float` written in
/// source are aliases for `int32` and `float32` and map to the same
/// variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float16,
    Float32,
    Float64,
    Float128,
    Boolean,
    Character,
    CString,
    Void,
}

impl BasicType {
    /// Resolves a type name as it appears in source, e.g. `int64` or
    /// the widthless aliases `int` and `float`.
    pub fn from_name(name: &str) -> Option<BasicType> {
        match name {
            "int" | "int32"     => Some(BasicType::Int32),
            "int8"              => Some(BasicType::Int8),
            "int16"             => Some(BasicType::Int16),
            "int64"             => Some(BasicType::Int64),
            "int128"            => Some(BasicType::Int128),
            "float" | "float32" => Some(BasicType::Float32),
            "float16"           => Some(BasicType::Float16),
            "float64"           => Some(BasicType::Float64),
            "float128"          => Some(BasicType::Float128),
            "bool"              => Some(BasicType::Boolean),
            "char"              => Some(BasicType::Character),
            "cstring"           => Some(BasicType::CString),
            "void"              => Some(BasicType::Void),
            _                   => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BasicType::Int8      => "int8",
            BasicType::Int16     => "int16",
            BasicType::Int32     => "int32",
            BasicType::Int64     => "int64",
            BasicType::Int128    => "int128",
            BasicType::Float16   => "float16",
            BasicType::Float32   => "float32",
            BasicType::Float64   => "float64",
            BasicType::Float128  => "float128",
            BasicType::Boolean   => "bool",
            BasicType::Character => "char",
            BasicType::CString   => "cstring",
            BasicType::Void      => "void",
        }
    }
}

/// A handle into the `TypeArena`. Because the arena interns, two
/// handles are equal exactly when the types they denote are
/// structurally equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

/// A type descriptor. Composite variants refer to their inner type
/// through the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// A primitive type.
    Basic(BasicType),
    /// A fixed-size array.
    Array {
        /// Element type.
        inner: TypeId,
        /// Number of elements.
        size: usize,
    },
    /// A pointer. The const flag records whether the pointee may be
    /// written through this pointer; it is semantic, not nominal.
    Pointer {
        /// Pointee type.
        to: TypeId,
        /// Whether the pointee is read-only through this pointer.
        points_to_const: bool,
    },
}

/// Owns every type descriptor of a compilation and interns them by
/// structure. Append-only; handles stay valid for the lifetime of the
/// arena.
#[derive(Debug, Default)]
pub struct TypeArena {
    types: Vec<Type>,
    interned: HashMap<Type, TypeId>,
}

impl TypeArena {
    /// Makes an empty arena.
    pub fn new() -> TypeArena {
        TypeArena::default()
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }

        let id = TypeId(self.types.len());
        self.types.push(ty);
        self.interned.insert(ty, id);
        id
    }

    /// The handle of a primitive type.
    pub fn basic(&mut self, basic: BasicType) -> TypeId {
        self.intern(Type::Basic(basic))
    }

    /// The default integer type, `int32`.
    pub fn int(&mut self) -> TypeId {
        self.basic(BasicType::Int32)
    }

    /// The `bool` type.
    pub fn boolean(&mut self) -> TypeId {
        self.basic(BasicType::Boolean)
    }

    /// The `void` type.
    pub fn void(&mut self) -> TypeId {
        self.basic(BasicType::Void)
    }

    /// The array type of `size` elements of type `inner`.
    pub fn array(&mut self, inner: TypeId, size: usize) -> TypeId {
        self.intern(Type::Array { inner, size })
    }

    /// The pointer type to `to`, optionally pointing to const data.
    pub fn pointer(&mut self, to: TypeId, points_to_const: bool) -> TypeId {
        self.intern(Type::Pointer { to, points_to_const })
    }

    /// The descriptor behind a handle.
    pub fn get(&self, id: TypeId) -> Type {
        self.types[id.0]
    }

    /// Canonical display name: `int32`, `Array<int32>`, `int32*`, …
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Basic(basic) => basic.name().to_owned(),
            Type::Array { inner, .. } => format!("Array<{}>", self.display(inner)),
            Type::Pointer { to, .. } => format!("{}*", self.display(to)),
        }
    }

    /// Answers whether the type is one of the integer primitives.
    pub fn is_integer(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Basic(basic) => match basic {
                BasicType::Int8
                | BasicType::Int16
                | BasicType::Int32
                | BasicType::Int64
                | BasicType::Int128 => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// Answers whether the type is one of the float primitives.
    pub fn is_float(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Basic(basic) => match basic {
                BasicType::Float16
                | BasicType::Float32
                | BasicType::Float64
                | BasicType::Float128 => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// The closed implicit-coercion relation:
    ///
    /// * `intN → intM` for `N < M`;
    /// * `intN → floatM` whenever `floatM` can represent every `intN`;
    /// * `floatN → floatM` for `N < M`;
    /// * every type coerces to itself.
    ///
    /// The table already encodes the transitive closure. Composite
    /// types only coerce to themselves.
    pub fn can_coerce(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }

        let (from, to) = match (self.get(from), self.get(to)) {
            (Type::Basic(f), Type::Basic(t)) => (f, t),
            _ => return false,
        };

        use self::BasicType::*;

        let targets: &[BasicType] = match from {
            Int8     => &[Int16, Int32, Int64, Int128, Float16, Float32, Float64, Float128],
            Int16    => &[Int32, Int64, Int128, Float16, Float32, Float64, Float128],
            Int32    => &[Int64, Int128, Float32, Float64, Float128],
            Int64    => &[Int128, Float64, Float128],
            Int128   => &[Float128],
            Float16  => &[Float32, Float64, Float128],
            Float32  => &[Float64, Float128],
            Float64  => &[Float128],
            _        => &[],
        };

        targets.contains(&to)
    }

    /// The SSA-IR type corresponding to a Babel type. Pointers are
    /// opaque; arrays keep their shape.
    pub fn ir_type_of(&self, id: TypeId) -> IrType {
        match self.get(id) {
            Type::Basic(basic) => match basic {
                BasicType::Int8      => IrType::I8,
                BasicType::Int16     => IrType::I16,
                BasicType::Int32     => IrType::I32,
                BasicType::Int64     => IrType::I64,
                BasicType::Int128    => IrType::I128,
                BasicType::Float16   => IrType::F16,
                BasicType::Float32   => IrType::F32,
                BasicType::Float64   => IrType::F64,
                BasicType::Float128  => IrType::F128,
                BasicType::Boolean   => IrType::I1,
                BasicType::Character => IrType::I8,
                BasicType::CString   => IrType::Ptr,
                BasicType::Void      => IrType::Void,
            },
            Type::Array { inner, size } => {
                IrType::Array(Box::new(self.ir_type_of(inner)), size)
            },
            Type::Pointer { .. } => IrType::Ptr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_basics() -> Vec<BasicType> {
        use self::BasicType::*;
        vec![
            Int8, Int16, Int32, Int64, Int128,
            Float16, Float32, Float64, Float128,
            Boolean, Character, CString, Void,
        ]
    }

    #[test]
    fn interning_makes_equality_structural() {
        let mut arena = TypeArena::new();
        let a = arena.basic(BasicType::Int32);
        let b = arena.basic(BasicType::Int32);
        assert_eq!(a, b);

        let pa = arena.pointer(a, false);
        let pb = arena.pointer(b, false);
        assert_eq!(pa, pb);

        let pc = arena.pointer(a, true);
        assert_ne!(pa, pc);

        let aa = arena.array(a, 3);
        let ab = arena.array(a, 4);
        assert_ne!(aa, ab);
    }

    #[test]
    fn display_names() {
        let mut arena = TypeArena::new();
        let int = arena.int();
        assert_eq!(arena.display(int), "int32");

        let float = arena.basic(BasicType::Float32);
        assert_eq!(arena.display(float), "float32");

        let array = arena.array(int, 4);
        assert_eq!(arena.display(array), "Array<int32>");

        let ptr = arena.pointer(array, true);
        assert_eq!(arena.display(ptr), "Array<int32>*");
    }

    #[test]
    fn coercion_is_reflexive() {
        let mut arena = TypeArena::new();
        for basic in all_basics() {
            let id = arena.basic(basic);
            assert!(arena.can_coerce(id, id));
        }
    }

    #[test]
    fn coercion_is_transitive() {
        let mut arena = TypeArena::new();
        let ids: Vec<TypeId> = all_basics().into_iter().map(|b| arena.basic(b)).collect();

        for &t in &ids {
            for &u in &ids {
                for &v in &ids {
                    if arena.can_coerce(t, u) && arena.can_coerce(u, v) {
                        assert!(
                            arena.can_coerce(t, v),
                            "{} → {} → {} holds but {} → {} does not",
                            arena.display(t), arena.display(u), arena.display(v),
                            arena.display(t), arena.display(v),
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn int_widening_and_int_to_float() {
        let mut arena = TypeArena::new();
        let i8_ = arena.basic(BasicType::Int8);
        let i32_ = arena.basic(BasicType::Int32);
        let i64_ = arena.basic(BasicType::Int64);
        let f16 = arena.basic(BasicType::Float16);
        let f32_ = arena.basic(BasicType::Float32);

        assert!(arena.can_coerce(i8_, i32_));
        assert!(!arena.can_coerce(i32_, i8_));
        assert!(arena.can_coerce(i8_, f16));
        assert!(arena.can_coerce(i32_, f32_));
        assert!(!arena.can_coerce(i32_, f16));
        assert!(!arena.can_coerce(i64_, f32_));
    }

    #[test]
    fn composite_types_do_not_coerce()  {
        let mut arena = TypeArena::new();
        let int = arena.int();
        let long = arena.basic(BasicType::Int64);
        let p_int = arena.pointer(int, false);
        let p_long = arena.pointer(long, false);
        let arr = arena.array(int, 2);

        assert!(!arena.can_coerce(p_int, p_long));
        assert!(arena.can_coerce(p_int, p_int));
        assert!(!arena.can_coerce(arr, p_int));
        assert!(!arena.can_coerce(int, p_int));
    }
}
