//
// symbols.rs
// The Babel Compiler
//

//! The symbol tables of a compilation unit: local slots, global
//! cells, tasks (with polymorphic renaming), and the per-task label
//! map. Lookup precedence is locals before globals. All tables are
//! ordinary members of one struct that the code generator threads
//! through emission; nothing here is process-global.

use std::collections::{ BTreeMap, HashMap };
use ir;
use typing::TypeId;


/// A named stack slot within the current task.
#[derive(Debug, Clone)]
pub struct LocalSymbol {
    /// The alloca'd slot. `None` while the symbol is only declared.
    pub slot: Option<ir::Value>,
    /// The declared type.
    pub ty: TypeId,
    /// Whether assignment to the symbol is forbidden.
    pub is_const: bool,
}

/// A named global cell.
#[derive(Debug, Clone)]
pub struct GlobalSymbol {
    /// The name of the module global backing this symbol. `None`
    /// while the symbol is a declaration-time placeholder with no
    /// storage emitted yet.
    pub cell: Option<String>,
    /// The declared type.
    pub ty: TypeId,
    /// Whether assignment to the symbol is forbidden.
    pub is_const: bool,
    /// Whether the initializer was a compile-time constant.
    pub is_comptime: bool,
    /// The compile-time initializer, when `is_comptime` holds.
    pub comptime_init: Option<ir::Const>,
}

/// Signature of a task: its argument types in order, and its return
/// type.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Argument types, in declaration order.
    pub args: Vec<TypeId>,
    /// The return type.
    pub ret: TypeId,
}

/// All symbol tables of one compilation unit.
#[derive(Debug, Default)]
pub struct SymbolTables {
    /// Local slots of the task currently being emitted. Cleared on
    /// entry to each task body.
    pub locals: BTreeMap<String, LocalSymbol>,
    /// Global cells, placeholders included.
    pub globals: BTreeMap<String, GlobalSymbol>,
    /// Task signatures, keyed by canonical (possibly mangled) name.
    pub tasks: BTreeMap<String, TaskInfo>,
    /// Whether a base name has been declared more than once, which
    /// makes the name polymorphic and subject to mangling.
    pub polymorph: BTreeMap<String, bool>,
    /// Label name → block index within the current task. Cleared on
    /// entry to each task body.
    pub labels: HashMap<String, usize>,
}

impl SymbolTables {
    /// Makes a fresh set of empty tables.
    pub fn new() -> SymbolTables {
        SymbolTables::default()
    }

    /// Registers a task declaration under its base name, recording in
    /// the polymorph table whether the name had been seen before.
    pub fn register_task(&mut self, name: &str, info: TaskInfo) {
        let seen_before = self.polymorph.contains_key(name);
        self.tasks.insert(name.to_owned(), info);
        self.polymorph.insert(name.to_owned(), seen_before);
    }

    /// Answers whether the base name is polymorphic, i.e. declared
    /// more than once.
    pub fn is_polymorphic(&self, name: &str) -> bool {
        self.polymorph.get(name).cloned().unwrap_or(false)
    }

    /// Moves the signature registered under `old` to the key `new`.
    /// Inserts under `new` even if `old` is already gone, which
    /// happens when a header is updated twice.
    pub fn rename_task(&mut self, old: &str, new: &str, info: TaskInfo) {
        self.tasks.remove(old);
        self.tasks.insert(new.to_owned(), info);
    }

    /// All mangled signatures declared for a polymorphic base name,
    /// in deterministic (sorted) order.
    pub fn polymorphic_signatures(&self, base: &str) -> Vec<(&String, &TaskInfo)> {
        let prefix = format!("{}.polymorphic", base);
        self.tasks
            .iter()
            .filter(|&(name, _)| name.starts_with(&prefix))
            .collect()
    }

    /// Clears the local table. Called on entry to each task body.
    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }

    /// Clears the label map. Called on entry to each task body.
    pub fn clear_labels(&mut self) {
        self.labels.clear();
    }
}

/// The canonical mangled name of a polymorphic task:
/// `base.polymorphic.<type1>_<type2>_…`, using each argument type's
/// display name.
pub fn polymorphic_name(base: &str, type_names: &[String]) -> String {
    format!("{}.polymorphic.{}", base, type_names.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use typing::TypeArena;

    #[test]
    fn polymorph_flag_tracks_redeclaration() {
        let mut arena = TypeArena::new();
        let int = arena.int();
        let void = arena.void();
        let mut tables = SymbolTables::new();

        tables.register_task("f", TaskInfo { args: vec![int], ret: void });
        assert!(!tables.is_polymorphic("f"));

        tables.register_task("f", TaskInfo { args: vec![void], ret: void });
        assert!(tables.is_polymorphic("f"));
    }

    #[test]
    fn mangled_names_use_type_displays() {
        let names = vec!["int32".to_owned(), "float64".to_owned()];
        assert_eq!(polymorphic_name("f", &names), "f.polymorphic.int32_float64");
    }

    #[test]
    fn signature_enumeration_is_sorted_and_prefixed() {
        let mut arena = TypeArena::new();
        let int = arena.int();
        let void = arena.void();
        let mut tables = SymbolTables::new();

        tables.register_task("f.polymorphic.int32", TaskInfo { args: vec![int], ret: void });
        tables.register_task("f.polymorphic.float32", TaskInfo { args: vec![int], ret: void });
        tables.register_task("g.polymorphic.int32", TaskInfo { args: vec![int], ret: void });

        let signatures = tables.polymorphic_signatures("f");
        let names: Vec<&str> = signatures.iter().map(|&(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["f.polymorphic.float32", "f.polymorphic.int32"]);
    }
}
