//! Global variables and aliases as declared by a module
//!
//! A [`GlobalEntry`] moves through three states:
//!
//! ```text
//! Declared ──set_name──▶ Named ──initialise──▶ Initialized
//! ```
//!
//! The initializer is stored as a one-based slot into the module's symbol
//! list and resolved only after every symbol of the module is registered,
//! because an initializer may reference a symbol defined further down.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use super::types::Type;
use crate::error::{Error, Result};

/// Name reported for a global before the symbol table builder names it
pub const UNKNOWN_NAME: &str = "<anon>";

lazy_static::lazy_static! {
    /// Counter for generating process-unique global ids
    static ref GLOBAL_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Process-unique identity of a global entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(u64);

impl GlobalId {
    fn next() -> Self {
        GlobalId(GLOBAL_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Raw numeric id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// What kind of declaration produced the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    /// A global variable with its own storage
    Variable {
        /// Declared `constant`
        constant: bool,
    },
    /// An alias sharing the storage of the global its initializer names
    Alias,
}

/// A symbol an initializer slot can refer to
#[derive(Clone)]
pub enum Symbol {
    /// Integer constant
    Integer {
        /// Integer type of the constant
        ty: Type,
        /// Value, truncated to the type's width when stored
        value: i64,
    },
    /// Floating constant (`float`, `double` or `x86_fp80`)
    Floating {
        /// Floating type of the constant
        ty: Type,
        /// Value
        value: f64,
    },
    /// `null` pointer constant
    NullPointer,
    /// Address of another global
    ///
    /// Held weakly: the declaring module owns its entries, and a global may
    /// name itself.
    GlobalRef(Weak<GlobalEntry>),
    /// Address of a function already placed in native code
    Function {
        /// Function name
        name: String,
        /// Native code address
        address: u64,
    },
    /// `zeroinitializer` of the given type
    ZeroInitializer(Type),
}

impl Symbol {
    /// Reference to `global` for use as an initializer
    pub fn global_ref(global: &Arc<GlobalEntry>) -> Self {
        Symbol::GlobalRef(Arc::downgrade(global))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::Integer { ty: a, value: x }, Symbol::Integer { ty: b, value: y }) => {
                a == b && x == y
            }
            (Symbol::Floating { ty: a, value: x }, Symbol::Floating { ty: b, value: y }) => {
                a == b && x.to_bits() == y.to_bits()
            }
            (Symbol::NullPointer, Symbol::NullPointer) => true,
            (Symbol::GlobalRef(a), Symbol::GlobalRef(b)) => Weak::ptr_eq(a, b),
            (
                Symbol::Function {
                    name: a,
                    address: x,
                },
                Symbol::Function {
                    name: b,
                    address: y,
                },
            ) => a == b && x == y,
            (Symbol::ZeroInitializer(a), Symbol::ZeroInitializer(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Integer { ty, value } => write!(f, "{} {}", ty, value),
            Symbol::Floating { ty, value } => write!(f, "{} {}", ty, value),
            Symbol::NullPointer => write!(f, "ptr null"),
            // Only the name: globals may reference themselves
            Symbol::GlobalRef(global) => match global.upgrade() {
                Some(global) => write!(f, "ptr {}", global.name()),
                None => write!(f, "ptr <dropped>"),
            },
            Symbol::Function { name, address } => write!(f, "fn @{} at 0x{:x}", name, address),
            Symbol::ZeroInitializer(ty) => write!(f, "{} zeroinitializer", ty),
        }
    }
}

/// Index-addressed symbol lookup
pub trait SymbolTable {
    /// Returns the symbol at the zero-based `index`
    fn get_symbol(&self, index: u32) -> Option<Symbol>;
}

/// Symbol list of one module
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    symbols: Vec<Symbol>,
}

impl Symbols {
    /// Creates an empty symbol list
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a symbol and returns its one-based slot
    pub fn add(&mut self, symbol: Symbol) -> u32 {
        self.symbols.push(symbol);
        self.symbols.len() as u32
    }

    /// Number of registered symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True when no symbol is registered
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolTable for Symbols {
    fn get_symbol(&self, index: u32) -> Option<Symbol> {
        self.symbols.get(index as usize).cloned()
    }
}

/// One global variable or alias declaration
pub struct GlobalEntry {
    id: GlobalId,
    kind: GlobalKind,
    ty: Type,
    alignment: u32,
    initializer_slot: Option<u32>,
    name: OnceLock<String>,
    /// Set by `initialise`; the inner `None` means "no initializer"
    value: OnceLock<Option<Symbol>>,
}

impl GlobalEntry {
    /// Declares a global. A slot of `0` is the encoding for "no initializer".
    pub fn new(kind: GlobalKind, ty: Type, alignment: u32, initializer_slot: Option<u32>) -> Self {
        GlobalEntry {
            id: GlobalId::next(),
            kind,
            ty,
            alignment,
            initializer_slot: initializer_slot.filter(|&slot| slot > 0),
            name: OnceLock::new(),
            value: OnceLock::new(),
        }
    }

    /// Declares a global variable
    pub fn variable(ty: Type, alignment: u32, initializer_slot: Option<u32>) -> Self {
        Self::new(
            GlobalKind::Variable { constant: false },
            ty,
            alignment,
            initializer_slot,
        )
    }

    /// Process-unique id
    pub fn id(&self) -> GlobalId {
        self.id
    }

    /// Variable or alias
    pub fn kind(&self) -> GlobalKind {
        self.kind
    }

    /// Value type of the global
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Declared alignment (0 means natural alignment of the type)
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// One-based initializer slot
    pub fn initializer_slot(&self) -> Option<u32> {
        self.initializer_slot
    }

    /// `@`-prefixed name, or the placeholder while unnamed
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or(UNKNOWN_NAME)
    }

    /// Assign the symbol name; allowed exactly once
    pub fn set_name(&self, name: &str) -> Result<()> {
        self.name
            .set(format!("@{}", name))
            .map_err(|_| Error::GlobalLifecycle {
                name: self.name().to_string(),
                message: format!("cannot rename to @{}", name),
            })
    }

    /// True once `set_name` ran
    pub fn is_named(&self) -> bool {
        self.name.get().is_some()
    }

    /// Resolve the initializer slot against the module's symbols
    ///
    /// Must run after every symbol of the module is registered. Without an
    /// initializer slot this only marks the entry complete.
    pub fn initialise(&self, symbols: &dyn SymbolTable) -> Result<()> {
        let resolved = self.pending_initializer(symbols)?;
        self.value.set(resolved).map_err(|_| Error::GlobalLifecycle {
            name: self.name().to_string(),
            message: "initialise raced with another initialise".to_string(),
        })
    }

    /// The symbol `initialise` would store, without changing the entry
    ///
    /// Fails if the entry is already initialised or its slot is out of range.
    pub fn pending_initializer(&self, symbols: &dyn SymbolTable) -> Result<Option<Symbol>> {
        if self.is_initialised() {
            return Err(Error::GlobalLifecycle {
                name: self.name().to_string(),
                message: "already initialised".to_string(),
            });
        }

        match self.initializer_slot {
            Some(slot) => symbols
                .get_symbol(slot - 1)
                .map(Some)
                .ok_or_else(|| Error::GlobalLifecycle {
                    name: self.name().to_string(),
                    message: format!("initializer slot {} is outside the symbol table", slot),
                }),
            None => Ok(None),
        }
    }

    /// True once `initialise` ran
    pub fn is_initialised(&self) -> bool {
        self.value.get().is_some()
    }

    /// The resolved initializer, if the entry has one and was initialised
    pub fn resolved_value(&self) -> Option<&Symbol> {
        self.value.get().and_then(Option::as_ref)
    }
}

impl fmt::Debug for GlobalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalEntry")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("kind", &self.kind)
            .field("ty", &self.ty)
            .field("alignment", &self.alignment)
            .field("initializer_slot", &self.initializer_slot)
            .field("value", &self.resolved_value())
            .finish()
    }
}

impl fmt::Display for GlobalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(count: i64) -> Symbols {
        let mut symbols = Symbols::new();
        for value in 0..count {
            symbols.add(Symbol::Integer { ty: Type::I32, value });
        }
        symbols
    }

    #[test]
    fn test_initialise_is_one_based() {
        let symbols = table(6);
        let global = GlobalEntry::variable(Type::I32, 4, Some(5));
        global.initialise(&symbols).unwrap();
        assert_eq!(
            global.resolved_value(),
            Some(&Symbol::Integer {
                ty: Type::I32,
                value: 4
            })
        );
    }

    #[test]
    fn test_initialise_without_slot() {
        let global = GlobalEntry::variable(Type::I32, 4, None);
        global.initialise(&table(2)).unwrap();
        assert!(global.is_initialised());
        assert_eq!(global.resolved_value(), None);
    }

    #[test]
    fn test_zero_slot_means_none() {
        let global = GlobalEntry::variable(Type::I32, 4, Some(0));
        assert_eq!(global.initializer_slot(), None);
    }

    #[test]
    fn test_second_initialise_rejected() {
        let symbols = table(3);
        let global = GlobalEntry::variable(Type::I32, 4, Some(1));
        global.initialise(&symbols).unwrap();
        assert!(matches!(
            global.initialise(&symbols),
            Err(Error::GlobalLifecycle { .. })
        ));
    }

    #[test]
    fn test_slot_out_of_range() {
        let global = GlobalEntry::variable(Type::I32, 4, Some(9));
        assert!(global.initialise(&table(2)).is_err());
        assert!(!global.is_initialised());
    }

    #[test]
    fn test_naming() {
        let global = GlobalEntry::variable(Type::I8, 1, None);
        assert_eq!(global.name(), UNKNOWN_NAME);
        global.set_name("counter").unwrap();
        assert_eq!(global.name(), "@counter");
        assert!(global.set_name("other").is_err());
        assert_eq!(global.to_string(), "@counter");
    }

    #[test]
    fn test_self_reference_debug_terminates() {
        let mut symbols = Symbols::new();
        let global = Arc::new(GlobalEntry::variable(Type::Pointer, 8, Some(1)));
        symbols.add(Symbol::global_ref(&global));
        global.set_name("self_ref").unwrap();
        global.initialise(&symbols).unwrap();
        let rendered = format!("{:?}", global);
        assert!(rendered.contains("ptr @self_ref"));
    }

    #[test]
    fn test_self_reference_does_not_keep_entry_alive() {
        let mut symbols = Symbols::new();
        let global = Arc::new(GlobalEntry::variable(Type::Pointer, 8, Some(1)));
        symbols.add(Symbol::global_ref(&global));
        global.initialise(&symbols).unwrap();

        let weak = Arc::downgrade(&global);
        drop(global);
        assert_eq!(weak.strong_count(), 0);
        assert_eq!(format!("{:?}", symbols.get_symbol(0).unwrap()), "ptr <dropped>");
    }

    #[test]
    fn test_pending_initializer_leaves_entry_untouched() {
        let global = GlobalEntry::variable(Type::I32, 4, Some(2));
        assert_eq!(
            global.pending_initializer(&table(3)).unwrap(),
            Some(Symbol::Integer {
                ty: Type::I32,
                value: 1
            })
        );
        assert!(!global.is_initialised());
        assert!(global.pending_initializer(&table(1)).is_err());
    }
}
