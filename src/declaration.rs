//! Property declarations.

use crate::expr::{Expr, Expression};
use crate::value::{Value, ValueType};
use bitflags::bitflags;
use core::fmt;
use std::sync::Arc;

bitflags! {
    /// Declaration flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeclFlags: u8 {
        /// The default expression is the only value the property will ever have.
        const CONSTANT = 1;
        /// Writes and redefinitions are allowed.
        const OVERRIDABLE = 1 << 1;
        /// Writes made by undoable actions are recorded for undo.
        const UNDOABLE = 1 << 2;
        /// Changes to the property change what its element looks like.
        const AFFECTS_PAINT = 1 << 3;
        /// Maintained by the scene itself (tree structure); only internal writes are allowed.
        const INTERNAL = 1 << 4;
    }
}

impl Default for DeclFlags {
    fn default() -> Self {
        DeclFlags::OVERRIDABLE | DeclFlags::UNDOABLE
    }
}

/// The name, type, default expression and flags shared by every property created from it.
pub struct Declaration {
    pub name: Arc<str>,
    pub ty: ValueType,
    pub default: Arc<dyn Expression>,
    pub flags: DeclFlags,
}

impl Declaration {
    /// Creates an overridable, undoable declaration.
    pub fn new(name: &str, ty: ValueType, default: impl Into<Expr>) -> Declaration {
        Declaration {
            name: name.into(),
            ty,
            default: Arc::new(default.into()),
            flags: DeclFlags::default(),
        }
    }

    /// A declaration whose default is a constant value.
    pub fn value(name: &str, value: impl Into<Value>) -> Declaration {
        let value = value.into();
        let ty = match value.ty() {
            ValueType::Nil => ValueType::Any,
            ty => ty,
        };
        Declaration::new(name, ty, Expr::Const(value))
    }

    pub fn with_default(mut self, default: Arc<dyn Expression>) -> Declaration {
        self.default = default;
        self
    }

    pub fn with_flags(mut self, flags: DeclFlags) -> Declaration {
        self.flags = flags;
        self
    }

    pub fn constant(mut self) -> Declaration {
        self.flags.insert(DeclFlags::CONSTANT);
        self.flags.remove(DeclFlags::OVERRIDABLE);
        self
    }

    pub fn affects_paint(mut self) -> Declaration {
        self.flags.insert(DeclFlags::AFFECTS_PAINT);
        self
    }

    pub fn not_undoable(mut self) -> Declaration {
        self.flags.remove(DeclFlags::UNDOABLE);
        self
    }

    pub fn is_constant(&self) -> bool {
        self.flags.contains(DeclFlags::CONSTANT)
    }

    pub fn is_overridable(&self) -> bool {
        self.flags.contains(DeclFlags::OVERRIDABLE)
    }

    pub fn is_undoable(&self) -> bool {
        self.flags.contains(DeclFlags::UNDOABLE)
    }

    pub fn affects_painting(&self) -> bool {
        self.flags.contains(DeclFlags::AFFECTS_PAINT)
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("default", &"..")
            .field("flags", &self.flags)
            .finish()
    }
}
