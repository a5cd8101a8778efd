//! Source-level debug values kept alongside a frame

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ir::Type;

use super::value::Value;

/// A source variable as named by debug info
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSymbol {
    /// Variable name
    pub name: String,
    /// Declaring line, if known
    pub line: Option<u32>,
}

impl SourceSymbol {
    pub fn new(name: impl Into<String>, line: Option<u32>) -> Self {
        SourceSymbol {
            name: name.into(),
            line,
        }
    }
}

impl fmt::Display for SourceSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.name, line),
            None => write!(f, "{}", self.name),
        }
    }
}

/// How a debugger should interpret the stored value
#[derive(Debug, Clone, PartialEq)]
pub enum DebugProviderKind {
    /// Interpreter value of the given IR type
    Typed(Type),
    /// Reference into foreign memory
    Foreign,
    /// Optimised out
    Unavailable,
}

/// One variable's value as seen by a debugger
#[derive(Debug, Clone, PartialEq)]
pub struct DebugValue {
    pub symbol: Arc<SourceSymbol>,
    pub provider: DebugProviderKind,
    pub value: Value,
}

/// Debug slots of one frame
#[derive(Debug, Clone, Default)]
pub struct DebugFrame {
    slots: Vec<Option<DebugValue>>,
}

impl DebugFrame {
    pub fn new(slot_count: usize) -> Self {
        DebugFrame {
            slots: vec![None; slot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value last written to `slot`
    pub fn get(&self, slot: usize) -> Option<&DebugValue> {
        self.slots.get(slot).and_then(Option::as_ref)
    }
}

/// Records a variable's current value in a frame slot
#[derive(Debug, Clone)]
pub struct DebugFrameWrite {
    slot: usize,
    variable: Arc<SourceSymbol>,
    provider: DebugProviderKind,
}

impl DebugFrameWrite {
    pub fn new(slot: usize, variable: Arc<SourceSymbol>, provider: DebugProviderKind) -> Self {
        DebugFrameWrite {
            slot,
            variable,
            provider,
        }
    }

    /// Store `value` in the slot; produces no IR value
    pub fn write(&self, frame: &mut DebugFrame, value: Value) -> Result<()> {
        let len = frame.slots.len();
        let slot = frame.slots.get_mut(self.slot).ok_or_else(|| {
            Error::fatal(
                "debug frame write",
                format!("slot {} outside a frame of {} slots", self.slot, len),
            )
        })?;

        tracing::trace!(slot = self.slot, variable = %self.variable, "debug value written");
        *slot = Some(DebugValue {
            symbol: self.variable.clone(),
            provider: self.provider.clone(),
            value,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_slot() {
        let mut frame = DebugFrame::new(2);
        let counter = Arc::new(SourceSymbol::new("counter", Some(12)));
        let write = DebugFrameWrite::new(1, counter.clone(), DebugProviderKind::Typed(Type::I32));

        write.write(&mut frame, Value::I32(1)).unwrap();
        write.write(&mut frame, Value::I32(2)).unwrap();

        let stored = frame.get(1).unwrap();
        assert_eq!(stored.value, Value::I32(2));
        assert_eq!(stored.symbol, counter);
        assert!(frame.get(0).is_none());
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut frame = DebugFrame::new(1);
        let write = DebugFrameWrite::new(
            4,
            Arc::new(SourceSymbol::new("x", None)),
            DebugProviderKind::Unavailable,
        );
        assert!(write.write(&mut frame, Value::Void).is_err());
    }
}
