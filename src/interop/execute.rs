//! Calls into foreign code
//!
//! A call first validates its target, then escapes every argument, and only
//! then crosses the boundary. The calling thread's stack pointer is pinned to
//! the caller's value for the duration of the call and re-applied afterwards,
//! whatever the callee (or any IR it re-entered) did to it.

use std::sync::Arc;

use super::convert::{DataEscape, ForeignToNative, FromForeign, ToForeign};
use super::foreign::RawForeignValue;
use crate::error::{Error, Result};
use crate::ir::{FunctionType, Type};
use crate::runtime::{ExecutionStack, RuntimeContext, Value};

/// Restores a stack pointer when dropped, including on early return
struct StackPointerGuard<'a> {
    stack: &'a dyn ExecutionStack,
    saved: u64,
}

impl<'a> StackPointerGuard<'a> {
    fn enter(stack: &'a dyn ExecutionStack, saved: u64) -> Self {
        stack.set_stack_pointer(saved);
        StackPointerGuard { stack, saved }
    }
}

impl Drop for StackPointerGuard<'_> {
    fn drop(&mut self) {
        self.stack.set_stack_pointer(self.saved);
    }
}

/// A call site targeting a foreign executable
#[derive(Clone)]
pub struct ForeignExecuteNode {
    arg_types: Vec<Type>,
    return_type: Type,
    to_foreign: Arc<dyn ToForeign>,
    to_native: Arc<dyn FromForeign>,
}

impl ForeignExecuteNode {
    /// Call site with the default conversions
    pub fn new(arg_types: Vec<Type>, return_type: Type) -> Self {
        Self::with_conversions(
            arg_types,
            return_type,
            Arc::new(DataEscape),
            Arc::new(ForeignToNative),
        )
    }

    /// Call site for a function signature
    pub fn for_signature(signature: &FunctionType) -> Self {
        Self::new(
            signature.params.clone(),
            signature.return_type.as_ref().clone(),
        )
    }

    pub fn with_conversions(
        arg_types: Vec<Type>,
        return_type: Type,
        to_foreign: Arc<dyn ToForeign>,
        to_native: Arc<dyn FromForeign>,
    ) -> Self {
        ForeignExecuteNode {
            arg_types,
            return_type,
            to_foreign,
            to_native,
        }
    }

    /// Number of arguments this site passes
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Call `target` with `args`
    ///
    /// `stack_pointer` is the caller's stack pointer right before the call;
    /// the calling thread's stack is set to it before dispatch and restored
    /// to it afterwards.
    pub fn execute(
        &self,
        ctx: &RuntimeContext,
        target: &Value,
        args: &[Value],
        stack_pointer: u64,
    ) -> Result<Value> {
        let callee = match target {
            Value::Address(address) => address.unmodified_foreign("execute")?,
            _ => None,
        }
        .ok_or_else(|| {
            tracing::warn!(target = %target.type_name(), "call target is not a foreign reference");
            Error::InvalidCallOperand {
                type_name: target.type_name(),
            }
        })?;

        if args.len() != self.arg_types.len() {
            return Err(Error::fatal(
                "execute",
                format!(
                    "call site declares {} arguments but {} were supplied",
                    self.arg_types.len(),
                    args.len()
                ),
            ));
        }

        let raw_args = args
            .iter()
            .zip(&self.arg_types)
            .map(|(value, ty)| self.to_foreign.to_foreign(ctx, value, ty))
            .collect::<Result<Vec<RawForeignValue>>>()?;

        let stack = ctx.stack_for_current_thread()?;
        tracing::trace!(arity = raw_args.len(), stack_pointer, "foreign execute");

        let raw_result = {
            let _guard = StackPointerGuard::enter(stack.as_ref(), stack_pointer);
            callee.execute(&raw_args)
        };

        let raw_result = raw_result.map_err(|err| {
            tracing::warn!(error = %err, "foreign call failed");
            Error::from(err)
        })?;

        Ok(self.to_native.from_foreign(raw_result, &self.return_type)?)
    }
}

impl std::fmt::Debug for ForeignExecuteNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignExecuteNode")
            .field("arg_types", &self.arg_types)
            .field("return_type", &self.return_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForeignError;
    use crate::interop::{ForeignFunction, ForeignHandle};
    use crate::runtime::Address;

    fn doubler() -> Value {
        let function = ForeignFunction::new("double", 1, |args: &[RawForeignValue]| match args {
            [RawForeignValue::Int(v)] => Ok(RawForeignValue::Int(v * 2)),
            _ => Err(ForeignError::unsupported_type("double expects an integer")),
        });
        Address::foreign(ForeignHandle::new(function)).into()
    }

    #[test]
    fn test_call_converts_result() {
        let ctx = RuntimeContext::with_defaults();
        let sp = ctx.stack_for_current_thread().unwrap().top();
        let node = ForeignExecuteNode::new(vec![Type::I32], Type::I32);

        let result = node.execute(&ctx, &doubler(), &[Value::I32(21)], sp).unwrap();
        assert_eq!(result, Value::I32(42));
    }

    #[test]
    fn test_native_target_is_invalid_operand() {
        let ctx = RuntimeContext::with_defaults();
        let node = ForeignExecuteNode::new(vec![], Type::Void);
        let err = node
            .execute(&ctx, &Address::native(0x1000).into(), &[], 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCallOperand { .. }));
    }

    #[test]
    fn test_site_arity_mismatch_is_fatal() {
        let ctx = RuntimeContext::with_defaults();
        let node = ForeignExecuteNode::new(vec![Type::I32, Type::I32], Type::I32);
        let err = node
            .execute(&ctx, &doubler(), &[Value::I32(1)], 0)
            .unwrap_err();
        assert!(matches!(err, Error::FatalOperand { .. }));
    }
}
