//! Integration tests for the foreign predicate intrinsics

use llir_runtime::error::Error;
use llir_runtime::interop::{
    has_size, is_boxed, is_executable, is_null, ForeignArray, ForeignBox, ForeignFunction,
    ForeignHandle, ForeignObject, ForeignPredicate, ForeignResult, RawForeignValue,
};
use llir_runtime::memory::AllocationHandle;
use llir_runtime::runtime::{Address, HostValue, Value};

/// Foreign object answering every query with a fixed value
#[derive(Debug)]
struct Answers(bool);

impl ForeignObject for Answers {
    fn is_boxed(&self) -> bool {
        self.0
    }

    fn is_executable(&self) -> bool {
        self.0
    }

    fn is_null(&self) -> bool {
        self.0
    }

    fn has_size(&self) -> bool {
        self.0
    }
}

fn foreign(object: impl ForeignObject + 'static) -> Value {
    Address::foreign(ForeignHandle::new(object)).into()
}

#[test]
fn test_forwards_answer_of_unmodified_reference() {
    let yes = foreign(Answers(true));
    let no = foreign(Answers(false));

    for predicate in ForeignPredicate::ALL {
        assert!(predicate.execute(&yes).unwrap(), "{} on yes", predicate);
        assert!(!predicate.execute(&no).unwrap(), "{} on no", predicate);
    }
}

#[test]
fn test_other_operands_answer_false() {
    let operands = [
        Value::Address(Address::native(0x1000)),
        Value::Address(Address::native(0)),
        Value::Address(Address::BoxedPrimitive(HostValue::Int(1))),
        Value::Address(Address::virtual_allocation(AllocationHandle::new(4))),
        Value::I32(1),
        Value::Double(0.0),
        Value::Void,
    ];

    for operand in &operands {
        for predicate in ForeignPredicate::ALL {
            assert!(
                !predicate.execute(operand).unwrap(),
                "{} on {:?}",
                predicate,
                operand
            );
        }
    }
}

#[test]
fn test_displaced_reference_is_fatal() {
    let displaced = match foreign(Answers(true)) {
        Value::Address(address) => Value::Address(address.offset_by(8).unwrap()),
        other => other,
    };

    for predicate in ForeignPredicate::ALL {
        let err = predicate.execute(&displaced).unwrap_err();
        assert!(matches!(err, Error::FatalOperand { .. }));
        assert!(err.to_string().contains(predicate.name()));
    }
}

#[test]
fn test_ready_made_objects() {
    let function = foreign(ForeignFunction::new(
        "noop",
        0,
        |_args: &[RawForeignValue]| -> ForeignResult<RawForeignValue> { Ok(RawForeignValue::Null) },
    ));
    let array = foreign(ForeignArray::new(vec![RawForeignValue::Int(1)]));
    let boxed = foreign(ForeignBox::new(RawForeignValue::Int(3)));

    assert!(is_executable(&function).unwrap());
    assert!(!has_size(&function).unwrap());

    assert!(has_size(&array).unwrap());
    assert!(!is_executable(&array).unwrap());

    assert!(is_boxed(&boxed).unwrap());
    assert!(!is_null(&boxed).unwrap());
}
