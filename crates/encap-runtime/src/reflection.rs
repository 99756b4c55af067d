//! Reflection API
//!
//! The sanctioned, mode-independent way to reach the prototype slots:
//! `Object.getPrototypeOf`, `Object.setPrototypeOf` and the three
//! well-known symbols `Symbol.proto`, `Symbol.instanceProto` and
//! `Symbol.ctor`. Symbols cannot be produced from strings, so untrusted
//! data never names these slots.

use crate::error::RuntimeError;
use crate::heap::Heap;
use crate::object::Slot;
use crate::value::{ObjectId, SymbolId, Value};
use encap_policy::ReflectionForm;

/// The realm's slot-granting symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownSymbols {
    pub proto: SymbolId,
    pub instance_proto: SymbolId,
    pub ctor: SymbolId,
}

impl WellKnownSymbols {
    pub fn new(heap: &mut Heap) -> Self {
        let mut make = |form: ReflectionForm| {
            heap.new_symbol(Some(&format!("Symbol.{}", form.symbol_name())))
        };
        Self {
            proto: make(ReflectionForm::PrototypeOf),
            instance_proto: make(ReflectionForm::InstanceProto),
            ctor: make(ReflectionForm::Ctor),
        }
    }

    /// Which slot a symbol grants, if any
    pub fn form_of(&self, symbol: SymbolId) -> Option<ReflectionForm> {
        if symbol == self.proto {
            Some(ReflectionForm::PrototypeOf)
        } else if symbol == self.instance_proto {
            Some(ReflectionForm::InstanceProto)
        } else if symbol == self.ctor {
            Some(ReflectionForm::Ctor)
        } else {
            None
        }
    }

    pub fn symbol_for(&self, form: ReflectionForm) -> SymbolId {
        match form {
            ReflectionForm::PrototypeOf => self.proto,
            ReflectionForm::InstanceProto => self.instance_proto,
            ReflectionForm::Ctor => self.ctor,
        }
    }
}

/// `Object.getPrototypeOf`
pub fn get_prototype_of(heap: &Heap, id: ObjectId) -> Value {
    heap.prototype_of(id).map(Value::Object).unwrap_or(Value::Null)
}

/// `Object.setPrototypeOf`; rejects cycles
pub fn set_prototype_of(
    heap: &mut Heap,
    id: ObjectId,
    proto: Option<ObjectId>,
) -> Result<(), RuntimeError> {
    if let Some(p) = proto {
        if heap.chain_contains(p, id) {
            return Err(RuntimeError::type_error("Cyclic __proto__ value"));
        }
    }
    heap.get_mut(id).proto = proto;
    Ok(())
}

/// Converts a value to a prototype target, if it is one
pub fn as_prototype(value: &Value) -> Option<Option<ObjectId>> {
    match value {
        Value::Object(id) => Some(Some(*id)),
        Value::Null => Some(None),
        _ => None,
    }
}

fn slot(heap: &Heap, id: ObjectId, form: ReflectionForm) -> Option<&Slot> {
    let data = heap.get(id);
    match form {
        ReflectionForm::InstanceProto => data.instance_proto.as_ref(),
        ReflectionForm::Ctor => data.ctor.as_ref(),
        ReflectionForm::PrototypeOf => None,
    }
}

fn slot_mut(heap: &mut Heap, id: ObjectId, form: ReflectionForm) -> Option<&mut Option<Slot>> {
    let data = heap.get_mut(id);
    match form {
        ReflectionForm::InstanceProto => Some(&mut data.instance_proto),
        ReflectionForm::Ctor => Some(&mut data.ctor),
        ReflectionForm::PrototypeOf => None,
    }
}

/// Read a slot, following the prototype chain for the inherited slots
pub fn get_slot(heap: &Heap, id: ObjectId, form: ReflectionForm) -> Value {
    if form == ReflectionForm::PrototypeOf {
        return get_prototype_of(heap, id);
    }
    let mut current = Some(id);
    while let Some(cur) = current {
        if let Some(slot) = slot(heap, cur, form) {
            return slot.value.clone();
        }
        current = heap.prototype_of(cur);
    }
    Value::Undefined
}

/// Write a slot on the object itself.
///
/// `[[Prototype]]` writes with a value that is neither an object nor null
/// are ignored and report `false`.
pub fn set_slot(
    heap: &mut Heap,
    id: ObjectId,
    form: ReflectionForm,
    value: Value,
    enumerable: bool,
) -> Result<bool, RuntimeError> {
    if form == ReflectionForm::PrototypeOf {
        return match as_prototype(&value) {
            Some(proto) => set_prototype_of(heap, id, proto).map(|_| true),
            None => Ok(false),
        };
    }
    let Some(slot) = slot_mut(heap, id, form) else {
        return Ok(false);
    };
    match slot {
        Some(existing) => existing.value = value,
        None => *slot = Some(Slot { value, enumerable }),
    }
    Ok(true)
}

/// Clear an own slot; the [[Prototype]] link cannot be deleted
pub fn delete_slot(heap: &mut Heap, id: ObjectId, form: ReflectionForm) -> bool {
    if let Some(slot) = slot_mut(heap, id, form) {
        *slot = None;
    }
    true
}

pub fn has_own_slot(heap: &Heap, id: ObjectId, form: ReflectionForm) -> bool {
    slot(heap, id, form).is_some()
}

/// Is the slot present on the object or an ancestor?
pub fn has_slot(heap: &Heap, id: ObjectId, form: ReflectionForm) -> bool {
    if form == ReflectionForm::PrototypeOf {
        return true;
    }
    let mut current = Some(id);
    while let Some(cur) = current {
        if has_own_slot(heap, cur, form) {
            return true;
        }
        current = heap.prototype_of(cur);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapLimits;
    use crate::object::ObjectData;

    fn heap() -> Heap {
        Heap::new(HeapLimits {
            max_objects: 64,
            warn_threshold: 64,
            max_bytes: 1 << 20,
        })
    }

    #[test]
    fn test_well_known_symbols() {
        let mut heap = heap();
        let symbols = WellKnownSymbols::new(&mut heap);

        assert_eq!(symbols.form_of(symbols.ctor), Some(ReflectionForm::Ctor));
        assert_eq!(symbols.symbol_for(ReflectionForm::PrototypeOf), symbols.proto);
        assert_eq!(
            heap.symbol(symbols.instance_proto).description.as_deref(),
            Some("Symbol.instanceProto")
        );
        let other = heap.new_symbol(Some("Symbol.ctor"));
        assert_eq!(symbols.form_of(other), None);
    }

    #[test]
    fn test_prototype_round_trip() {
        let mut heap = heap();
        let p = heap.alloc(ObjectData::ordinary(None)).unwrap();
        let o = heap.alloc(ObjectData::ordinary(None)).unwrap();

        assert_eq!(get_prototype_of(&heap, o), Value::Null);
        set_prototype_of(&mut heap, o, Some(p)).unwrap();
        assert_eq!(get_prototype_of(&heap, o), Value::Object(p));
    }

    #[test]
    fn test_cycles_rejected() {
        let mut heap = heap();
        let a = heap.alloc(ObjectData::ordinary(None)).unwrap();
        let b = heap.alloc(ObjectData::ordinary(Some(a))).unwrap();

        assert!(set_prototype_of(&mut heap, a, Some(b)).is_err());
        assert!(set_prototype_of(&mut heap, a, Some(a)).is_err());
        assert_eq!(heap.prototype_of(a), None);
    }

    #[test]
    fn test_inherited_slots() {
        let mut heap = heap();
        let proto = heap.alloc(ObjectData::ordinary(None)).unwrap();
        let f = heap.alloc(ObjectData::ordinary(None)).unwrap();
        let child = heap.alloc(ObjectData::ordinary(Some(proto))).unwrap();

        set_slot(&mut heap, proto, ReflectionForm::Ctor, Value::Object(f), false).unwrap();

        assert_eq!(get_slot(&heap, child, ReflectionForm::Ctor), Value::Object(f));
        assert!(has_slot(&heap, child, ReflectionForm::Ctor));
        assert!(!has_own_slot(&heap, child, ReflectionForm::Ctor));

        delete_slot(&mut heap, proto, ReflectionForm::Ctor);
        assert_eq!(get_slot(&heap, child, ReflectionForm::Ctor), Value::Undefined);
    }

    #[test]
    fn test_proto_slot_ignores_primitives() {
        let mut heap = heap();
        let o = heap.alloc(ObjectData::ordinary(None)).unwrap();
        let written =
            set_slot(&mut heap, o, ReflectionForm::PrototypeOf, Value::Number(1.0), true).unwrap();
        assert!(!written);
        assert_eq!(heap.prototype_of(o), None);
    }
}
