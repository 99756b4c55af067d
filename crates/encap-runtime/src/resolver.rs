//! Property Resolver
//!
//! Every dynamic property operation (get, set, define, delete, has and
//! key enumeration) is funnelled through here. Keys are classified once:
//!
//! | Key | Disabled realm | Enabled realm |
//! |-----|----------------|---------------|
//! | well-known symbol | slot access | slot access |
//! | reserved string | legacy slot semantics | absent; writes denied per policy |
//! | anything else | ordinary lookup | ordinary lookup |
//!
//! In an enabled realm a reserved string key is indistinguishable from a
//! key that was never set: `has` is false, enumeration skips it and a
//! silent-policy get yields `undefined`. Denials are recorded either way.

use crate::error::RuntimeError;
use crate::heap::Heap;
use crate::object::Property;
use crate::reflection::{self, WellKnownSymbols};
use crate::value::{ObjectId, PropertyKey, Value};
use encap_policy::{DenialPolicy, ReflectionForm, ReservedKey, ReservedOp, RuntimeMode};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, warn};

/// Longest array a script may create
pub(crate) const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// A reserved-key access that was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyDenial {
    pub key: ReservedKey,
    pub op: ReservedOp,
}

/// How a property key is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyClass {
    Reflection(ReflectionForm),
    Reserved(ReservedKey),
    Ordinary,
}

/// Realm-wide property resolution
#[derive(Debug)]
pub struct PropertyResolver {
    mode: RuntimeMode,
    policy: DenialPolicy,
    symbols: WellKnownSymbols,
    /// Holder of the legacy `__proto__` accessor
    object_prototype: ObjectId,
    denials: Vec<PolicyDenial>,
}

impl PropertyResolver {
    pub fn new(
        mode: RuntimeMode,
        policy: DenialPolicy,
        symbols: WellKnownSymbols,
        object_prototype: ObjectId,
    ) -> Self {
        Self {
            mode,
            policy,
            symbols,
            object_prototype,
            denials: Vec::new(),
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn policy(&self) -> DenialPolicy {
        self.policy
    }

    pub fn symbols(&self) -> &WellKnownSymbols {
        &self.symbols
    }

    /// Denied accesses so far
    pub fn denials(&self) -> &[PolicyDenial] {
        &self.denials
    }

    fn classify(&self, key: &PropertyKey) -> KeyClass {
        match key {
            PropertyKey::Symbol(sym) => self
                .symbols
                .form_of(*sym)
                .map(KeyClass::Reflection)
                .unwrap_or(KeyClass::Ordinary),
            PropertyKey::String(s) => ReservedKey::from_key(s)
                .map(KeyClass::Reserved)
                .unwrap_or(KeyClass::Ordinary),
        }
    }

    fn deny<T>(&mut self, key: ReservedKey, op: ReservedOp, silent: T) -> Result<T, RuntimeError> {
        self.denials.push(PolicyDenial { key, op });
        match self.policy {
            DenialPolicy::Silent => {
                debug!("Denied {} of '{}'", op, key);
                Ok(silent)
            }
            DenialPolicy::Throw => {
                warn!("Policy violation: {} of '{}'", op, key);
                Err(RuntimeError::PolicyViolation { key, op })
            }
        }
    }

    /// [[Get]]
    pub fn get(
        &mut self,
        heap: &Heap,
        id: ObjectId,
        key: &PropertyKey,
    ) -> Result<Value, RuntimeError> {
        match self.classify(key) {
            KeyClass::Reflection(form) => Ok(reflection::get_slot(heap, id, form)),
            KeyClass::Reserved(reserved) if self.mode.is_enabled() => {
                self.deny(reserved, ReservedOp::Get, Value::Undefined)
            }
            KeyClass::Reserved(ReservedKey::Proto) => Ok(self.legacy_get_proto(heap, id)),
            KeyClass::Reserved(reserved) => {
                Ok(reflection::get_slot(heap, id, reserved.reflection()))
            }
            KeyClass::Ordinary => Ok(Self::ordinary_get(heap, id, key)),
        }
    }

    /// Lookup of a non-reserved key along the prototype chain
    pub fn ordinary_get(heap: &Heap, id: ObjectId, key: &PropertyKey) -> Value {
        let mut current = Some(id);
        while let Some(cur) = current {
            if let Some(value) = heap.get(cur).own_property(key) {
                return value;
            }
            current = heap.prototype_of(cur);
        }
        Value::Undefined
    }

    /// `o.__proto__` read: a shadowing own data property wins, otherwise
    /// the accessor on `Object.prototype` reports [[Prototype]]
    fn legacy_get_proto(&self, heap: &Heap, receiver: ObjectId) -> Value {
        let key = PropertyKey::string(ReservedKey::Proto.as_str());
        let mut current = Some(receiver);
        while let Some(cur) = current {
            if let Some(value) = heap.get(cur).own_property(&key) {
                return value;
            }
            if cur == self.object_prototype {
                return reflection::get_prototype_of(heap, receiver);
            }
            current = heap.prototype_of(cur);
        }
        Value::Undefined
    }

    /// [[Set]]
    pub fn set(
        &mut self,
        heap: &mut Heap,
        id: ObjectId,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match self.classify(key) {
            KeyClass::Reflection(form) => {
                reflection::set_slot(heap, id, form, value, false)?;
                Ok(())
            }
            KeyClass::Reserved(reserved) if self.mode.is_enabled() => {
                self.deny(reserved, ReservedOp::Set, ())
            }
            KeyClass::Reserved(ReservedKey::Proto) => self.legacy_set_proto(heap, id, key, value),
            KeyClass::Reserved(reserved) => {
                reflection::set_slot(heap, id, reserved.reflection(), value, true)?;
                Ok(())
            }
            KeyClass::Ordinary => Self::ordinary_set(heap, id, key, value),
        }
    }

    fn legacy_set_proto(
        &self,
        heap: &mut Heap,
        receiver: ObjectId,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let mut current = Some(receiver);
        while let Some(cur) = current {
            if heap.get(cur).has_own_property(key) {
                break;
            }
            if cur == self.object_prototype {
                // Accessor: objects and null relink, anything else is ignored
                return match reflection::as_prototype(&value) {
                    Some(proto) => reflection::set_prototype_of(heap, receiver, proto),
                    None => Ok(()),
                };
            }
            current = heap.prototype_of(cur);
        }
        Self::ordinary_set(heap, receiver, key, value)
    }

    /// Write an own property, creating it if needed
    pub fn ordinary_set(
        heap: &mut Heap,
        id: ObjectId,
        key: &PropertyKey,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if let Some(len) = heap.get(id).elements().map(Vec::len) {
            if let Some(index) = key.array_index() {
                if index >= MAX_ARRAY_LENGTH {
                    return Err(RuntimeError::Range("Invalid array length".into()));
                }
                if index >= len {
                    Self::resize_elements(heap, id, index + 1)?;
                }
                let slot = heap
                    .get_mut(id)
                    .elements_mut()
                    .and_then(|elements| elements.get_mut(index));
                if let Some(slot) = slot {
                    *slot = value;
                }
                return Ok(());
            }
            if key.as_str() == Some("length") {
                let length = value.to_number();
                if length < 0.0 || length.fract() != 0.0 || length >= MAX_ARRAY_LENGTH as f64 {
                    return Err(RuntimeError::Range("Invalid array length".into()));
                }
                return Self::resize_elements(heap, id, length as usize);
            }
        }
        let data = heap.get_mut(id);
        match data.properties.get_mut(key) {
            Some(existing) if !existing.writable => {
                debug!("Ignored write to read-only property {}", key);
            }
            Some(existing) => existing.value = value,
            None => {
                data.properties
                    .insert(key.clone(), Property::enumerable(value));
            }
        }
        Ok(())
    }

    /// Grow or truncate an array, charging any growth to the byte budget
    fn resize_elements(heap: &mut Heap, id: ObjectId, length: usize) -> Result<(), RuntimeError> {
        let current = heap.get(id).elements().map_or(0, Vec::len);
        if length > current {
            heap.charge_elements(length - current)?;
        }
        if let Some(elements) = heap.get_mut(id).elements_mut() {
            elements.resize(length, Value::Undefined);
        }
        Ok(())
    }

    /// [[DefineOwnProperty]] with a plain data descriptor, as used by
    /// object literals, `JSON.parse` and `Object.defineProperty`
    pub fn define(
        &mut self,
        heap: &mut Heap,
        id: ObjectId,
        key: &PropertyKey,
        value: Value,
        enumerable: bool,
    ) -> Result<(), RuntimeError> {
        match self.classify(key) {
            KeyClass::Reflection(form) => {
                reflection::set_slot(heap, id, form, value, false)?;
                Ok(())
            }
            KeyClass::Reserved(reserved) if self.mode.is_enabled() => {
                self.deny(reserved, ReservedOp::Define, ())
            }
            // A defined `__proto__` is plain data and shadows the accessor
            KeyClass::Reserved(ReservedKey::Proto) | KeyClass::Ordinary => {
                if heap
                    .get(id)
                    .properties
                    .get(key)
                    .is_some_and(|existing| !existing.writable)
                {
                    return Err(RuntimeError::type_error(format!(
                        "Cannot redefine property: {}",
                        key
                    )));
                }
                Self::ordinary_set(heap, id, key, value)?;
                if let Some(property) = heap.get_mut(id).properties.get_mut(key) {
                    property.enumerable = enumerable;
                }
                Ok(())
            }
            KeyClass::Reserved(reserved) => {
                let form = reserved.reflection();
                reflection::delete_slot(heap, id, form);
                reflection::set_slot(heap, id, form, value, enumerable)?;
                Ok(())
            }
        }
    }

    /// [[Delete]]
    pub fn delete(
        &mut self,
        heap: &mut Heap,
        id: ObjectId,
        key: &PropertyKey,
    ) -> Result<bool, RuntimeError> {
        match self.classify(key) {
            KeyClass::Reflection(form) => Ok(reflection::delete_slot(heap, id, form)),
            KeyClass::Reserved(reserved) if self.mode.is_enabled() => {
                self.deny(reserved, ReservedOp::Delete, true)
            }
            KeyClass::Reserved(ReservedKey::Proto) | KeyClass::Ordinary => {
                Ok(Self::ordinary_delete(heap, id, key))
            }
            KeyClass::Reserved(reserved) => {
                Ok(reflection::delete_slot(heap, id, reserved.reflection()))
            }
        }
    }

    fn ordinary_delete(heap: &mut Heap, id: ObjectId, key: &PropertyKey) -> bool {
        let data = heap.get_mut(id);
        if let Some(elements) = data.elements_mut() {
            if let Some(index) = key.array_index() {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return true;
            }
            if key.as_str() == Some("length") {
                return false;
            }
        }
        if data.properties.get(key).is_some_and(|p| !p.writable) {
            return false;
        }
        data.properties.shift_remove(key);
        true
    }

    /// [[HasProperty]] (`key in o`)
    pub fn has(&mut self, heap: &Heap, id: ObjectId, key: &PropertyKey) -> bool {
        match self.classify(key) {
            KeyClass::Reflection(form) => reflection::has_slot(heap, id, form),
            KeyClass::Reserved(reserved) if self.mode.is_enabled() => {
                self.denials.push(PolicyDenial {
                    key: reserved,
                    op: ReservedOp::Has,
                });
                false
            }
            KeyClass::Reserved(ReservedKey::Proto) => {
                heap.chain_contains(id, self.object_prototype) || self.chain_has(heap, id, key)
            }
            KeyClass::Reserved(reserved) => reflection::has_slot(heap, id, reserved.reflection()),
            KeyClass::Ordinary => self.chain_has(heap, id, key),
        }
    }

    fn chain_has(&self, heap: &Heap, id: ObjectId, key: &PropertyKey) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if heap.get(cur).has_own_property(key) {
                return true;
            }
            current = heap.prototype_of(cur);
        }
        false
    }

    /// [[GetOwnProperty]] presence (`hasOwnProperty`)
    pub fn has_own(&self, heap: &Heap, id: ObjectId, key: &PropertyKey) -> bool {
        match self.classify(key) {
            KeyClass::Reflection(form) => reflection::has_own_slot(heap, id, form),
            KeyClass::Reserved(_) if self.mode.is_enabled() => false,
            KeyClass::Reserved(ReservedKey::Proto) => {
                id == self.object_prototype || heap.get(id).has_own_property(key)
            }
            KeyClass::Reserved(reserved) => {
                reflection::has_own_slot(heap, id, reserved.reflection())
            }
            KeyClass::Ordinary => heap.get(id).has_own_property(key),
        }
    }

    /// Own string keys, in order: array indices, properties, then the
    /// legacy slot spellings
    fn own_string_keys(&self, heap: &Heap, id: ObjectId, enumerable_only: bool) -> Vec<Rc<str>> {
        let data = heap.get(id);
        let mut keys: Vec<Rc<str>> = Vec::new();
        if let Some(elements) = data.elements() {
            keys.extend((0..elements.len()).map(|i| Rc::from(i.to_string())));
            if !enumerable_only {
                keys.push(Rc::from("length"));
            }
        }
        for (key, property) in &data.properties {
            if enumerable_only && !property.enumerable {
                continue;
            }
            if let PropertyKey::String(s) = key {
                if self.classify(key) == KeyClass::Ordinary || !self.mode.is_enabled() {
                    keys.push(s.clone());
                }
            }
        }
        if !self.mode.is_enabled() {
            let slots = [
                (ReservedKey::Prototype, &data.instance_proto),
                (ReservedKey::Constructor, &data.ctor),
            ];
            for (reserved, slot) in slots {
                if let Some(slot) = slot {
                    if slot.enumerable || !enumerable_only {
                        keys.push(Rc::from(reserved.as_str()));
                    }
                }
            }
        }
        keys
    }

    /// `Object.keys`, `JSON.stringify`
    pub fn own_enumerable_keys(&self, heap: &Heap, id: ObjectId) -> Vec<Rc<str>> {
        self.own_string_keys(heap, id, true)
    }

    /// `Reflect.ownKeys`: every own key, hidden ones included
    pub fn own_keys(&self, heap: &Heap, id: ObjectId) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = self
            .own_string_keys(heap, id, false)
            .into_iter()
            .map(PropertyKey::String)
            .collect();
        keys.extend(
            heap.get(id)
                .properties
                .keys()
                .filter(|k| matches!(k, PropertyKey::Symbol(_)))
                .cloned(),
        );
        keys
    }

    /// `for…in` keys: enumerable string keys along the chain, each name
    /// once, shadowed names skipped
    pub fn enumerate(&self, heap: &Heap, id: ObjectId) -> Vec<Rc<str>> {
        let mut seen: FxHashSet<Rc<str>> = FxHashSet::default();
        let mut keys = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let visible: FxHashSet<Rc<str>> =
                self.own_enumerable_keys(heap, cur).into_iter().collect();
            for key in self.own_string_keys(heap, cur, false) {
                if seen.insert(key.clone()) && visible.contains(&key) {
                    keys.push(key);
                }
            }
            current = heap.prototype_of(cur);
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapLimits;
    use crate::object::{ObjectData, ObjectKind};
    use crate::value::SymbolId;

    struct Fixture {
        heap: Heap,
        symbols: WellKnownSymbols,
        object_prototype: ObjectId,
    }

    fn fixture() -> Fixture {
        let mut heap = Heap::new(HeapLimits {
            max_objects: 64,
            warn_threshold: 64,
            max_bytes: 1 << 20,
        });
        let symbols = WellKnownSymbols::new(&mut heap);
        let object_prototype = heap.alloc(ObjectData::ordinary(None)).unwrap();
        Fixture {
            heap,
            symbols,
            object_prototype,
        }
    }

    impl Fixture {
        fn resolver(&self, mode: RuntimeMode, policy: DenialPolicy) -> PropertyResolver {
            PropertyResolver::new(mode, policy, self.symbols, self.object_prototype)
        }

        fn object(&mut self) -> ObjectId {
            self.heap
                .alloc(ObjectData::ordinary(Some(self.object_prototype)))
                .unwrap()
        }
    }

    fn key(s: &str) -> PropertyKey {
        PropertyKey::string(s)
    }

    #[test]
    fn test_legacy_proto_accessor() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let o = fx.object();
        let p = fx.object();

        assert_eq!(
            legacy.get(&fx.heap, o, &key("__proto__")).unwrap(),
            Value::Object(fx.object_prototype)
        );
        legacy
            .set(&mut fx.heap, o, &key("__proto__"), Value::Object(p))
            .unwrap();
        assert_eq!(fx.heap.prototype_of(o), Some(p));

        // Primitives are ignored by the accessor
        legacy
            .set(&mut fx.heap, o, &key("__proto__"), Value::Number(1.0))
            .unwrap();
        assert_eq!(fx.heap.prototype_of(o), Some(p));
        assert!(legacy.has(&fx.heap, o, &key("__proto__")));
        assert!(!legacy.has_own(&fx.heap, o, &key("__proto__")));
    }

    #[test]
    fn test_defined_proto_shadows_accessor() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let o = fx.object();
        let payload = fx.object();

        legacy
            .define(&mut fx.heap, o, &key("__proto__"), Value::Object(payload), true)
            .unwrap();

        assert_eq!(fx.heap.prototype_of(o), Some(fx.object_prototype));
        assert_eq!(
            legacy.get(&fx.heap, o, &key("__proto__")).unwrap(),
            Value::Object(payload)
        );
        assert_eq!(
            legacy.own_enumerable_keys(&fx.heap, o),
            vec![Rc::<str>::from("__proto__")]
        );
    }

    #[test]
    fn test_enabled_reserved_keys_are_absent() {
        let mut fx = fixture();
        let mut secure = fx.resolver(RuntimeMode::Enabled, DenialPolicy::Silent);
        let o = fx.object();
        let f = fx.object();
        reflection::set_slot(&mut fx.heap, fx.object_prototype, ReflectionForm::Ctor, f.into(), false)
            .unwrap();

        for reserved in ReservedKey::ALL {
            let k = key(reserved.as_str());
            assert_eq!(secure.get(&fx.heap, o, &k).unwrap(), Value::Undefined);
            assert!(!secure.has(&fx.heap, o, &k));
            assert!(!secure.has_own(&fx.heap, o, &k));
            secure.set(&mut fx.heap, o, &k, Value::Null).unwrap();
            secure.define(&mut fx.heap, o, &k, Value::Null, true).unwrap();
            assert!(secure.delete(&mut fx.heap, o, &k).unwrap());
        }

        assert_eq!(fx.heap.prototype_of(o), Some(fx.object_prototype));
        assert!(fx.heap.get(o).properties.is_empty());
        assert!(secure.own_enumerable_keys(&fx.heap, o).is_empty());
        assert_eq!(secure.denials().len(), 15);
    }

    #[test]
    fn test_throw_policy() {
        let mut fx = fixture();
        let mut secure = fx.resolver(RuntimeMode::Enabled, DenialPolicy::Throw);
        let o = fx.object();

        let err = secure
            .set(&mut fx.heap, o, &key("__proto__"), Value::Null)
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::PolicyViolation {
                key: ReservedKey::Proto,
                op: ReservedOp::Set
            }
        ));
        // Presence checks never throw
        assert!(!secure.has(&fx.heap, o, &key("constructor")));
        assert_eq!(fx.heap.prototype_of(o), Some(fx.object_prototype));
    }

    #[test]
    fn test_symbols_reach_slots_in_both_modes() {
        let mut fx = fixture();
        let f = fx.object();
        let instances = fx.object();
        let sym = |s: SymbolId| PropertyKey::Symbol(s);

        for mode in [RuntimeMode::Disabled, RuntimeMode::Enabled] {
            let mut resolver = fx.resolver(mode, DenialPolicy::Throw);
            resolver
                .set(&mut fx.heap, f, &sym(fx.symbols.instance_proto), instances.into())
                .unwrap();
            assert_eq!(
                resolver
                    .get(&fx.heap, f, &sym(fx.symbols.instance_proto))
                    .unwrap(),
                Value::Object(instances)
            );
            assert_eq!(
                resolver.get(&fx.heap, f, &sym(fx.symbols.proto)).unwrap(),
                Value::Object(fx.object_prototype)
            );
            assert!(resolver.denials().is_empty());
        }
    }

    #[test]
    fn test_legacy_and_reflection_agree() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let f = fx.object();
        let instances = fx.object();
        legacy
            .set(&mut fx.heap, f, &key("prototype"), instances.into())
            .unwrap();
        legacy
            .set(&mut fx.heap, instances, &key("constructor"), f.into())
            .unwrap();
        let o = fx.heap.alloc(ObjectData::ordinary(Some(instances))).unwrap();

        assert_eq!(
            legacy.get(&fx.heap, o, &key("__proto__")).unwrap(),
            reflection::get_prototype_of(&fx.heap, o)
        );
        assert_eq!(
            legacy.get(&fx.heap, o, &key("constructor")).unwrap(),
            reflection::get_slot(&fx.heap, o, ReflectionForm::Ctor)
        );
        assert_eq!(
            legacy.get(&fx.heap, f, &key("prototype")).unwrap(),
            reflection::get_slot(&fx.heap, f, ReflectionForm::InstanceProto)
        );
    }

    #[test]
    fn test_fixed_property_resists_writes() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let o = fx.object();
        fx.heap
            .get_mut(o)
            .properties
            .insert(key("k"), Property::fixed(Value::Bool(true)));

        legacy.set(&mut fx.heap, o, &key("k"), Value::Null).unwrap();
        assert_eq!(legacy.get(&fx.heap, o, &key("k")).unwrap(), Value::Bool(true));
        assert!(legacy
            .define(&mut fx.heap, o, &key("k"), Value::Null, true)
            .is_err());
        assert!(!legacy.delete(&mut fx.heap, o, &key("k")).unwrap());
        assert!(legacy.has_own(&fx.heap, o, &key("k")));
    }

    #[test]
    fn test_array_growth_is_charged() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let a = fx
            .heap
            .alloc(ObjectData::new(None, ObjectKind::Array(Vec::new())))
            .unwrap();

        legacy.set(&mut fx.heap, a, &key("9"), Value::Null).unwrap();
        assert_eq!(fx.heap.stats().bytes, 10 * std::mem::size_of::<Value>());

        // 1 MiB budget, far less than a million elements
        let err = legacy
            .set(&mut fx.heap, a, &key("length"), Value::Number(1_000_000.0))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ByteLimit { .. }));
        let err = legacy
            .set(&mut fx.heap, a, &key("999999"), Value::Null)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ByteLimit { .. }));
        assert_eq!(fx.heap.get(a).elements().map(Vec::len), Some(10));
    }

    #[test]
    fn test_legacy_slot_enumeration() {
        let mut fx = fixture();
        let mut legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let o = fx.object();
        legacy.set(&mut fx.heap, o, &key("a"), Value::Null).unwrap();
        legacy
            .set(&mut fx.heap, o, &key("constructor"), Value::Null)
            .unwrap();

        let keys: Vec<String> = legacy
            .enumerate(&fx.heap, o)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["a", "constructor"]);

        let secure = fx.resolver(RuntimeMode::Enabled, DenialPolicy::Silent);
        assert_eq!(secure.enumerate(&fx.heap, o).len(), 1);
    }

    #[test]
    fn test_enumerate_skips_shadowed_and_hidden() {
        let mut fx = fixture();
        let legacy = fx.resolver(RuntimeMode::Disabled, DenialPolicy::Silent);
        let o = fx.object();
        fx.heap
            .get_mut(fx.object_prototype)
            .properties
            .insert(key("polluted"), Property::enumerable(Value::Bool(true)));
        fx.heap
            .get_mut(fx.object_prototype)
            .properties
            .insert(key("toString"), Property::hidden(Value::Null));
        fx.heap
            .get_mut(o)
            .properties
            .insert(key("toString"), Property::enumerable(Value::Null));

        let keys: Vec<String> = legacy
            .enumerate(&fx.heap, o)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["toString", "polluted"]);
    }
}
