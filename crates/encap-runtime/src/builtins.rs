//! Built-in objects
//!
//! | Global | Members |
//! |--------|---------|
//! | `Object` | `keys`, `values`, `entries`, `assign`, `create`, `getPrototypeOf`, `setPrototypeOf`, `defineProperty`, `getOwnPropertyNames`, `hasOwn`; `prototype.hasOwnProperty`, `prototype.toString` |
//! | `Function.prototype` | `call`, `apply` |
//! | `Array` | `isArray`; `prototype.push`, `pop`, `join`, `indexOf`, `includes`, `slice`, `forEach`, `map`, `filter` |
//! | `Reflect` | `getPrototypeOf`, `setPrototypeOf`, `has`, `get`, `set`, `deleteProperty`, `ownKeys` |
//! | `Symbol` | callable; `proto`, `instanceProto`, `ctor` |
//! | `JSON` | `parse`, `stringify` |
//! | `String`, `Number` | conversion functions |
//! | `Error`, `TypeError`, `ReferenceError`, `RangeError`, `SyntaxError` | constructors |
//! | `console` | `log`, `error` |
//!
//! Constructor/prototype pairs are linked through the `instance_proto` and
//! `ctor` slots, never through string-keyed properties.

use crate::error::RuntimeError;
use crate::heap::{Heap, HeapError};
use crate::interpreter::Interpreter;
use crate::json;
use crate::object::{Callable, NativeFn, ObjectData, ObjectKind, Property, Slot};
use crate::reflection;
use crate::resolver::MAX_ARRAY_LENGTH;
use crate::value::{ObjectId, PropertyKey, Value};
use tracing::warn;

type Result<T> = std::result::Result<T, RuntimeError>;

/// Objects the interpreter refers to directly
#[derive(Debug, Clone, Copy)]
pub struct Intrinsics {
    pub object_prototype: ObjectId,
    pub function_prototype: ObjectId,
    pub array_prototype: ObjectId,
    pub error_prototype: ObjectId,
    pub type_error_prototype: ObjectId,
    pub reference_error_prototype: ObjectId,
    pub range_error_prototype: ObjectId,
    pub syntax_error_prototype: ObjectId,
    /// `Object.getPrototypeOf`, which rewritten code calls directly
    pub get_prototype_of: ObjectId,
}

impl Intrinsics {
    /// Allocate the intrinsic prototypes
    pub fn bootstrap(heap: &mut Heap) -> std::result::Result<Self, HeapError> {
        let object_prototype = heap.alloc(ObjectData::ordinary(None))?;
        let function_prototype = heap.alloc(ObjectData::ordinary(Some(object_prototype)))?;
        let array_prototype = heap.alloc(ObjectData::ordinary(Some(object_prototype)))?;
        let error_prototype = heap.alloc(ObjectData::ordinary(Some(object_prototype)))?;

        let mut error_subclass = |name: &str| -> std::result::Result<ObjectId, HeapError> {
            let proto = heap.alloc(ObjectData::ordinary(Some(error_prototype)))?;
            heap.get_mut(proto)
                .properties
                .insert("name".into(), Property::hidden(Value::string(name)));
            Ok(proto)
        };
        let type_error_prototype = error_subclass("TypeError")?;
        let reference_error_prototype = error_subclass("ReferenceError")?;
        let range_error_prototype = error_subclass("RangeError")?;
        let syntax_error_prototype = error_subclass("SyntaxError")?;

        let base = &mut heap.get_mut(error_prototype).properties;
        base.insert("name".into(), Property::hidden(Value::string("Error")));
        base.insert("message".into(), Property::hidden(Value::string("")));

        let get_prototype_of = heap.alloc(ObjectData::new(
            Some(function_prototype),
            ObjectKind::Function(Callable::Native {
                name: "getPrototypeOf",
                func: object_get_prototype_of,
                constructor: false,
            }),
        ))?;
        heap.get_mut(get_prototype_of).properties.insert(
            "name".into(),
            Property::hidden(Value::string("getPrototypeOf")),
        );

        Ok(Self {
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            type_error_prototype,
            reference_error_prototype,
            range_error_prototype,
            syntax_error_prototype,
            get_prototype_of,
        })
    }

    /// Prototype for errors of the named constructor
    pub fn error_prototype_for(&self, name: &str) -> ObjectId {
        match name {
            "TypeError" => self.type_error_prototype,
            "ReferenceError" => self.reference_error_prototype,
            "RangeError" => self.range_error_prototype,
            "SyntaxError" => self.syntax_error_prototype,
            _ => self.error_prototype,
        }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn hidden(interp: &mut Interpreter, target: ObjectId, name: &str, value: Value) {
    interp
        .heap
        .get_mut(target)
        .properties
        .insert(PropertyKey::string(name), Property::hidden(value));
}

fn native(
    interp: &mut Interpreter,
    name: &'static str,
    func: NativeFn,
    constructor: bool,
) -> Result<ObjectId> {
    interp.new_function(Callable::Native {
        name,
        func,
        constructor,
    })
}

fn method(interp: &mut Interpreter, target: ObjectId, name: &'static str, func: NativeFn) -> Result<()> {
    let f = native(interp, name, func, false)?;
    hidden(interp, target, name, Value::Object(f));
    Ok(())
}

/// Link a constructor and its instance prototype through the slots
fn link(heap: &mut Heap, ctor: ObjectId, proto: ObjectId) {
    heap.get_mut(ctor).instance_proto = Some(Slot {
        value: Value::Object(proto),
        enumerable: false,
    });
    heap.get_mut(proto).ctor = Some(Slot {
        value: Value::Object(ctor),
        enumerable: false,
    });
}

fn namespace(interp: &mut Interpreter, name: &str, methods: &[(&'static str, NativeFn)]) -> Result<()> {
    let ns = interp.new_object()?;
    for (method_name, func) in methods {
        method(interp, ns, *method_name, *func)?;
    }
    interp.define_global(name, Value::Object(ns));
    Ok(())
}

/// Install every global into a fresh interpreter
pub fn install(interp: &mut Interpreter) -> Result<()> {
    let intrinsics = interp.intrinsics;

    interp.define_global("undefined", Value::Undefined);
    interp.define_global("NaN", Value::Number(f64::NAN));
    interp.define_global("Infinity", Value::Number(f64::INFINITY));

    // Object
    let object = native(interp, "Object", object_ctor, true)?;
    link(&mut interp.heap, object, intrinsics.object_prototype);
    let statics: [(&'static str, NativeFn); 9] = [
        ("keys", object_keys),
        ("values", object_values),
        ("entries", object_entries),
        ("assign", object_assign),
        ("create", object_create),
        ("setPrototypeOf", object_set_prototype_of),
        ("defineProperty", object_define_property),
        ("getOwnPropertyNames", object_get_own_property_names),
        ("hasOwn", object_has_own),
    ];
    for (name, func) in statics {
        method(interp, object, name, func)?;
    }
    hidden(
        interp,
        object,
        "getPrototypeOf",
        Value::Object(intrinsics.get_prototype_of),
    );
    method(interp, intrinsics.object_prototype, "hasOwnProperty", object_proto_has_own_property)?;
    method(interp, intrinsics.object_prototype, "toString", object_proto_to_string)?;
    interp.define_global("Object", Value::Object(object));

    // Function.prototype
    method(interp, intrinsics.function_prototype, "call", function_proto_call)?;
    method(interp, intrinsics.function_prototype, "apply", function_proto_apply)?;

    // Array
    let array = native(interp, "Array", array_ctor, true)?;
    link(&mut interp.heap, array, intrinsics.array_prototype);
    method(interp, array, "isArray", array_is_array)?;
    let methods: [(&'static str, NativeFn); 9] = [
        ("push", array_push),
        ("pop", array_pop),
        ("join", array_join),
        ("indexOf", array_index_of),
        ("includes", array_includes),
        ("slice", array_slice),
        ("forEach", array_for_each),
        ("map", array_map),
        ("filter", array_filter),
    ];
    for (name, func) in methods {
        method(interp, intrinsics.array_prototype, name, func)?;
    }
    interp.define_global("Array", Value::Object(array));

    // Symbol
    let symbol = native(interp, "Symbol", symbol_fn, false)?;
    let symbols = interp.symbols();
    let well_known = [
        ("proto", symbols.proto),
        ("instanceProto", symbols.instance_proto),
        ("ctor", symbols.ctor),
    ];
    for (name, sym) in well_known {
        interp
            .heap
            .get_mut(symbol)
            .properties
            .insert(PropertyKey::string(name), Property::fixed(Value::Symbol(sym)));
    }
    interp.define_global("Symbol", Value::Object(symbol));

    let string = native(interp, "String", string_fn, false)?;
    interp.define_global("String", Value::Object(string));
    let number = native(interp, "Number", number_fn, false)?;
    interp.define_global("Number", Value::Object(number));

    // Errors
    let errors: [(&'static str, NativeFn, ObjectId); 5] = [
        ("Error", error_ctor, intrinsics.error_prototype),
        ("TypeError", type_error_ctor, intrinsics.type_error_prototype),
        ("ReferenceError", reference_error_ctor, intrinsics.reference_error_prototype),
        ("RangeError", range_error_ctor, intrinsics.range_error_prototype),
        ("SyntaxError", syntax_error_ctor, intrinsics.syntax_error_prototype),
    ];
    for (name, func, proto) in errors {
        let ctor = native(interp, name, func, true)?;
        link(&mut interp.heap, ctor, proto);
        interp.define_global(name, Value::Object(ctor));
    }

    namespace(
        interp,
        "Reflect",
        &[
            ("getPrototypeOf", reflect_get_prototype_of),
            ("setPrototypeOf", reflect_set_prototype_of),
            ("has", reflect_has),
            ("get", reflect_get),
            ("set", reflect_set),
            ("deleteProperty", reflect_delete_property),
            ("ownKeys", reflect_own_keys),
        ],
    )?;
    namespace(
        interp,
        "JSON",
        &[("parse", json_parse), ("stringify", json_stringify)],
    )?;
    namespace(interp, "console", &[("log", console_log), ("error", console_error)])?;

    Ok(())
}

fn require_object(value: &Value, what: &str) -> Result<ObjectId> {
    match value {
        Value::Object(id) => Ok(*id),
        _ => Err(RuntimeError::type_error(format!(
            "{} called on non-object",
            what
        ))),
    }
}

fn prototype_argument(value: &Value) -> Result<Option<ObjectId>> {
    reflection::as_prototype(value).ok_or_else(|| {
        RuntimeError::type_error("Object prototype may only be an Object or null")
    })
}

// ---- Object ------------------------------------------------------------------

fn object_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Object(id) => Ok(Value::Object(id)),
        _ => Ok(Value::Object(interp.new_object()?)),
    }
}

fn object_keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Object.keys")?;
    let keys = interp.resolver.own_enumerable_keys(&interp.heap, id);
    let keys = keys.into_iter().map(Value::String).collect();
    Ok(Value::Object(interp.new_array(keys)?))
}

fn own_entries(interp: &mut Interpreter, id: ObjectId) -> Result<Vec<(Value, Value)>> {
    let keys = interp.resolver.own_enumerable_keys(&interp.heap, id);
    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let value = interp.get_value(&Value::Object(id), &PropertyKey::String(key.clone()))?;
        entries.push((Value::String(key), value));
    }
    Ok(entries)
}

fn object_values(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Object.values")?;
    let values = own_entries(interp, id)?.into_iter().map(|(_, v)| v).collect();
    Ok(Value::Object(interp.new_array(values)?))
}

fn object_entries(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Object.entries")?;
    let mut pairs = Vec::new();
    for (key, value) in own_entries(interp, id)? {
        pairs.push(Value::Object(interp.new_array(vec![key, value])?));
    }
    Ok(Value::Object(interp.new_array(pairs)?))
}

fn object_assign(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    require_object(&target, "Object.assign")?;
    for source in args.iter().skip(1) {
        let Value::Object(id) = source else { continue };
        for (key, value) in own_entries(interp, *id)? {
            let key = interp.to_property_key(&key)?;
            interp.set_value(&target, &key, value)?;
        }
    }
    Ok(target)
}

fn object_create(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = prototype_argument(&arg(args, 0))?;
    Ok(Value::Object(interp.alloc(ObjectData::ordinary(proto))?))
}

fn object_get_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::Object(id) => Ok(reflection::get_prototype_of(&interp.heap, id)),
        v if v.is_nullish() => Err(RuntimeError::type_error(
            "Cannot convert undefined or null to object",
        )),
        _ => Ok(Value::Object(interp.intrinsics.object_prototype)),
    }
}

fn object_set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let proto = prototype_argument(&arg(args, 1))?;
    if let Value::Object(id) = target {
        reflection::set_prototype_of(&mut interp.heap, id, proto)?;
    } else if target.is_nullish() {
        return Err(RuntimeError::type_error(
            "Object.setPrototypeOf called on null or undefined",
        ));
    }
    Ok(target)
}

fn object_define_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let id = require_object(&target, "Object.defineProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let descriptor = arg(args, 2);
    require_object(&descriptor, "Property description")?;
    let value = interp.get_value(&descriptor, &"value".into())?;
    let enumerable = interp.get_value(&descriptor, &"enumerable".into())?.truthy();
    interp
        .resolver
        .define(&mut interp.heap, id, &key, value, enumerable)?;
    Ok(target)
}

fn object_get_own_property_names(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Object.getOwnPropertyNames")?;
    let names = interp
        .resolver
        .own_keys(&interp.heap, id)
        .into_iter()
        .filter(|k| matches!(k, PropertyKey::String(_)))
        .map(|k| k.to_value())
        .collect();
    Ok(Value::Object(interp.new_array(names)?))
}

fn has_own(interp: &mut Interpreter, target: &Value, key: &Value) -> Result<Value> {
    let key = interp.to_property_key(key)?;
    Ok(Value::Bool(match target {
        Value::Object(id) => interp.resolver.has_own(&interp.heap, *id, &key),
        _ => false,
    }))
}

fn object_has_own(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    has_own(interp, &arg(args, 0), &arg(args, 1))
}

fn object_proto_has_own_property(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    has_own(interp, this, &arg(args, 0))
}

fn object_proto_to_string(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Result<Value> {
    let tag = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Object(id) if interp.heap.get(*id).is_array() => "Array",
        Value::Object(id) if interp.heap.is_callable(*id) => "Function",
        _ => "Object",
    };
    Ok(Value::string(format!("[object {}]", tag)))
}

// ---- Function.prototype ------------------------------------------------------

fn function_proto_call(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let rest = args.iter().skip(1).cloned().collect();
    interp.call(this, arg(args, 0), rest)
}

fn function_proto_apply(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let list = match arg(args, 1) {
        Value::Object(id) => interp.heap.get(id).elements().cloned().unwrap_or_default(),
        _ => Vec::new(),
    };
    interp.call(this, arg(args, 0), list)
}

// ---- Array --------------------------------------------------------------------

fn array_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let [Value::Number(n)] = args else {
        return Ok(Value::Object(interp.new_array(args.to_vec())?));
    };
    if *n < 0.0 || n.fract() != 0.0 || *n >= MAX_ARRAY_LENGTH as f64 {
        return Err(RuntimeError::Range("Invalid array length".into()));
    }
    // Charge before the storage exists
    let length = *n as usize;
    interp.heap.charge_elements(length)?;
    let proto = interp.intrinsics.array_prototype;
    let elements = vec![Value::Undefined; length];
    Ok(Value::Object(interp.alloc(ObjectData::new(
        Some(proto),
        ObjectKind::Array(elements),
    ))?))
}

fn array_is_array(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(match arg(args, 0) {
        Value::Object(id) => interp.heap.get(id).is_array(),
        _ => false,
    }))
}

fn this_array(interp: &Interpreter, this: &Value, method: &str) -> Result<(ObjectId, Vec<Value>)> {
    match this {
        Value::Object(id) => match interp.heap.get(*id).elements() {
            Some(elements) => Ok((*id, elements.clone())),
            None => Err(RuntimeError::type_error(format!(
                "Array.prototype.{} called on non-array",
                method
            ))),
        },
        _ => Err(RuntimeError::type_error(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

fn array_push(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let (id, _) = this_array(interp, this, "push")?;
    interp.heap.charge_elements(args.len())?;
    let elements = interp
        .heap
        .get_mut(id)
        .elements_mut()
        .ok_or_else(|| RuntimeError::type_error("Array.prototype.push called on non-array"))?;
    elements.extend(args.iter().cloned());
    Ok(Value::Number(elements.len() as f64))
}

fn array_pop(interp: &mut Interpreter, this: &Value, _args: &[Value]) -> Result<Value> {
    let (id, _) = this_array(interp, this, "pop")?;
    Ok(interp
        .heap
        .get_mut(id)
        .elements_mut()
        .and_then(|elements| elements.pop())
        .unwrap_or_default())
}

fn array_join(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let (_, elements) = this_array(interp, this, "join")?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => interp.to_string(&other)?,
    };
    let mut parts = Vec::with_capacity(elements.len());
    for element in &elements {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => interp.to_string(other)?,
        });
    }
    let length = parts.iter().map(String::len).sum::<usize>()
        + separator.len().saturating_mul(parts.len().saturating_sub(1));
    interp.heap.charge(length)?;
    Ok(Value::string(parts.join(&separator)))
}

fn array_index_of(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let (_, elements) = this_array(interp, this, "indexOf")?;
    let needle = arg(args, 0);
    Ok(Value::Number(
        elements
            .iter()
            .position(|e| e.strict_equals(&needle))
            .map(|i| i as f64)
            .unwrap_or(-1.0),
    ))
}

fn array_includes(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let (_, elements) = this_array(interp, this, "includes")?;
    let needle = arg(args, 0);
    Ok(Value::Bool(elements.iter().any(|e| {
        e.strict_equals(&needle)
            || matches!((e, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
    })))
}

fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    let n = match value {
        Value::Undefined => return default,
        other => other.to_number(),
    };
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

fn array_slice(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let (_, elements) = this_array(interp, this, "slice")?;
    let len = elements.len();
    let start = relative_index(&arg(args, 0), len, 0);
    let end = relative_index(&arg(args, 1), len, len);
    let slice = if start < end {
        elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::Object(interp.new_array(slice)?))
}

fn for_each_element(
    interp: &mut Interpreter,
    this: &Value,
    args: &[Value],
    method: &str,
    mut visit: impl FnMut(&mut Interpreter, Value, Value) -> Result<()>,
) -> Result<()> {
    let (_, elements) = this_array(interp, this, method)?;
    let callback = arg(args, 0);
    for (index, element) in elements.into_iter().enumerate() {
        let result = interp.call(
            &callback,
            Value::Undefined,
            vec![element.clone(), Value::Number(index as f64), this.clone()],
        )?;
        visit(interp, element, result)?;
    }
    Ok(())
}

fn array_for_each(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    for_each_element(interp, this, args, "forEach", |_, _, _| Ok(()))?;
    Ok(Value::Undefined)
}

fn array_map(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let mut mapped = Vec::new();
    for_each_element(interp, this, args, "map", |_, _, result| {
        mapped.push(result);
        Ok(())
    })?;
    Ok(Value::Object(interp.new_array(mapped)?))
}

fn array_filter(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Result<Value> {
    let mut kept = Vec::new();
    for_each_element(interp, this, args, "filter", |_, element, result| {
        if result.truthy() {
            kept.push(element);
        }
        Ok(())
    })?;
    Ok(Value::Object(interp.new_array(kept)?))
}

// ---- Symbol, String, Number ----------------------------------------------------

fn symbol_fn(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let description = match arg(args, 0) {
        Value::Undefined => None,
        other => Some(interp.to_string(&other)?),
    };
    Ok(Value::Symbol(interp.heap.new_symbol(description.as_deref())))
}

fn string_fn(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let Some(value) = args.first() else {
        return Ok(Value::string(""));
    };
    // Explicit conversion of a symbol yields its description, a plain string
    if let Some(s) = interp.symbol_descriptive_string(value) {
        return Ok(Value::string(s));
    }
    Ok(Value::string(interp.to_string(value)?))
}

fn number_fn(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(value) => Ok(Value::Number(interp.to_number(value)?)),
        None => Ok(Value::Number(0.0)),
    }
}

// ---- Errors -------------------------------------------------------------------

fn new_error(interp: &mut Interpreter, proto: ObjectId, args: &[Value]) -> Result<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        other => interp.to_string(&other)?,
    };
    Ok(Value::Object(interp.make_error(proto, &message)?))
}

fn error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = interp.intrinsics.error_prototype;
    new_error(interp, proto, args)
}

fn type_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = interp.intrinsics.type_error_prototype;
    new_error(interp, proto, args)
}

fn reference_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = interp.intrinsics.reference_error_prototype;
    new_error(interp, proto, args)
}

fn range_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = interp.intrinsics.range_error_prototype;
    new_error(interp, proto, args)
}

fn syntax_error_ctor(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let proto = interp.intrinsics.syntax_error_prototype;
    new_error(interp, proto, args)
}

// ---- Reflect ------------------------------------------------------------------

fn reflect_get_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Reflect.getPrototypeOf")?;
    Ok(reflection::get_prototype_of(&interp.heap, id))
}

fn reflect_set_prototype_of(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Reflect.setPrototypeOf")?;
    let proto = prototype_argument(&arg(args, 1))?;
    Ok(Value::Bool(
        reflection::set_prototype_of(&mut interp.heap, id, proto).is_ok(),
    ))
}

fn reflect_has(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Reflect.has")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(Value::Bool(interp.resolver.has(&interp.heap, id, &key)))
}

fn reflect_get(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    require_object(&target, "Reflect.get")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    interp.get_value(&target, &key)
}

fn reflect_set(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    require_object(&target, "Reflect.set")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    interp.set_value(&target, &key, arg(args, 2))?;
    Ok(Value::Bool(true))
}

fn reflect_delete_property(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Reflect.deleteProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    Ok(Value::Bool(interp.resolver.delete(&mut interp.heap, id, &key)?))
}

fn reflect_own_keys(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let id = require_object(&arg(args, 0), "Reflect.ownKeys")?;
    let keys = interp
        .resolver
        .own_keys(&interp.heap, id)
        .iter()
        .map(PropertyKey::to_value)
        .collect();
    Ok(Value::Object(interp.new_array(keys)?))
}

// ---- JSON ---------------------------------------------------------------------

fn json_parse(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let text = interp.to_string(&arg(args, 0))?;
    json::parse(interp, &text)
}

fn json_stringify(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let indent = match arg(args, 2) {
        Value::Number(n) if n >= 1.0 => n.min(10.0) as usize,
        _ => 0,
    };
    Ok(json::stringify(interp, &arg(args, 0), indent)?
        .map(Value::string)
        .unwrap_or_default())
}

// ---- console ------------------------------------------------------------------

fn format_line(interp: &Interpreter, args: &[Value]) -> String {
    args.iter()
        .map(|value| interp.display(value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn console_log(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let line = format_line(interp, args);
    interp.print_line(line);
    Ok(Value::Undefined)
}

fn console_error(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Result<Value> {
    let line = format_line(interp, args);
    warn!(target: "encap::console", "{}", line);
    interp.print_line(line);
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encap_policy::{DenialPolicy, RuntimeLimits, RuntimeMode};
    use encap_syntax::parse;

    fn run(mode: RuntimeMode, source: &str) -> (Interpreter, Value) {
        let mut interp =
            Interpreter::new(mode, DenialPolicy::Silent, RuntimeLimits::sandbox()).unwrap();
        let value = interp.run(&parse(source).unwrap()).unwrap();
        (interp, value)
    }

    fn display(source: &str) -> String {
        let (interp, value) = run(RuntimeMode::Disabled, source);
        interp.display(&value)
    }

    #[test]
    fn test_constructor_links_use_slots() {
        let (interp, _) = run(RuntimeMode::Disabled, "");
        let object = interp.global("Object").unwrap().as_object().unwrap();
        let proto = interp.intrinsics().object_prototype;

        assert_eq!(
            reflection::get_slot(interp.heap(), object, encap_policy::ReflectionForm::InstanceProto),
            Value::Object(proto)
        );
        assert!(!interp
            .heap()
            .get(proto)
            .properties
            .contains_key(&PropertyKey::string("constructor")));
    }

    #[test]
    fn test_object_statics() {
        assert_eq!(display("Object.keys({ a: 1, b: 2 })"), "[\"a\", \"b\"]");
        assert_eq!(display("Object.values({ a: 1, b: 2 })"), "[1, 2]");
        assert_eq!(display("Object.entries({ a: 1 })"), "[[\"a\", 1]]");
        assert_eq!(display("Object.assign({ a: 1 }, { b: 2 }, null)"), "{ a: 1, b: 2 }");
        assert_eq!(
            display("var o = Object.create(null); Object.getPrototypeOf(o)"),
            "null"
        );
        assert_eq!(
            display("var o = {}; Object.defineProperty(o, 'h', { value: 1 }); [o.h, Object.keys(o).length, Object.getOwnPropertyNames(o).length]"),
            "[1, 0, 1]"
        );
        assert_eq!(display("Object.hasOwn({ a: 1 }, 'a')"), "true");
        assert_eq!(display("Object.prototype.toString.call([])"), "[object Array]");
    }

    #[test]
    fn test_set_prototype_of_validates() {
        let mut interp =
            Interpreter::new(RuntimeMode::Disabled, DenialPolicy::Silent, RuntimeLimits::sandbox())
                .unwrap();
        let err = interp
            .run(&parse("Object.setPrototypeOf({}, 1)").unwrap())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Type(_)));

        let err = interp
            .run(&parse("var a = {}; var b = Object.create(a); Object.setPrototypeOf(a, b)").unwrap())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Type(m) if m.contains("Cyclic")));

        assert_eq!(
            interp
                .run(&parse("var c = {}; Reflect.setPrototypeOf(c, Object.create(c))").unwrap())
                .unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(display("[1, 2, 3].map(function (x) { return x * 2; })"), "[2, 4, 6]");
        assert_eq!(display("[1, 2, 3, 4].filter(function (x) { return x % 2 == 0; })"), "[2, 4]");
        assert_eq!(display("[1, 2, 3].slice(-2)"), "[2, 3]");
        assert_eq!(display("[1, 2, 3].indexOf(3)"), "2");
        assert_eq!(display("[NaN].includes(NaN)"), "true");
        assert_eq!(display("var a = [1]; a.pop(); a.length"), "0");
        assert_eq!(display("new Array(2).length"), "2");
        assert_eq!(
            display("var s = 0; [1, 2].forEach(function (x, i) { s += x * i; }); s"),
            "2"
        );
    }

    #[test]
    fn test_array_and_string_budget() {
        let mut interp =
            Interpreter::new(RuntimeMode::Disabled, DenialPolicy::Silent, RuntimeLimits::sandbox())
                .unwrap();
        for source in [
            "new Array(4294967295)",
            "new Array(16000000)",
            "var a = []; a[16000000] = 1;",
            "var a = []; a.length = 16000000;",
            "var s = 'xxxxxxxxxxxxxxxx'; while (true) { s = s + s; }",
            "var a = []; a[1000] = 1; while (true) { a.join('-'); }",
        ] {
            let err = interp.run(&parse(source).unwrap()).unwrap_err();
            assert!(
                matches!(err, RuntimeError::ByteLimit { .. } | RuntimeError::Range(_)),
                "{:?} for {:?}",
                err,
                source
            );
            assert!(!err.is_catchable() || matches!(err, RuntimeError::Range(_)));
        }
        assert!(interp.heap().stats().bytes <= RuntimeLimits::sandbox().max_bytes);
    }

    #[test]
    fn test_function_call_and_apply() {
        assert_eq!(
            display("function f(a, b) { return this.base + a + b; } [f.call({ base: 1 }, 2, 3), f.apply({ base: 0 }, [4, 5])]"),
            "[6, 9]"
        );
        assert_eq!(
            display("Object.prototype.hasOwnProperty.call({ k: 1 }, 'k')"),
            "true"
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(display("String(new TypeError('bad'))"), "TypeError: bad");
        assert_eq!(
            display("var e = new RangeError('r'); [e instanceof RangeError, e instanceof Error, e.message]"),
            "[true, true, \"r\"]"
        );
    }

    #[test]
    fn test_symbols_are_distinct() {
        assert_eq!(display("Symbol('a') === Symbol('a')"), "false");
        assert_eq!(display("Symbol.ctor === Symbol.ctor"), "true");
        assert_eq!(display("String(Symbol.proto)"), "Symbol(Symbol.proto)");
        assert_eq!(display("typeof Symbol.instanceProto"), "symbol");
    }

    #[test]
    fn test_well_known_symbols_are_fixed() {
        assert_eq!(
            display("var s = Symbol.proto; Symbol.proto = 'x'; Symbol.ctor = undefined; [Symbol.proto === s, typeof Symbol.ctor]"),
            "[true, \"symbol\"]"
        );
        assert_eq!(
            display("[delete Symbol.instanceProto, typeof Symbol.instanceProto]"),
            "[false, \"symbol\"]"
        );

        let mut interp =
            Interpreter::new(RuntimeMode::Disabled, DenialPolicy::Silent, RuntimeLimits::sandbox())
                .unwrap();
        let err = interp
            .run(&parse("Object.defineProperty(Symbol, 'proto', { value: 1 })").unwrap())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Type(m) if m.contains("redefine")));
    }

    #[test]
    fn test_reflect() {
        assert_eq!(
            display("var s = Symbol('k'); var o = { a: 1 }; o[s] = 2; Reflect.ownKeys(o).length"),
            "2"
        );
        assert_eq!(display("Reflect.has({ a: 1 }, 'a')"), "true");
        assert_eq!(
            display("var o = { a: 1 }; Reflect.deleteProperty(o, 'a'); Reflect.get(o, 'a')"),
            "undefined"
        );
    }

    #[test]
    fn test_console_output() {
        let (interp, _) = run(
            RuntimeMode::Disabled,
            "console.log('x', 1, { a: [1, 'b'] }, null); console.error('oops');",
        );
        assert_eq!(
            interp.output(),
            &["x 1 { a: [1, \"b\"] } null".to_string(), "oops".to_string()]
        );
    }
}
