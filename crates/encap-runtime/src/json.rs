//! JSON bridge
//!
//! `JSON.parse` goes through `serde_json` and then builds objects with the
//! resolver's define path, so a `"__proto__"` member becomes plain data in a
//! legacy realm and is refused in an encapsulated one. `JSON.stringify`
//! only sees what key enumeration shows: symbol keys and values never
//! serialise, and neither do reserved keys of an encapsulated realm.

use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::object::ObjectKind;
use crate::value::{ObjectId, PropertyKey, Value};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

type Result<T> = std::result::Result<T, RuntimeError>;

/// Largest integer serialised without a fractional part
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// `JSON.parse(text)`
pub fn parse(interp: &mut Interpreter, text: &str) -> Result<Value> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| RuntimeError::Json(e.to_string()))?;
    from_json(interp, &parsed)
}

fn from_json(interp: &mut Interpreter, value: &serde_json::Value) -> Result<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(from_json(interp, item)?);
            }
            Value::Object(interp.new_array(elements)?)
        }
        serde_json::Value::Object(members) => {
            let id = interp.new_object()?;
            for (key, member) in members {
                let member = from_json(interp, member)?;
                interp.define(id, &PropertyKey::string(key), member)?;
            }
            Value::Object(id)
        }
    })
}

/// `JSON.stringify(value, null, indent)`; `None` when the value has no
/// JSON form (`undefined`, functions, symbols)
pub fn stringify(interp: &mut Interpreter, value: &Value, indent: usize) -> Result<Option<String>> {
    let mut stack = Vec::new();
    let Some(json) = to_json(interp, value, &mut stack)? else {
        return Ok(None);
    };
    if indent == 0 {
        return serde_json::to_string(&json)
            .map(Some)
            .map_err(|e| RuntimeError::Json(e.to_string()));
    }

    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| RuntimeError::Json(e.to_string()))?;
    String::from_utf8(out)
        .map(Some)
        .map_err(|e| RuntimeError::Json(e.to_string()))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn to_json(
    interp: &mut Interpreter,
    value: &Value,
    stack: &mut Vec<ObjectId>,
) -> Result<Option<serde_json::Value>> {
    let id = match value {
        Value::Undefined | Value::Symbol(_) => return Ok(None),
        Value::Null => return Ok(Some(serde_json::Value::Null)),
        Value::Bool(b) => return Ok(Some(serde_json::Value::Bool(*b))),
        Value::Number(n) => return Ok(Some(number_to_json(*n))),
        Value::String(s) => return Ok(Some(serde_json::Value::String(s.to_string()))),
        Value::Object(id) => *id,
    };
    if stack.contains(&id) {
        return Err(RuntimeError::type_error(
            "Converting circular structure to JSON",
        ));
    }

    let kind = interp.heap.get(id).kind.clone();
    stack.push(id);
    let json = match kind {
        ObjectKind::Function(_) => None,
        ObjectKind::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in &elements {
                items.push(to_json(interp, element, stack)?.unwrap_or(serde_json::Value::Null));
            }
            Some(serde_json::Value::Array(items))
        }
        ObjectKind::Ordinary | ObjectKind::Error => {
            let mut members = serde_json::Map::new();
            for key in interp.resolver.own_enumerable_keys(&interp.heap, id) {
                let member = interp.get_value(value, &PropertyKey::String(key.clone()))?;
                if let Some(json) = to_json(interp, &member, stack)? {
                    members.insert(key.to_string(), json);
                }
            }
            Some(serde_json::Value::Object(members))
        }
    };
    stack.pop();
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encap_policy::{DenialPolicy, RuntimeLimits, RuntimeMode};
    use encap_syntax::parse as parse_script;

    fn interpreter(mode: RuntimeMode) -> Interpreter {
        Interpreter::new(mode, DenialPolicy::Silent, RuntimeLimits::sandbox()).unwrap()
    }

    fn run(interp: &mut Interpreter, source: &str) -> Value {
        interp.run(&parse_script(source).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_preserves_order() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        let value = parse(&mut interp, r#"{"b": 1, "a": [true, null, "x"], "c": 1.5}"#).unwrap();
        assert_eq!(interp.display(&value), "{ b: 1, a: [true, null, \"x\"], c: 1.5 }");
    }

    #[test]
    fn test_parse_error() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        assert!(matches!(parse(&mut interp, "{bad"), Err(RuntimeError::Json(_))));
    }

    #[test]
    fn test_stringify_shapes() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        let value = run(
            &mut interp,
            "({ n: 1, f: 0.5, s: 'q\"', u: undefined, fn: function () {}, arr: [undefined, NaN, -0], nested: { ok: true } })",
        );
        assert_eq!(
            stringify(&mut interp, &value, 0).unwrap().unwrap(),
            r#"{"n":1,"f":0.5,"s":"q\"","arr":[null,null,0],"nested":{"ok":true}}"#
        );
        assert_eq!(stringify(&mut interp, &Value::Undefined, 0).unwrap(), None);
    }

    #[test]
    fn test_stringify_indent() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        let value = run(&mut interp, "({ a: [1] })");
        assert_eq!(
            stringify(&mut interp, &value, 2).unwrap().unwrap(),
            "{\n  \"a\": [\n    1\n  ]\n}"
        );
    }

    #[test]
    fn test_stringify_cycle() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        let value = run(&mut interp, "var o = {}; o.self = o; o");
        assert!(matches!(
            stringify(&mut interp, &value, 0),
            Err(RuntimeError::Type(_))
        ));
    }

    #[test]
    fn test_symbols_do_not_serialise() {
        let mut interp = interpreter(RuntimeMode::Enabled);
        let value = run(
            &mut interp,
            "var o = { k: Symbol.ctor, s: String(Symbol.ctor) }; o[Symbol.proto] = null; o[Symbol('x')] = 1; o",
        );
        assert_eq!(
            stringify(&mut interp, &value, 0).unwrap().unwrap(),
            r#"{"s":"Symbol(Symbol.ctor)"}"#
        );
    }

    #[test]
    fn test_legacy_proto_member_is_data() {
        let mut interp = interpreter(RuntimeMode::Disabled);
        let value = parse(&mut interp, r#"{"__proto__": {"polluted": true}, "constructor": 1}"#).unwrap();
        let id = value.as_object().unwrap();

        assert_eq!(
            interp.heap().prototype_of(id),
            Some(interp.intrinsics().object_prototype)
        );
        assert_eq!(
            stringify(&mut interp, &value, 0).unwrap().unwrap(),
            r#"{"__proto__":{"polluted":true},"constructor":1}"#
        );
    }

    #[test]
    fn test_encapsulated_parse_drops_reserved_members() {
        let mut interp = interpreter(RuntimeMode::Enabled);
        let value = parse(
            &mut interp,
            r#"{"__proto__": {"polluted": true}, "constructor": {"prototype": {}}, "ok": 1}"#,
        )
        .unwrap();

        assert_eq!(stringify(&mut interp, &value, 0).unwrap().unwrap(), r#"{"ok":1}"#);
        assert_eq!(interp.resolver().denials().len(), 3);
    }

    #[test]
    fn test_encapsulated_parse_throws_under_throw_policy() {
        let mut interp =
            Interpreter::new(RuntimeMode::Enabled, DenialPolicy::Throw, RuntimeLimits::sandbox())
                .unwrap();
        assert!(matches!(
            parse(&mut interp, r#"{"__proto__": {}}"#),
            Err(RuntimeError::PolicyViolation { .. })
        ));
    }
}
