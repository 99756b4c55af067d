//! Tree-walking interpreter
//!
//! Evaluates a (possibly rewritten) `Program` against a realm's heap. All
//! property traffic goes through the `PropertyResolver`, so the interpreter
//! itself has no knowledge of which keys are reserved; the only place it
//! looks at a key's spelling is the `__proto__:` literal form.

use crate::builtins::{self, Intrinsics};
use crate::error::RuntimeError;
use crate::heap::{Heap, HeapLimits};
use crate::object::{Callable, ObjectData, ObjectKind, Property, Slot};
use crate::reflection::{self, WellKnownSymbols};
use crate::resolver::PropertyResolver;
use crate::scope::{Scope, ScopeRef};
use crate::value::{string_to_number, ObjectId, PropertyKey, Value};
use encap_policy::{DenialPolicy, ReflectionForm, ReservedKey, RuntimeLimits, RuntimeMode};
use encap_syntax::{
    format_number, print_expr, quote_string, AssignOp, BinaryOp, Expr, ExprKind, ForInit,
    FunctionDef, Intrinsic, LogicalOp, MemberProp, Program, PropKey, Stmt, UnaryOp, UpdateOp,
    VarKind,
};
use std::rc::Rc;
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, RuntimeError>;

/// Statement completion
#[derive(Debug, Clone)]
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Evaluation state of one realm
pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) resolver: PropertyResolver,
    pub(crate) intrinsics: Intrinsics,
    global: ScopeRef,
    limits: RuntimeLimits,
    steps: u64,
    depth: usize,
    output: Vec<String>,
}

impl Interpreter {
    /// Create an interpreter with its intrinsics installed
    pub fn new(mode: RuntimeMode, policy: DenialPolicy, limits: RuntimeLimits) -> Result<Self> {
        let mut heap = Heap::new(HeapLimits::from_limits(&limits));
        let symbols = WellKnownSymbols::new(&mut heap);
        let intrinsics = Intrinsics::bootstrap(&mut heap)?;
        let resolver = PropertyResolver::new(mode, policy, symbols, intrinsics.object_prototype);

        let mut interpreter = Self {
            heap,
            resolver,
            intrinsics,
            global: Scope::global(),
            limits,
            steps: 0,
            depth: 0,
            output: Vec::new(),
        };
        builtins::install(&mut interpreter)?;

        debug!(
            "Interpreter ready ({:?}, {:?}): {}",
            mode,
            policy,
            interpreter.heap.stats().format()
        );
        Ok(interpreter)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn resolver(&self) -> &PropertyResolver {
        &self.resolver
    }

    pub fn symbols(&self) -> WellKnownSymbols {
        *self.resolver.symbols()
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Lines written by `console.log`
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn print_line(&mut self, line: String) {
        debug!(target: "encap::console", "{}", line);
        self.output.push(line);
    }

    /// Steps taken by the current run
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Bind a global name
    pub fn define_global(&mut self, name: &str, value: Value) {
        Scope::declare(&self.global, name, value, true);
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.global, name)
    }

    /// Run a program; the result is the value of the last top-level
    /// expression statement
    pub fn run(&mut self, program: &Program) -> Result<Value> {
        self.steps = 0;
        self.depth = 0;
        let global = self.global.clone();
        hoist_vars(&program.body, &global);
        self.hoist_functions(&program.body, &global)?;

        let mut last = Value::Undefined;
        for stmt in &program.body {
            if let Stmt::Expr(expr) = stmt {
                last = self.eval(expr, &global)?;
                continue;
            }
            self.exec(stmt, &global)?;
        }
        trace!("Program finished in {} steps", self.steps);
        Ok(last)
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(RuntimeError::StepLimit {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    // ---- allocation -------------------------------------------------------

    pub(crate) fn alloc(&mut self, data: ObjectData) -> Result<ObjectId> {
        Ok(self.heap.alloc(data)?)
    }

    /// Ordinary object inheriting from `Object.prototype`
    pub fn new_object(&mut self) -> Result<ObjectId> {
        let proto = self.intrinsics.object_prototype;
        self.alloc(ObjectData::ordinary(Some(proto)))
    }

    pub fn new_array(&mut self, elements: Vec<Value>) -> Result<ObjectId> {
        self.heap.charge_elements(elements.len())?;
        let proto = self.intrinsics.array_prototype;
        self.alloc(ObjectData::new(Some(proto), ObjectKind::Array(elements)))
    }

    /// Script function with a fresh `instance_proto` object whose `ctor`
    /// slot points back at the function
    fn new_closure(&mut self, def: &Rc<FunctionDef>, scope: &ScopeRef) -> Result<Value> {
        let f = self.new_function(Callable::Script {
            def: def.clone(),
            scope: scope.clone(),
        })?;
        let instances = self.new_object()?;
        self.heap.get_mut(instances).ctor = Some(Slot {
            value: Value::Object(f),
            enumerable: false,
        });
        self.heap.get_mut(f).instance_proto = Some(Slot {
            value: Value::Object(instances),
            enumerable: false,
        });
        Ok(Value::Object(f))
    }

    /// Named function expressions see their own name
    fn new_function_expression(&mut self, def: &Rc<FunctionDef>, scope: &ScopeRef) -> Result<Value> {
        let Some(name) = &def.name else {
            return self.new_closure(def, scope);
        };
        let own = Scope::block(scope);
        let f = self.new_closure(def, &own)?;
        Scope::declare(&own, name, f.clone(), false);
        Ok(f)
    }

    pub(crate) fn new_function(&mut self, callable: Callable) -> Result<ObjectId> {
        let name = Value::string(callable.name());
        let proto = self.intrinsics.function_prototype;
        let f = self.alloc(ObjectData::new(Some(proto), ObjectKind::Function(callable)))?;
        self.heap
            .get_mut(f)
            .properties
            .insert(PropertyKey::string("name"), Property::hidden(name));
        Ok(f)
    }

    pub fn is_constructor(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|id| {
            self.heap
                .get(id)
                .callable()
                .is_some_and(Callable::is_constructor)
        })
    }

    // ---- conversions ------------------------------------------------------

    /// ToPropertyKey
    pub fn to_property_key(&mut self, value: &Value) -> Result<PropertyKey> {
        match value {
            Value::Symbol(sym) => Ok(PropertyKey::Symbol(*sym)),
            Value::String(s) => Ok(PropertyKey::String(s.clone())),
            other => Ok(PropertyKey::string(self.to_string(other)?)),
        }
    }

    /// ToString; symbols are refused
    pub fn to_string(&mut self, value: &Value) -> Result<String> {
        match value {
            Value::Symbol(_) => Err(RuntimeError::type_error(
                "Cannot convert a Symbol value to a string",
            )),
            Value::Object(id) => self.object_to_string(*id, 0),
            other => Ok(other.primitive_to_string().unwrap_or_default()),
        }
    }

    fn object_to_string(&mut self, id: ObjectId, depth: usize) -> Result<String> {
        let data = self.heap.get(id);
        match &data.kind {
            ObjectKind::Array(elements) => {
                if depth > 8 {
                    return Ok(String::new());
                }
                let elements = elements.clone();
                let mut parts = Vec::with_capacity(elements.len());
                for element in &elements {
                    parts.push(match element {
                        Value::Undefined | Value::Null => String::new(),
                        Value::Object(inner) => self.object_to_string(*inner, depth + 1)?,
                        other => self.to_string(other)?,
                    });
                }
                Ok(parts.join(","))
            }
            ObjectKind::Function(callable) => {
                Ok(format!("function {}() {{ [code] }}", callable.name()))
            }
            ObjectKind::Error => {
                let name = self.get_value(&Value::Object(id), &"name".into())?;
                let message = self.get_value(&Value::Object(id), &"message".into())?;
                let name = self.to_string(&name)?;
                let message = self.to_string(&message)?;
                Ok(if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                })
            }
            ObjectKind::Ordinary => Ok("[object Object]".into()),
        }
    }

    /// ToNumber
    pub fn to_number(&mut self, value: &Value) -> Result<f64> {
        match value {
            Value::Symbol(_) => Err(RuntimeError::type_error(
                "Cannot convert a Symbol value to a number",
            )),
            Value::Object(_) => {
                let s = self.to_string(value)?;
                Ok(string_to_number(&s))
            }
            other => Ok(other.to_number()),
        }
    }

    /// Objects become their string form; primitives pass through
    fn to_primitive(&mut self, value: Value) -> Result<Value> {
        match value {
            Value::Object(_) => Ok(Value::string(self.to_string(&value)?)),
            other => Ok(other),
        }
    }

    pub fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Object(id) if self.heap.is_callable(*id) => "function",
            Value::Object(_) => "object",
            other => other.primitive_type_of().unwrap_or("object"),
        }
    }

    pub fn symbol_descriptive_string(&self, value: &Value) -> Option<String> {
        match value {
            Value::Symbol(sym) => {
                let description = self.heap.symbol(*sym).description.clone();
                Some(format!("Symbol({})", description.as_deref().unwrap_or("")))
            }
            _ => None,
        }
    }

    /// Abstract equality (`==`)
    pub fn loose_equals(&mut self, a: &Value, b: &Value) -> Result<bool> {
        Ok(match (a, b) {
            (x, y) if x.is_nullish() && y.is_nullish() => true,
            (x, y) if x.is_nullish() || y.is_nullish() => false,
            (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
                a.to_number() == b.to_number()
            }
            (Value::Bool(_), _) => self.loose_equals(&Value::Number(a.to_number()), b)?,
            (_, Value::Bool(_)) => self.loose_equals(a, &Value::Number(b.to_number()))?,
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let a = self.to_primitive(a.clone())?;
                self.loose_equals(&a, b)?
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let b = self.to_primitive(b.clone())?;
                self.loose_equals(a, &b)?
            }
            _ => a.strict_equals(b),
        })
    }

    // ---- property access --------------------------------------------------

    /// `value[key]`
    pub fn get_value(&mut self, value: &Value, key: &PropertyKey) -> Result<Value> {
        match value {
            Value::Object(id) => self.resolver.get(&self.heap, *id, key),
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.describe_primitive(value),
                self.describe_key(key)
            ))),
            Value::String(s) => {
                if key.as_str() == Some("length") {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = key.array_index() {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or_default());
                }
                let proto = self.intrinsics.object_prototype;
                self.resolver.get(&self.heap, proto, key)
            }
            _ => {
                let proto = self.intrinsics.object_prototype;
                self.resolver.get(&self.heap, proto, key)
            }
        }
    }

    /// `value[key] = v`
    pub fn set_value(&mut self, value: &Value, key: &PropertyKey, v: Value) -> Result<()> {
        match value {
            Value::Object(id) => self.resolver.set(&mut self.heap, *id, key, v),
            Value::Undefined | Value::Null => Err(RuntimeError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                self.describe_primitive(value),
                self.describe_key(key)
            ))),
            // Writes to primitives are dropped
            _ => Ok(()),
        }
    }

    /// Define an enumerable own data property
    pub fn define(&mut self, id: ObjectId, key: &PropertyKey, value: Value) -> Result<()> {
        self.resolver.define(&mut self.heap, id, key, value, true)
    }

    fn describe_primitive(&self, value: &Value) -> String {
        value.primitive_to_string().unwrap_or_else(|| "object".into())
    }

    fn describe_key(&self, key: &PropertyKey) -> String {
        match key {
            PropertyKey::String(s) => s.to_string(),
            PropertyKey::Symbol(_) => self
                .symbol_descriptive_string(&key.to_value())
                .unwrap_or_default(),
        }
    }

    // ---- calls --------------------------------------------------------------

    /// Call `callee` with `this` and arguments
    pub fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> Result<Value> {
        let Some(callable) = callee
            .as_object()
            .and_then(|id| self.heap.get(id).callable().cloned())
        else {
            return Err(RuntimeError::type_error(format!(
                "{} is not a function",
                self.type_of(callee)
            )));
        };

        if self.depth >= self.limits.max_call_depth {
            return Err(RuntimeError::CallDepth {
                limit: self.limits.max_call_depth,
            });
        }
        self.depth += 1;
        let result = match callable {
            Callable::Native { func, .. } => func(self, &this, &args),
            Callable::Script { def, scope } => self.call_script(&def, &scope, this, args),
        };
        self.depth -= 1;
        result
    }

    fn call_script(
        &mut self,
        def: &FunctionDef,
        closure: &ScopeRef,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value> {
        let scope = Scope::function(closure, this);
        let mut args = args.into_iter();
        for param in &def.params {
            Scope::declare(&scope, param, args.next().unwrap_or_default(), true);
        }
        hoist_vars(&def.body, &scope);
        self.hoist_functions(&def.body, &scope)?;

        for stmt in &def.body {
            match self.exec(stmt, &scope)? {
                Completion::Return(value) => return Ok(value),
                Completion::Normal => {}
                // Rejected by the parser
                Completion::Break | Completion::Continue => break,
            }
        }
        Ok(Value::Undefined)
    }

    /// `new callee(args…)`
    pub fn construct(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        let id = match callee {
            Value::Object(id) if self.is_constructor(callee) => *id,
            _ => {
                return Err(RuntimeError::type_error(format!(
                    "{} is not a constructor",
                    self.type_of(callee)
                )))
            }
        };

        if let Some(Callable::Native { .. }) = self.heap.get(id).callable() {
            let result = self.call(callee, Value::Undefined, args)?;
            return match result {
                Value::Object(_) => Ok(result),
                _ => Ok(Value::Object(self.new_object()?)),
            };
        }

        let proto = match reflection::get_slot(&self.heap, id, ReflectionForm::InstanceProto) {
            Value::Object(p) => p,
            _ => self.intrinsics.object_prototype,
        };
        let instance = Value::Object(self.alloc(ObjectData::ordinary(Some(proto)))?);
        let result = self.call(callee, instance.clone(), args)?;
        Ok(match result {
            Value::Object(_) => result,
            _ => instance,
        })
    }

    // ---- errors -------------------------------------------------------------

    /// The value a `catch` clause binds for an error
    pub fn error_value(&mut self, err: RuntimeError) -> Result<Value> {
        if let RuntimeError::Thrown(value) = err {
            return Ok(value);
        }
        let proto = self.intrinsics.error_prototype_for(err.error_name());
        let message = err.message();
        let id = self.make_error(proto, &message)?;
        if let RuntimeError::PolicyViolation { key, op } = err {
            let properties = &mut self.heap.get_mut(id).properties;
            properties.insert(
                "reservedKey".into(),
                Property::hidden(Value::string(key.as_str())),
            );
            properties.insert(
                "operation".into(),
                Property::hidden(Value::string(op.to_string())),
            );
        }
        Ok(Value::Object(id))
    }

    pub(crate) fn make_error(&mut self, proto: ObjectId, message: &str) -> Result<ObjectId> {
        let id = self.alloc(ObjectData::new(Some(proto), ObjectKind::Error))?;
        self.heap
            .get_mut(id)
            .properties
            .insert("message".into(), Property::hidden(Value::string(message)));
        Ok(id)
    }

    // ---- display ------------------------------------------------------------

    /// `console.log` rendering
    pub fn display(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.to_string(),
            other => self.inspect(other, 0),
        }
    }

    fn inspect(&self, value: &Value, depth: usize) -> String {
        let id = match value {
            Value::String(s) => return quote_string(s),
            Value::Number(n) => return format_number(*n),
            Value::Symbol(_) => return self.symbol_descriptive_string(value).unwrap_or_default(),
            Value::Object(id) => *id,
            other => return other.primitive_to_string().unwrap_or_default(),
        };
        let data = self.heap.get(id);
        match &data.kind {
            ObjectKind::Function(callable) => match callable.name() {
                "" => "[Function (anonymous)]".into(),
                name => format!("[Function: {}]", name),
            },
            ObjectKind::Error => {
                let name = PropertyResolver::ordinary_get(&self.heap, id, &"name".into());
                let message = PropertyResolver::ordinary_get(&self.heap, id, &"message".into());
                format!(
                    "{}: {}",
                    self.display(&name),
                    self.display(&message)
                )
            }
            ObjectKind::Array(elements) => {
                if depth > 2 {
                    return "[Array]".into();
                }
                let items: Vec<String> = elements
                    .iter()
                    .map(|element| self.inspect(element, depth + 1))
                    .collect();
                format!("[{}]", items.join(", "))
            }
            ObjectKind::Ordinary => {
                if depth > 2 {
                    return "[Object]".into();
                }
                let keys = self.resolver.own_enumerable_keys(&self.heap, id);
                if keys.is_empty() {
                    return "{}".into();
                }
                let entries: Vec<String> = keys
                    .iter()
                    .map(|key| {
                        let value = self.peek_own(id, key);
                        format!("{}: {}", key, self.inspect(&value, depth + 1))
                    })
                    .collect();
                format!("{{ {} }}", entries.join(", "))
            }
        }
    }

    /// Own value for a key listed by enumeration, without recording denials
    fn peek_own(&self, id: ObjectId, key: &str) -> Value {
        let data = self.heap.get(id);
        let slot = match ReservedKey::from_key(key) {
            Some(ReservedKey::Prototype) => data.instance_proto.as_ref(),
            Some(ReservedKey::Constructor) => data.ctor.as_ref(),
            _ => None,
        };
        match slot {
            Some(slot) => slot.value.clone(),
            None => data.own_property(&key.into()).unwrap_or_default(),
        }
    }

    // ---- statements ---------------------------------------------------------

    fn hoist_functions(&mut self, body: &[Stmt], scope: &ScopeRef) -> Result<()> {
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                let f = self.new_closure(def, scope)?;
                if let Some(name) = &def.name {
                    Scope::declare(scope, name, f, true);
                }
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, body: &[Stmt], parent: &ScopeRef) -> Result<Completion> {
        let scope = Scope::block(parent);
        self.hoist_functions(body, &scope)?;
        for stmt in body {
            match self.exec(stmt, &scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_declarations(
        &mut self,
        kind: VarKind,
        decls: &[encap_syntax::VarDecl],
        scope: &ScopeRef,
    ) -> Result<()> {
        for decl in decls {
            let value = match &decl.init {
                Some(init) => self.eval(init, scope)?,
                None if kind == VarKind::Var => continue,
                None => Value::Undefined,
            };
            match kind {
                VarKind::Var => {
                    if Scope::assign(scope, &decl.name, value.clone()).is_err() {
                        Scope::declare(scope, &decl.name, value, true);
                    }
                }
                VarKind::Let => Scope::declare(scope, &decl.name, value, true),
                VarKind::Const => Scope::declare(scope, &decl.name, value, false),
            }
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Completion> {
        self.step()?;
        match stmt {
            Stmt::Var(kind, decls) => {
                self.exec_declarations(*kind, decls, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let scope = Scope::block(scope);
                match init {
                    Some(ForInit::Var(kind, decls)) => {
                        self.exec_declarations(*kind, decls, &scope)?
                    }
                    Some(ForInit::Expr(e)) => {
                        self.eval(e, &scope)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec(body, &scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::ForIn {
                kind,
                name,
                object,
                body,
            } => {
                let object = self.eval(object, scope)?;
                let keys: Vec<Rc<str>> = match &object {
                    Value::Object(id) => self.resolver.enumerate(&self.heap, *id),
                    Value::String(s) => (0..s.chars().count())
                        .map(|i| Rc::from(i.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                for key in keys {
                    let iteration = Scope::block(scope);
                    let key = Value::String(key);
                    match kind {
                        Some(VarKind::Let) => Scope::declare(&iteration, name, key, true),
                        Some(VarKind::Const) => Scope::declare(&iteration, name, key, false),
                        Some(VarKind::Var) | None => {
                            if Scope::assign(scope, name, key.clone()).is_err() {
                                if kind.is_none() {
                                    return Err(RuntimeError::Reference(name.clone()));
                                }
                                Scope::declare(scope, name, key, true);
                            }
                        }
                    }
                    match self.exec(body, &iteration)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Throw(e) => {
                let value = self.eval(e, scope)?;
                Err(RuntimeError::Thrown(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, scope);
                if let Some(handler) = handler {
                    result = match result {
                        Err(err) if err.is_catchable() => {
                            let value = self.error_value(err)?;
                            let catch_scope = Scope::block(scope);
                            if let Some(param) = param {
                                Scope::declare(&catch_scope, param, value, true);
                            }
                            self.exec_block(handler, &catch_scope)
                        }
                        other => other,
                    };
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, scope)? {
                        Completion::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                result
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::Expr(e) => {
                self.eval(e, scope)?;
                Ok(Completion::Normal)
            }
        }
    }

    // ---- expressions --------------------------------------------------------

    fn member_key(&mut self, property: &MemberProp, scope: &ScopeRef) -> Result<PropertyKey> {
        match property {
            MemberProp::Named(name) => Ok(PropertyKey::string(name)),
            MemberProp::Computed(expr) => {
                let key = self.eval(expr, scope)?;
                self.to_property_key(&key)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> Result<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg, scope)).collect()
    }

    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        self.step()?;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::string(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Ident(name) => {
                Scope::lookup(scope, name).ok_or_else(|| RuntimeError::Reference(name.clone()))
            }
            ExprKind::This => Ok(Scope::this_value(scope)),
            ExprKind::Intrinsic(Intrinsic::Symbol(form)) => {
                Ok(Value::Symbol(self.resolver.symbols().symbol_for(*form)))
            }
            ExprKind::Intrinsic(Intrinsic::GetPrototypeOf) => {
                Ok(Value::Object(self.intrinsics.get_prototype_of))
            }
            ExprKind::Array(elements) => {
                let values = self.eval_args(elements, scope)?;
                Ok(Value::Object(self.new_array(values)?))
            }
            ExprKind::Object(properties) => self.eval_object(properties, scope),
            ExprKind::Function(def) => self.new_function_expression(def, scope),
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                self.get_value(&object, &key)
            }
            ExprKind::Call { callee, args } => {
                let (function, this) = match &callee.kind {
                    ExprKind::Member { object, property } => {
                        let object = self.eval(object, scope)?;
                        let key = self.member_key(property, scope)?;
                        (self.get_value(&object, &key)?, object)
                    }
                    _ => (self.eval(callee, scope)?, Value::Undefined),
                };
                let args = self.eval_args(args, scope)?;
                if !function.as_object().is_some_and(|id| self.heap.is_callable(id)) {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a function",
                        print_expr(callee)
                    )));
                }
                self.call(&function, this, args)
            }
            ExprKind::New { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                if !self.is_constructor(&function) {
                    return Err(RuntimeError::type_error(format!(
                        "{} is not a constructor",
                        print_expr(callee)
                    )));
                }
                self.construct(&function, args)
            }
            ExprKind::Unary { op, argument } => self.eval_unary(*op, argument, scope),
            ExprKind::Update { op, prefix, target } => {
                let ReadTarget { reference, value } = self.read_target(target, scope)?;
                let old = self.to_number(&value)?;
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.write_target(reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, left, right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            ExprKind::Assign { op, target, value } => {
                if *op == AssignOp::Assign {
                    let reference = self.resolve_reference(target, scope)?;
                    let value = self.eval(value, scope)?;
                    self.write_target(reference, value.clone(), scope)?;
                    return Ok(value);
                }
                let old = self.read_target(target, scope)?;
                let rhs = self.eval(value, scope)?;
                let op = match op {
                    AssignOp::AddAssign => BinaryOp::Add,
                    _ => BinaryOp::Sub,
                };
                let value = self.binary(op, old.value, rhs)?;
                self.write_target(old.reference, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
        }
    }

    fn eval_object(
        &mut self,
        properties: &[encap_syntax::Property],
        scope: &ScopeRef,
    ) -> Result<Value> {
        let id = self.new_object()?;
        for property in properties {
            let key = match &property.key {
                PropKey::Ident(name) | PropKey::Str(name) => {
                    // `{ __proto__: p }` sets [[Prototype]] in legacy realms
                    if name == ReservedKey::Proto.as_str() && !self.resolver.mode().is_enabled() {
                        let value = self.eval(&property.value, scope)?;
                        if let Some(proto) = reflection::as_prototype(&value) {
                            reflection::set_prototype_of(&mut self.heap, id, proto)?;
                        }
                        continue;
                    }
                    PropertyKey::string(name)
                }
                PropKey::Number(n) => PropertyKey::string(format_number(*n)),
                PropKey::Computed(expr) => {
                    let key = self.eval(expr, scope)?;
                    self.to_property_key(&key)?
                }
            };
            let value = self.eval(&property.value, scope)?;
            self.define(id, &key, value)?;
        }
        Ok(Value::Object(id))
    }

    fn eval_unary(&mut self, op: UnaryOp, argument: &Expr, scope: &ScopeRef) -> Result<Value> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Ident(name) = &argument.kind {
                    if Scope::lookup(scope, name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.eval(argument, scope)?;
                Ok(Value::string(self.type_of(&value)))
            }
            UnaryOp::Delete => match &argument.kind {
                ExprKind::Member { object, property } => {
                    let object = self.eval(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    match object {
                        Value::Object(id) => {
                            Ok(Value::Bool(self.resolver.delete(&mut self.heap, id, &key)?))
                        }
                        ref v if v.is_nullish() => Err(RuntimeError::type_error(format!(
                            "Cannot convert {} to object",
                            self.describe_primitive(v)
                        ))),
                        _ => Ok(Value::Bool(true)),
                    }
                }
                ExprKind::Ident(_) => Ok(Value::Bool(false)),
                _ => {
                    self.eval(argument, scope)?;
                    Ok(Value::Bool(true))
                }
            },
            UnaryOp::Not => Ok(Value::Bool(!self.eval(argument, scope)?.truthy())),
            UnaryOp::Neg => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOp::Void => {
                self.eval(argument, scope)?;
                Ok(Value::Undefined)
            }
        }
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        let number = |n: f64| -> Result<Value> { Ok(Value::Number(n)) };
        match op {
            BinaryOp::Add => {
                let left = self.to_primitive(left)?;
                let right = self.to_primitive(right)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let left = self.to_string(&left)?;
                    let right = self.to_string(&right)?;
                    self.heap.charge(left.len() + right.len())?;
                    let mut s = String::with_capacity(left.len() + right.len());
                    s.push_str(&left);
                    s.push_str(&right);
                    return Ok(Value::string(s));
                }
                number(self.to_number(&left)? + self.to_number(&right)?)
            }
            BinaryOp::Sub => number(self.to_number(&left)? - self.to_number(&right)?),
            BinaryOp::Mul => number(self.to_number(&left)? * self.to_number(&right)?),
            BinaryOp::Div => number(self.to_number(&left)? / self.to_number(&right)?),
            BinaryOp::Rem => number(self.to_number(&left)? % self.to_number(&right)?),
            BinaryOp::StrictEq => Ok(Value::Bool(left.strict_equals(&right))),
            BinaryOp::StrictNotEq => Ok(Value::Bool(!left.strict_equals(&right))),
            BinaryOp::Eq => Ok(Value::Bool(self.loose_equals(&left, &right)?)),
            BinaryOp::NotEq => Ok(Value::Bool(!self.loose_equals(&left, &right)?)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                self.compare(op, left, right)
            }
            BinaryOp::In => {
                let Value::Object(id) = right else {
                    return Err(RuntimeError::type_error(
                        "Cannot use 'in' operator to search for a key in a non-object",
                    ));
                };
                let key = self.to_property_key(&left)?;
                Ok(Value::Bool(self.resolver.has(&self.heap, id, &key)))
            }
            BinaryOp::Instanceof => self.instance_of(&left, &right).map(Value::Bool),
        }
    }

    fn compare(&mut self, op: BinaryOp, left: Value, right: Value) -> Result<Value> {
        let left = self.to_primitive(left)?;
        let right = self.to_primitive(right)?;
        let ordering = match (&left, &right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.to_number(&left)?;
                let b = self.to_number(&right)?;
                a.partial_cmp(&b)
            }
        };
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        Ok(Value::Bool(match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::LtEq => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            _ => ordering.is_ge(),
        }))
    }

    /// `value instanceof F`, via `F`'s `instance_proto` slot
    pub fn instance_of(&mut self, value: &Value, target: &Value) -> Result<bool> {
        let Some(f) = target.as_object().filter(|id| self.heap.is_callable(*id)) else {
            return Err(RuntimeError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        let Value::Object(proto) = reflection::get_slot(&self.heap, f, ReflectionForm::InstanceProto)
        else {
            return Err(RuntimeError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        let Some(id) = value.as_object() else {
            return Ok(false);
        };
        Ok(self
            .heap
            .prototype_of(id)
            .is_some_and(|start| self.heap.chain_contains(start, proto)))
    }

    // ---- references -----------------------------------------------------------

    fn resolve_reference(&mut self, target: &Expr, scope: &ScopeRef) -> Result<Reference> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Reference::Binding(name.clone())),
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property(object, key))
            }
            _ => Err(RuntimeError::type_error("Invalid assignment target")),
        }
    }

    fn read_target(&mut self, target: &Expr, scope: &ScopeRef) -> Result<ReadTarget> {
        let reference = self.resolve_reference(target, scope)?;
        let value = match &reference {
            Reference::Binding(name) => Scope::lookup(scope, name)
                .ok_or_else(|| RuntimeError::Reference(name.clone()))?,
            Reference::Property(object, key) => self.get_value(object, key)?,
        };
        Ok(ReadTarget { reference, value })
    }

    fn write_target(&mut self, reference: Reference, value: Value, scope: &ScopeRef) -> Result<()> {
        match reference {
            Reference::Binding(name) => Scope::assign(scope, &name, value),
            Reference::Property(object, key) => self.set_value(&object, &key, value),
        }
    }
}

/// Assignment target after evaluating its object and key
enum Reference {
    Binding(String),
    Property(Value, PropertyKey),
}

struct ReadTarget {
    reference: Reference,
    value: Value,
}

/// Declare every `var` in a function body, without entering nested
/// functions
fn hoist_vars(body: &[Stmt], scope: &ScopeRef) {
    for stmt in body {
        hoist_stmt(stmt, scope);
    }
}

fn hoist_stmt(stmt: &Stmt, scope: &ScopeRef) {
    match stmt {
        Stmt::Var(VarKind::Var, decls)
        | Stmt::For {
            init: Some(ForInit::Var(VarKind::Var, decls)),
            ..
        } => {
            for decl in decls {
                Scope::declare_var(scope, &decl.name);
            }
            if let Stmt::For { body, .. } = stmt {
                hoist_stmt(body, scope);
            }
        }
        Stmt::ForIn { kind, name, body, .. } => {
            if *kind == Some(VarKind::Var) {
                Scope::declare_var(scope, name);
            }
            hoist_stmt(body, scope);
        }
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            hoist_stmt(consequent, scope);
            if let Some(alternate) = alternate {
                hoist_stmt(alternate, scope);
            }
        }
        Stmt::While { body, .. } | Stmt::For { body, .. } => hoist_stmt(body, scope),
        Stmt::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            hoist_vars(block, scope);
            for body in [handler, finalizer].into_iter().flatten() {
                hoist_vars(body, scope);
            }
        }
        Stmt::Block(body) => hoist_vars(body, scope),
        _ => {}
    }
}
