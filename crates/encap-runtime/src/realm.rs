//! Realm Management
//!
//! A realm is one isolated global environment: its own heap, intrinsics,
//! resolver and a mode fixed at creation. Every unit evaluated in it goes
//! through the same pipeline:
//!
//! ```text
//! source ─▶ parse ─▶ directive check ─▶ compat scan ─▶ rewrite ─▶ run
//! ```
//!
//! A realm that hits a resource limit is faulted and refuses further work.

use crate::error::RuntimeError;
use crate::heap::HeapStats;
use crate::interpreter::Interpreter;
use crate::resolver::PolicyDenial;
use crate::value::Value;
use encap_policy::{ConfigError, EncapConfig, ModeController, ModeSignal, SignalSource};
use encap_syntax::{
    parse, scan, CompatDiagnostic, ParseError, Program, RewriteRecord, RewrittenSource, Rewriter,
};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Realm state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmState {
    /// Ready to evaluate
    Active,
    /// A resource limit was hit; the realm refuses further work
    Faulted,
}

/// Errors creating a realm
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Realm bootstrap failed: {0}")]
    Bootstrap(#[from] RuntimeError),
}

/// Something a realm noticed while compiling or running code
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RealmDiagnostic {
    /// The unit asked for encapsulation the realm does not provide
    ModeMismatch { source: SignalSource },
    /// A reserved-key access was refused at run time
    PolicyViolation(PolicyDenial),
    /// Construct the rewriter cannot handle
    Compat(CompatDiagnostic),
}

impl fmt::Display for RealmDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeMismatch { source } => write!(
                f,
                "warning: script requests encapsulation but the realm runs in legacy mode (mode source: {})",
                source
            ),
            Self::PolicyViolation(denial) => write!(
                f,
                "denied: {} of '{}' in encapsulation mode",
                denial.op, denial.key
            ),
            Self::Compat(diagnostic) => write!(f, "{}", diagnostic),
        }
    }
}

/// A parsed, rewritten unit ready to run
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub program: Program,
    pub records: Vec<RewriteRecord>,
    pub compat: Vec<CompatDiagnostic>,
}

/// An isolated script environment with a fixed encapsulation mode
pub struct Realm {
    id: u64,
    config: EncapConfig,
    mode: ModeController,
    rewriter: Rewriter,
    interpreter: Interpreter,
    state: RealmState,
    diagnostics: Vec<RealmDiagnostic>,
    created_at: Instant,
}

impl Realm {
    /// Create a realm
    ///
    /// The mode comes from `signal`, falling back to the configuration's
    /// `secure_mode`. With neither present the realm runs in legacy mode.
    pub fn new(id: u64, config: EncapConfig, signal: &ModeSignal) -> Result<Self, RealmError> {
        config.validate()?;
        let signal = ModeSignal::first_present([*signal, config.mode_signal()]);
        Self::with_mode(id, config, ModeController::from_signal(&signal))
    }

    /// Create a realm with an already-resolved mode
    pub fn with_mode(
        id: u64,
        config: EncapConfig,
        mode: ModeController,
    ) -> Result<Self, RealmError> {
        config.validate()?;
        info!(
            "Creating realm {} ({:?}, {:?} denials)",
            id,
            mode.mode(),
            config.denial_policy
        );

        let interpreter = Interpreter::new(mode.mode(), config.denial_policy, config.limits)?;
        Ok(Self {
            id,
            config,
            mode,
            rewriter: Rewriter::new(mode),
            interpreter,
            state: RealmState::Active,
            diagnostics: Vec::new(),
            created_at: Instant::now(),
        })
    }

    /// Legacy realm with the compatible preset
    pub fn legacy(id: u64) -> Result<Self, RealmError> {
        Self::with_mode(id, EncapConfig::compatible(), ModeController::disabled())
    }

    /// Encapsulated realm with the compatible preset
    pub fn secure(id: u64) -> Result<Self, RealmError> {
        Self::with_mode(id, EncapConfig::compatible(), ModeController::enabled())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> ModeController {
        self.mode
    }

    pub fn state(&self) -> RealmState {
        self.state
    }

    pub fn config(&self) -> &EncapConfig {
        &self.config
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Parse, check and rewrite a unit without running it
    pub fn compile(&mut self, source: &str) -> Result<CompiledScript, RuntimeError> {
        let program = parse(source)?;

        if program.requests_encapsulation() && !self.mode.is_secure_mode_enabled() {
            warn!(
                "Realm {}: script requests encapsulation, running in legacy mode",
                self.id
            );
            if self.config.report_mode_mismatch {
                self.diagnostics.push(RealmDiagnostic::ModeMismatch {
                    source: self.mode.source(),
                });
            }
        }

        let compat = scan(&program);
        if self.mode.is_secure_mode_enabled() {
            for finding in compat.iter().filter(|d| d.is_blocking()) {
                warn!("Realm {}: {}", self.id, finding);
                self.diagnostics
                    .push(RealmDiagnostic::Compat(finding.clone()));
            }
        }

        let output = self.rewriter.rewrite(program);
        Ok(CompiledScript {
            program: output.program,
            records: output.records,
            compat,
        })
    }

    /// Run a compiled unit
    pub fn run(&mut self, script: &CompiledScript) -> Result<Value, RuntimeError> {
        if self.state == RealmState::Faulted {
            return Err(RuntimeError::Faulted);
        }

        let result = self.interpreter.run(&script.program);
        if let Err(e) = &result {
            if e.is_resource_limit() {
                warn!("Realm {} faulted: {}", self.id, e);
                self.state = RealmState::Faulted;
            }
        }
        debug!(
            "Realm {}: unit finished after {} steps",
            self.id,
            self.interpreter.steps()
        );
        result
    }

    /// Compile and run a unit
    pub fn evaluate(&mut self, source: &str) -> Result<Value, RuntimeError> {
        if self.state == RealmState::Faulted {
            return Err(RuntimeError::Faulted);
        }
        let script = self.compile(source)?;
        self.run(&script)
    }

    /// Rewrite a unit to source text with this realm's rewriter
    pub fn rewrite_source(&self, source: &str) -> Result<RewrittenSource, ParseError> {
        self.rewriter.rewrite_source(source)
    }

    /// Lines printed by `console`
    pub fn output(&self) -> &[String] {
        self.interpreter.output()
    }

    pub fn take_output(&mut self) -> Vec<String> {
        self.interpreter.take_output()
    }

    /// Everything noticed so far: compile-time findings, then denials
    pub fn diagnostics(&self) -> Vec<RealmDiagnostic> {
        let mut all = self.diagnostics.clone();
        all.extend(
            self.interpreter
                .resolver()
                .denials()
                .iter()
                .copied()
                .map(RealmDiagnostic::PolicyViolation),
        );
        all
    }

    /// Render a value the way `console.log` does
    pub fn display(&self, value: &Value) -> String {
        self.interpreter.display(value)
    }

    /// Render an error escaping the realm
    pub fn describe_error(&self, err: &RuntimeError) -> String {
        match err {
            RuntimeError::Thrown(value) => format!("Uncaught {}", self.display(value)),
            other => format!("Uncaught {}", other),
        }
    }

    pub fn heap_stats(&self) -> &HeapStats {
        self.interpreter.heap().stats()
    }

    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// One-line status
    pub fn summary(&self) -> String {
        format!(
            "Realm {} ({:?}): {} | {} denials",
            self.id,
            self.mode.mode(),
            self.heap_stats().format(),
            self.interpreter.resolver().denials().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encap_policy::{DenialPolicy, RuntimeLimits, RuntimeMode};

    const MERGE: &str = r#"
        function merge(target, source) {
            for (var k in source) {
                if (typeof source[k] === "object" && source[k] !== null &&
                    typeof target[k] === "object" && target[k] !== null) {
                    merge(target[k], source[k]);
                } else {
                    target[k] = source[k];
                }
            }
            return target;
        }
        merge({}, JSON.parse('{"__proto__": {"polluted": true}}'));
        var fresh = {};
        fresh.polluted === true;
    "#;

    fn realm(mode: ModeController, policy: DenialPolicy) -> Realm {
        let mut config = EncapConfig::compatible();
        config.denial_policy = policy;
        config.limits = RuntimeLimits::sandbox();
        Realm::with_mode(1, config, mode).unwrap()
    }

    fn eval(realm: &mut Realm, source: &str) -> String {
        let value = realm.evaluate(source).unwrap();
        realm.display(&value)
    }

    /// Result of `source` in a legacy realm, checked against a secure realm
    /// that throws on any dynamic reserved-key access
    fn same_in_both_modes(source: &str) -> String {
        let mut legacy = realm(ModeController::disabled(), DenialPolicy::Throw);
        let mut secure = realm(ModeController::enabled(), DenialPolicy::Throw);
        let expected = eval(&mut legacy, source);
        assert_eq!(
            expected,
            eval(&mut secure, source),
            "modes disagree on {:?}",
            source
        );
        expected
    }

    #[test]
    fn test_realm_creation() {
        let realm = Realm::legacy(7).unwrap();

        assert_eq!(realm.id(), 7);
        assert_eq!(realm.state(), RealmState::Active);
        assert!(!realm.mode().is_secure_mode_enabled());
        assert!(realm.summary().starts_with("Realm 7 (Disabled)"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EncapConfig::compatible();
        config.limits.max_objects = 1;
        assert!(matches!(
            Realm::new(1, config, &ModeSignal::absent()),
            Err(RealmError::Config(_))
        ));
    }

    #[test]
    fn test_missing_signal_fails_open() {
        let realm = Realm::new(1, EncapConfig::compatible(), &ModeSignal::absent()).unwrap();
        assert_eq!(realm.mode().mode(), RuntimeMode::Disabled);

        let mut config = EncapConfig::compatible();
        config.secure_mode = Some(true);
        let realm = Realm::new(2, config, &ModeSignal::absent()).unwrap();
        assert_eq!(realm.mode().mode(), RuntimeMode::Enabled);
        assert_eq!(realm.mode().source(), SignalSource::Config);
    }

    #[test]
    fn test_signal_overrides_config() {
        let mut config = EncapConfig::compatible();
        config.secure_mode = Some(true);
        let signal = ModeSignal::from_header_value(Some("?0"));

        let realm = Realm::new(1, config, &signal).unwrap();
        assert_eq!(realm.mode().mode(), RuntimeMode::Disabled);
    }

    #[test]
    fn test_merge_pollutes_legacy_realm() {
        let mut realm = realm(ModeController::disabled(), DenialPolicy::Silent);
        assert_eq!(eval(&mut realm, MERGE), "true");
        assert_eq!(eval(&mut realm, "({}).polluted"), "true");
    }

    #[test]
    fn test_merge_cannot_pollute_secure_realm() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        assert_eq!(eval(&mut realm, MERGE), "false");
        assert_eq!(eval(&mut realm, "({}).polluted"), "undefined");
        assert!(realm.diagnostics().iter().any(|d| matches!(
            d,
            RealmDiagnostic::PolicyViolation(PolicyDenial {
                key: encap_policy::ReservedKey::Proto,
                ..
            })
        )));
    }

    #[test]
    fn test_merge_throws_under_throw_policy() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Throw);
        let err = realm.evaluate(MERGE).unwrap_err();

        assert!(matches!(err, RuntimeError::PolicyViolation { .. }));
        assert!(realm.describe_error(&err).starts_with("Uncaught PolicyViolation"));
        assert_eq!(realm.state(), RealmState::Active);
    }

    #[test]
    fn test_policy_violation_is_catchable() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Throw);
        let out = eval(
            &mut realm,
            r#"
            var key = "__" + "proto__";
            var caught;
            try { ({})[key] = {}; } catch (e) { caught = e; }
            [caught instanceof TypeError, caught.reservedKey, caught.operation]
            "#,
        );
        assert_eq!(out, r#"[true, "__proto__", "set"]"#);
    }

    #[test]
    fn test_legacy_baseline_semantics() {
        let mut realm = realm(ModeController::disabled(), DenialPolicy::Silent);
        let out = eval(
            &mut realm,
            r#"
            function C() {}
            var c = new C();
            var o = {};
            o.__proto__ = c;
            [c.__proto__ === C.prototype, c.constructor === C,
             C.prototype.constructor === C, o.__proto__ === c,
             "__proto__" in o, o.hasOwnProperty("__proto__")]
            "#,
        );
        assert_eq!(out, "[true, true, true, true, true, false]");
    }

    #[test]
    fn test_static_access_rewritten_dynamic_denied() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        let out = eval(
            &mut realm,
            r#"
            function C() {}
            var c = new C();
            var o = {};
            [o.__proto__ === Object.prototype, c.constructor === C,
             o["__" + "proto__"] === undefined, "__proto__" in o,
             o.hasOwnProperty("constructor"), Object.keys(C).length]
            "#,
        );
        assert_eq!(out, "[true, true, true, false, false, 0]");

        let diagnostics = realm.diagnostics();
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, RealmDiagnostic::Compat(c) if c.is_blocking())));
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, RealmDiagnostic::PolicyViolation(_))));
    }

    #[test]
    fn test_reflection_matches_legacy_proto() {
        const TAG: &str = r#"
            function C() {}
            function tag(p) {
                return p === null ? "null"
                    : p === Object.prototype ? "Object"
                    : p === Array.prototype ? "Array"
                    : p === C.prototype ? "C"
                    : p === fp ? "Function"
                    : "?";
            }
            var fp = Object.getPrototypeOf(C);
            var c = new C();
        "#;

        let mut legacy = realm(ModeController::disabled(), DenialPolicy::Silent);
        let legacy_out = eval(
            &mut legacy,
            &format!(
                "{}[tag(({{}}).__proto__), tag([].__proto__), tag(c.__proto__), tag(C.__proto__), tag(Object.prototype.__proto__)]",
                TAG
            ),
        );

        let mut secure = realm(ModeController::enabled(), DenialPolicy::Silent);
        let secure_out = eval(
            &mut secure,
            &format!(
                "{}[tag(Object.getPrototypeOf({{}})), tag(Object.getPrototypeOf([])), tag(Object.getPrototypeOf(c)), tag(Object.getPrototypeOf(C)), tag(Object.getPrototypeOf(Object.prototype))]",
                TAG
            ),
        );

        assert_eq!(legacy_out, r#"["Object", "Array", "C", "Function", "null"]"#);
        assert_eq!(legacy_out, secure_out);
    }

    #[test]
    fn test_literal_proto_primitive_is_ignored() {
        assert_eq!(
            same_in_both_modes(
                r#"
                var a = { __proto__: 5, x: 1 };
                var b = { __proto__: null };
                var c = { __proto__: "s" };
                [a.x, Object.getPrototypeOf(a) === Object.prototype, Object.keys(a).length,
                 Object.getPrototypeOf(b), Object.getPrototypeOf(c) === Object.prototype]
                "#
            ),
            "[1, true, 1, null, true]"
        );
    }

    #[test]
    fn test_literal_evaluation_order_is_kept() {
        assert_eq!(
            same_in_both_modes(
                r#"
                var log = [];
                function g() { log.push("g"); return 1; }
                function h() { log.push("h"); return { inherited: 2 }; }
                function k() { log.push("k"); return 3; }
                var o = { a: g(), __proto__: h(), b: k() };
                [log.join(","), o.a, o.inherited, o.b, Object.keys(o).join(",")]
                "#
            ),
            r#"["g,h,k", 1, 2, 3, "a,b"]"#
        );
    }

    #[test]
    fn test_rewritten_access_ignores_local_bindings() {
        assert_eq!(
            same_in_both_modes(
                r#"
                var base = { k: 1 };
                function C() {}
                function f(Object, Symbol) {
                    var o = { __proto__: base, constructor: 2 };
                    var p = {};
                    p.__proto__ = o;
                    return [o.__proto__ === base, o.constructor, p.k,
                            new C().constructor === C, C.prototype.constructor === C];
                }
                f(null, {})
                "#
            ),
            "[true, 2, 1, true, true]"
        );
    }

    #[test]
    fn test_rewritten_access_survives_reassigned_globals() {
        assert_eq!(
            same_in_both_modes(
                r#"
                var p = { k: 1 };
                var q = {};
                Object = undefined;
                Symbol = undefined;
                q.__proto__ = p;
                [q.k, q.__proto__ === p]
                "#
            ),
            "[1, true]"
        );
    }

    #[test]
    fn test_tampered_symbols_do_not_change_rewrites() {
        assert_eq!(
            same_in_both_modes(
                r#"
                Symbol.proto = "x";
                Symbol.ctor = "y";
                Symbol.instanceProto = "z";
                function C() {}
                C.prototype.m = function () { return 4; };
                var o = {};
                o.__proto__ = { k: 1 };
                [o.k, new C().m(), new C().constructor === C,
                 o.hasOwnProperty("x"), typeof Symbol.proto]
                "#
            ),
            r#"[1, 4, true, false, "symbol"]"#
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        let source = "var p = o.__proto__; o.__proto__ = q; F.prototype.constructor.name;";

        let once = realm.rewrite_source(source).unwrap();
        let twice = realm.rewrite_source(&once.code).unwrap();

        assert_eq!(once.code, twice.code);
        assert!(!once.records.is_empty());
        assert!(twice.records.is_empty());
    }

    #[test]
    fn test_leaked_handle_does_not_round_trip() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        let out = eval(
            &mut realm,
            r#"
            var wire = JSON.stringify({ handle: String(Symbol.proto), raw: Symbol.proto });
            var leaked = JSON.parse(wire).handle;
            var o = {};
            o[leaked] = 5;
            [wire, typeof leaked, o[leaked], Object.getPrototypeOf(o) === Object.prototype]
            "#,
        );
        assert_eq!(
            out,
            r#"["{\"handle\":\"Symbol(Symbol.proto)\"}", "string", 5, true]"#
        );
    }

    #[test]
    fn test_mode_mismatch_reported() {
        let mut realm = realm(ModeController::disabled(), DenialPolicy::Silent);
        let out = eval(&mut realm, "'use encapsulation'; var o = {}; o.__proto__ === Object.prototype");

        assert_eq!(out, "true");
        assert!(matches!(
            realm.diagnostics().as_slice(),
            [RealmDiagnostic::ModeMismatch { .. }]
        ));
    }

    #[test]
    fn test_mode_mismatch_can_be_muted() {
        let mut config = EncapConfig::compatible();
        config.report_mode_mismatch = false;
        let mut realm = Realm::with_mode(1, config, ModeController::disabled()).unwrap();

        realm.evaluate("'use encapsulation';").unwrap();
        assert!(realm.diagnostics().is_empty());
    }

    #[test]
    fn test_resource_limit_faults_realm() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        let err = realm.evaluate("while (true) {}").unwrap_err();

        assert!(matches!(err, RuntimeError::StepLimit { .. }));
        assert_eq!(realm.state(), RealmState::Faulted);
        assert!(matches!(realm.evaluate("1"), Err(RuntimeError::Faulted)));
    }

    #[test]
    fn test_byte_budget_faults_realm() {
        let mut realm = realm(ModeController::disabled(), DenialPolicy::Silent);
        let err = realm
            .evaluate("var s = 'ab'; while (true) { s = s + s; }")
            .unwrap_err();

        assert!(matches!(err, RuntimeError::ByteLimit { .. }));
        assert_eq!(realm.state(), RealmState::Faulted);
        assert!(realm.heap_stats().bytes <= RuntimeLimits::sandbox().max_bytes);
    }

    #[test]
    fn test_console_output_captured() {
        let mut realm = realm(ModeController::enabled(), DenialPolicy::Silent);
        realm.evaluate("console.log('a', 1); console.log({ b: [2] });").unwrap();

        assert_eq!(realm.output(), ["a 1", "{ b: [2] }"]);
        assert_eq!(realm.take_output().len(), 2);
        assert!(realm.output().is_empty());
    }
}
