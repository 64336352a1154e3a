// Scripting capability
//
// The base spec treats JSR-223 scripting as an opaque "evaluate script over
// context/bindings -> value(s)" capability (SPEC_FULL.md §9, "Scripting").
// `ScriptEvaluator` is the trait embedders implement; `NoScriptEvaluator` is the
// crate default and rejects every script at initialization time so that a
// scripted definition/matcher/connector fails fast rather than silently doing
// nothing. An `mlua`-backed evaluator is available behind the `scripting-mlua`
// feature.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::model::AttributeValue;

/// Named variables bound into a script evaluation: dependency attributes (as
/// value lists) plus ad-hoc scalars (principal, issuer, recipient ids, ...).
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub attributes: HashMap<String, Vec<AttributeValue>>,
    pub scalars: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, values: Vec<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), values);
        self
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.scalars.insert(name.into(), value.into());
        self
    }
}

/// What a script evaluation produces: either a set of whole attributes (for
/// scripted connectors) or a single value list bound to one output slot (for
/// scripted definitions/matchers).
#[derive(Debug, Clone)]
pub enum ScriptValue {
    Attributes(HashMap<String, Vec<AttributeValue>>),
    Values(Vec<AttributeValue>),
}

/// Capability supplied by the embedder to run scripted definitions, scripted
/// connectors and scripted matchers. No scripting engine is linked by default;
/// this crate only defines the seam.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &str, bindings: &Bindings) -> Result<ScriptValue, EngineError>;
}

/// Default evaluator: rejects every script. Any node configured with a script
/// but no other evaluator fails at `initialize()` rather than at first
/// invocation, so misconfiguration surfaces immediately.
#[derive(Debug, Default)]
pub struct NoScriptEvaluator;

impl ScriptEvaluator for NoScriptEvaluator {
    fn evaluate(&self, script: &str, _bindings: &Bindings) -> Result<ScriptValue, EngineError> {
        Err(EngineError::init_error(
            "ScriptEvaluator",
            "no-script-evaluator",
            format!("scripting is not enabled; cannot evaluate script: {script:.40}"),
        ))
    }
}

#[cfg(feature = "scripting-mlua")]
pub mod mlua_evaluator {
    use super::*;
    use mlua::Lua;

    /// A `mlua`-backed evaluator. Scripts bind `attrs` (a table of name ->
    /// array of strings) and `scalars` (a table of name -> string), and must
    /// assign into a global `output` table of name -> array of strings.
    pub struct LuaScriptEvaluator {
        lua: Lua,
    }

    impl Default for LuaScriptEvaluator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LuaScriptEvaluator {
        pub fn new() -> Self {
            Self { lua: Lua::new() }
        }
    }

    impl ScriptEvaluator for LuaScriptEvaluator {
        fn evaluate(&self, script: &str, bindings: &Bindings) -> Result<ScriptValue, EngineError> {
            let globals = self.lua.globals();

            let attrs_table = self.lua.create_table().map_err(lua_err)?;
            for (name, values) in &bindings.attributes {
                let strings: Vec<String> = values
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect();
                attrs_table.set(name.as_str(), strings).map_err(lua_err)?;
            }
            globals.set("attrs", attrs_table).map_err(lua_err)?;

            let scalars_table = self.lua.create_table().map_err(lua_err)?;
            for (name, value) in &bindings.scalars {
                scalars_table.set(name.as_str(), value.as_str()).map_err(lua_err)?;
            }
            globals.set("scalars", scalars_table).map_err(lua_err)?;

            let output_table = self.lua.create_table().map_err(lua_err)?;
            globals.set("output", output_table).map_err(lua_err)?;

            self.lua.load(script).exec().map_err(lua_err)?;

            let output: mlua::Table = globals.get("output").map_err(lua_err)?;
            let mut result = HashMap::new();
            for pair in output.pairs::<String, Vec<String>>() {
                let (name, values) = pair.map_err(lua_err)?;
                result.insert(
                    name,
                    values.into_iter().map(AttributeValue::String).collect(),
                );
            }
            Ok(ScriptValue::Attributes(result))
        }
    }

    fn lua_err(e: mlua::Error) -> EngineError {
        EngineError::resolution("scripted", format!("lua evaluation failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_script_evaluator_rejects_any_script() {
        let eval = NoScriptEvaluator;
        let result = eval.evaluate("return 1", &Bindings::new());
        assert!(matches!(
            result,
            Err(EngineError::ComponentInitialization { .. })
        ));
    }
}
