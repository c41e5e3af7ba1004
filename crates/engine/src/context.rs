// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Per-call evaluation context: scope, options and caller-supplied variables.

use tracing::debug;

use crate::{
    backend::{FrameRef, TargetRef},
    bail, eval_err,
    error::Result,
    smart_ptr::SmartPtrTable,
    types::Type,
    value::Value,
};

/// A named value injected by the caller, visible to the expression as an
/// identifier.
#[derive(Debug, Clone)]
pub struct ContextVariable {
    /// Identifier the value is bound to, e.g. `$ptr` or `limit`
    pub name: String,
    /// The bound value
    pub value: Value,
}

impl ContextVariable {
    /// Bind `value` to `name`
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }
}

/// Caller controls for one evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options<'a> {
    /// Permit assignments and increments on debuggee storage
    pub allow_side_effects: bool,
    /// Extra identifiers, borrowed for the duration of the call
    pub context_vars: &'a [ContextVariable],
}

impl<'a> Options<'a> {
    /// Default options: no side effects, no context variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the side-effect permission
    pub fn with_side_effects(mut self, allow: bool) -> Self {
        self.allow_side_effects = allow;
        self
    }

    /// Set the context variables
    pub fn with_context_vars(mut self, context_vars: &'a [ContextVariable]) -> Self {
        self.context_vars = context_vars;
        self
    }

    /// The value bound to `name`. With duplicate names the last binding wins.
    pub fn find_context_var(&self, name: &str) -> Option<&Value> {
        self.context_vars.iter().rev().find(|var| var.name == name).map(|var| &var.value)
    }
}

/// Where identifiers are resolved.
#[derive(Debug, Clone)]
pub enum Scope {
    /// Locals, `this` members and globals of a stack frame
    Frame(FrameRef),
    /// Members of a value (through one level of pointer)
    Value(Value),
}

/// Everything the evaluator needs for one call. Built by the entry points
/// and dropped when the call returns.
#[derive(Debug)]
pub struct Context<'a> {
    scope: Scope,
    target: TargetRef,
    options: Options<'a>,
    smart_pointers: &'a SmartPtrTable,
}

impl<'a> Context<'a> {
    /// Validate the scope and capture its target
    pub fn new(scope: Scope, options: Options<'a>, smart_pointers: &'a SmartPtrTable) -> Result<Self> {
        let target = match &scope {
            Scope::Frame(frame) => {
                if !frame.is_valid() {
                    bail!(InvalidScope, "frame of '{}' is no longer valid", frame.function_name());
                }
                frame.target()
            }
            Scope::Value(value) => {
                if !value.is_valid() {
                    bail!(InvalidScope, "scope value is invalid");
                }
                value.target()?
            }
        };
        Ok(Self { scope, target, options, smart_pointers })
    }

    /// The scope identifiers resolve in
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The target capability used to synthesize values
    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    /// The caller's options
    pub fn options(&self) -> &Options<'a> {
        &self.options
    }

    /// Whether mutations are permitted
    pub fn allow_side_effects(&self) -> bool {
        self.options.allow_side_effects
    }

    /// Recognized smart pointer templates
    pub fn smart_pointers(&self) -> &SmartPtrTable {
        self.smart_pointers
    }

    /// Resolve a type name through the target
    pub fn find_type(&self, name: &str) -> Option<Type> {
        self.target.find_type(name).map(Type::new)
    }

    /// The object `this` points to, if any
    fn this_object(&self) -> Option<Value> {
        match &self.scope {
            Scope::Frame(frame) => {
                let this = Value::new(frame.find_variable("this")?);
                this.dereference().ok()
            }
            Scope::Value(value) => Some(value.clone()),
        }
    }

    /// The value of `this`
    pub fn this_value(&self) -> Result<Value> {
        match &self.scope {
            Scope::Frame(frame) => frame
                .find_variable("this")
                .map(Value::new)
                .ok_or_else(|| eval_err!(UndeclaredIdentifier, "invalid use of 'this' outside of a non-static member function")),
            Scope::Value(value) => {
                if value.ty().is_pointer() {
                    Ok(value.clone())
                } else {
                    value.address_of()
                }
            }
        }
    }

    /// Resolve an identifier.
    ///
    /// Context variables shadow everything in the scope. A frame scope then
    /// tries locals, members of `*this` and globals; a value scope tries the
    /// members of the value, looking through a pointer.
    pub fn lookup_identifier(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.options.find_context_var(name) {
            debug!(name, "resolved context variable");
            return Ok(value.clone());
        }

        let found = match &self.scope {
            Scope::Frame(frame) => frame
                .find_variable(name)
                .map(Value::new)
                .or_else(|| self.this_object().and_then(|this| this.member(name)))
                .or_else(|| frame.find_global(name).map(Value::new)),
            Scope::Value(value) => {
                let base = if value.ty().is_pointer() || value.ty().is_reference() {
                    value.dereference().ok()
                } else {
                    Some(value.clone())
                };
                base.and_then(|base| base.member(name))
            }
        };

        found.ok_or_else(|| eval_err!(UndeclaredIdentifier, "use of undeclared identifier '{}'", name))
    }
}
