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


//! Describe a [`MemoryTarget`] frame in TOML.
//!
//! ```toml
//! function = "main"
//!
//! [[types]]
//! kind = "struct"
//! name = "Point"
//! fields = [{ name = "x", type = "int" }, { name = "y", type = "int" }]
//!
//! [[variables]]
//! name = "p"
//! type = "Point"
//! value = { x = 1, y = 2 }
//!
//! [[variables]]
//! name = "pp"
//! type = "Point *"
//! value = "&p"
//! ```

use std::{collections::HashMap, fs, path::Path};

use eyre::{bail, eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    memory::{MemoryFrame, MemoryTarget},
    TypeClass,
};
use crate::{
    apfloat::ApFloat,
    apint::{ApInt, ApSInt},
    types::Type,
    value::Value,
};

/// One data member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Member name
    pub name: String,
    /// Member type spelling
    #[serde(rename = "type")]
    pub ty: String,
}

/// A user-defined type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDecl {
    /// `struct name { fields }`
    Struct {
        /// Type name
        name: String,
        /// Data members in declaration order
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    /// `class name { fields }`
    Class {
        /// Type name
        name: String,
        /// Data members in declaration order
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    /// `union name { fields }`
    Union {
        /// Type name
        name: String,
        /// Alternatives
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    /// `enum [class] name [: underlying]`
    Enum {
        /// Type name
        name: String,
        /// Declared underlying type
        #[serde(default)]
        underlying: Option<String>,
        /// `enum class`
        #[serde(default)]
        scoped: bool,
    },
    /// `typedef target name`
    Typedef {
        /// Alias name
        name: String,
        /// Aliased type spelling
        target: String,
    },
    /// A class template specialization `name<args...>`
    Template {
        /// Template name without arguments
        name: String,
        /// Template type argument spellings
        args: Vec<String>,
        /// Data members
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    /// A smart pointer specialization `name<pointee>` with a `__ptr_` member
    SmartPtr {
        /// Template name without arguments, e.g. `std::unique_ptr`
        name: String,
        /// Pointee type spelling
        pointee: String,
    },
}

/// A variable of the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    /// Variable name
    pub name: String,
    /// Type spelling
    #[serde(rename = "type")]
    pub ty: String,
    /// Initializer; zero when absent
    #[serde(default)]
    pub value: Option<toml::Value>,
    /// Namespace-scope variable instead of a local
    #[serde(default)]
    pub global: bool,
}

/// A frame description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeFile {
    /// Name of the function the frame belongs to
    pub function: String,
    /// User-defined types, in dependency order
    pub types: Vec<TypeDecl>,
    /// Variables, in declaration order
    pub variables: Vec<VariableDecl>,
}

impl ScopeFile {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("Failed to parse scope file as TOML")
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read scope file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Materialize the described types and variables
    pub fn build(&self) -> Result<(MemoryTarget, MemoryFrame)> {
        let target = MemoryTarget::new();
        for decl in &self.types {
            declare_type(&target, decl)?;
        }

        let function = if self.function.is_empty() { "main" } else { self.function.as_str() };
        let frame = target.frame(function);
        let mut declared: HashMap<String, Value> = HashMap::new();

        for var in &self.variables {
            let ty = resolve(&target, &var.ty)?;
            let value = if var.global {
                target.add_global(&var.name, &ty, &[])
            } else {
                let value = target.variable(&var.name, &ty, &[]);
                frame.add_local(&var.name, value.clone());
                value
            };
            if let Some(init) = &var.value {
                initialize(&value, init, &declared)
                    .wrap_err_with(|| format!("Failed to initialize '{}'", var.name))?;
            }
            debug!(name = %var.name, ty = %ty, global = var.global, "declared variable");
            declared.insert(var.name.clone(), value);
        }

        Ok((target, frame))
    }
}

fn resolve(target: &MemoryTarget, spelling: &str) -> Result<Type> {
    target.resolve_type_name(spelling).ok_or_else(|| eyre!("Unknown type '{}'", spelling))
}

fn resolve_fields(target: &MemoryTarget, fields: &[FieldDecl]) -> Result<Vec<(String, Type)>> {
    fields.iter().map(|field| Ok((field.name.clone(), resolve(target, &field.ty)?))).collect()
}

fn declare_type(target: &MemoryTarget, decl: &TypeDecl) -> Result<Type> {
    let record = |name: &str, class: TypeClass, fields: &[FieldDecl]| -> Result<Type> {
        let fields = resolve_fields(target, fields)?;
        let borrowed = fields.iter().map(|(name, ty)| (name.as_str(), ty)).collect::<Vec<_>>();
        Ok(target.define_record(name, class, &borrowed))
    };

    match decl {
        TypeDecl::Struct { name, fields } => record(name, TypeClass::Struct, fields),
        TypeDecl::Class { name, fields } => record(name, TypeClass::Class, fields),
        TypeDecl::Union { name, fields } => record(name, TypeClass::Union, fields),
        TypeDecl::Enum { name, underlying, scoped } => {
            let underlying = underlying.as_deref().map(|ty| resolve(target, ty)).transpose()?;
            if underlying.as_ref().is_some_and(|ty| !ty.is_integer()) {
                bail!("Underlying type of enum '{}' must be an integer type", name);
            }
            Ok(target.define_enum(name, underlying.as_ref(), *scoped))
        }
        TypeDecl::Typedef { name, target: aliased } => {
            Ok(target.typedef(name, &resolve(target, aliased)?))
        }
        TypeDecl::Template { name, args, fields } => {
            let args = args.iter().map(|arg| resolve(target, arg)).collect::<Result<Vec<_>>>()?;
            let fields = resolve_fields(target, fields)?;
            let arg_refs = args.iter().collect::<Vec<_>>();
            let field_refs = fields.iter().map(|(name, ty)| (name.as_str(), ty)).collect::<Vec<_>>();
            Ok(target.define_template(name, &arg_refs, &field_refs))
        }
        TypeDecl::SmartPtr { name, pointee } => {
            Ok(target.define_smart_ptr(name, &resolve(target, pointee)?))
        }
    }
}

fn write_bytes(value: &Value, bytes: &[u8]) -> Result<()> {
    let handle = value.handle().ok_or_else(|| eyre!("Invalid value"))?;
    handle.set_data(bytes)?;
    Ok(())
}

fn write_integer(value: &Value, bits: i128) -> Result<()> {
    let ty = value.ty();
    let order = value.target()?.byte_order();
    let size = ty.byte_size() as usize;
    if ty.is_bool() {
        return write_bytes(value, &[(bits != 0) as u8]);
    }
    if let Some(semantics) = ty.float_semantics() {
        let float = ApFloat::from_integer(&ApSInt::from_i128(128, bits), semantics);
        return write_bytes(value, &float.to_bytes(size, order));
    }
    if ty.is_integer() || ty.is_enum() || ty.is_pointer() {
        return write_bytes(value, &ApInt::from_i128(128, bits).to_bytes(size, order));
    }
    bail!("Cannot initialize '{}' of type '{}' with an integer", value.name(), ty)
}

fn initialize(value: &Value, init: &toml::Value, declared: &HashMap<String, Value>) -> Result<()> {
    let ty = value.ty();
    match init {
        toml::Value::Integer(int) => write_integer(value, *int as i128),
        toml::Value::Boolean(flag) => write_integer(value, *flag as i128),
        toml::Value::Float(float) => {
            let Some(semantics) = ty.float_semantics() else {
                bail!("Cannot initialize '{}' of type '{}' with a float", value.name(), ty);
            };
            let order = value.target()?.byte_order();
            write_bytes(value, &ApFloat::new(semantics, *float).to_bytes(ty.byte_size() as usize, order))
        }
        toml::Value::String(text) if ty.is_pointer() => {
            let referent = text
                .strip_prefix('&')
                .ok_or_else(|| eyre!("Pointer initializer must look like '&name', got '{}'", text))?;
            let pointee = declared
                .get(referent)
                .ok_or_else(|| eyre!("Unknown variable '{}'", referent))?;
            let address = pointee.address_of()?;
            write_integer(value, address.get_u64()? as i128)
        }
        toml::Value::String(text) if ty.is_array() && ty.array_element_type().byte_size() == 1 => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(ty.byte_size() as usize, 0);
            write_bytes(value, &bytes)
        }
        toml::Value::Array(items) if ty.is_array() => {
            for (index, item) in items.iter().enumerate() {
                let element = value
                    .child_at_index(index as u64)
                    .ok_or_else(|| eyre!("Too many initializers for '{}'", ty))?;
                initialize(&element, item, declared)?;
            }
            Ok(())
        }
        toml::Value::Table(members) if ty.is_record() => {
            for (name, item) in members {
                let member = value
                    .member(name)
                    .ok_or_else(|| eyre!("'{}' has no member named '{}'", ty, name))?;
                initialize(&member, item, declared)?;
            }
            Ok(())
        }
        other => bail!("Unsupported initializer {} for type '{}'", other, ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FrameHandle;

    const SCOPE: &str = r#"
        function = "draw"

        [[types]]
        kind = "struct"
        name = "Point"
        fields = [{ name = "x", type = "int" }, { name = "y", type = "int" }]

        [[types]]
        kind = "enum"
        name = "Color"
        underlying = "unsigned char"

        [[types]]
        kind = "smart_ptr"
        name = "std::unique_ptr"
        pointee = "Point"

        [[variables]]
        name = "p"
        type = "Point"
        value = { x = 3, y = -4 }

        [[variables]]
        name = "pp"
        type = "Point *"
        value = "&p"

        [[variables]]
        name = "name"
        type = "char[8]"
        value = "abc"

        [[variables]]
        name = "ratio"
        type = "float"
        value = 0.5

        [[variables]]
        name = "counter"
        type = "long"
        value = 9
        global = true
    "#;

    #[test]
    fn test_build_scope() {
        let scope = ScopeFile::from_toml_str(SCOPE).unwrap();
        let (target, frame) = scope.build().unwrap();
        assert_eq!(frame.function_name(), "draw");
        assert!(target.lookup_type("std::unique_ptr<Point>").is_some());

        let p = Value::new(frame.find_variable("p").unwrap());
        assert_eq!(p.member("y").unwrap().get_i64().unwrap(), -4);

        let pp = Value::new(frame.find_variable("pp").unwrap());
        assert_eq!(pp.get_u64().unwrap(), p.load_address().unwrap());

        let name = Value::new(frame.find_variable("name").unwrap());
        assert_eq!(&name.data().unwrap()[..4], b"abc\0");

        let ratio = Value::new(frame.find_variable("ratio").unwrap());
        assert_eq!(ratio.get_float().unwrap().to_f64(), 0.5);

        assert!(frame.find_variable("counter").is_none());
        assert_eq!(Value::new(frame.find_global("counter").unwrap()).get_i64().unwrap(), 9);
    }

    #[test]
    fn test_bad_scopes() {
        let unknown = ScopeFile::from_toml_str(
            r#"
            [[variables]]
            name = "x"
            type = "Widget"
            "#,
        )
        .unwrap();
        assert!(unknown.build().is_err());

        let mismatch = ScopeFile::from_toml_str(
            r#"
            [[variables]]
            name = "x"
            type = "int"
            value = 1.5
            "#,
        )
        .unwrap();
        assert!(mismatch.build().is_err());

        assert!(ScopeFile::from_toml_str("types = 3").is_err());
    }
}
