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


//! Table-driven smart pointer recognition.
//!
//! A type is a smart pointer when its canonical name starts with the prefix
//! of one of the table's rules. The rule says which template argument is the
//! pointee and which data member (possibly a dotted path through nested
//! members) holds the raw pointer, so `*p` and `p->x` work on smart pointers
//! without any per-library code in the evaluator.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Recognition rule for one smart pointer template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartPtrRule {
    /// Name prefix including the opening angle bracket, e.g. `std::unique_ptr<`
    pub prefix: String,
    /// Index of the template argument naming the pointee
    #[serde(default)]
    pub pointee_argument: usize,
    /// Dotted member path to the raw pointer inside the object, e.g. `__ptr_`
    pub pointer_member: String,
}

impl SmartPtrRule {
    /// Build a rule
    pub fn new(prefix: impl Into<String>, pointee_argument: usize, pointer_member: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), pointee_argument, pointer_member: pointer_member.into() }
    }

    /// Whether `type_name` is a specialization covered by this rule
    pub fn matches(&self, type_name: &str) -> bool {
        type_name.trim_start().starts_with(&self.prefix)
    }

    /// Components of the member path
    pub fn member_path(&self) -> impl Iterator<Item = &str> {
        self.pointer_member.split('.').filter(|segment| !segment.is_empty())
    }
}

/// The set of recognized smart pointer templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartPtrTable {
    /// Rules, first match wins
    #[serde(default, rename = "rule")]
    pub rules: Vec<SmartPtrRule>,
}

static DEFAULT_SMART_POINTERS: Lazy<SmartPtrTable> = Lazy::new(|| SmartPtrTable {
    rules: vec![
        SmartPtrRule::new("std::unique_ptr<", 0, "__ptr_"),
        SmartPtrRule::new("std::shared_ptr<", 0, "__ptr_"),
        SmartPtrRule::new("std::weak_ptr<", 0, "__ptr_"),
    ],
});

impl Default for SmartPtrTable {
    fn default() -> Self {
        DEFAULT_SMART_POINTERS.clone()
    }
}

impl SmartPtrTable {
    /// A table that recognizes nothing
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in table (libc++ `unique_ptr`, `shared_ptr`, `weak_ptr`)
    pub fn builtin() -> &'static Self {
        &DEFAULT_SMART_POINTERS
    }

    /// Add a rule after the existing ones
    pub fn with_rule(mut self, rule: SmartPtrRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The first rule matching `type_name`
    pub fn find(&self, type_name: &str) -> Option<&SmartPtrRule> {
        self.rules.iter().find(|rule| rule.matches(type_name))
    }

    /// Whether no rule is configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
