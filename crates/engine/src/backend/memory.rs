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


//! In-process implementation of the backend contract.
//!
//! [`MemoryTarget`] models a little-endian LP64 debuggee: a sparse
//! byte-addressed memory with a bump allocator, a registry of types and a
//! set of global variables. [`MemoryFrame`] adds locals on top. Values either
//! live in that memory (and have a load address) or in synthetic buffers
//! created by the construction layer.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{trace, warn};

use super::{
    BackendError, BasicType, ByteOrder, FrameHandle, FrameRef, TargetHandle, TargetRef,
    TypeClass, TypeHandle, TypeIdentity, TypeRef, ValueHandle, ValueRef,
};
use crate::{apint::ApInt, types::Type, value::Value};

/// Lowest address handed out by the allocator
const HEAP_BASE: u64 = 0x1000_0000;
/// Unmapped gap left after every allocation
const RED_ZONE: u64 = 16;
/// Largest synthetic value the target agrees to create
const MAX_SYNTHETIC_BYTES: u64 = 1 << 24;
const MAX_TYPEDEF_DEPTH: usize = 64;
const POINTER_SIZE: u64 = 8;

const BUILTINS: &[(BasicType, u64)] = &[
    (BasicType::Void, 0),
    (BasicType::Bool, 1),
    (BasicType::Char, 1),
    (BasicType::SignedChar, 1),
    (BasicType::UnsignedChar, 1),
    (BasicType::WChar, 4),
    (BasicType::Char16, 2),
    (BasicType::Char32, 4),
    (BasicType::Short, 2),
    (BasicType::UnsignedShort, 2),
    (BasicType::Int, 4),
    (BasicType::UnsignedInt, 4),
    (BasicType::Long, 8),
    (BasicType::UnsignedLong, 8),
    (BasicType::LongLong, 8),
    (BasicType::UnsignedLongLong, 8),
    (BasicType::Int128, 16),
    (BasicType::UnsignedInt128, 16),
    (BasicType::Float, 4),
    (BasicType::Double, 8),
    (BasicType::LongDouble, 16),
    (BasicType::NullPtr, 8),
];

#[derive(Debug, Clone)]
struct Field {
    name: String,
    ty: u64,
    offset: u64,
}

#[derive(Debug, Clone)]
enum TypeKind {
    Invalid,
    Builtin(BasicType),
    Pointer(u64),
    Reference(u64),
    Enum { underlying: Option<u64>, scoped: bool },
    Record { class: TypeClass, fields: Vec<Field>, template_args: Vec<u64> },
    Array { element: u64, count: u64 },
    Typedef(u64),
}

#[derive(Debug, Clone)]
struct TypeNode {
    name: String,
    size: u64,
    align: u64,
    kind: TypeKind,
}

impl TypeNode {
    fn invalid() -> Self {
        Self { name: "<invalid>".to_string(), size: 0, align: 1, kind: TypeKind::Invalid }
    }
}

#[derive(Debug, Default)]
struct Memory {
    regions: BTreeMap<u64, Vec<u8>>,
    next: u64,
}

impl Memory {
    fn allocate(&mut self, size: u64, align: u64) -> u64 {
        let align = align.max(RED_ZONE);
        let base = self.next.max(HEAP_BASE).div_ceil(align) * align;
        self.next = base + size.max(1) + RED_ZONE;
        self.regions.insert(base, vec![0; size as usize]);
        base
    }

    fn region(&self, address: u64, len: u64) -> Option<(u64, usize, usize)> {
        let (base, bytes) = self.regions.range(..=address).next_back()?;
        let start = (address - base) as usize;
        let end = start.checked_add(len as usize)?;
        (end <= bytes.len()).then_some((*base, start, end))
    }

    fn read(&self, address: u64, len: u64) -> Result<Vec<u8>, BackendError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let (base, start, end) =
            self.region(address, len).ok_or(BackendError::Unreadable(address))?;
        Ok(self.regions.get(&base).map(|bytes| bytes[start..end].to_vec()).unwrap_or_default())
    }

    fn write(&mut self, address: u64, data: &[u8]) -> Result<(), BackendError> {
        let not_writable = || BackendError::NotWritable(format!("{address:#x}"));
        let (base, start, end) = self.region(address, data.len() as u64).ok_or_else(not_writable)?;
        let bytes = self.regions.get_mut(&base).ok_or_else(not_writable)?;
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }
}

struct TargetState {
    byte_order: ByteOrder,
    builtins: HashMap<BasicType, u64>,
    types: RwLock<Vec<Arc<TypeNode>>>,
    names: RwLock<HashMap<String, u64>>,
    pointers: RwLock<HashMap<u64, u64>>,
    memory: RwLock<Memory>,
    globals: RwLock<Vec<(String, ValueRef)>>,
}

impl fmt::Debug for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetState")
            .field("byte_order", &self.byte_order)
            .field("types", &self.types.read().len())
            .field("globals", &self.globals.read().len())
            .finish()
    }
}

impl TargetState {
    fn node(&self, id: u64) -> Arc<TypeNode> {
        self.types
            .read()
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeNode::invalid()))
    }

    fn canonical(&self, mut id: u64) -> u64 {
        for _ in 0..MAX_TYPEDEF_DEPTH {
            match self.node(id).kind {
                TypeKind::Typedef(next) => id = next,
                _ => break,
            }
        }
        id
    }

    fn register(&self, node: TypeNode) -> u64 {
        let name = node.name.clone();
        let mut types = self.types.write();
        let id = types.len() as u64;
        types.push(Arc::new(node));
        self.names.write().entry(name).or_insert(id);
        id
    }

    fn pointer_to(&self, pointee: u64) -> u64 {
        if let Some(id) = self.pointers.read().get(&pointee) {
            return *id;
        }
        let name = format!("{} *", self.node(pointee).name);
        let id = self.register(TypeNode {
            name,
            size: POINTER_SIZE,
            align: POINTER_SIZE,
            kind: TypeKind::Pointer(pointee),
        });
        *self.pointers.write().entry(pointee).or_insert(id)
    }

    fn encode_address(&self, address: u64) -> Vec<u8> {
        ApInt::new(64, address as u128).to_bytes(POINTER_SIZE as usize, self.byte_order)
    }

    fn decode_address(&self, data: &[u8]) -> u64 {
        ApInt::from_bytes(data, 64, self.byte_order).bits() as u64
    }
}

/// Handle to a type registered in a [`MemoryTarget`]
#[derive(Clone)]
pub struct MemoryType {
    state: Arc<TargetState>,
    id: u64,
}

impl fmt::Debug for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryType").field("id", &self.id).field("name", &self.name()).finish()
    }
}

impl MemoryType {
    fn node(&self) -> Arc<TypeNode> {
        self.state.node(self.id)
    }

    fn handle(&self, id: u64) -> TypeRef {
        Arc::new(Self { state: self.state.clone(), id })
    }
}

impl TypeHandle for MemoryType {
    fn is_valid(&self) -> bool {
        !matches!(self.node().kind, TypeKind::Invalid)
    }

    fn identity(&self) -> TypeIdentity {
        TypeIdentity(self.id)
    }

    fn name(&self) -> String {
        self.node().name.clone()
    }

    fn type_class(&self) -> TypeClass {
        match &self.node().kind {
            TypeKind::Invalid => TypeClass::Invalid,
            TypeKind::Builtin(_) => TypeClass::Builtin,
            TypeKind::Pointer(_) => TypeClass::Pointer,
            TypeKind::Reference(_) => TypeClass::Reference,
            TypeKind::Enum { .. } => TypeClass::Enumeration,
            TypeKind::Record { class, .. } => *class,
            TypeKind::Array { .. } => TypeClass::Array,
            TypeKind::Typedef(_) => TypeClass::Typedef,
        }
    }

    fn basic_type(&self) -> BasicType {
        match self.node().kind {
            TypeKind::Builtin(basic) => basic,
            _ => BasicType::Invalid,
        }
    }

    fn byte_size(&self) -> u64 {
        self.node().size
    }

    fn desugared_type(&self) -> Option<TypeRef> {
        match self.node().kind {
            TypeKind::Typedef(target) => Some(self.handle(target)),
            _ => None,
        }
    }

    fn pointee_type(&self) -> Option<TypeRef> {
        match self.node().kind {
            TypeKind::Pointer(pointee) | TypeKind::Reference(pointee) => Some(self.handle(pointee)),
            _ => None,
        }
    }

    fn array_element_type(&self) -> Option<TypeRef> {
        match self.node().kind {
            TypeKind::Array { element, .. } => Some(self.handle(element)),
            _ => None,
        }
    }

    fn is_scoped_enum(&self) -> bool {
        matches!(self.node().kind, TypeKind::Enum { scoped: true, .. })
    }

    fn enum_integer_type(&self) -> Option<TypeRef> {
        match self.node().kind {
            TypeKind::Enum { underlying, .. } => underlying.map(|id| self.handle(id)),
            _ => None,
        }
    }

    fn template_argument(&self, index: usize) -> Option<TypeRef> {
        match &self.node().kind {
            TypeKind::Record { template_args, .. } => {
                template_args.get(index).map(|id| self.handle(*id))
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
enum Storage {
    Memory(u64),
    Synthetic { buf: Arc<RwLock<Vec<u8>>>, offset: u64 },
}

impl Storage {
    fn at(&self, delta: u64) -> Self {
        match self {
            // Addresses wrap like target pointers; the access then fails as unreadable.
            Self::Memory(address) => Self::Memory(address.wrapping_add(delta)),
            Self::Synthetic { buf, offset } => Self::Synthetic {
                buf: buf.clone(),
                offset: offset.checked_add(delta).unwrap_or(u64::MAX),
            },
        }
    }
}

fn synthetic_range(offset: u64, size: u64) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(size).ok()?)?;
    Some(start..end)
}

/// A value in target memory or in a synthetic buffer
#[derive(Clone)]
pub struct MemoryValue {
    state: Arc<TargetState>,
    name: String,
    ty: u64,
    storage: Storage,
}

impl fmt::Debug for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MemoryValue");
        s.field("name", &self.name).field("type", &self.state.node(self.ty).name);
        match &self.storage {
            Storage::Memory(address) => s.field("address", &format_args!("{address:#x}")),
            Storage::Synthetic { offset, .. } => s.field("synthetic_offset", offset),
        };
        s.finish()
    }
}

impl MemoryValue {
    fn size(&self) -> u64 {
        self.state.node(self.ty).size
    }

    fn child(&self, name: String, ty: u64, delta: u64) -> ValueRef {
        Arc::new(Self { state: self.state.clone(), name, ty, storage: self.storage.at(delta) })
    }

    fn synthetic(state: &Arc<TargetState>, name: &str, ty: u64, data: Vec<u8>) -> Self {
        Self {
            state: state.clone(),
            name: name.to_string(),
            ty,
            storage: Storage::Synthetic { buf: Arc::new(RwLock::new(data)), offset: 0 },
        }
    }
}

impl ValueHandle for MemoryValue {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn ty(&self) -> TypeRef {
        Arc::new(MemoryType { state: self.state.clone(), id: self.ty })
    }

    fn target(&self) -> TargetRef {
        Arc::new(MemoryTarget { state: self.state.clone() })
    }

    fn data(&self) -> Result<Vec<u8>, BackendError> {
        let size = self.size();
        match &self.storage {
            Storage::Memory(address) => self.state.memory.read().read(*address, size),
            Storage::Synthetic { buf, offset } => {
                let buf = buf.read();
                synthetic_range(*offset, size)
                    .and_then(|range| buf.get(range))
                    .map(<[u8]>::to_vec)
                    .ok_or(BackendError::Unreadable(*offset))
            }
        }
    }

    fn set_data(&self, data: &[u8]) -> Result<(), BackendError> {
        let size = self.size();
        if data.len() as u64 != size {
            return Err(BackendError::SizeMismatch { expected: size, actual: data.len() as u64 });
        }
        match &self.storage {
            Storage::Memory(address) => self.state.memory.write().write(*address, data),
            Storage::Synthetic { buf, offset } => {
                let mut buf = buf.write();
                let slot = match synthetic_range(*offset, size) {
                    Some(range) => buf.get_mut(range),
                    None => None,
                }
                .ok_or_else(|| BackendError::NotWritable(self.name.clone()))?;
                slot.copy_from_slice(data);
                Ok(())
            }
        }
    }

    fn load_address(&self) -> Option<u64> {
        match self.storage {
            Storage::Memory(address) => Some(address),
            Storage::Synthetic { .. } => None,
        }
    }

    fn address_of(&self) -> Option<ValueRef> {
        let address = self.load_address()?;
        let pointer = self.state.pointer_to(self.ty);
        let data = self.state.encode_address(address);
        Some(Arc::new(Self::synthetic(&self.state, &format!("&{}", self.name), pointer, data)))
    }

    fn dereference(&self) -> Option<ValueRef> {
        let pointee = match self.state.node(self.state.canonical(self.ty)).kind {
            TypeKind::Pointer(pointee) | TypeKind::Reference(pointee) => pointee,
            _ => return None,
        };
        if matches!(
            self.state.node(self.state.canonical(pointee)).kind,
            TypeKind::Builtin(BasicType::Void)
        ) {
            return None;
        }
        let address = self.state.decode_address(&self.data().ok()?);
        trace!(name = %self.name, address = format_args!("{address:#x}"), "dereference");
        Some(Arc::new(Self {
            state: self.state.clone(),
            name: format!("*{}", self.name),
            ty: pointee,
            storage: Storage::Memory(address),
        }))
    }

    fn member(&self, name: &str) -> Option<ValueRef> {
        match &self.state.node(self.state.canonical(self.ty)).kind {
            TypeKind::Record { fields, .. } => fields
                .iter()
                .find(|field| field.name == name)
                .map(|field| self.child(format!("{}.{}", self.name, name), field.ty, field.offset)),
            _ => None,
        }
    }

    fn child_at_index(&self, index: u64) -> Option<ValueRef> {
        match self.state.node(self.state.canonical(self.ty)).kind {
            TypeKind::Array { element, count } if index < count => {
                let stride = self.state.node(element).size;
                Some(self.child(format!("{}[{}]", self.name, index), element, index * stride))
            }
            _ => None,
        }
    }

    fn persist(&self) -> Result<ValueRef, BackendError> {
        let data = self.data()?;
        Ok(Arc::new(Self::synthetic(&self.state, &self.name, self.ty, data)))
    }
}

/// An in-memory debuggee.
///
/// Cloning is cheap and every clone refers to the same state. The builder
/// methods return [`Type`]s and [`Value`]s directly so tests read naturally:
///
/// ```rust,ignore
/// let target = MemoryTarget::new();
/// let int = target.ty(BasicType::Int);
/// let point = target.define_struct("Point", &[("x", &int), ("y", &int)]);
/// let frame = target.frame("main");
/// frame.add_local("p", target.variable("p", &point, &[1, 0, 0, 0, 2, 0, 0, 0]));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    state: Arc<TargetState>,
}

impl Default for MemoryTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTarget {
    /// A little-endian target with every builtin type registered
    pub fn new() -> Self {
        Self::with_byte_order(ByteOrder::Little)
    }

    /// A target with the given byte order
    pub fn with_byte_order(byte_order: ByteOrder) -> Self {
        let mut types = Vec::with_capacity(BUILTINS.len());
        let mut names = HashMap::new();
        let mut builtins = HashMap::new();
        for (index, (basic, size)) in BUILTINS.iter().enumerate() {
            let id = index as u64;
            types.push(Arc::new(TypeNode {
                name: basic.name().to_string(),
                size: *size,
                align: (*size).clamp(1, 16),
                kind: TypeKind::Builtin(*basic),
            }));
            names.insert(basic.name().to_string(), id);
            builtins.insert(*basic, id);
        }

        let state = TargetState {
            byte_order,
            builtins,
            types: RwLock::new(types),
            names: RwLock::new(names),
            pointers: RwLock::new(HashMap::new()),
            memory: RwLock::new(Memory::default()),
            globals: RwLock::new(Vec::new()),
        };
        Self { state: Arc::new(state) }
    }

    /// The target as a shared backend handle
    pub fn as_target(&self) -> TargetRef {
        Arc::new(self.clone())
    }

    fn wrap(&self, id: u64) -> Type {
        Type::new(Arc::new(MemoryType { state: self.state.clone(), id }))
    }

    fn id_of(&self, ty: &Type) -> Option<u64> {
        let handle = ty.handle()?;
        self.resolve(handle).ok()
    }

    fn resolve(&self, ty: &TypeRef) -> Result<u64, BackendError> {
        let id = ty.identity().0;
        let known = self.state.types.read().get(id as usize).is_some_and(|node| node.name == ty.name());
        if known {
            Ok(id)
        } else {
            Err(BackendError::ForeignType(ty.name()))
        }
    }

    /// A fundamental type
    pub fn ty(&self, basic: BasicType) -> Type {
        self.state.builtins.get(&basic).map(|id| self.wrap(*id)).unwrap_or_default()
    }

    /// A named type (builtin spelling or registered name)
    pub fn lookup_type(&self, name: &str) -> Option<Type> {
        let name = name.trim();
        if let Some(basic) = BasicType::from_type_name(name) {
            return Some(self.ty(basic));
        }
        self.state.names.read().get(name).map(|id| self.wrap(*id))
    }

    /// Resolve a type spelling with declarators, e.g. `const char *`,
    /// `Point &` or `int[4]`
    pub fn resolve_type_name(&self, spelling: &str) -> Option<Type> {
        let spelling = spelling.trim();
        if let Some(base) = spelling.strip_suffix('*') {
            return self.resolve_type_name(base).map(|ty| self.pointer_to(&ty));
        }
        if let Some(base) = spelling.strip_suffix('&') {
            return self.resolve_type_name(base).map(|ty| self.reference_to(&ty));
        }
        if let Some(open) = spelling.strip_suffix(']').and_then(|rest| rest.rfind('[')) {
            let count = spelling[open + 1..spelling.len() - 1].trim().parse().ok()?;
            return self.resolve_type_name(&spelling[..open]).map(|ty| self.array_of(&ty, count));
        }
        let unqualified = spelling
            .split_whitespace()
            .filter(|word| *word != "const" && *word != "volatile")
            .join(" ");
        self.lookup_type(&unqualified)
    }

    /// `ty *`
    pub fn pointer_to(&self, ty: &Type) -> Type {
        match self.id_of(ty) {
            Some(id) => self.wrap(self.state.pointer_to(id)),
            None => Type::invalid(),
        }
    }

    /// `ty &`
    pub fn reference_to(&self, ty: &Type) -> Type {
        let Some(id) = self.id_of(ty) else {
            return Type::invalid();
        };
        let name = format!("{} &", self.state.node(id).name);
        if let Some(existing) = self.state.names.read().get(&name) {
            return self.wrap(*existing);
        }
        self.wrap(self.state.register(TypeNode {
            name,
            size: POINTER_SIZE,
            align: POINTER_SIZE,
            kind: TypeKind::Reference(id),
        }))
    }

    /// `ty[count]`
    pub fn array_of(&self, ty: &Type, count: u64) -> Type {
        let Some(id) = self.id_of(ty) else {
            return Type::invalid();
        };
        let element = self.state.node(id);
        let name = format!("{}[{}]", element.name, count);
        if let Some(existing) = self.state.names.read().get(&name) {
            return self.wrap(*existing);
        }
        self.wrap(self.state.register(TypeNode {
            name,
            size: element.size * count,
            align: element.align,
            kind: TypeKind::Array { element: id, count },
        }))
    }

    /// `typedef ty name;`
    pub fn typedef(&self, name: &str, ty: &Type) -> Type {
        let Some(id) = self.id_of(ty) else {
            return Type::invalid();
        };
        let aliased = self.state.node(id);
        self.wrap(self.state.register(TypeNode {
            name: name.to_string(),
            size: aliased.size,
            align: aliased.align,
            kind: TypeKind::Typedef(id),
        }))
    }

    /// An enumeration. Without a declared underlying type it is 4 bytes wide.
    pub fn define_enum(&self, name: &str, underlying: Option<&Type>, scoped: bool) -> Type {
        let underlying = underlying.and_then(|ty| self.id_of(ty));
        let size = underlying.map_or(4, |id| self.state.node(id).size);
        self.wrap(self.state.register(TypeNode {
            name: name.to_string(),
            size,
            align: size.max(1),
            kind: TypeKind::Enum { underlying, scoped },
        }))
    }

    fn define_record_with_args(
        &self,
        name: String,
        class: TypeClass,
        fields: &[(&str, &Type)],
        template_args: Vec<u64>,
    ) -> Type {
        let mut laid_out = Vec::with_capacity(fields.len());
        let (mut offset, mut size, mut align) = (0u64, 0u64, 1u64);
        for (field_name, field_ty) in fields {
            let Some(id) = self.id_of(field_ty) else {
                warn!(record = %name, field = field_name, "skipping field of foreign type");
                continue;
            };
            let node = self.state.node(id);
            align = align.max(node.align);
            let field_offset =
                if class == TypeClass::Union { 0 } else { offset.div_ceil(node.align) * node.align };
            offset = field_offset + node.size;
            size = size.max(offset);
            laid_out.push(Field { name: field_name.to_string(), ty: id, offset: field_offset });
        }
        let size = size.max(1).div_ceil(align) * align;
        self.wrap(self.state.register(TypeNode {
            name,
            size,
            align,
            kind: TypeKind::Record { class, fields: laid_out, template_args },
        }))
    }

    /// A record of the given class (`Struct`, `Class` or `Union`) with
    /// naturally aligned fields
    pub fn define_record(&self, name: &str, class: TypeClass, fields: &[(&str, &Type)]) -> Type {
        self.define_record_with_args(name.to_string(), class, fields, Vec::new())
    }

    /// A struct with naturally aligned fields
    pub fn define_struct(&self, name: &str, fields: &[(&str, &Type)]) -> Type {
        self.define_record(name, TypeClass::Struct, fields)
    }

    /// A class template specialization named `base<args...>`
    pub fn define_template(&self, base: &str, args: &[&Type], fields: &[(&str, &Type)]) -> Type {
        let name = format!("{}<{}>", base, args.iter().map(|arg| arg.name()).join(", "));
        let ids = args.iter().filter_map(|arg| self.id_of(arg)).collect();
        self.define_record_with_args(name, TypeClass::Class, fields, ids)
    }

    /// A smart pointer specialization `base<pointee>` holding its raw
    /// pointer in `__ptr_`
    pub fn define_smart_ptr(&self, base: &str, pointee: &Type) -> Type {
        let raw = self.pointer_to(pointee);
        self.define_template(base, &[pointee], &[("__ptr_", &raw)])
    }

    /// Allocate zeroed storage for `ty` and copy `bytes` into it (truncated
    /// or zero padded to the type's size). Returns the address.
    pub fn alloc(&self, ty: &Type, bytes: &[u8]) -> u64 {
        let size = ty.byte_size();
        let mut memory = self.state.memory.write();
        let address = memory.allocate(size, ty.byte_size().clamp(1, 16));
        let mut data = bytes.to_vec();
        data.resize(size as usize, 0);
        if let Err(err) = memory.write(address, &data) {
            warn!(%err, "failed to initialize fresh allocation");
        }
        address
    }

    /// A variable of type `ty` in target memory, initialized from `bytes`
    pub fn variable(&self, name: &str, ty: &Type, bytes: &[u8]) -> Value {
        let Some(id) = self.id_of(ty) else {
            warn!(name, ty = %ty, "cannot create a variable of a foreign type");
            return Value::invalid();
        };
        let address = self.alloc(ty, bytes);
        Value::new(Arc::new(MemoryValue {
            state: self.state.clone(),
            name: name.to_string(),
            ty: id,
            storage: Storage::Memory(address),
        }))
    }

    /// A value of type `ty` located at `address` (not allocated)
    pub fn value_at(&self, name: &str, ty: &Type, address: u64) -> Value {
        match self.id_of(ty) {
            Some(id) => Value::new(Arc::new(MemoryValue {
                state: self.state.clone(),
                name: name.to_string(),
                ty: id,
                storage: Storage::Memory(address),
            })),
            None => Value::invalid(),
        }
    }

    /// Define a global variable
    pub fn add_global(&self, name: &str, ty: &Type, bytes: &[u8]) -> Value {
        let value = self.variable(name, ty, bytes);
        if let Some(handle) = value.handle() {
            self.state.globals.write().push((name.to_string(), handle.clone()));
        }
        value
    }

    /// Read raw target memory
    pub fn read_memory(&self, address: u64, len: u64) -> Result<Vec<u8>, BackendError> {
        self.state.memory.read().read(address, len)
    }

    /// A new, empty stack frame
    pub fn frame(&self, function_name: &str) -> MemoryFrame {
        MemoryFrame {
            inner: Arc::new(FrameState {
                target: self.clone(),
                function_name: function_name.to_string(),
                locals: RwLock::new(Vec::new()),
                valid: AtomicBool::new(true),
            }),
        }
    }
}

impl TargetHandle for MemoryTarget {
    fn basic_type(&self, basic: BasicType) -> TypeRef {
        let id = self.state.builtins.get(&basic).copied().unwrap_or(u64::MAX);
        Arc::new(MemoryType { state: self.state.clone(), id })
    }

    fn find_type(&self, name: &str) -> Option<TypeRef> {
        self.lookup_type(name).and_then(|ty| ty.handle().cloned())
    }

    fn pointer_type_to(&self, pointee: &TypeRef) -> Result<TypeRef, BackendError> {
        let id = self.resolve(pointee)?;
        Ok(Arc::new(MemoryType { state: self.state.clone(), id: self.state.pointer_to(id) }))
    }

    fn byte_order(&self) -> ByteOrder {
        self.state.byte_order
    }

    fn address_byte_size(&self) -> u32 {
        POINTER_SIZE as u32
    }

    fn create_value_from_data(
        &self,
        name: &str,
        data: &[u8],
        ty: &TypeRef,
    ) -> Result<ValueRef, BackendError> {
        let id = self.resolve(ty)?;
        let size = self.state.node(id).size;
        if size > MAX_SYNTHETIC_BYTES {
            return Err(BackendError::Allocation(size));
        }
        if (data.len() as u64) < size {
            return Err(BackendError::SizeMismatch { expected: size, actual: data.len() as u64 });
        }
        let data = data[..size as usize].to_vec();
        Ok(Arc::new(MemoryValue::synthetic(&self.state, name, id, data)))
    }
}

#[derive(Debug)]
struct FrameState {
    target: MemoryTarget,
    function_name: String,
    locals: RwLock<Vec<(String, ValueRef)>>,
    valid: AtomicBool,
}

/// A stack frame of a [`MemoryTarget`]. Clones share the same locals.
#[derive(Debug, Clone)]
pub struct MemoryFrame {
    inner: Arc<FrameState>,
}

impl MemoryFrame {
    /// Declare a local; a later declaration shadows an earlier one
    pub fn add_local(&self, name: &str, value: Value) {
        match value.handle() {
            Some(handle) => self.inner.locals.write().push((name.to_string(), handle.clone())),
            None => warn!(name, "ignoring invalid local"),
        }
    }

    /// Mark the frame as gone (the function returned)
    pub fn invalidate(&self) {
        self.inner.valid.store(false, Ordering::Release);
    }

    /// The frame as a shared backend handle
    pub fn as_frame(&self) -> FrameRef {
        Arc::new(self.clone())
    }

    /// The target the frame belongs to
    pub fn memory_target(&self) -> &MemoryTarget {
        &self.inner.target
    }
}

impl FrameHandle for MemoryFrame {
    fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::Acquire)
    }

    fn function_name(&self) -> String {
        self.inner.function_name.clone()
    }

    fn target(&self) -> TargetRef {
        self.inner.target.as_target()
    }

    fn find_variable(&self, name: &str) -> Option<ValueRef> {
        let locals = self.inner.locals.read();
        locals.iter().rev().find(|(local, _)| local == name).map(|(_, value)| value.clone())
    }

    fn find_global(&self, name: &str) -> Option<ValueRef> {
        let globals = self.inner.target.state.globals.read();
        globals.iter().rev().find(|(global, _)| global == name).map(|(_, value)| value.clone())
    }
}
