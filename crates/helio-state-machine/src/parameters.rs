//! Parameter symbol table and per-instance parameter storage

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Kind of a declared parameter
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    Bool,
    Int,
    Float,
    /// Boolean that resets to `false` after being read as set during a tick
    Trigger,
}

/// Stable index of a parameter inside a [`ParameterTable`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterIndex(pub u16);

impl ParameterIndex {
    /// Most parameters a single table can address
    pub const MAX_COUNT: usize = u16::MAX as usize + 1;

    fn from_position(position: usize) -> Option<Self> {
        u16::try_from(position).ok().map(ParameterIndex)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// A typed parameter value
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Trigger(bool),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Bool(_) => ParameterKind::Bool,
            ParameterValue::Int(_) => ParameterKind::Int,
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::Trigger(_) => ParameterKind::Trigger,
        }
    }

    /// Zero value for a kind
    pub fn zero(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::Bool => ParameterValue::Bool(false),
            ParameterKind::Int => ParameterValue::Int(0),
            ParameterKind::Float => ParameterValue::Float(0.0),
            ParameterKind::Trigger => ParameterValue::Trigger(false),
        }
    }
}

/// A declared parameter: name, kind and the value new instances start with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    pub kind: ParameterKind,
    pub default: ParameterValue,
}

impl ParameterDecl {
    pub fn new(name: impl Into<String>, default: ParameterValue) -> Self {
        Self {
            name: name.into(),
            kind: default.kind(),
            default,
        }
    }

    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParameterValue::Bool(default))
    }

    pub fn int(name: impl Into<String>, default: i32) -> Self {
        Self::new(name, ParameterValue::Int(default))
    }

    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self::new(name, ParameterValue::Float(default))
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self::new(name, ParameterValue::Trigger(false))
    }
}

/// Ordered name -> index table, built once by the compiler
///
/// Lookups by name only happen at compile time or when application code
/// resolves a handle up front; the per-tick path works on indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    decls: Vec<ParameterDecl>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self { decls: Vec::new() }
    }

    /// Append a declaration, or `None` once the table holds
    /// [`ParameterIndex::MAX_COUNT`] entries. Duplicate names are rejected by
    /// the compiler before this.
    pub(crate) fn push(&mut self, decl: ParameterDecl) -> Option<ParameterIndex> {
        let index = ParameterIndex::from_position(self.decls.len())?;
        self.decls.push(decl);
        Some(index)
    }

    pub fn index_of(&self, name: &str) -> Option<ParameterIndex> {
        self.decls
            .iter()
            .position(|decl| decl.name == name)
            .and_then(ParameterIndex::from_position)
    }

    /// Resolve a name that must have the given kind
    pub fn index(&self, name: &str, kind: ParameterKind) -> Result<ParameterIndex> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::Parameter(format!("Parameter '{}' not found", name)))?;
        let declared = self.decls[index.get()].kind;
        if declared != kind {
            return Err(Error::Parameter(format!(
                "Parameter '{}' is {:?}, not {:?}",
                name, declared, kind
            )));
        }
        Ok(index)
    }

    pub fn get(&self, index: ParameterIndex) -> Option<&ParameterDecl> {
        self.decls.get(index.get())
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParameterIndex, &ParameterDecl)> {
        self.decls
            .iter()
            .enumerate()
            .filter_map(|(i, decl)| ParameterIndex::from_position(i).map(|index| (index, decl)))
    }
}

/// Live parameter values of one instance, indexed by [`ParameterIndex`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBuffer {
    values: Vec<ParameterValue>,
}

impl ParameterBuffer {
    /// Buffer initialised from the declared defaults
    pub fn new(table: &ParameterTable) -> Self {
        Self {
            values: table.decls.iter().map(|decl| decl.default).collect(),
        }
    }

    #[inline]
    pub fn get(&self, index: ParameterIndex) -> ParameterValue {
        self.values[index.get()]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write a value; the kind must match the declared kind
    pub fn set(&mut self, index: ParameterIndex, value: ParameterValue) -> Result<()> {
        let slot = self
            .values
            .get_mut(index.get())
            .ok_or_else(|| Error::Parameter(format!("Parameter index {} out of range", index.0)))?;
        if slot.kind() != value.kind() {
            return Err(Error::Parameter(format!(
                "Parameter {} is {:?}, cannot assign {:?}",
                index.0,
                slot.kind(),
                value.kind()
            )));
        }
        *slot = value;
        Ok(())
    }

    pub fn set_bool(&mut self, index: ParameterIndex, value: bool) -> Result<()> {
        self.set(index, ParameterValue::Bool(value))
    }

    pub fn set_int(&mut self, index: ParameterIndex, value: i32) -> Result<()> {
        self.set(index, ParameterValue::Int(value))
    }

    pub fn set_float(&mut self, index: ParameterIndex, value: f32) -> Result<()> {
        self.set(index, ParameterValue::Float(value))
    }

    /// Raise a trigger; it stays set until a condition reads it during a tick
    pub fn set_trigger(&mut self, index: ParameterIndex) -> Result<()> {
        self.set(index, ParameterValue::Trigger(true))
    }

    /// Write by name, resolving through the table
    pub fn set_named(&mut self, table: &ParameterTable, name: &str, value: ParameterValue) -> Result<()> {
        let index = table.index(name, value.kind())?;
        self.set(index, value)
    }

    pub fn is_trigger_set(&self, index: ParameterIndex) -> bool {
        matches!(self.values.get(index.get()), Some(ParameterValue::Trigger(true)))
    }

    pub(crate) fn clear_trigger(&mut self, index: ParameterIndex) {
        if let Some(value @ ParameterValue::Trigger(_)) = self.values.get_mut(index.get()) {
            *value = ParameterValue::Trigger(false);
        }
    }

    /// Carry values over to another table by name; unmatched or re-typed parameters take the new default
    pub(crate) fn rebind(&self, old: &ParameterTable, new: &ParameterTable) -> Self {
        let values = new
            .decls
            .iter()
            .map(|decl| {
                old.index_of(&decl.name)
                    .and_then(|i| self.values.get(i.get()).copied())
                    .filter(|value| value.kind() == decl.kind)
                    .unwrap_or(decl.default)
            })
            .collect();
        Self { values }
    }
}

/// Triggers read as set during the current tick
///
/// Marking is idempotent: however many conditions read the same trigger, it is
/// recorded once and cleared once by [`TriggerMarks::reset`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerMarks {
    marked: Vec<bool>,
    pending: Vec<ParameterIndex>,
}

impl TriggerMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter_count(count: usize) -> Self {
        Self {
            marked: vec![false; count],
            pending: Vec::new(),
        }
    }

    pub fn mark(&mut self, index: ParameterIndex) {
        let i = index.get();
        if i >= self.marked.len() {
            self.marked.resize(i + 1, false);
        }
        if !self.marked[i] {
            self.marked[i] = true;
            self.pending.push(index);
        }
    }

    pub fn is_marked(&self, index: ParameterIndex) -> bool {
        self.marked.get(index.get()).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Clear every marked trigger in `buffer` and forget the marks.
    /// Returns how many distinct triggers were reset.
    pub fn reset(&mut self, buffer: &mut ParameterBuffer) -> usize {
        let count = self.pending.len();
        for index in self.pending.drain(..) {
            buffer.clear_trigger(index);
            self.marked[index.get()] = false;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ParameterTable {
        let mut table = ParameterTable::new();
        table.push(ParameterDecl::bool("grounded", true));
        table.push(ParameterDecl::int("combo", 0));
        table.push(ParameterDecl::float("speed", 1.5));
        table.push(ParameterDecl::trigger("attack"));
        table
    }

    #[test]
    fn indices_follow_declaration_order() {
        let table = table();
        assert_eq!(table.index_of("grounded"), Some(ParameterIndex(0)));
        assert_eq!(table.index_of("attack"), Some(ParameterIndex(3)));
        assert_eq!(table.index_of("missing"), None);
    }

    #[test]
    fn index_checks_kind() {
        let table = table();
        assert!(table.index("combo", ParameterKind::Int).is_ok());
        assert!(matches!(table.index("combo", ParameterKind::Float), Err(Error::Parameter(_))));
        assert!(matches!(table.index("nope", ParameterKind::Int), Err(Error::Parameter(_))));
    }

    #[test]
    fn buffer_starts_from_defaults() {
        let buffer = ParameterBuffer::new(&table());
        assert_eq!(buffer.get(ParameterIndex(0)), ParameterValue::Bool(true));
        assert_eq!(buffer.get(ParameterIndex(2)), ParameterValue::Float(1.5));
        assert!(!buffer.is_trigger_set(ParameterIndex(3)));
    }

    #[test]
    fn set_rejects_wrong_kind() {
        let mut buffer = ParameterBuffer::new(&table());
        assert!(buffer.set_int(ParameterIndex(1), 2).is_ok());
        assert!(buffer.set_float(ParameterIndex(1), 2.0).is_err());
        assert!(buffer.set_bool(ParameterIndex(9), true).is_err());
        assert_eq!(buffer.get(ParameterIndex(1)), ParameterValue::Int(2));
    }

    #[test]
    fn set_named_resolves_through_table() {
        let table = table();
        let mut buffer = ParameterBuffer::new(&table);
        buffer.set_named(&table, "speed", ParameterValue::Float(3.0)).unwrap();
        assert_eq!(buffer.get(ParameterIndex(2)), ParameterValue::Float(3.0));
        assert!(buffer.set_named(&table, "speed", ParameterValue::Int(3)).is_err());
    }

    #[test]
    fn marks_reset_each_trigger_once() {
        let table = table();
        let mut buffer = ParameterBuffer::new(&table);
        buffer.set_trigger(ParameterIndex(3)).unwrap();

        let mut marks = TriggerMarks::with_parameter_count(table.len());
        marks.mark(ParameterIndex(3));
        marks.mark(ParameterIndex(3));
        marks.mark(ParameterIndex(3));
        assert_eq!(marks.len(), 1);

        assert_eq!(marks.reset(&mut buffer), 1);
        assert!(!buffer.is_trigger_set(ParameterIndex(3)));
        assert!(marks.is_empty());
        assert!(!marks.is_marked(ParameterIndex(3)));
    }

    #[test]
    fn push_stops_at_index_width() {
        let mut table = ParameterTable::new();
        for i in 0..ParameterIndex::MAX_COUNT {
            assert!(table.push(ParameterDecl::bool(format!("p{}", i), false)).is_some());
        }
        assert_eq!(table.push(ParameterDecl::bool("overflow", false)), None);
        assert_eq!(table.len(), ParameterIndex::MAX_COUNT);
        assert_eq!(table.index_of("p65535"), Some(ParameterIndex(u16::MAX)));
        assert_eq!(table.index_of("overflow"), None);
    }

    #[test]
    fn rebind_keeps_values_by_name() {
        let old = table();
        let mut buffer = ParameterBuffer::new(&old);
        buffer.set_int(ParameterIndex(1), 7).unwrap();
        buffer.set_float(ParameterIndex(2), 9.0).unwrap();

        let mut new = ParameterTable::new();
        new.push(ParameterDecl::float("combo", 0.25));
        new.push(ParameterDecl::float("speed", 0.0));
        new.push(ParameterDecl::int("stamina", 100));

        let rebound = buffer.rebind(&old, &new);
        assert_eq!(rebound.get(ParameterIndex(0)), ParameterValue::Float(0.25));
        assert_eq!(rebound.get(ParameterIndex(1)), ParameterValue::Float(9.0));
        assert_eq!(rebound.get(ParameterIndex(2)), ParameterValue::Int(100));
    }
}
