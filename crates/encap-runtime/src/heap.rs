//! Realm Heap
//!
//! Arena of objects and symbols for a single realm. Objects live as long
//! as the realm; the object limit bounds how many a script can allocate
//! and the byte budget bounds array storage and string data.

use crate::object::{ObjectData, ObjectKind};
use crate::value::{ObjectId, SymbolId, Value};
use encap_policy::RuntimeLimits;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Heap size limits
#[derive(Debug, Clone, Copy)]
pub struct HeapLimits {
    /// Maximum number of objects
    pub max_objects: usize,
    /// Object count at which a warning is logged
    pub warn_threshold: usize,
    /// Bytes of array elements and string data
    pub max_bytes: usize,
}

impl HeapLimits {
    /// Create from realm limits
    pub fn from_limits(limits: &RuntimeLimits) -> Self {
        Self {
            max_objects: limits.max_objects,
            warn_threshold: (limits.max_objects as f64 * 0.9) as usize,
            max_bytes: limits.max_bytes,
        }
    }

    /// Check if a count is within limits
    pub fn is_within_limit(&self, objects: usize) -> bool {
        objects <= self.max_objects
    }
}

impl Default for HeapLimits {
    fn default() -> Self {
        Self::from_limits(&RuntimeLimits::default())
    }
}

/// Heap statistics
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    pub objects: usize,
    pub functions: usize,
    pub arrays: usize,
    pub symbols: usize,
    /// Bytes charged against the budget
    pub bytes: usize,
}

impl HeapStats {
    /// Object count as a percentage of the limit
    pub fn utilization(&self, limits: &HeapLimits) -> f32 {
        (self.objects as f32 / limits.max_objects as f32) * 100.0
    }

    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "Heap: {} objects ({} functions, {} arrays), {} symbols, {} KiB",
            self.objects,
            self.functions,
            self.arrays,
            self.symbols,
            self.bytes / 1024
        )
    }
}

/// Symbol record
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub description: Option<Rc<str>>,
}

/// Object and symbol storage for one realm
pub struct Heap {
    objects: Vec<ObjectData>,
    symbols: Vec<SymbolData>,
    limits: HeapLimits,
    stats: HeapStats,
    warned: bool,
}

impl Heap {
    pub fn new(limits: HeapLimits) -> Self {
        debug!("Creating heap (max objects: {})", limits.max_objects);

        Self {
            objects: Vec::new(),
            symbols: Vec::new(),
            limits,
            stats: HeapStats::default(),
            warned: false,
        }
    }

    /// Allocate an object
    pub fn alloc(&mut self, data: ObjectData) -> Result<ObjectId, HeapError> {
        let count = self.objects.len() + 1;
        if !self.limits.is_within_limit(count) {
            warn!("Heap exceeded object limit of {}", self.limits.max_objects);
            return Err(HeapError::OutOfMemory {
                limit: self.limits.max_objects,
            });
        }
        if count >= self.limits.warn_threshold && !self.warned {
            self.warned = true;
            info!(
                "Heap at {:.0}% of object limit",
                self.stats.utilization(&self.limits)
            );
        }

        match data.kind {
            ObjectKind::Function(_) => self.stats.functions += 1,
            ObjectKind::Array(_) => self.stats.arrays += 1,
            _ => {}
        }
        self.stats.objects = count;

        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(data);
        Ok(id)
    }

    /// Charge `bytes` of script data against the budget
    ///
    /// Nothing is ever refunded; the budget bounds what a realm allocates
    /// over its lifetime.
    pub fn charge(&mut self, bytes: usize) -> Result<(), HeapError> {
        let total = self.stats.bytes.saturating_add(bytes);
        if total > self.limits.max_bytes {
            warn!(
                "Heap byte budget of {} exceeded ({} requested)",
                self.limits.max_bytes, bytes
            );
            return Err(HeapError::ByteLimit {
                limit: self.limits.max_bytes,
            });
        }
        self.stats.bytes = total;
        Ok(())
    }

    /// Charge storage for `count` array elements
    pub fn charge_elements(&mut self, count: usize) -> Result<(), HeapError> {
        self.charge(count.saturating_mul(std::mem::size_of::<Value>()))
    }

    /// Create a fresh, unique symbol
    pub fn new_symbol(&mut self, description: Option<&str>) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(SymbolData {
            description: description.map(Rc::from),
        });
        self.stats.symbols += 1;
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &SymbolData {
        &self.symbols[id.0 as usize]
    }

    pub fn get(&self, id: ObjectId) -> &ObjectData {
        &self.objects[id.index()]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectData {
        &mut self.objects[id.index()]
    }

    /// [[Prototype]] of an object
    pub fn prototype_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).proto
    }

    /// Does `ancestor` appear on the prototype chain starting at `start`
    /// (inclusive)?
    pub fn chain_contains(&self, start: ObjectId, ancestor: ObjectId) -> bool {
        let mut current = Some(start);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.prototype_of(id);
        }
        false
    }

    pub fn is_callable(&self, id: ObjectId) -> bool {
        self.get(id).callable().is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    pub fn limits(&self) -> &HeapLimits {
        &self.limits
    }
}

/// Heap errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum HeapError {
    #[error("Out of memory: object limit of {limit} reached")]
    OutOfMemory { limit: usize },

    #[error("Out of memory: byte budget of {limit} exhausted")]
    ByteLimit { limit: usize },
}
