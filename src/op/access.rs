//! Memory access descriptors for field and element operators.

use std::hash::{Hash, Hasher};

/// Size of a tagged pointer slot, in bytes.
pub const POINTER_SIZE: u32 = 8;

/// Offset of an object's map pointer.
pub const MAP_OFFSET: u32 = 0;

/// Offset of an object's elements backing-store pointer.
pub const ELEMENTS_OFFSET: u32 = 2 * POINTER_SIZE;

/// Whether the base input is a tagged heap pointer or a raw machine address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTaggedness {
    Untagged,
    Tagged,
}

/// Machine-level representation of the accessed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineType {
    AnyTagged,
    TaggedSigned,
    TaggedPointer,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl MachineType {
    pub fn token(self) -> &'static str {
        match self {
            MachineType::AnyTagged => "any_tagged",
            MachineType::TaggedSigned => "tagged_signed",
            MachineType::TaggedPointer => "tagged_pointer",
            MachineType::Int8 => "int8",
            MachineType::Uint8 => "uint8",
            MachineType::Int16 => "int16",
            MachineType::Uint16 => "uint16",
            MachineType::Int32 => "int32",
            MachineType::Uint32 => "uint32",
            MachineType::Int64 => "int64",
            MachineType::Uint64 => "uint64",
            MachineType::Float32 => "float32",
            MachineType::Float64 => "float64",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "any_tagged" => MachineType::AnyTagged,
            "tagged_signed" => MachineType::TaggedSigned,
            "tagged_pointer" => MachineType::TaggedPointer,
            "int8" => MachineType::Int8,
            "uint8" => MachineType::Uint8,
            "int16" => MachineType::Int16,
            "uint16" => MachineType::Uint16,
            "int32" => MachineType::Int32,
            "uint32" => MachineType::Uint32,
            "int64" => MachineType::Int64,
            "uint64" => MachineType::Uint64,
            "float32" => MachineType::Float32,
            "float64" => MachineType::Float64,
            _ => return None,
        })
    }
}

/// Write barrier required when storing through the access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteBarrierKind {
    NoWriteBarrier,
    MapWriteBarrier,
    PointerWriteBarrier,
    FullWriteBarrier,
}

/// Describes a fixed-offset field slot of an object.
#[derive(Debug, Clone, Copy, Eq)]
pub struct FieldAccess {
    pub base_is_tagged: BaseTaggedness,
    pub offset: u32,
    pub machine_type: MachineType,
    pub write_barrier_kind: WriteBarrierKind,
    pub name: Option<&'static str>,
}

impl FieldAccess {
    /// A tagged pointer-size field at `offset`.
    pub fn tagged(offset: u32) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            offset,
            machine_type: MachineType::AnyTagged,
            write_barrier_kind: WriteBarrierKind::FullWriteBarrier,
            name: None,
        }
    }

    /// The map pointer field of a heap object.
    pub fn for_map() -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            offset: MAP_OFFSET,
            machine_type: MachineType::TaggedPointer,
            write_barrier_kind: WriteBarrierKind::MapWriteBarrier,
            name: Some("map"),
        }
    }

    /// The elements backing-store pointer field of a heap object.
    pub fn for_elements() -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            offset: ELEMENTS_OFFSET,
            machine_type: MachineType::TaggedPointer,
            write_barrier_kind: WriteBarrierKind::PointerWriteBarrier,
            name: Some("elements"),
        }
    }
}

impl PartialEq for FieldAccess {
    fn eq(&self, other: &Self) -> bool {
        // The write barrier kind and debug name are left out on purpose: two
        // accesses that differ only there still address the same slot.
        self.base_is_tagged == other.base_is_tagged
            && self.offset == other.offset
            && self.machine_type == other.machine_type
    }
}

impl Hash for FieldAccess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_is_tagged.hash(state);
        self.offset.hash(state);
        self.machine_type.hash(state);
    }
}

/// Describes indexed element access past a fixed header.
#[derive(Debug, Clone, Copy, Eq)]
pub struct ElementAccess {
    pub base_is_tagged: BaseTaggedness,
    pub header_size: u32,
    pub machine_type: MachineType,
    pub write_barrier_kind: WriteBarrierKind,
}

impl ElementAccess {
    /// Tagged element access with the given header size.
    pub fn tagged(header_size: u32) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::Tagged,
            header_size,
            machine_type: MachineType::AnyTagged,
            write_barrier_kind: WriteBarrierKind::FullWriteBarrier,
        }
    }
}

impl PartialEq for ElementAccess {
    fn eq(&self, other: &Self) -> bool {
        // Same as fields: the barrier kind never changes which slots alias.
        self.base_is_tagged == other.base_is_tagged
            && self.header_size == other.header_size
            && self.machine_type == other.machine_type
    }
}

impl Hash for ElementAccess {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_is_tagged.hash(state);
        self.header_size.hash(state);
        self.machine_type.hash(state);
    }
}

#[cfg(test)]
#[path = "../tests/op/t_access.rs"]
mod tests;
