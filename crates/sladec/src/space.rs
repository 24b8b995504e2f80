use std::borrow::Cow;
use std::collections::BTreeMap;

use sla_format::{SpaceKind, Specification};

use crate::{Error, Result};

/// Address space identifier for an address space. The identifier is the index of the space in
/// the specification that defined it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressSpaceId(usize);

impl std::fmt::Debug for AddressSpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AddressSpaceId").field(&self.0).finish()
    }
}

impl std::fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "space{}", self.0)
    }
}

impl AddressSpaceId {
    /// Construct a new address space id
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The index of the address space within its specification.
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressSpaceType {
    /// Special space to represent constants
    Constant,
    /// Normal spaces modelled by processor
    Processor,
    /// Processor registers
    Register,
    /// Internally managed temporary space
    Internal,
}

impl From<SpaceKind> for AddressSpaceType {
    fn from(kind: SpaceKind) -> Self {
        match kind {
            SpaceKind::Constant => Self::Constant,
            SpaceKind::Processor => Self::Processor,
            SpaceKind::Register => Self::Register,
            SpaceKind::Unique => Self::Internal,
        }
    }
}

/// Information about an address space
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddressSpace {
    pub id: AddressSpaceId,
    pub name: Cow<'static, str>,
    pub word_size: usize,
    pub address_size: usize,
    pub space_type: AddressSpaceType,
    pub big_endian: bool,
}

impl AddressSpace {
    pub fn is_constant(&self) -> bool {
        self.space_type == AddressSpaceType::Constant
    }

    /// Returns `true` if the contents of this space can be supplied by a load image. Constants
    /// and temporaries only exist within p-code and registers are processor state.
    pub fn is_loadable(&self) -> bool {
        match self.space_type {
            AddressSpaceType::Processor => true,
            AddressSpaceType::Constant
            | AddressSpaceType::Register
            | AddressSpaceType::Internal => false,
        }
    }

    /// The largest offset addressable in this space.
    pub fn max_offset(&self) -> u64 {
        match self.address_size {
            size if size >= 8 => u64::MAX,
            size => (1u64 << (size * 8)) - 1,
        }
    }
}

impl std::fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An address is represented by an offset into an address space
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Address {
    pub address_space: AddressSpaceId,

    /// The standard interpretation of the offset is an index into the associated address space.
    /// However, when used in conjunction with the constant address space, the offset is the actual
    /// value.
    pub offset: u64,
}

impl Address {
    pub fn new(address_space: AddressSpaceId, offset: u64) -> Self {
        Self {
            address_space,
            offset,
        }
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Address")
            .field("address_space", &self.address_space)
            .field("offset", &format!("{offset:#016x}", offset = &self.offset))
            .finish()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:#x}", self.address_space, self.offset)
    }
}

/// A VarnodeData represents the address and size of data. Varnodes are ordered by address space,
/// then offset, then size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarnodeData {
    pub address: Address,
    pub size: usize,
}

impl std::fmt::Display for VarnodeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]#{}", self.address, self.size)
    }
}

impl VarnodeData {
    pub fn new(address: Address, size: usize) -> Self {
        Self { address, size }
    }

    /// The byte range covered by this varnode, or `None` if it overflows the 64-bit offset.
    pub fn range(&self) -> Option<std::ops::Range<u64>> {
        let size = u64::try_from(self.size).ok()?;
        let end = self.address.offset.checked_add(size)?;
        Some(self.address.offset..end)
    }
}

/// The address spaces defined by a specification. Spaces are immutable once loaded and are
/// addressed by index or by name.
#[derive(Clone, Debug)]
pub struct SpaceRegistry {
    spaces: Vec<AddressSpace>,
    by_name: BTreeMap<String, AddressSpaceId>,
    default_code_space: AddressSpaceId,
    constant_space: AddressSpaceId,
    unique_space: Option<AddressSpaceId>,
}

impl SpaceRegistry {
    /// Build the registry from a validated specification.
    pub(crate) fn new(spec: &Specification) -> Result<Self> {
        let spaces: Vec<AddressSpace> = spec
            .spaces
            .iter()
            .enumerate()
            .map(|(index, definition)| AddressSpace {
                id: AddressSpaceId::new(index),
                name: Cow::Owned(definition.name.clone()),
                word_size: definition.word_size,
                address_size: definition.address_size,
                space_type: definition.kind.into(),
                big_endian: spec.big_endian,
            })
            .collect();

        let by_name: BTreeMap<String, AddressSpaceId> = spaces
            .iter()
            .map(|space| (space.name.to_string(), space.id))
            .collect();

        let default_code_space = by_name
            .get(&spec.default_code_space)
            .copied()
            .ok_or_else(|| {
                Error::InternalError(format!(
                    "default code space {} missing from validated specification",
                    spec.default_code_space
                ))
            })?;

        let first_of = |space_type| {
            spaces
                .iter()
                .find(|space| space.space_type == space_type)
                .map(|space| space.id)
        };

        let constant_space = first_of(AddressSpaceType::Constant).ok_or_else(|| {
            Error::InternalError("constant space missing from validated specification".into())
        })?;
        let unique_space = first_of(AddressSpaceType::Internal);

        Ok(Self {
            spaces,
            by_name,
            default_code_space,
            constant_space,
            unique_space,
        })
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Get the address space at `index`.
    pub fn get(&self, index: usize) -> Result<&AddressSpace> {
        self.spaces.get(index).ok_or(Error::OutOfRange {
            index,
            count: self.spaces.len(),
        })
    }

    /// Get the address space identified by `id`.
    pub fn space(&self, id: AddressSpaceId) -> Result<&AddressSpace> {
        self.get(id.index())
    }

    pub fn by_name(&self, name: &str) -> Option<&AddressSpace> {
        self.by_name
            .get(name)
            .and_then(|id| self.spaces.get(id.index()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressSpace> {
        self.spaces.iter()
    }

    pub fn default_code_space(&self) -> &AddressSpace {
        &self.spaces[self.default_code_space.index()]
    }

    pub fn constant_space(&self) -> &AddressSpace {
        &self.spaces[self.constant_space.index()]
    }

    pub fn unique_space(&self) -> Option<&AddressSpace> {
        self.unique_space.map(|id| &self.spaces[id.index()])
    }
}
