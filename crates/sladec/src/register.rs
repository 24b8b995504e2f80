use std::collections::BTreeMap;

use sla_format::Specification;

use crate::space::{Address, SpaceRegistry, VarnodeData};
use crate::{Error, Result};

/// A named register and its location.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegisterEntry {
    pub name: String,
    pub location: VarnodeData,
}

/// Every register declared by a specification, indexed both by name and by exact location.
///
/// Lookups by location only succeed on an exact match. A varnode covering part of a register,
/// such as the low byte of a 32-bit register, has no name unless the specification declares
/// that sub-register explicitly.
#[derive(Clone, Debug, Default)]
pub struct RegisterCatalog {
    by_name: BTreeMap<String, VarnodeData>,
    by_location: BTreeMap<VarnodeData, String>,
}

impl RegisterCatalog {
    pub(crate) fn new(spec: &Specification, spaces: &SpaceRegistry) -> Result<Self> {
        let mut catalog = Self::default();
        for register in &spec.registers {
            let space = spaces.by_name(&register.space).ok_or_else(|| {
                Error::InternalError(format!(
                    "register {} refers to unknown space {}",
                    register.name, register.space
                ))
            })?;

            let location = VarnodeData::new(Address::new(space.id, register.offset), register.size);
            catalog.by_name.insert(register.name.clone(), location);
            catalog.by_location.insert(location, register.name.clone());
        }

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Get the location of the named register.
    pub fn lookup(&self, name: &str) -> Result<VarnodeData> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownRegister(name.to_string()))
    }

    /// Get the name of the register at exactly `location`.
    pub fn name(&self, location: &VarnodeData) -> Result<&str> {
        self.by_location
            .get(location)
            .map(String::as_str)
            .ok_or(Error::NoRegisterAtLocation(*location))
    }

    /// All registers ordered by location.
    pub fn entries(&self) -> Vec<RegisterEntry> {
        self.by_location
            .iter()
            .map(|(location, name)| RegisterEntry {
                name: name.clone(),
                location: *location,
            })
            .collect()
    }

    /// A sorted map of register locations to register names.
    pub fn name_map(&self) -> &BTreeMap<VarnodeData, String> {
        &self.by_location
    }
}
