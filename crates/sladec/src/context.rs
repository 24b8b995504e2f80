use std::collections::BTreeMap;

use sla_format::Specification;

use crate::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct ContextVariable {
    width: u32,
    value: u32,
}

impl ContextVariable {
    fn mask(&self) -> u32 {
        if self.width >= u32::BITS {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }
}

/// Default values of the context variables declared by a specification. Decoding reads these
/// values but never changes them.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContextDatabase {
    variables: BTreeMap<String, ContextVariable>,
}

impl ContextDatabase {
    pub fn new(spec: &Specification) -> Self {
        let mut database = Self::default();
        for field in &spec.context {
            let mut variable = ContextVariable {
                width: field.width,
                value: 0,
            };
            variable.value = field.default & variable.mask();
            database.variables.insert(field.name.clone(), variable);
        }

        database
    }

    /// Set the default of a context variable. The value is truncated to the width of the
    /// variable. Returns the stored value.
    pub fn set_default(&mut self, name: &str, value: u32) -> Result<u32> {
        let variable = self
            .variables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownContextVariable(name.to_string()))?;

        variable.value = value & variable.mask();
        Ok(variable.value)
    }

    pub fn value(&self, name: &str) -> Result<u32> {
        self.variables
            .get(name)
            .map(|variable| variable.value)
            .ok_or_else(|| Error::UnknownContextVariable(name.to_string()))
    }
}
