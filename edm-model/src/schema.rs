//! Schemas and the diagnosis of types they leave open.

use crate::element::{Element, ElementKind};
use crate::errors::ModelError;
use crate::model::EntityModel;
use crate::scope::NameTable;

pub(crate) struct SchemaData {
    pub(crate) table: NameTable,
}

impl SchemaData {
    pub(crate) fn new() -> Self {
        SchemaData {
            table: NameTable::new(),
        }
    }
}

impl EntityModel {
    /// Diagnoses elements of a closed schema that are still open when the
    /// model closes.
    ///
    /// A type that never completed either sits on an inheritance cycle,
    /// reported as such by probing its base chain, or is waiting on
    /// references that can't resolve any more. The latter are force
    /// closed so their own completion rules name what is missing.
    pub(crate) fn detect_circular_refs(&self, schema: Element) -> Result<(), ModelError> {
        for (name, item) in self.entries(schema) {
            if self.name_of(item).as_deref() != Some(name.as_str()) {
                continue;
            }
            if self.data(item).payload.table().is_none() || self.is_closed(item) {
                continue;
            }
            log::warn!(
                "{} still open after its schema closed, suspecting a circular reference",
                self.describe(item)
            );
            match self.kind_of(item) {
                ElementKind::EntityType if self.base_cycle(item) => {
                    return Err(ModelError::EntityCycle(self.describe(item)));
                }
                ElementKind::ComplexType if self.base_cycle(item) => {
                    return Err(ModelError::ComplexCycle(self.describe(item)));
                }
                _ => {}
            }
            self.close_dispatch(item)?;
        }
        Ok(())
    }
}
