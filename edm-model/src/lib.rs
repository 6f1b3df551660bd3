#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
//!
//! ## Orientation
//!
//! * [`EntityModel`] owns every element and is the entry point for all
//!   operations; [`Element`] is a cheap handle into it.
//! * [`Declaration`] enumerates what can be declared where.
//! * Reference operations (`set_base_name`, `set_property_type_name`,
//!   `set_navigation_type_name`, ...) accept names that resolve later.
//! * [`DeclareError`] and [`ModelError`] split naming failures from
//!   structural ones.

mod annotations;
mod builtins;
mod container;
mod element;
mod errors;
mod model;
mod navigation;
mod schema;
mod scope;
mod structured;
mod types;

pub use annotations::ConstExpr;
pub use container::{OverloadDecl, ParameterDecl};
pub use element::{Declaration, Element, ElementKind};
pub use errors::{DeclareError, ModelError};
pub use model::EntityModel;
pub use types::PrimitiveKind;

/// The name grammars used throughout the model, re-exported from the
/// `edm-names` crate.
pub use edm_names as names;
