//! Domain layer: entities, value objects and the pure decision rules
//! that turn an observed repository state into an action.

pub mod entities;
pub mod value_objects;
