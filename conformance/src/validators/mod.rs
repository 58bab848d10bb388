//! Validators over a built output directory (inventory, layout, leaves, relations).

pub mod inventory;
pub mod layout;
pub mod leaves;
pub mod relations;
