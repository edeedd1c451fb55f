//! Table store, windowed views and value coercion

pub mod data_view;
pub mod datatable;
pub mod type_coercion;
