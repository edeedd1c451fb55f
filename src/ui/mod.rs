//! Terminal front end: screen geometry, the format-mode editor, frame
//! assembly and the event loop

pub mod coordinate_mapper;
pub mod format_buffer;
pub mod render;
pub mod tui_app;
