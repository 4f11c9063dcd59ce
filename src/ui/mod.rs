pub mod app;
pub mod debounce;
pub mod form;
pub mod grouping;
pub mod list;
pub mod month;
pub mod notice;
pub mod render;
