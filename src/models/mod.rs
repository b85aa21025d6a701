pub mod api;
pub mod common;
pub mod crm;
pub mod settings;
pub mod zoom;
