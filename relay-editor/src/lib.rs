pub mod adapter;
pub mod headless;
pub mod host;
pub mod language;
pub mod loader;
pub mod protocol;
pub mod registry;
pub mod settings;
pub mod widget;

