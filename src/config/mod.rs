pub mod ini;
pub mod settings;

pub use ini::Ini;
pub use settings::EditorSettings;
