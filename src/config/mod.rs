//! Configuration: settings file, image references and core instance descriptors

pub mod images;
pub mod instance;
pub mod settings;

pub use images::ImageRef;
pub use instance::CoreInstance;
pub use settings::Settings;
