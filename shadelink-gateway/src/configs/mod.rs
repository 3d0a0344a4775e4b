pub mod settings;

pub use settings::{Device, Gateway, Settings};
