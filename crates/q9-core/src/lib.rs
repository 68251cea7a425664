pub mod dict;
pub mod key;
pub mod script;
pub mod settings;
