//! Script files: parsing and the per-controller directory browser.

pub mod browser;
pub mod parser;

pub use browser::ScriptBrowser;
pub use parser::parse_script;
