pub mod build;
pub mod console;
pub mod discover;
pub mod report;
pub mod run;

pub use build::*;
pub use console::*;
pub use discover::*;
pub use report::*;
pub use run::*;
