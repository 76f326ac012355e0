pub mod build;
pub mod convert;
pub mod create;
pub mod import;
pub mod sync;
