//! External process adapter
//!
//! Every packaging tool mpkg drives (pkgbuild, productbuild, notarytool, ...)
//! is launched through this crate. [`run`] is the async variant used by the
//! build pipeline, [`run_blocking`] gives the same contract without a runtime.
//!
//! Both variants capture stdout and stderr completely, trim one trailing
//! newline from each and never fail: a tool that cannot be launched reports
//! [`LAUNCH_FAILURE`] as its exit code.
//!
//! There is no timeout. A tool that never exits blocks its caller.

mod blocking;
mod invocation;
#[cfg(feature = "mock")]
pub mod mock;
mod result;
mod runner;

pub use blocking::run_blocking;
pub use invocation::Invocation;
pub use result::{ProcessResult, LAUNCH_FAILURE};
pub use runner::{run, SystemRunner, ToolRunner};
