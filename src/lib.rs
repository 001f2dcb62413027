//! Load, validate and emit the descriptor a service-worker precaching tool
//! reads at build time.

pub mod app;

pub use app::error::{DescriptorError, Field, PatternError};
pub use app::matcher::{PrecacheMatcher, Selection};
pub use app::models::{ConfigurationDescriptor, RawDescriptor};
