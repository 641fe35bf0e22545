#[macro_use]
pub mod macros;
pub mod file_format;
pub mod file_utils;
pub mod log_setup;
pub mod normalize_string;
pub mod output_stream;
pub mod scoped_ref;
pub mod serde;
pub mod string_ext;
pub mod test_utils;

pub use file_format::SerdeFormat;
pub use scoped_ref::ScopeRef;
