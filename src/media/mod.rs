mod filename;
mod source;
mod twitter;
mod types;
pub mod url;

pub use filename::make_file_name;
pub use source::MediaSource;
pub use twitter::TwitterApi;
pub use types::{MediaDescriptor, MediaError, PostReference};
