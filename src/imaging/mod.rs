pub mod codec;
pub mod profile;

pub use codec::{encode_data_uri, load_upload, SharedImage};
pub use profile::{analyze_image, ImageProfile, ProfileSettings};
