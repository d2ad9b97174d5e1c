pub mod services;

pub use services::{upload_media, UploadItem};
