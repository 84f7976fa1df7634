pub mod background;
pub mod blob;
pub mod blob_detector;
pub mod masks;
pub mod pixel;
