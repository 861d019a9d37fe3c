pub mod image;

pub use image::{ImageRecord, Referent, ResolveStatus, StatusResponse};
