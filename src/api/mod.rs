pub mod error;
pub mod image;

pub use error::ApiError;

pub fn routes() -> Vec<rocket::Route> {
    routes![
        image::resolve_record,
        image::get_image,
        image::get_status,
        image::rescan,
    ]
}
