pub mod catalog;
pub mod gallery;
pub mod store;

pub use catalog::ServiceCatalog;
pub use gallery::GalleryService;
