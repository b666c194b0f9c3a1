pub mod domain;
pub mod images;
pub mod render;
pub mod store;

pub use domain::{Category, GuideSummary};
pub use images::ImageStore;
pub use store::{GuideStore, NewGuide};
