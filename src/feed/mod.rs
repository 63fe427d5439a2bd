pub mod gnews;
mod normalize;

pub use gnews::{GNewsClient, NewsProvider};
pub use normalize::normalize;
