mod article;
mod category;
mod feed;
mod report;
mod summary;

pub use article::{Article, NewArticle};
pub use category::Category;
#[cfg(test)]
pub use feed::CacheEntry;
pub use feed::{CategoryStats, FeedItem, FeedPage, StoreStats, Story};
pub use report::{
    CategoryAbort, CategoryIngest, CategoryKeep, IngestReport, KeeperReport, SummarizeReport,
};
pub use summary::NewSummary;
#[cfg(test)]
pub use summary::Summary;
