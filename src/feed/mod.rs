pub mod http;
pub mod ports;
pub mod testing;

pub use http::HttpNewsFeed;
pub use ports::{
    AnomalyQuery, ArticleQuery, CountQuery, FeedError, FeedErrorKind, NewsFeedPort,
};
pub use testing::ScriptedFeed;
