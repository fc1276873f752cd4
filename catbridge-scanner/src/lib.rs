pub mod client;
pub mod config;
pub mod crawler;
pub mod error;
pub mod graph;
pub mod main_article;
pub mod memory;
pub mod result;
pub mod retry;

pub use client::{WikiApi, WikiClient};
pub use config::WikiConfig;
pub use crawler::{CategoryCrawler, ProgressCallback};
pub use error::ScanError;
pub use graph::{CategoryGraph, GraphNode, NodeIdentity, NodeKind};
pub use main_article::{MainArticle, MainArticleResolver, MainArticleStrategy};
pub use memory::InMemoryWiki;
pub use result::{CategoryMember, CrawlStats, PageRef, WikiPage};
pub use retry::Retrying;
