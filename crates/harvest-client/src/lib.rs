pub mod fetcher;
pub mod links;
pub mod semantic;

pub use fetcher::ReqwestFetcher;
pub use links::ScraperLinkExtractor;
pub use semantic::OpenAiLinkLabeler;
