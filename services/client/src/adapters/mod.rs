pub mod http;
pub mod storage;

pub use http::HttpStudyApi;
pub use storage::{JsonFileStorage, StorageError};
