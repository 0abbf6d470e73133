pub mod controller;
pub mod downloader;
pub mod error;
pub mod events;
pub mod http_client;
pub mod paths;
pub mod version;
