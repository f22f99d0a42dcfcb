//! Ad Video Relay library.
//!
//! An HTTP service that opens ad-library pages in a headless browser, picks a
//! video from the page, and hands it back as an attachment, a multipart form,
//! or base64 JSON. It also relays brand data to workflow-engine webhooks.

pub mod config;
pub mod constants;
pub mod extractor;
pub mod web;
pub mod webhooks;
