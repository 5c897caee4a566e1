//! Defines the custom error types for the email-harvester application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for the crawl-and-extract engine.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing CSV output.
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error driving the headless rendering engine.
    #[error("Browser Error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    /// Failed to extract a domain from the provided URL.
    #[error("Failed to extract domain from URL: {0}")]
    DomainExtraction(String),

    /// Error related to concurrency or task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
