use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("could not build upstream client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Failures reaching the analytics API, as opposed to the API answering with an error.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("{0}")]
    Request(reqwest::Error),
    #[error("failed to read upstream body: {0}")]
    Body(reqwest::Error),
}
