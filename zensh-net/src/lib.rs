// zensh-net/src/lib.rs
pub mod github;
pub mod http;
pub mod platform;

pub use github::GithubReleases;
pub use platform::Platform;
