// zensh-net/src/github.rs
//! Release lookup and asset download against the GitHub REST API.

use std::io::Read;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use zensh_common::client::ReleaseSource;
use zensh_common::error::{Result, ZenshError};
use zensh_common::model::Asset;

use crate::http::{build_http_client, get_checked, GITHUB_JSON, OCTET_STREAM};
use crate::platform::Platform;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    id: Option<u64>,
    name: Option<String>,
    content_type: Option<String>,
}

/// `ReleaseSource` for public (or token-accessible) GitHub repositories.
#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    api_base: String,
    platform: Platform,
}

impl GithubReleases {
    pub fn new(token: Option<&str>) -> Result<Self> {
        Ok(Self::from_client(build_http_client(token)?))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            platform: Platform::current(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn release_url(&self, owner: &str, repo: &str, tag: Option<&str>) -> String {
        match tag {
            Some(tag) => format!("{}/repos/{owner}/{repo}/releases/tags/{tag}", self.api_base),
            None => format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base),
        }
    }
}

/// First asset whose lowercased name matches the platform and whose content
/// type is an `application` type. Assets missing any field are ignored.
fn select_asset(release: &Release, owner: &str, repo: &str, platform: &Platform) -> Result<Asset> {
    release
        .assets
        .iter()
        .find_map(|candidate| {
            let (Some(id), Some(name), Some(content_type)) =
                (candidate.id, &candidate.name, &candidate.content_type)
            else {
                return None;
            };
            (platform.matches(name) && content_type.starts_with("application")).then(|| Asset {
                id,
                name: name.clone(),
                owner: owner.to_string(),
                repo: repo.to_string(),
            })
        })
        .ok_or_else(|| ZenshError::AssetNotFound {
            repo: format!("{owner}/{repo}"),
            os: platform.os,
            arch: platform.arch,
        })
}

impl ReleaseSource for GithubReleases {
    #[instrument(skip(self), level = "debug")]
    fn fetch_latest_or_tagged(&self, owner: &str, repo: &str, tag: Option<&str>) -> Result<Asset> {
        let url = self.release_url(owner, repo, tag);
        let response = get_checked(&self.client, &url, GITHUB_JSON).map_err(|e| match e {
            ZenshError::HttpStatus { status: 404, .. } => ZenshError::NotFound(match tag {
                Some(tag) => format!("release {tag} of {owner}/{repo}"),
                None => format!("latest release of {owner}/{repo}"),
            }),
            other => other,
        })?;
        let release: Release = response.json()?;
        debug!(
            "Release {} of {}/{} has {} assets",
            release.tag_name.as_deref().unwrap_or("?"),
            owner,
            repo,
            release.assets.len()
        );
        select_asset(&release, owner, repo, &self.platform)
    }

    fn open(&self, asset: &Asset) -> Result<Box<dyn Read + Send>> {
        let url = format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_base, asset.owner, asset.repo, asset.id
        );
        let response = get_checked(&self.client, &url, OCTET_STREAM)?;
        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::http::http_client_builder;

    const LINUX_64: Platform = Platform { os: "linux", arch: "x86_64" };

    fn local_source(token: Option<&str>, base: &str) -> GithubReleases {
        let client = http_client_builder(token).unwrap().no_proxy().build().unwrap();
        GithubReleases::from_client(client)
            .with_api_base(base)
            .with_platform(LINUX_64)
    }

    fn release(json: &str) -> Release {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn selects_first_platform_match_with_application_type() {
        let rel = release(
            r#"{"tag_name":"0.44.1","assets":[
                {"id":1,"name":"fzf-0.44.1-darwin_amd64.zip","content_type":"application/zip"},
                {"id":2,"name":"fzf-0.44.1-linux_amd64.tar.gz.sig","content_type":"text/plain"},
                {"id":3,"name":"fzf-0.44.1-linux_amd64.tar.gz","content_type":"application/gzip"},
                {"id":4,"name":"fzf-0.44.1-linux_amd64.zip","content_type":"application/zip"}
            ]}"#,
        );
        let asset = select_asset(&rel, "junegunn", "fzf", &LINUX_64).unwrap();
        assert_eq!(asset.id, 3);
        assert_eq!(asset.name, "fzf-0.44.1-linux_amd64.tar.gz");
        assert_eq!(asset.full_name(), "junegunn/fzf");
    }

    #[test]
    fn incomplete_assets_are_skipped() {
        let rel = release(
            r#"{"assets":[
                {"id":null,"name":"tool-linux-amd64","content_type":"application/octet-stream"},
                {"id":7,"name":"tool-linux-amd64","content_type":null}
            ]}"#,
        );
        let err = select_asset(&rel, "o", "tool", &LINUX_64).unwrap_err();
        assert!(matches!(
            err,
            ZenshError::AssetNotFound { ref repo, os: "linux", arch: "x86_64" } if repo == "o/tool"
        ));
    }

    /// Serves one canned response per expected request, recording request lines.
    fn serve(responses: Vec<(u16, &'static str, Vec<u8>)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, content_type, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = Vec::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    request.push(line.trim_end().to_string());
                }
                seen.push(request.join("\n"));
                write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .unwrap();
                stream.write_all(&body).unwrap();
            }
            seen
        });
        (base, handle)
    }

    #[test]
    fn fetches_release_and_downloads_asset() {
        let json = br#"{"tag_name":"v1","assets":[{"id":42,"name":"tool-linux-x86_64","content_type":"application/octet-stream"}]}"#;
        let (base, server) = serve(vec![
            (200, "application/json", json.to_vec()),
            (200, "application/octet-stream", b"binary".to_vec()),
        ]);
        let source = local_source(Some("secret"), &base);

        let asset = source.fetch_latest_or_tagged("o", "tool", Some("v1")).unwrap();
        assert_eq!(asset.id, 42);
        let mut body = Vec::new();
        source.open(&asset).unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"binary");

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("GET /repos/o/tool/releases/tags/v1 "));
        assert!(requests[0].to_lowercase().contains("authorization: bearer secret"));
        assert!(requests[1].starts_with("GET /repos/o/tool/releases/assets/42 "));
        assert!(requests[1].to_lowercase().contains("accept: application/octet-stream"));
    }

    #[test]
    fn missing_release_is_not_found_and_failed_download_is_http_status() {
        let (base, server) = serve(vec![
            (404, "application/json", b"{}".to_vec()),
            (500, "text/plain", b"boom".to_vec()),
        ]);
        let source = local_source(None, &base);

        let err = source.fetch_latest_or_tagged("o", "tool", None).unwrap_err();
        assert!(matches!(err, ZenshError::NotFound(_)));

        let asset = Asset {
            id: 9,
            name: "x".to_string(),
            owner: "o".to_string(),
            repo: "tool".to_string(),
        };
        let err = source.open(&asset).err().unwrap();
        assert!(matches!(err, ZenshError::HttpStatus { status: 500, .. }));

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("GET /repos/o/tool/releases/latest "));
    }
}
