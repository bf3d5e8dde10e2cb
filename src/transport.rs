//! The injected fetcher the core downloads through.

use {
    futures::io::{AsyncRead, AsyncReadExt},
    isahc::{
        config::{Configurable, RedirectPolicy},
        http::StatusCode,
        HttpClient,
    },
    once_cell::sync::Lazy,
    std::{future::Future, io, pin::Pin},
    url::Url,
};

/// Abstract byte-stream fetcher. Implementations resolve a URL to an async
/// reader; everything else (decompression, hashing, decoding) is layered on
/// top by the caller. Dropping a returned future or reader cancels the
/// underlying request.
pub trait TransportProvider: Sync + Send {
    fn open(
        &self,
        url: &str,
    ) -> impl Future<Output = io::Result<Pin<Box<dyn AsyncRead + Send>>>> + Send;

    /// Reads a resource fully, up to `limit` bytes.
    fn fetch(&self, url: &str, limit: u64) -> impl Future<Output = io::Result<Vec<u8>>> + Send {
        async move {
            let mut buf = Vec::new();
            self.open(url).await?.take(limit).read_to_end(&mut buf).await?;
            Ok(buf)
        }
    }
}

fn client() -> &'static HttpClient {
    static SHARED: Lazy<HttpClient> = Lazy::new(|| {
        HttpClient::builder()
            .redirect_policy(RedirectPolicy::Limit(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client")
    });
    &SHARED
}

/// Shared-client HTTP transport, with `file://` support for local mirrors.
#[derive(Clone, Default)]
pub struct HttpTransport {}

impl HttpTransport {
    pub fn new() -> Self {
        Self {}
    }
}

impl TransportProvider for HttpTransport {
    async fn open(&self, url: &str) -> io::Result<Pin<Box<dyn AsyncRead + Send>>> {
        let url = to_url(url)?;
        match url.scheme() {
            "http" | "https" => {
                let rsp = client().get_async(url.as_str()).await?;
                match rsp.status() {
                    StatusCode::OK => {
                        Ok(Box::pin(rsp.into_body()) as Pin<Box<dyn AsyncRead + Send>>)
                    }
                    StatusCode::NOT_FOUND => {
                        Err(io::Error::new(io::ErrorKind::NotFound, url.to_string()))
                    }
                    code => Err(io::Error::other(format!(
                        "unexpected HTTP response {}",
                        code
                    ))),
                }
            }
            "file" => Ok(Box::pin(async_std::fs::File::open(url.path()).await?)),
            s => Err(io::Error::other(format!("unsupported transport {}", s))),
        }
    }
}

fn to_url(url: &str) -> io::Result<Url> {
    Url::parse(url).map_err(|err| match err {
        url::ParseError::RelativeUrlWithoutBase => {
            io::Error::other(format!("expects absolute path: {}", url))
        }
        other => io::Error::other(format!("invalid URL {}: {}", url, other)),
    })
}
