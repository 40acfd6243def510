//! Dials a plugin's gRPC channel over a Unix domain socket.
//!
//! `tonic::transport::Channel` only speaks HTTP/TCP out of the box; reaching
//! a local socket means handing it a custom `tower::Service` connector. The
//! URI passed to the endpoint is never actually resolved — it exists only to
//! satisfy `Endpoint`'s API — the real address is captured by the closure.

use std::path::Path;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use crate::error::{ProviderError, Result};

pub async fn connect(provider_id: &str, socket_path: &Path) -> Result<Channel> {
    let socket_path = socket_path.to_path_buf();
    // Dummy authority: never dialed over the network, only used by the
    // connector below to decide where to actually connect.
    let channel = Endpoint::try_from("http://[::]:50051")
        .expect("static endpoint URI is always valid")
        .connect_with_connector(service_fn(move |_: Uri| {
            let socket_path = socket_path.clone();
            async move {
                let stream = UnixStream::connect(socket_path).await?;
                Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(stream))
            }
        }))
        .await
        .map_err(|source| ProviderError::Transport {
            provider_id: provider_id.to_string(),
            source,
        })?;
    Ok(channel)
}
