//! Protocol definitions for the provider plugin boundary (C5).
//!
//! This is the wire format every out-of-process encoder backend speaks: the
//! RPC surface from spec.md §4.5 (`GetInfo`, `StartTranscode`, `GetProgress`,
//! …), transported as gRPC over a local Unix domain socket. The core only
//! ever talks to a plugin through these generated types.

pub mod pb {
    #![allow(clippy::all)]
    #![allow(warnings)]
    include!(concat!(env!("OUT_DIR"), "/viewra.transcode.rs"));
}

pub use pb::transcode_provider_client::TranscodeProviderClient;
pub use pb::transcode_provider_server::{TranscodeProvider, TranscodeProviderServer};
pub use pb::{
    Container, Empty, GetProgressRequest, GetStreamRequest, GetSupportedFormatsResponse,
    ProgressInfo, ProviderInfo, Resolution, SpeedPriority, StopRequest, StreamChunk,
    StreamHandle, TranscodeHandle, TranscodeRequest,
};
