//! Distributed tracing helpers shared across the workspace's gRPC and HTTP
//! boundaries. Actual subscriber setup lives in [`crate::logging`]; this
//! module only builds the spans those boundaries enter.

/// Context propagation for distributed tracing
pub mod context {
    /// Extract trace context from HTTP headers
    pub fn extract_from_http(headers: &http::HeaderMap) -> tracing::Span {
        use http::header::HeaderName;

        // Check for traceparent header (W3C Trace Context)
        let trace_parent_header = HeaderName::from_static("traceparent");
        if let Some(trace_parent) = headers.get(&trace_parent_header) {
            match trace_parent.to_str() {
                Ok(trace_str) => {
                    tracing::debug!(trace_parent = %trace_str, "Extracting trace context from HTTP");
                    // In production, you would use opentelemetry propagator here
                    return tracing::info_span!("http_request", trace_context = %trace_str);
                }
                Err(_) => {
                    tracing::warn!("Invalid traceparent header value");
                }
            }
        }

        // No trace context, create new span
        tracing::info_span!("http_request")
    }

    /// Create a span for a provider plugin RPC call
    pub fn grpc_span(method: &str, provider_id: &str) -> tracing::Span {
        tracing::info_span!("provider_rpc", method = %method, provider_id = %provider_id)
    }

    /// Create a span for an encoder process lifecycle operation
    pub fn process_span(operation: &str, pid: u32) -> tracing::Span {
        tracing::info_span!("process_op", operation = %operation, pid = pid)
    }

    /// Create a span scoped to a single transcode session
    pub fn session_span(session_id: uuid::Uuid) -> tracing::Span {
        tracing::info_span!("session", session_id = %session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_extraction() {
        let headers = http::HeaderMap::new();
        let span = context::extract_from_http(&headers);
        drop(span);
    }

    #[test]
    fn test_create_spans() {
        let grpc_span = context::grpc_span("StartTranscode", "ffmpeg");
        let process_span = context::process_span("spawn", 1234);
        let session_span = context::session_span(uuid::Uuid::new_v4());
        drop((grpc_span, process_span, session_span));
    }
}
