/// Full-document text payload pushed by the remote peer.
///
/// The wire protocol attaches no envelope, identity or sequence number;
/// every frame replaces all prior content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame(pub String);

impl InboundFrame {
    pub fn into_content(self) -> String {
        self.0
    }
}

impl From<&str> for InboundFrame {
    fn from(content: &str) -> Self {
        InboundFrame(content.to_string())
    }
}

/// Full-document text payload produced by a local change. Sent verbatim,
/// no batching, no diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame(pub String);

impl OutboundFrame {
    pub fn into_payload(self) -> String {
        self.0
    }
}

impl From<&str> for OutboundFrame {
    fn from(payload: &str) -> Self {
        OutboundFrame(payload.to_string())
    }
}
