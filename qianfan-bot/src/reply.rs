//! Reply payloads handed back to the dispatcher.

/// What a command invocation hands back: reply text plus, optionally, a
/// base64-encoded PNG illustration. Rendering is the dispatcher's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub image_b64: Option<String>,
}

impl Reply {
    /// A text-only reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_b64: None,
        }
    }

    /// A reply carrying both text and an illustration.
    pub fn with_image(text: impl Into<String>, image_b64: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_b64: Some(image_b64.into()),
        }
    }

    /// An image-only reply.
    pub fn image(image_b64: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            image_b64: Some(image_b64.into()),
        }
    }
}
