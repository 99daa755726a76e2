//! Broker message type.

/// A message as sent to, and delivered by, the broker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Broker-assigned identifier (empty until sent)
    pub id: String,
    /// Destination topic; empty means "use the producer's default topic"
    pub topic: String,
    /// Optional tag used by consumer tag filters
    pub tag: Option<String>,
    /// Optional business keys
    pub keys: Option<String>,
    /// Serialized body (typically JSON or binary)
    pub body: Vec<u8>,
    /// User properties
    pub properties: Vec<(String, String)>,
    /// Number of times this message has been handed back for reconsumption
    pub reconsume_times: u32,
}

impl Message {
    /// Create a new message for `topic` with the given body.
    pub fn new(topic: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            body,
            ..Self::default()
        }
    }

    /// Create a message with a string body.
    pub fn with_string_body(topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(topic, body.into().into_bytes())
    }

    /// Create a message with a bitcode-serialized body.
    pub fn encode<T: serde::Serialize>(
        topic: impl Into<String>,
        body: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(body)?;
        Ok(Self::new(topic, bytes))
    }

    /// Decode the body from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.body)
    }

    /// Create a message with a JSON body.
    pub fn json<T: serde::Serialize>(
        topic: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(body)?;
        Ok(Self::new(topic, bytes))
    }

    /// Decode a JSON body.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Set the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Set the business keys.
    pub fn with_keys(mut self, keys: impl Into<String>) -> Self {
        self.keys = Some(keys.into());
        self
    }

    /// Add a user property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Look up a user property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
