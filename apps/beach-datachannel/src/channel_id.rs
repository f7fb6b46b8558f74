pub const DEFAULT_CHANNEL_PREFIX: &str = "TestChannel";

/// Hands out data-channel labels: a fixed prefix plus a counter that starts at
/// zero and only ever grows.
#[derive(Debug)]
pub struct ChannelIdAllocator {
    prefix: String,
    next: u64,
}

impl ChannelIdAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

impl Default for ChannelIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_PREFIX)
    }
}
