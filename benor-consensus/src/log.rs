use benor_common::Message;

/// Append-only record of every message a node has received.
///
/// Messages are indexed by the round they claim. Nothing is removed unless
/// the node is configured with a retention window, in which case rounds
/// that fall behind the window are dropped with [`MessageLog::retain_from`].
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    /// Appends unconditionally: no deduplication.
    pub fn record(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Messages claiming `round`, in arrival order.
    pub fn messages_for_round(&self, round: u64) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.round == round)
            .cloned()
            .collect()
    }

    /// Drops every message older than `round`. Returns how many were dropped.
    pub fn retain_from(&mut self, round: u64) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| m.round >= round);
        before - self.messages.len()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
