/// Snapshot of one active subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    /// Generated subscription id (`sub-N`).
    pub id: String,
    /// Topic destination the subscription is registered on.
    pub destination: String,
    /// Millis since Unix epoch when the subscription was created.
    pub created_at_ms: u64,
}
