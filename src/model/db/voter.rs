use serde::{Deserialize, Serialize};

/// An entry in the eligible-voter registry.
///
/// Only membership matters; the registry is maintained by the surrounding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidVoter {
    /// Voter identity as asserted by the identity provider.
    #[serde(rename = "_id")]
    pub identity: String,
}

impl ValidVoter {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}
