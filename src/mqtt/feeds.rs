//! Cloud feed topics: `<account>/feeds/<feed>`.

use crate::actuator::ActuatorId;

/// Actuators mirrored to, and controllable from, the cloud broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudFeed {
    Fan,
    Light,
}

impl CloudFeed {
    pub const ALL: [CloudFeed; 2] = [CloudFeed::Fan, CloudFeed::Light];

    pub fn key(self) -> &'static str {
        match self {
            CloudFeed::Fan => "fan",
            CloudFeed::Light => "light",
        }
    }

    pub fn topic(self, account: &str) -> String {
        format!("{}/feeds/{}", account, self.key())
    }

    /// Feed addressed by `topic`, if it belongs to `account`.
    pub fn from_topic(topic: &str, account: &str) -> Option<Self> {
        let key = topic.strip_prefix(account)?.strip_prefix("/feeds/")?;
        Self::ALL.into_iter().find(|feed| feed.key() == key)
    }

    pub fn actuator(self) -> ActuatorId {
        match self {
            CloudFeed::Fan => ActuatorId::Fan,
            CloudFeed::Light => ActuatorId::Light,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_lookup() {
        for feed in CloudFeed::ALL {
            assert_eq!(CloudFeed::from_topic(&feed.topic("alice"), "alice"), Some(feed));
        }
        assert_eq!(CloudFeed::topic(CloudFeed::Light, "alice"), "alice/feeds/light");
    }

    #[test]
    fn test_foreign_topics_ignored() {
        assert_eq!(CloudFeed::from_topic("bob/feeds/fan", "alice"), None);
        assert_eq!(CloudFeed::from_topic("alice/feeds/air", "alice"), None);
        assert_eq!(CloudFeed::from_topic("alice/feeds/fan/json", "alice"), None);
        assert_eq!(CloudFeed::from_topic("alicefeeds/fan", "alice"), None);
    }
}
