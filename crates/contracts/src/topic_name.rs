//! TopicName - shared topic identifier
//!
//! Topic names are resolved once per selection and then cloned into every
//! handle, buffer and map key, so the name is held behind an `Arc<str>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Name of a recorded topic, e.g. `/front/imu`.
///
/// Equality, ordering and hashing follow the underlying string, so maps keyed
/// by `TopicName` can be looked up with a plain `&str`.
///
/// ```
/// use contracts::TopicName;
///
/// let topic: TopicName = "/front/imu".into();
/// assert_eq!(topic.column_name("acc.x"), "/front/imu.acc.x");
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicName(Arc<str>);

impl TopicName {
    /// Namespace a leaf path under this topic (`"<topic>.<leaf>"`).
    #[inline]
    pub fn column_name(&self, leaf_path: &str) -> String {
        format!("{}.{}", self.0, leaf_path)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TopicName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TopicName {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TopicName {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for TopicName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl PartialEq<str> for TopicName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for TopicName {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicName({:?})", &*self.0)
    }
}

impl Serialize for TopicName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TopicName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_clone_shares_storage() {
        let topic: TopicName = "/front/camera".into();
        let copy = topic.clone();
        assert_eq!(topic.as_str().as_ptr(), copy.as_str().as_ptr());
    }

    #[test]
    fn test_column_name() {
        let topic: TopicName = "/front/imu".into();
        assert_eq!(topic.column_name("acceleration.x"), "/front/imu.acceleration.x");
    }

    #[test]
    fn test_ordering_follows_str() {
        let mut topics: Vec<TopicName> = vec!["/imu".into(), "/gps".into(), "/camera".into()];
        topics.sort();
        assert_eq!(topics, vec!["/camera", "/gps", "/imu"]);
    }

    #[test]
    fn test_map_lookup_by_str() {
        let mut counts: BTreeMap<TopicName, usize> = BTreeMap::new();
        counts.insert("/imu".into(), 10);
        counts.insert(String::from("/gps").into(), 3);

        assert_eq!(counts.get("/imu"), Some(&10));
        assert_eq!(counts.get("/gps"), Some(&3));
        assert_eq!(counts.get("/lidar"), None);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let topic: TopicName = "/odom".into();
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, "\"/odom\"");

        let parsed: TopicName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, topic);
        assert_eq!(format!("{parsed}"), "/odom");
    }
}
