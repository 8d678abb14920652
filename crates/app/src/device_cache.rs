//! In-memory device-state cache.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use homeflow_domain::device_state::{DeviceState, StateLookup};
use homeflow_domain::id::DeviceId;
use homeflow_domain::time::Timestamp;
use homeflow_domain::value::{AttributeValue, Attributes};

/// Last-known state of every device seen on the bus.
///
/// Writers build the merged state off to the side and swap the `Arc`, so
/// concurrent readers always see a complete record. There is no eviction.
#[derive(Debug, Default)]
pub struct DeviceStateCache {
    devices: RwLock<HashMap<DeviceId, Arc<DeviceState>>>,
}

impl DeviceStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a state report into the entry for `device_id`, creating it
    /// if absent.
    pub fn merge(
        &self,
        device_id: &DeviceId,
        device_type: Option<&str>,
        attributes: &Attributes,
        at: Timestamp,
    ) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = devices.get(device_id).map_or_else(
            || DeviceState::new(device_id.clone(), at),
            |current| DeviceState::clone(current),
        );
        next.merge(attributes, device_type, at);
        devices.insert(device_id.clone(), Arc::new(next));
    }

    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<Arc<DeviceState>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    /// The known type of `device_id`, if any.
    #[must_use]
    pub fn device_type(&self, device_id: &DeviceId) -> Option<String> {
        self.get(device_id)?.device_type.clone()
    }
}

impl StateLookup for DeviceStateCache {
    fn attribute(&self, device_id: &DeviceId, attribute: &str) -> Option<AttributeValue> {
        self.get(device_id)?.attribute(attribute).cloned()
    }
}

#[cfg(test)]
mod tests {
    use homeflow_domain::time::now;

    use super::*;

    fn report(name: &str, value: AttributeValue) -> Attributes {
        Attributes::from([(name.to_string(), value)])
    }

    #[test]
    fn should_create_entry_when_device_first_seen() {
        let cache = DeviceStateCache::new();
        let id = DeviceId::new("sensor1");
        cache.merge(&id, Some("sensor"), &report("temperature", AttributeValue::Int(20)), now());

        let state = cache.get(&id).unwrap();
        assert!(state.online);
        assert_eq!(cache.device_type(&id).as_deref(), Some("sensor"));
        assert_eq!(
            cache.attribute(&id, "temperature"),
            Some(AttributeValue::Int(20))
        );
    }

    #[test]
    fn should_merge_fields_when_device_reports_again() {
        let cache = DeviceStateCache::new();
        let id = DeviceId::new("sensor1");
        cache.merge(&id, None, &report("temperature", AttributeValue::Int(20)), now());
        cache.merge(&id, None, &report("humidity", AttributeValue::Int(55)), now());

        assert_eq!(cache.attribute(&id, "temperature"), Some(AttributeValue::Int(20)));
        assert_eq!(cache.attribute(&id, "humidity"), Some(AttributeValue::Int(55)));
    }

    #[test]
    fn should_keep_previous_snapshot_unchanged_after_merge() {
        let cache = DeviceStateCache::new();
        let id = DeviceId::new("sensor1");
        cache.merge(&id, None, &report("temperature", AttributeValue::Int(20)), now());
        let before = cache.get(&id).unwrap();

        cache.merge(&id, None, &report("temperature", AttributeValue::Int(25)), now());

        assert_eq!(before.attribute("temperature"), Some(&AttributeValue::Int(20)));
    }

    #[test]
    fn should_return_none_for_unknown_device() {
        let cache = DeviceStateCache::new();
        assert!(cache.device_type(&DeviceId::new("ghost")).is_none());
        assert!(cache.attribute(&DeviceId::new("ghost"), "x").is_none());
    }
}
