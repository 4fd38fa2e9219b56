//! MQTT topic naming.
//!
//! Every topic the gateway touches is derived here, so the publishing side
//! (`devices/{id}/cmd`) and the subscribing side (`devices/+/status`) can never
//! disagree about where a device lives.

/// Root segment shared by all device topics.
const ROOT: &str = "devices";

/// Wildcard filter covering the status topic of every device.
pub const STATUS_FILTER: &str = "devices/+/status";

/// Topic a device listens on for `on` / `off` commands.
pub fn command_topic(device_id: &str) -> String {
    format!("{ROOT}/{device_id}/cmd")
}

/// Topic a device reports its state on. Also the status cache key.
pub fn status_topic(device_id: &str) -> String {
    format!("{ROOT}/{device_id}/status")
}

/// Extract the device id from a status topic, if `topic` is one.
///
/// Returns `None` for anything [`STATUS_FILTER`] would not match: a different
/// root, a trailing segment other than `status`, or an id spanning levels.
pub fn device_from_status_topic(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix(ROOT)?.strip_prefix('/')?;
    let id = rest.strip_suffix("/status")?;
    if id.contains('/') {
        return None;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_topic_format() {
        assert_eq!(command_topic("fan202"), "devices/fan202/cmd");
    }

    #[test]
    fn status_topic_format() {
        assert_eq!(status_topic("fan202"), "devices/fan202/status");
    }

    #[test]
    fn status_topic_round_trips_through_filter_match() {
        let topic = status_topic("lamp-7");
        assert_eq!(device_from_status_topic(&topic), Some("lamp-7"));
    }

    #[test]
    fn empty_device_id_is_a_single_empty_level() {
        // `devices//status` still matches `devices/+/status`
        assert_eq!(device_from_status_topic("devices//status"), Some(""));
    }

    #[test]
    fn rejects_command_topic() {
        assert_eq!(device_from_status_topic("devices/fan202/cmd"), None);
    }

    #[test]
    fn rejects_multi_level_id() {
        assert_eq!(device_from_status_topic("devices/a/b/status"), None);
    }

    #[test]
    fn rejects_other_root() {
        assert_eq!(device_from_status_topic("sensors/fan202/status"), None);
        assert_eq!(device_from_status_topic("devicesx/fan202/status"), None);
    }
}
