use crate::nt::instance::{EntryNotification, NetworkTableInstance, NotifyFlags};
use crate::nt::value::Value;
use log::warn;

/// A view of the entries under `/<name>/`.
#[derive(Clone)]
pub struct NetworkTable {
    instance: NetworkTableInstance,
    path: String,
}

impl NetworkTable {
    pub(crate) fn new(instance: NetworkTableInstance, name: &str) -> Self {
        let trimmed = name.trim_matches('/');
        NetworkTable {
            instance,
            path: format!("/{}", trimmed),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get_entry(&self, key: &str) -> NetworkTableEntry {
        NetworkTableEntry::new(self.instance.clone(), &format!("{}/{}", self.path, key))
    }

    pub fn put_number(&self, key: &str, value: f64) -> bool {
        self.get_entry(key).set_value(Value::Double(value))
    }

    pub fn put_number_array(&self, key: &str, values: &[f64]) -> bool {
        self.get_entry(key).set_value(Value::DoubleArray(values.to_vec()))
    }

    pub fn put_string(&self, key: &str, value: &str) -> bool {
        self.get_entry(key).set_value(Value::String(value.to_string()))
    }

    pub fn put_string_array(&self, key: &str, values: &[String]) -> bool {
        self.get_entry(key).set_value(Value::StringArray(values.to_vec()))
    }

    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        self.get_entry(key)
            .get_value()
            .and_then(|v| v.as_double())
            .unwrap_or(default)
    }
}

#[derive(Clone)]
pub struct NetworkTableEntry {
    instance: NetworkTableInstance,
    key: String,
}

impl NetworkTableEntry {
    pub(crate) fn new(instance: NetworkTableInstance, key: &str) -> Self {
        NetworkTableEntry {
            instance,
            key: key.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.key
    }

    pub fn get_value(&self) -> Option<Value> {
        self.instance.get_value(&self.key)
    }

    pub fn set_value(&self, value: Value) -> bool {
        let stored = self.instance.set_value(&self.key, value);
        if !stored {
            warn!("Could not update entry '{}': type mismatch", self.key);
        }
        stored
    }

    pub fn add_listener<F>(&self, callback: F, flags: NotifyFlags)
    where
        F: Fn(&EntryNotification) + Send + Sync + 'static,
    {
        self.instance.add_entry_listener(&self.key, flags, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_entries_are_prefixed() {
        let nt = NetworkTableInstance::new();
        let vision = nt.get_table("Vision");
        assert!(vision.put_number("Frame Rate (fps)", 29.5));
        assert!(vision.put_number_array("Center Color", &[10.0, 200.0, 250.0]));

        assert_eq!(nt.get_value("/Vision/Frame Rate (fps)"), Some(Value::Double(29.5)));
        assert_eq!(
            nt.get_value("/Vision/Center Color"),
            Some(Value::DoubleArray(vec![10.0, 200.0, 250.0]))
        );
        assert_eq!(vision.get_number("Frame Rate (fps)", 0.0), 29.5);
        assert_eq!(vision.get_number("missing", -1.0), -1.0);
    }

    #[test]
    fn nested_names_are_normalised() {
        let nt = NetworkTableInstance::new();
        assert_eq!(nt.get_table("/CameraPublisher/front/").path(), "/CameraPublisher/front");
    }
}
