use serde_json::{Map, Value};

/// A leaf that differs between two payloads.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    pub path: String,
    pub old: Value,
    pub new: Value,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn channel_of(item: &Value) -> Option<&Value> {
    item.get("channel")
}

/// Collects leaf changes from `previous` to `current`.
///
/// Lists of channel objects are matched by `channel` rather than position,
/// so a device reporting channels in a different order is not a change.
pub(crate) fn diff_payload(previous: &Value, current: &Value, path_prefix: &str, changes: &mut Vec<Change>) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = join(path_prefix, key);
                match prev_map.get(key) {
                    Some(prev_val) => diff_payload(prev_val, curr_val, &path, changes),
                    None if curr_val.is_object() => {
                        diff_payload(&Value::Object(Map::new()), curr_val, &path, changes);
                    }
                    None => changes.push(Change {
                        path,
                        old: Value::Null,
                        new: curr_val.clone(),
                    }),
                }
            }
        }
        (Value::Array(prev_items), Value::Array(curr_items))
            if curr_items.iter().all(|i| channel_of(i).is_some()) =>
        {
            for curr_item in curr_items {
                let channel = channel_of(curr_item).unwrap_or(&Value::Null);
                let path = join(path_prefix, &format!("[{channel}]"));
                let prev_item = prev_items
                    .iter()
                    .find(|p| channel_of(p) == Some(channel))
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                diff_payload(&prev_item, curr_item, &path, changes);
            }
        }
        (prev, curr) if prev != curr => changes.push(Change {
            path: path_prefix.to_string(),
            old: prev.clone(),
            new: curr.clone(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_leaf_change() {
        let prev = json!({"togglex": {"channel": 0, "onoff": 0}});
        let curr = json!({"togglex": {"channel": 0, "onoff": 1}});
        let mut changes = vec![];
        diff_payload(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "togglex.onoff");
        assert_eq!(changes[0].old, json!(0));
        assert_eq!(changes[0].new, json!(1));
    }

    #[test]
    fn ignores_unchanged() {
        let val = json!({"mode": [{"channel": 0, "mode": 1, "targetTemp": 210}]});
        let mut changes = vec![];
        diff_payload(&val, &val, "", &mut changes);
        assert!(changes.is_empty());
    }

    #[test]
    fn channel_lists_match_by_channel() {
        let prev = json!({"togglex": [{"channel": 0, "onoff": 1}, {"channel": 1, "onoff": 0}]});
        let curr = json!({"togglex": [{"channel": 1, "onoff": 1}, {"channel": 0, "onoff": 1}]});
        let mut changes = vec![];
        diff_payload(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "togglex.[1].onoff");
    }

    #[test]
    fn new_channel_reports_all_fields() {
        let prev = json!({"spray": [{"channel": 0, "mode": 2}]});
        let curr = json!({"spray": [{"channel": 0, "mode": 2}, {"channel": 1, "mode": 0}]});
        let mut changes = vec![];
        diff_payload(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.old.is_null()));
    }

    #[test]
    fn plain_lists_compare_whole() {
        let prev = json!({"value": [1, 2]});
        let curr = json!({"value": [2, 1]});
        let mut changes = vec![];
        diff_payload(&prev, &curr, "", &mut changes);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "value");
    }
}
