use super::*;

#[test]
fn default() {
    let c = DispatcherConfig::default();
    assert_eq!(c.max_redispatch, 1024);
    assert!(c.queue_reentrant);
}

#[test]
fn deserialize_partial() {
    let c: DispatcherConfig = serde_json::from_str(r#"{ "max_redispatch": 8 }"#).unwrap();
    assert_eq!(c, DispatcherConfig::new().with_max_redispatch(8));
}

#[test]
fn deserialize_empty() {
    let c: DispatcherConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(c, DispatcherConfig::default());
}

#[test]
fn serialize() {
    let c = DispatcherConfig::new().with_queue_reentrant(false);
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "max_redispatch": 1024, "queue_reentrant": false })
    );
}
