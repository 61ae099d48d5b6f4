//! Store contract tests against the in-process backend.

use proptest::prelude::*;
use redis_config_store::backend::MemoryConnection;
use redis_config_store::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const KEY: &str = "my-config-key";

fn store() -> HashConfigStore<MemoryConnection> {
    HashConfigStore::new(MemoryConnection::new(), KEY).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Phone {
    kind: String,
    number: String,
}

#[tokio::test]
async fn test_get_all_values() {
    let store = store();
    store.set("foo", "bar").await.unwrap();
    store.set("name", "cristian").await.unwrap();

    let values = store.get_all().await.unwrap();
    assert_eq!(
        values,
        ConfigMap::from([
            ("foo".to_string(), json!("bar")),
            ("name".to_string(), json!("cristian")),
        ])
    );
}

#[tokio::test]
async fn test_empty_when_no_values() {
    assert_eq!(store().get_all().await.unwrap(), ConfigMap::new());
}

#[tokio::test]
async fn test_delete_value() {
    let store = store();
    store.set("foo", "bar").await.unwrap();
    store.set("test", 23).await.unwrap();
    store.set("name", "cristian").await.unwrap();

    store.delete("test").await.unwrap();

    let values = store.get_all().await.unwrap();
    assert_eq!(values.len(), 2);
    assert!(!values.contains_key("test"));
}

#[tokio::test]
async fn test_delete_unknown_keeps_values() {
    let store = store();
    store.set("foo", "bar").await.unwrap();
    store.set("test", 23).await.unwrap();
    store.set("name", "cristian").await.unwrap();

    assert_eq!(store.delete("unknown").await.unwrap(), 0);

    let values = store.get_all().await.unwrap();
    assert_eq!(values["test"], json!(23));
    assert_eq!(values.len(), 3);
}

#[tokio::test]
async fn test_set_overwrites() {
    let store = store();
    store.set("foo", "bar").await.unwrap();
    store.set("foo", json!({"nested": true})).await.unwrap();

    assert_eq!(store.get_all().await.unwrap()["foo"], json!({"nested": true}));
}

#[tokio::test]
async fn test_structured_values_round_trip() {
    let store = store();
    let phone = Phone {
        kind: "mobile".to_string(),
        number: "555-0100".to_string(),
    };

    let returned = store.set("phone", phone.clone()).await.unwrap();
    assert_eq!(returned, phone);

    let values = store.get_all().await.unwrap();
    let read_back: Phone = serde_json::from_value(values["phone"].clone()).unwrap();
    assert_eq!(read_back, phone);
}

#[tokio::test]
async fn test_stores_share_collection_by_key() {
    let connection = MemoryConnection::new();
    let writer = HashConfigStore::new(connection.duplicate().unwrap(), KEY).unwrap();
    let reader = HashConfigStore::new(connection.duplicate().unwrap(), KEY).unwrap();
    let unrelated = HashConfigStore::new(connection, "other-key").unwrap();

    writer.set("foo", "bar").await.unwrap();

    assert_eq!(reader.get_all().await.unwrap()["foo"], json!("bar"));
    assert!(unrelated.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_usable_through_trait_object() {
    let store: Box<dyn ConfigStore> = Box::new(store());

    assert_eq!(store.set("n", json!(23)).await.unwrap(), json!(23));
    assert_eq!(store.get_all().await.unwrap()["n"], json!(23));
    assert_eq!(store.delete("n").await.unwrap(), 1);
}

#[test]
fn test_constructor_errors_are_synchronous() {
    // No runtime here: argument checks must not need one.
    let err = HashConfigStore::new(MemoryConnection::new(), "").err().unwrap();
    assert!(err.is_argument_error());

    let store = HashConfigStore::new(MemoryConnection::new(), KEY).unwrap();
    let err = store.to_extension("").err().unwrap();
    assert!(err.is_argument_error());
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _.-]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_set_then_get_all_is_lossless(name in "[a-z][a-z0-9_.]{0,12}", value in json_value()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let read_back = runtime.block_on(async {
            let store = store();
            store.set(&name, value.clone()).await.unwrap();
            store.get_all().await.unwrap()
        });
        prop_assert_eq!(read_back.get(&name), Some(&value));
    }
}
