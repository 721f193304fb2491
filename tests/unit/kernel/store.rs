use super::*;
use serde_json::json;

fn schemas() -> SchemaDictionary {
    let mut schemas = SchemaDictionary::new();
    schemas.insert("div".to_string(), json!({ "type": "object" }));
    schemas.insert("span".to_string(), json!({ "type": "object" }));
    schemas
}

fn document() -> DataDictionary {
    DataDictionary::new("root", NodeRecord::new("div", json!({})))
        .with_node(
            "span",
            NodeRecord::new("span", json!({ "text": "hi" })).with_parent("root", "children"),
        )
        .with_node(
            "inner",
            NodeRecord::new("span", json!({ "text": "deep" })).with_parent("span", "children"),
        )
}

fn initialized() -> DataStore {
    let mut store = DataStore::new();
    let result = store.dispatch(Envelope::initialize(document(), schemas()));
    assert!(result.state_changed);
    store
}

fn single(result: DispatchResult) -> Envelope {
    assert_eq!(result.responses.len(), 1);
    result.responses.into_iter().next().unwrap()
}

#[test]
fn test_initialize_sets_cursor_to_root() {
    let mut store = DataStore::new();
    let response = single(store.dispatch(Envelope::initialize(document(), schemas())));

    assert_eq!(response.kind, MessageType::Initialize);
    assert_eq!(response.active_dictionary_id.as_deref(), Some("root"));
    assert_eq!(response.data_dictionary, Some(document()));
    assert_eq!(response.schema_dictionary, Some(schemas()));
    assert_eq!(store.active_dictionary_id(), Some("root"));
}

#[test]
fn test_initialize_honors_requested_cursor() {
    let mut store = DataStore::new();
    let mut request = Envelope::initialize(document(), schemas());
    request.active_dictionary_id = Some("inner".to_string());
    let response = single(store.dispatch(request));
    assert_eq!(response.active_dictionary_id.as_deref(), Some("inner"));

    let mut request = Envelope::initialize(document(), schemas());
    request.active_dictionary_id = Some("missing".to_string());
    store.dispatch(request);
    assert_eq!(store.active_dictionary_id(), Some("root"));
}

#[test]
fn test_initialize_rejects_cyclic_parent_links() {
    let cyclic = DataDictionary::new("root", NodeRecord::new("div", json!({})))
        .with_node("a", NodeRecord::new("div", json!({})).with_parent("b", "children"))
        .with_node("b", NodeRecord::new("div", json!({})).with_parent("a", "children"));
    let mut store = DataStore::new();
    let response = single(store.dispatch(Envelope::initialize(cyclic, schemas())));

    assert_eq!(response.kind, MessageType::Error);
    assert_eq!(
        response.data,
        Some(json!(StoreError::BrokenParentLink("a".to_string()).to_string()))
    );
    assert!(store.data_dictionary().is_none());

    let response = single(store.dispatch(Envelope::data(DataAction::Remove, "a")));
    assert_eq!(response.kind, MessageType::Error);
}

#[test]
fn test_remove_leaves_parent_data_untouched() {
    let mut store = initialized();
    store.dispatch(Envelope::data(DataAction::Remove, "inner"));
    let span = store.data_dictionary().unwrap().get("span").unwrap();
    assert_eq!(span.data, json!({ "text": "hi" }));
}

#[test]
fn test_data_before_initialize_is_an_error() {
    let mut store = DataStore::new();
    let response = single(
        store.dispatch(Envelope::data_update("root", json!({})).with_originator("svc")),
    );
    assert_eq!(response.kind, MessageType::Error);
    assert_eq!(
        response.data,
        Some(json!(StoreError::NotInitialized.to_string()))
    );
    assert_eq!(response.originator_id(), Some("svc"));
}

#[test]
fn test_update_at_location() {
    let mut store = initialized();
    let response = single(
        store.dispatch(
            Envelope::data_update("span", json!("bye"))
                .with_data_location("text")
                .with_originator("editor"),
        ),
    );

    assert_eq!(response.kind, MessageType::Data);
    assert_eq!(response.action.as_deref(), Some("update"));
    assert_eq!(response.dictionary_id.as_deref(), Some("span"));
    assert_eq!(response.originator_id(), Some("editor"));
    let node = store.data_dictionary().unwrap().get("span").unwrap();
    assert_eq!(node.data, json!({ "text": "bye" }));
}

#[test]
fn test_update_unknown_node() {
    let mut store = initialized();
    let response = single(store.dispatch(Envelope::data_update("nope", json!(1))));
    assert_eq!(response.kind, MessageType::Error);
}

#[test]
fn test_unknown_action_is_a_no_op() {
    let mut store = initialized();
    let result = store.dispatch(Envelope::new(MessageType::Data).with_action("explode"));
    assert!(result.responses.is_empty());
    assert!(!result.state_changed);
}

#[test]
fn test_add_links_parent() {
    let mut store = initialized();
    let response = single(
        store.dispatch(
            Envelope::data(DataAction::Add, "root")
                .with_data_location("children")
                .with_data(json!({ "schemaId": "span", "data": { "text": "new" } })),
        ),
    );

    let id = response.dictionary_id.unwrap();
    assert_eq!(id, "span-1");
    let node = store.data_dictionary().unwrap().get(&id).unwrap();
    assert_eq!(node.parent.as_ref().map(|p| p.id.as_str()), Some("root"));
    assert_eq!(
        node.parent.as_ref().map(|p| p.data_location.as_str()),
        Some("children")
    );
}

#[test]
fn test_add_keeps_unused_requested_id() {
    let mut store = initialized();
    let response = single(store.dispatch(
        Envelope::data(DataAction::Add, "root")
            .with_data(json!({ "id": "fresh", "schemaId": "div" })),
    ));
    assert_eq!(response.dictionary_id.as_deref(), Some("fresh"));

    let response = single(store.dispatch(
        Envelope::data(DataAction::Add, "root")
            .with_data(json!({ "id": "fresh", "schemaId": "div" })),
    ));
    assert_ne!(response.dictionary_id.as_deref(), Some("fresh"));
}

#[test]
fn test_add_unknown_schema() {
    let mut store = initialized();
    let response = single(store.dispatch(
        Envelope::data(DataAction::Add, "root").with_data(json!({ "schemaId": "table" })),
    ));
    assert_eq!(response.kind, MessageType::Error);
    assert_eq!(store.data_dictionary().unwrap().len(), 3);
}

#[test]
fn test_remove_drops_subtree_and_moves_cursor() {
    let mut store = initialized();
    store.dispatch(Envelope::navigation_update("inner", None));

    let response = single(store.dispatch(Envelope::data(DataAction::Remove, "span")));
    assert_eq!(response.kind, MessageType::Data);

    let dictionary = store.data_dictionary().unwrap();
    assert_eq!(dictionary.len(), 1);
    assert!(!dictionary.contains("inner"));
    // The removed cursor falls back to the removed node's parent.
    assert_eq!(store.active_dictionary_id(), Some("root"));
}

#[test]
fn test_root_cannot_be_removed() {
    let mut store = initialized();
    let response = single(store.dispatch(Envelope::data(DataAction::Remove, "root")));
    assert_eq!(response.kind, MessageType::Error);
    assert_eq!(
        response.data,
        Some(json!(StoreError::RootRemoval.to_string()))
    );
}

#[test]
fn test_duplicate_copies_subtree() {
    let mut store = initialized();
    let response = single(store.dispatch(Envelope::data(DataAction::Duplicate, "span")));
    let copy = response.dictionary_id.unwrap();

    let dictionary = store.data_dictionary().unwrap();
    assert_eq!(dictionary.len(), 5);
    assert_eq!(dictionary.parent_of(&copy), Some("root"));

    let children = dictionary.children_of(&copy);
    assert_eq!(children.len(), 1);
    assert_eq!(
        dictionary.get(children[0]).map(|n| n.data.clone()),
        Some(json!({ "text": "deep" }))
    );
}

#[test]
fn test_navigation_update_and_get() {
    let mut store = initialized();
    let result = store.dispatch(Envelope::navigation_update("span", Some("tab".to_string())));
    assert!(result.state_changed);
    assert_eq!(store.active_dictionary_id(), Some("span"));
    assert_eq!(store.active_navigation_config_id(), Some("tab"));

    let result = store.dispatch(Envelope::new(MessageType::Navigation).with_action("get"));
    assert!(!result.state_changed);
    let response = single(result);
    assert_eq!(response.active_dictionary_id.as_deref(), Some("span"));
}

#[test]
fn test_navigation_to_unknown_node() {
    let mut store = initialized();
    let response = single(store.dispatch(Envelope::navigation_update("ghost", None)));
    assert_eq!(response.kind, MessageType::Error);
    assert_eq!(store.active_dictionary_id(), Some("root"));
}

#[test]
fn test_custom_is_echoed() {
    let mut store = initialized();
    let request = Envelope::custom("svc", "ping").with_extra("n", json!(3));
    let response = single(store.dispatch(request.clone()));
    assert_eq!(response, request);
}
