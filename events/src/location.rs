use crate::error::EventsError;
use crate::error::Result;
use musiconn_api_client::ApiQuery;
use musiconn_api_client::FetchJson;
use musiconn_api_client::LocationInfo;
use musiconn_api_client::LocationNode;
use musiconn_api_client::Uid;
use musiconn_api_client::entity_entry;
use serde::de::DeserializeOwned;
use serde_json::Value;

const INFO_PROPS: [&str; 7] = [
    "uid",
    "title",
    "slug",
    "categories",
    "geometries",
    "childs",
    "parents",
];

/// Fetches the descriptive fields of one location (not recursive).
pub async fn location_info(api: &dyn FetchJson, uid: Uid) -> Result<LocationInfo> {
    let query = ApiQuery::get().ids("location", [uid]).props(INFO_PROPS);
    fetch_location(api, &query, uid).await
}

/// Fetches only the geometries of one location.
pub async fn location_geometries(api: &dyn FetchJson, uid: Uid) -> Result<Vec<Value>> {
    let query = ApiQuery::get().ids("location", [uid]).props(["geometries"]);
    let json = api.fetch_json(&query).await?;
    let entry = entity_entry(&json, "location", &uid.to_string())
        .ok_or(EventsError::MissingNode { uid })?;
    match entry.get("geometries") {
        Some(Value::Array(items)) => Ok(items.clone()),
        _ => Ok(Vec::new()),
    }
}

/// Fetches the child references and directly attached events of a node.
pub(crate) async fn location_node(api: &dyn FetchJson, uid: Uid) -> Result<LocationNode> {
    let query = ApiQuery::get()
        .ids("location", [uid])
        .props(["childs", "events"]);
    fetch_location(api, &query, uid).await
}

async fn fetch_location<T: DeserializeOwned>(
    api: &dyn FetchJson,
    query: &ApiQuery,
    uid: Uid,
) -> Result<T> {
    let json = api.fetch_json(query).await?;
    let entry = entity_entry(&json, "location", &uid.to_string())
        .ok_or(EventsError::MissingNode { uid })?;
    Ok(T::deserialize(entry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use musiconn_api_client::testing::ScriptedApi;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn reads_location_info() {
        let api = ScriptedApi::new(|query| {
            assert_eq!(
                query.value("props"),
                Some("uid|title|slug|categories|geometries|childs|parents")
            );
            Ok(json!({
                "location": {
                    "332": {
                        "uid": 332,
                        "title": "Münster",
                        "slug": "muenster",
                        "childs": [{ "location": "400" }],
                        "parents": [{ "location": 1 }],
                        "geometries": [{ "type": "Point" }]
                    }
                }
            }))
        });

        let info = location_info(&api, Uid(332)).await.expect("info");
        assert_eq!(info.title, "Münster");
        assert_eq!(info.slug.as_deref(), Some("muenster"));
        assert_eq!(info.children.len(), 1);
        assert_eq!(info.children[0].location, Uid(400));
        assert_eq!(info.parents[0].location, Uid(1));
        assert_eq!(info.geometries.len(), 1);
        assert!(info.categories.is_empty());
    }

    #[tokio::test]
    async fn missing_location_is_an_error() {
        let api = ScriptedApi::new(|_| Ok(json!({ "location": {} })));
        let err = location_info(&api, Uid(9)).await.expect_err("missing");
        assert!(matches!(err, EventsError::MissingNode { uid } if uid == Uid(9)));
    }

    #[tokio::test]
    async fn geometries_default_to_empty() {
        let api = ScriptedApi::new(|_| Ok(json!({ "location": { "5": { "uid": 5 } } })));
        let geometries = location_geometries(&api, Uid(5)).await.expect("geometries");
        assert!(geometries.is_empty());
    }
}
