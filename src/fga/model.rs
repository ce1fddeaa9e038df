//! Authorization model and seed relationships for the document demo.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::RetrievalSettings;

/// A relationship tuple to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleKey {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl TupleKey {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

/// Schema 1.1 model: an `owner` relation and a viewing relation on the
/// document type. Viewers may be single users or every user (`user:*`).
///
/// ```text
/// type user
/// type doc
///   relations
///     define owner: [user]
///     define viewer: [user, user:*]
/// ```
pub fn document_viewer_model(settings: &RetrievalSettings) -> Value {
    let user_type = settings.user_type.as_str();
    let mut relations = serde_json::Map::new();
    let mut metadata = serde_json::Map::new();

    relations.insert("owner".to_string(), json!({ "this": {} }));
    metadata.insert(
        "owner".to_string(),
        json!({ "directly_related_user_types": [{ "type": user_type }] }),
    );
    relations.insert(settings.relation.clone(), json!({ "this": {} }));
    metadata.insert(
        settings.relation.clone(),
        json!({
            "directly_related_user_types": [
                { "type": user_type },
                { "type": user_type, "wildcard": {} }
            ]
        }),
    );

    json!({
        "schema_version": "1.1",
        "type_definitions": [
            { "type": user_type },
            {
                "type": settings.object_type,
                "relations": relations,
                "metadata": { "relations": metadata }
            }
        ]
    })
}

/// Everyone may view `public-doc`; only `admin` may view `private-doc`.
pub fn sample_tuples(settings: &RetrievalSettings) -> Vec<TupleKey> {
    let object = |id: &str| format!("{}:{}", settings.object_type, id);
    let user = |id: &str| format!("{}:{}", settings.user_type, id);
    vec![
        TupleKey::new(user("*"), &settings.relation, object("public-doc")),
        TupleKey::new(user("admin"), &settings.relation, object("private-doc")),
    ]
}
