/// Record field holding the entity id
pub const ID_FIELD: &str = "id";
/// Record field holding the parent entity id
pub const PARENT_ID_FIELD: &str = "parentId";
/// Record field holding the name of the parent property the entity lives in
pub const PARENT_PROPERTY_FIELD: &str = "parentProperty";
/// Record field holding the concrete class tag
pub const CLASS_NAME_FIELD: &str = "className";
/// Record field holding the display name
pub const NAME_FIELD: &str = "name";

/// Fields every entity record carries, handled outside of the typed properties
pub const HEADER_FIELDS: [&str; 5] = [
    ID_FIELD,
    PARENT_ID_FIELD,
    PARENT_PROPERTY_FIELD,
    CLASS_NAME_FIELD,
    NAME_FIELD,
];

/// Id of the self-parented root of every graph
pub const ROOT_ID: &str = "Root";

/// Class name of the abstract base every class extends
pub const ENTITY_CLASS: &str = "Entity";

/// Depth value requesting an entire subtree
pub const FULL_DEPTH: i32 = -1;

pub fn is_header_field(name: &str) -> bool {
    HEADER_FIELDS.contains(&name)
}
