// Time-ordered identifiers for token ids (`jti`) and store row ids.
//
// UUIDv7 keeps `jti` globally unique across processes without coordination
// and sorts store rows by creation time.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Fresh token identifier in hyphenated form.
pub fn new_jti() -> String {
    uuidv7().hyphenated().to_string()
}
