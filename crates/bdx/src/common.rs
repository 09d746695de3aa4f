//! 📦 Common data structures. The building blocks of bdx.
//!
//! 🎬 INT. CALL SITE, 2:14 PM. Somebody wants a session document indexed.
//! They don't want to wait for a round trip. They don't want to know what a round trip is.
//! They hand over a struct, get an `Ok(())`, and go back to their life.
//! The struct becomes a [`WriteOperation`]. This file is where that happens to it.
//!
//! Nothing in here mutates after construction. An operation is born, buffered,
//! shipped, and forgotten, in that order. Like a postcard. 🦆

use std::fmt;

use thiserror::Error;

/// 🎭 What the backend should do with the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 📄 Create or replace the whole document. Bulk verb `index`.
    Create,
    /// 🩹 Merge partial fields into an existing document. Bulk verb `update`.
    Update,
    /// ➕ Run an append script against an existing document. Also bulk verb `update`.
    ScriptedAppend,
    /// 🗑️ Remove the document. Bulk verb `delete`, and no body line.
    Delete,
}

impl Action {
    /// 📡 The `_bulk` action verb this maps to.
    pub fn bulk_verb(self) -> &'static str {
        match self {
            Action::Create => "index",
            Action::Update | Action::ScriptedAppend => "update",
            Action::Delete => "delete",
        }
    }
}

/// 📮 One write, fully rendered and ready to ride along in a bulk request.
///
/// The body is already JSON text. Serialization happens before enqueue, so a document
/// that can't be encoded never gets this far. The accumulator only deals in strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOperation {
    target_index: String,
    document_id: String,
    action: Action,
    body: Option<String>,
}

impl WriteOperation {
    pub fn new(
        target_index: impl Into<String>,
        document_id: impl Into<String>,
        action: Action,
        body: Option<String>,
    ) -> Self {
        Self {
            target_index: target_index.into(),
            document_id: document_id.into(),
            action,
            body,
        }
    }

    pub fn target_index(&self) -> &str {
        &self.target_index
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// 📏 Bytes this operation contributes toward the flush-by-size threshold.
    /// Body bytes only. Deletes weigh nothing, like a feather, or a promise.
    pub fn size_bytes(&self) -> usize {
        self.body.as_ref().map_or(0, String::len)
    }
}

/// 🔒 A field name that's safe to interpolate into a painless script.
///
/// `ctx._source.<name>.addAll(...)` is string-built, so the name is the one spot where
/// caller input becomes backend code. Only `[A-Za-z_][A-Za-z0-9_]*` gets through.
/// No dots, no quotes, no semicolons, no "; ctx.op = 'delete'". Nice try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName(String);

/// 💀 The field name had ideas above its station.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("💀 '{0}' is not a valid field name. Letters, digits and underscores only, and no leading digit. The script interpreter thanks you for your restraint.")]
pub struct InvalidFieldName(pub String);

impl FieldName {
    pub fn new(name: &str) -> Result<Self, InvalidFieldName> {
        let mut chars = name.chars();
        let first_is_fine = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if first_is_fine && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidFieldName(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for FieldName {
    type Error = InvalidFieldName;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        FieldName::new(name)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_action_knows_its_bulk_verb() {
        assert_eq!(Action::Create.bulk_verb(), "index");
        assert_eq!(Action::Update.bulk_verb(), "update");
        assert_eq!(Action::ScriptedAppend.bulk_verb(), "update");
        assert_eq!(Action::Delete.bulk_verb(), "delete");
    }

    #[test]
    fn the_one_where_deletes_are_weightless() {
        let delete = WriteOperation::new("p_sessions", "1", Action::Delete, None);
        let create = WriteOperation::new("p_sessions", "1", Action::Create, Some("{\"a\":1}".into()));
        assert_eq!(delete.size_bytes(), 0);
        assert_eq!(create.size_bytes(), 7);
    }

    #[test]
    fn the_one_where_polite_field_names_get_in() {
        for fine in ["fields", "_private", "user_properties2", "A"] {
            assert_eq!(FieldName::new(fine).map(|f| f.to_string()), Ok(fine.to_string()));
        }
    }

    #[test]
    fn the_one_where_script_injection_is_turned_away_at_the_door() {
        // 🧪 the bouncer has a list. you are not on it.
        for sketchy in [
            "",
            "2fast",
            "a.b",
            "fields.addAll(x); ctx.op = 'delete'; ctx._source.x",
            "naïve",
            "with space",
            "quote\"",
        ] {
            assert_eq!(
                FieldName::try_from(sketchy),
                Err(InvalidFieldName(sketchy.to_string())),
                "'{sketchy}' should have been bounced"
            );
        }
    }
}
