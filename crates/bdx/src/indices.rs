//! 🗂️ Index naming. The post office of bdx: you tell it what kind of letter
//! you have, it tells you which mailbox. With your deployment's name stamped on it,
//! so prod and stage stop reading each other's mail. 🦆

use std::fmt;

/// 📚 The closed set of document families we ever write.
///
/// Adding a family is a code change on purpose. A typo'd string index at runtime
/// is how you end up with `prod_sesions` and a very confused dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexCategory {
    Sessions,
    Fields,
    Errors,
}

impl IndexCategory {
    /// 🏷️ The suffix glued after the deployment prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            IndexCategory::Sessions => "sessions",
            IndexCategory::Fields => "fields",
            IndexCategory::Errors => "errors",
        }
    }
}

impl fmt::Display for IndexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// 🧭 Maps a category to `<prefix>_<suffix>`.
///
/// The prefix is handed in once at startup (see [`crate::app_config::AppConfig::index_prefix`]).
/// No env lookups hiding in here. This struct knows exactly one string and it's not telling
/// anyone else where it got it.
///
/// ⚠️ An empty prefix still keeps the underscore: `""` + `Sessions` = `"_sessions"`.
/// Existing clusters already have indices named that way, so we don't get clever.
#[derive(Debug, Clone, Default)]
pub struct IndexResolver {
    prefix: String,
}

impl IndexResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 🎯 Pure function of (prefix, category). No I/O, no errors, no surprises.
    pub fn resolve(&self, category: IndexCategory) -> String {
        let suffix = category.suffix();
        let mut index_name = String::with_capacity(self.prefix.len() + 1 + suffix.len());
        index_name.push_str(&self.prefix);
        index_name.push('_');
        index_name.push_str(suffix);
        index_name
    }
}
