use crate::Params;

/// Name of the free-form code node. Its only parameter is `code`.
pub const CODE_FUNCTION: &str = "python";

/// Functions under this prefix are methods applied to a prior result.
pub const RECEIVER_PREFIX: &str = "DataFrame.";

pub const READ_PREFIX: &str = "read_";

/// Canonical key for the source location of a `read_*` call.
pub const READ_SOURCE_PARAM: &str = "filepath_or_buffer";

/// Equivalent spellings folded into [`READ_SOURCE_PARAM`], in priority order.
pub const READ_SOURCE_ALIASES: [&str; 5] = ["filepath", "file_path", "path", "path_or_buf", "io"];

const NAMESPACE_PREFIXES: [&str; 2] = ["pandas.", "numpy."];

/// Strips a leading `pandas.` and then a leading `numpy.` qualifier.
pub fn canonical_function_name(name: &str) -> &str {
    NAMESPACE_PREFIXES
        .iter()
        .fold(name, |acc, prefix| acc.strip_prefix(prefix).unwrap_or(acc))
}

/// Last dotted segment, used as the display label.
pub fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

pub fn is_read_function(name: &str) -> bool {
    short_name(canonical_function_name(name)).starts_with(READ_PREFIX)
}

pub fn needs_receiver(name: &str) -> bool {
    FunctionFamily::classify(canonical_function_name(name)).needs_receiver()
}

/// Folds read-source aliases into [`READ_SOURCE_PARAM`].
///
/// A non-null canonical value wins; otherwise the first non-null alias is
/// promoted. Every alias key is removed either way. Running this on already
/// canonical params changes nothing.
pub fn fold_read_aliases(params: &mut Params) {
    let value = match params.get(READ_SOURCE_PARAM) {
        Some(value) if !value.is_null() => None,
        _ => READ_SOURCE_ALIASES
            .iter()
            .find_map(|alias| params.get(*alias).filter(|value| !value.is_null()))
            .cloned(),
    };

    params.retain(|key, _| !READ_SOURCE_ALIASES.contains(&key.as_str()));

    if let Some(value) = value {
        params.insert(READ_SOURCE_PARAM.to_string(), value);
    }
}

/// Applies [`fold_read_aliases`] when `function` is a read function.
pub fn canonicalize_read_params(function: &str, params: &mut Params) {
    if is_read_function(function) {
        fold_read_aliases(params);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Indexer {
    Iloc,
    Loc,
}

impl Indexer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Iloc => "iloc",
            Self::Loc => "loc",
        }
    }
}

/// Code-generation and wiring family of a canonical function name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionFamily<'a> {
    /// Free-form code cell.
    Code,
    /// `DataFrame.iloc` / `DataFrame.loc`, rendered as subscripts.
    Indexer(Indexer),
    /// Any other `DataFrame.<method>`.
    Method(&'a str),
    /// `merge` or `<module>.merge`, taking left and right frames.
    Merge,
    Read,
    Dotted { head: &'a str, rest: &'a str },
    TopLevel,
}

impl<'a> FunctionFamily<'a> {
    /// Classifies an already canonical name.
    pub fn classify(name: &'a str) -> Self {
        if name == CODE_FUNCTION {
            return Self::Code;
        }
        if let Some(rest) = name.strip_prefix(RECEIVER_PREFIX) {
            let method = rest.split('.').next().unwrap_or_default();
            return match method {
                "iloc" => Self::Indexer(Indexer::Iloc),
                "loc" => Self::Indexer(Indexer::Loc),
                _ => Self::Method(method),
            };
        }
        if name == "merge" || name.ends_with(".merge") {
            return Self::Merge;
        }
        if name.starts_with(READ_PREFIX) {
            return Self::Read;
        }
        if let Some((head, rest)) = name.split_once('.') {
            return Self::Dotted { head, rest };
        }
        Self::TopLevel
    }

    pub fn needs_receiver(&self) -> bool {
        matches!(self, Self::Indexer(_) | Self::Method(_))
    }
}

/// Returns `true` when `value` has the shape of a Python identifier.
pub fn is_identifier_like(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn params(value: Value) -> Params {
        value.as_object().cloned().expect("test params must be an object")
    }

    #[test]
    fn canonical_function_name_strips_namespaces_expected_bare_name() {
        assert_eq!(canonical_function_name("pandas.read_csv"), "read_csv");
        assert_eq!(canonical_function_name("numpy.linalg.norm"), "linalg.norm");
        assert_eq!(canonical_function_name("DataFrame.rename"), "DataFrame.rename");
        assert_eq!(canonical_function_name("pandas.numpy.where"), "where");
    }

    #[test]
    fn fold_read_aliases_path_alias_expected_canonical_key_only() {
        let mut p = params(json!({"path": "x.csv", "sep": ";"}));
        fold_read_aliases(&mut p);
        assert_eq!(p, params(json!({"sep": ";", "filepath_or_buffer": "x.csv"})));
    }

    #[test]
    fn fold_read_aliases_canonical_non_null_expected_kept_and_aliases_dropped() {
        let mut p = params(json!({"filepath_or_buffer": "a.csv", "io": "b.csv"}));
        fold_read_aliases(&mut p);
        assert_eq!(p, params(json!({"filepath_or_buffer": "a.csv"})));
    }

    #[test]
    fn fold_read_aliases_canonical_null_expected_first_alias_promoted() {
        let mut p = params(json!({"filepath_or_buffer": null, "file_path": null, "path_or_buf": "c.csv", "io": "d.csv"}));
        fold_read_aliases(&mut p);
        assert_eq!(p, params(json!({"filepath_or_buffer": "c.csv"})));
    }

    #[test]
    fn fold_read_aliases_twice_expected_same_as_once() {
        let mut once = params(json!({"io": "x.parquet", "columns": ["a"]}));
        fold_read_aliases(&mut once);
        let mut twice = once.clone();
        fold_read_aliases(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn classify_families_expected_closed_dispatch() {
        assert_eq!(FunctionFamily::classify("python"), FunctionFamily::Code);
        assert_eq!(
            FunctionFamily::classify("DataFrame.iloc"),
            FunctionFamily::Indexer(Indexer::Iloc)
        );
        assert_eq!(
            FunctionFamily::classify("DataFrame.rename"),
            FunctionFamily::Method("rename")
        );
        assert_eq!(FunctionFamily::classify("merge"), FunctionFamily::Merge);
        assert_eq!(FunctionFamily::classify("reshape.merge"), FunctionFamily::Merge);
        assert_eq!(FunctionFamily::classify("read_csv"), FunctionFamily::Read);
        assert_eq!(
            FunctionFamily::classify("plotting.scatter_matrix"),
            FunctionFamily::Dotted {
                head: "plotting",
                rest: "scatter_matrix"
            }
        );
        assert_eq!(FunctionFamily::classify("concat"), FunctionFamily::TopLevel);
    }

    #[test]
    fn needs_receiver_dataframe_methods_only() {
        assert!(needs_receiver("pandas.DataFrame.dropna"));
        assert!(needs_receiver("DataFrame.loc"));
        assert!(!needs_receiver("read_csv"));
        assert!(!needs_receiver("merge"));
    }

    #[test]
    fn is_read_function_uses_last_segment() {
        assert!(is_read_function("pandas.io.api.read_csv"));
        assert!(is_read_function("read_table"));
        assert!(!is_read_function("DataFrame.to_csv"));
    }
}
