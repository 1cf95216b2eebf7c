use std::collections::HashSet;

use pgmount_core::{Decorate, NormalizedConfig};

use crate::error::PluginError;
use crate::host::{DecorationTarget, Host, HostError};

/// Name the aggregate is decorated under for `decorate: true`.
pub const DEFAULT_DECORATION: &str = "pg";

/// How the connection set is attached to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorationMode {
    /// Each descriptor decorated under its own name, index-aligned.
    Named(Vec<String>),
    /// The aggregate decorated under [`DEFAULT_DECORATION`].
    Boolean,
    /// The aggregate exposed as `lib`, `pool` and `client`; no decoration.
    Default,
}

#[derive(PartialEq, Eq, Hash)]
enum Kind {
    Boolean,
    String,
    Absent,
}

impl DecorationMode {
    /// Pick the single mode all descriptors agree on.
    pub fn resolve(config: &NormalizedConfig) -> Result<Self, PluginError> {
        let kinds: HashSet<Kind> = config
            .iter()
            .map(|d| match &d.decorate {
                None => Kind::Absent,
                Some(Decorate::Default) => Kind::Boolean,
                Some(Decorate::Named(_)) => Kind::String,
            })
            .collect();
        if kinds.len() > 1 {
            return Err(PluginError::MixedDecoration);
        }

        let names: Vec<String> = config
            .iter()
            .filter_map(|d| d.decorate.as_ref()?.name().map(str::to_owned))
            .collect();
        if !names.is_empty() {
            let mut seen = HashSet::new();
            if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(PluginError::DuplicateDecoration(duplicate.clone()));
            }
            return Ok(Self::Named(names));
        }

        Ok(match kinds.into_iter().next() {
            Some(Kind::Boolean) => Self::Boolean,
            _ => Self::Default,
        })
    }

    /// Decoration names this mode will claim on both targets.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Named(names) => names.iter().map(String::as_str).collect(),
            Self::Boolean => vec![DEFAULT_DECORATION],
            Self::Default => Vec::new(),
        }
    }

    /// Fail if any name this mode needs is already taken on `host`.
    pub fn check_available<H: Host + ?Sized>(&self, host: &H) -> Result<(), HostError> {
        for name in self.names() {
            for target in [DecorationTarget::Server, DecorationTarget::Request] {
                if host.has_decoration(target, name) {
                    return Err(HostError::DecorationExists {
                        target,
                        name: name.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Server;
    use pgmount_core::PluginOptions;
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::sync::Arc;

    const URL: &str = "postgres://app@db/orders";

    fn resolve(value: Value) -> Result<DecorationMode, PluginError> {
        let config = PluginOptions::from_value(&value)?.normalize()?;
        DecorationMode::resolve(&config)
    }

    #[rstest]
    #[case(json!({ "settings": URL }), DecorationMode::Default)]
    #[case(json!([{ "settings": URL }, { "settings": URL }]), DecorationMode::Default)]
    #[case(json!({ "settings": URL, "decorate": true }), DecorationMode::Boolean)]
    #[case(
        json!([{ "settings": URL, "decorate": true }, { "settings": URL, "decorate": true }]),
        DecorationMode::Boolean
    )]
    #[case(
        json!({ "settings": URL, "decorate": "db" }),
        DecorationMode::Named(vec!["db".into()])
    )]
    #[case(
        json!([{ "settings": URL, "decorate": "orders" }, { "settings": URL, "decorate": "users" }]),
        DecorationMode::Named(vec!["orders".into(), "users".into()])
    )]
    fn consistent_kinds_resolve(#[case] options: Value, #[case] expected: DecorationMode) {
        assert_eq!(resolve(options).unwrap(), expected);
    }

    #[rstest]
    #[case(json!([{ "settings": URL, "decorate": true }, { "settings": URL, "decorate": "foo" }]))]
    #[case(json!([{ "settings": URL, "decorate": true }, { "settings": URL }]))]
    #[case(json!([{ "settings": URL }, { "settings": URL, "decorate": "foo" }]))]
    fn mixed_kinds_are_rejected(#[case] options: Value) {
        let err = resolve(options).unwrap_err();
        assert!(matches!(err, PluginError::MixedDecoration));
        assert_eq!(err.to_string(), "You cannot mix different types of decorate options");
    }

    #[test]
    fn repeated_name_is_rejected() {
        let err = resolve(json!([
            { "settings": URL, "decorate": "db" },
            { "settings": URL, "decorate": "db" },
        ]))
        .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateDecoration(name) if name == "db"));
    }

    #[test]
    fn taken_name_is_reported() {
        let mut server = Server::new();
        server
            .decorate(DecorationTarget::Request, DEFAULT_DECORATION, Arc::new(()))
            .unwrap();

        assert!(DecorationMode::Default.check_available(&server).is_ok());
        assert_eq!(
            DecorationMode::Boolean.check_available(&server),
            Err(HostError::DecorationExists {
                target: DecorationTarget::Request,
                name: DEFAULT_DECORATION.into(),
            })
        );
    }
}
