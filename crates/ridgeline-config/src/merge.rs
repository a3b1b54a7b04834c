//! Per-component configuration resolution:
//!
//! `start = current-persisted (if any) else default`, then RESET, then
//! MERGE. With no update at all: defaults if there was never a running
//! config, otherwise the prior running config unchanged.

use ridgeline_core::{ConfigValue, ConfigurationUpdate};

use crate::reset::apply_reset;

/// Resolve one component's configuration tree.
#[must_use]
pub fn resolve_configuration(
    defaults: &ConfigValue,
    persisted: Option<&ConfigValue>,
    update: Option<&ConfigurationUpdate>,
) -> ConfigValue {
    let Some(update) = update else {
        return persisted.cloned().unwrap_or_else(|| defaults.clone());
    };

    let mut current = persisted.cloned().unwrap_or_else(|| defaults.clone());
    apply_reset(&mut current, defaults, &update.reset);
    if let Some(merge_tree) = &update.merge {
        current.merge_in_place(merge_tree);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn obj(pairs: &[(&str, ConfigValue)]) -> ConfigValue {
        ConfigValue::Object(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn defaults() -> ConfigValue {
        obj(&[
            ("singleLevelKey", "default value of singleLevelKey".into()),
            (
                "listKey",
                ConfigValue::Array(vec!["item1".into(), "item2".into()]),
            ),
        ])
    }

    #[test]
    fn no_update_and_no_persisted_config_uses_defaults() {
        let resolved = resolve_configuration(&defaults(), None, None);
        assert_eq!(resolved, defaults());
    }

    #[test]
    fn no_update_with_persisted_config_keeps_it_unchanged() {
        let persisted = obj(&[("singleLevelKey", "from a prior deployment".into())]);
        let resolved = resolve_configuration(&defaults(), Some(&persisted), None);
        assert_eq!(resolved, persisted);
    }

    #[test]
    fn scenario_three_merge_then_reset_cycle() {
        let mut merge_tree = BTreeMap::new();
        merge_tree.insert(
            "singleLevelKey".to_string(),
            "updated value of singleLevelKey".into(),
        );
        merge_tree.insert("listKey".to_string(), ConfigValue::Array(vec!["item3".into()]));
        merge_tree.insert(
            "path".to_string(),
            obj(&[("leafKey", "updated value of /path/leafKey".into())]),
        );
        merge_tree.insert(
            "newSingleLevelKey".to_string(),
            "value of newSingleLevelKey".into(),
        );

        let update = ConfigurationUpdate {
            reset: vec![],
            merge: Some(ConfigValue::Object(merge_tree)),
        };
        let resolved = resolve_configuration(&defaults(), None, Some(&update));
        assert_eq!(
            resolved.pointer("/singleLevelKey"),
            Some(&ConfigValue::from("updated value of singleLevelKey"))
        );
        assert_eq!(resolved.pointer("/listKey/0"), Some(&ConfigValue::from("item3")));

        let reset_update = ConfigurationUpdate {
            reset: vec![
                "/newSingleLevelKey".to_string(),
                "/path/newLeafKey".to_string(),
            ],
            merge: None,
        };
        let resolved = resolve_configuration(&defaults(), Some(&resolved), Some(&reset_update));
        assert_eq!(resolved.pointer("/newSingleLevelKey"), None);
        assert_eq!(
            resolved.pointer("/path/leafKey"),
            Some(&ConfigValue::from("updated value of /path/leafKey"))
        );

        let whole_reset = ConfigurationUpdate {
            reset: vec![String::new()],
            merge: None,
        };
        let resolved = resolve_configuration(&defaults(), Some(&resolved), Some(&whole_reset));
        assert_eq!(resolved, defaults());
    }
}
