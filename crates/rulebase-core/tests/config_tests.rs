use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;

use rulebase_core::config::{expand_path, resolve_with_base, Config, Settings};
use rulebase_core::error::Error;

fn config_with(toml: &str) -> Config {
    Config::from_figment(Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml)))
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::default();
    settings.validate().unwrap();
    assert_eq!(settings.retrieval.k, 15);
    assert_eq!(settings.retrieval.candidate_breadth, 50);
    assert_eq!(settings.retrieval.rrf_k, 60.0);
    assert_eq!(settings.embedding.dim, 768);
    assert!(settings.variants.contains_key("hockey5s"));
}

#[test]
fn toml_overrides_merge_over_defaults() {
    let settings = config_with("[retrieval]\nk = 5\n\n[data]\ntable = \"alt\"\n").settings().unwrap();
    assert_eq!(settings.retrieval.k, 5);
    assert_eq!(settings.retrieval.candidate_breadth, 50);
    assert_eq!(settings.data.table, "alt");
    assert_eq!(settings.data.lancedb_dir, "data/lancedb");
}

#[test]
fn invalid_breadth_is_rejected() {
    let err = config_with("[retrieval]\nk = 60\n").settings().unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(_))), "{err}");
}

#[test]
fn get_reads_nested_keys() {
    let dim: usize = config_with("").get("embedding.dim").unwrap();
    assert_eq!(dim, 768);
}

#[test]
fn unknown_variant_lists_allowed_values() {
    let settings = Settings::default();
    settings.check_variant("indoor").unwrap();
    match settings.check_variant("beach") {
        Err(Error::UnknownVariant { variant, allowed }) => {
            assert_eq!(variant, "beach");
            assert!(allowed.contains(&"outdoor".to_string()));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/srv/rulebase");
    assert_eq!(resolve_with_base(base, "data/lancedb"), base.join("data/lancedb"));
    assert_eq!(resolve_with_base(base, "/abs/dir"), Path::new("/abs/dir"));
    assert_eq!(expand_path("plain/dir"), Path::new("plain/dir"));
}
