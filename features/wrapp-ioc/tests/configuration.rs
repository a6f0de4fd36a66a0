use std::sync::Arc;

use pretty_assertions::assert_eq;
use wrapp_ioc::{
    configuration::ConfigurationKind, contribution::ContributionDef, errors::ConfigurationError,
    DynError, ModuleDef, Registry, RegistryError, ServiceDef, ServiceResources,
};

/// Service whose factory collects its ordered configuration
struct Pipeline {
    steps: Vec<&'static str>,
}

fn pipeline() -> ModuleDef {
    ModuleDef::builder("pipeline")
        .service(ServiceDef::builder::<Pipeline, _>(
            "Pipeline",
            |resources: &ServiceResources<'_>| -> Result<Arc<Pipeline>, DynError> {
                let steps = resources.ordered_configuration::<&'static str>()?;
                Ok(Arc::new(Pipeline { steps }))
            },
        ))
        .build()
}

/// Service which only exists to be contributed to
fn target(service_id: &str) -> ModuleDef {
    ModuleDef::builder("targets")
        .service(ServiceDef::builder::<(), _>(
            service_id,
            |_: &ServiceResources<'_>| -> Result<Arc<()>, DynError> { Ok(Arc::new(())) },
        ))
        .build()
}

fn registry(modules: Vec<ModuleDef>) -> Registry {
    modules
        .into_iter()
        .fold(Registry::builder(), |builder, module| builder.add_module(module))
        .build()
        .unwrap()
}

fn configuration_error(err: RegistryError) -> ConfigurationError {
    match err {
        RegistryError::Configuration(err) => err,
        other => panic!("expected a configuration error, got {other}"),
    }
}

#[test]
fn ordered_contributions_follow_constraints_across_modules() {
    let second = ModuleDef::builder("second")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.add("Second", "stepB", &["after:First"]);
            Ok(())
        })
        .build();
    let first = ModuleDef::builder("first")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.add("First", "stepA", &[]);
            Ok(())
        })
        .build();
    let registry = registry(vec![pipeline(), second, first]);

    let pipeline = registry.service::<Pipeline>("Pipeline").unwrap();
    assert_eq!(pipeline.steps, vec!["stepA", "stepB"]);
}

#[test]
fn placeholders_anchor_without_a_value() {
    let module = ModuleDef::builder("steps")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.add("Late", "late", &["after:Middle"]);
            configuration.add_placeholder("Middle", &[]);
            configuration.add("Early", "early", &["before:Middle"]);
            Ok(())
        })
        .build();
    let registry = registry(vec![pipeline(), module]);

    let steps = registry.ordered_configuration::<&'static str>("Pipeline").unwrap();
    assert_eq!(steps, vec!["early", "late"]);
}

#[test]
fn ordered_overrides_replace_value_and_constraints() {
    let defaults = ModuleDef::builder("defaults")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.add("Parse", "parse", &[]);
            configuration.add("Check", "check", &["after:Parse"]);
            Ok(())
        })
        .build();
    let custom = ModuleDef::builder("custom")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.override_value("check", "strict check", &["before:Parse"]);
            Ok(())
        })
        .build();
    let registry = registry(vec![pipeline(), defaults, custom]);

    let steps = registry.ordered_configuration::<&'static str>("Pipeline").unwrap();
    assert_eq!(steps, vec!["strict check", "parse"]);
}

#[test]
fn overriding_unknown_ids_fails() {
    let custom = ModuleDef::builder("custom")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.override_value("Missing", "value", &[]);
            Ok(())
        })
        .build();
    let registry = registry(vec![pipeline(), custom]);

    let err = configuration_error(
        registry
            .ordered_configuration::<&'static str>("Pipeline")
            .unwrap_err(),
    );
    assert!(matches!(err, ConfigurationError::UnknownOverride { .. }));
    assert_eq!(
        err.to_string(),
        "custom (contribution #1 to 'Pipeline') overrides 'Missing' in the configuration of service 'Pipeline', but nothing was contributed under it"
    );
}

#[test]
fn duplicate_ordered_ids_name_both_contributions() {
    let first = ModuleDef::builder("first")
        .contribute(
            ContributionDef::ordered::<&'static str, _>("Pipeline", |_, configuration| {
                configuration.add("Parse", "parse", &[]);
                Ok(())
            })
            .labelled("parsing"),
        )
        .build();
    let second = ModuleDef::builder("second")
        .contribute_ordered::<&'static str, _>("Pipeline", |_, configuration| {
            configuration.add("PARSE", "parse again", &[]);
            Ok(())
        })
        .build();
    let registry = registry(vec![pipeline(), first, second]);

    let err = registry
        .ordered_configuration::<&'static str>("Pipeline")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Ordered configuration of service 'Pipeline' received id 'PARSE' from both first::parsing and second (contribution #1 to 'Pipeline')"
    );
}

#[test]
fn unordered_contributions_keep_module_order() {
    let contribute = |numbers: &'static [u32]| {
        move |_: &ServiceResources<'_>,
              configuration: &mut wrapp_ioc::configuration::UnorderedConfiguration<'_, u32>|
              -> Result<(), DynError> {
            numbers.iter().for_each(|number| configuration.add(*number));
            Ok(())
        }
    };
    let registry = registry(vec![
        target("Numbers"),
        ModuleDef::builder("low")
            .contribute_unordered("Numbers", contribute(&[1, 2]))
            .build(),
        ModuleDef::builder("high")
            .contribute_unordered("Numbers", contribute(&[3]))
            .build(),
    ]);

    let numbers = registry.unordered_configuration::<u32>("numbers").unwrap();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn contributions_run_with_their_modules_resources() {
    let names = |name: &str| {
        ModuleDef::builder(name)
            .contribute_unordered::<String, _>("Names", |resources, configuration| {
                configuration.add(format!(
                    "{} for {}",
                    resources.module_name(),
                    resources.service_id()
                ));
                Ok(())
            })
            .build()
    };
    let registry = registry(vec![target("Names"), names("alpha"), names("beta")]);

    let contributed = registry.unordered_configuration::<String>("Names").unwrap();
    assert_eq!(contributed, vec!["alpha for Names", "beta for Names"]);
}

#[test]
fn values_of_the_wrong_type_are_rejected() {
    let registry = registry(vec![
        target("Numbers"),
        ModuleDef::builder("words")
            .contribute_unordered::<&'static str, _>("Numbers", |_, configuration| {
                configuration.add("one");
                Ok(())
            })
            .build(),
    ]);

    let err = configuration_error(registry.unordered_configuration::<u32>("Numbers").unwrap_err());
    assert!(matches!(
        err,
        ConfigurationError::ValueTypeMismatch {
            expected: "u32",
            actual: "&str",
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "words (contribution #1 to 'Numbers') contributed a value of type '&str' to service 'Numbers', which collects values of type 'u32'"
    );
}

#[test]
fn contributions_of_another_kind_are_rejected() {
    let registry = registry(vec![
        target("Numbers"),
        ModuleDef::builder("ordered")
            .contribute_ordered::<u32, _>("Numbers", |_, configuration| {
                configuration.add("one", 1, &[]);
                Ok(())
            })
            .build(),
    ]);

    let err = configuration_error(registry.unordered_configuration::<u32>("Numbers").unwrap_err());
    assert!(matches!(
        err,
        ConfigurationError::KindMismatch {
            contributed: ConfigurationKind::Ordered,
            requested: ConfigurationKind::Unordered,
            ..
        }
    ));
    assert!(
        err.to_string()
            .ends_with("contributes ordered configuration to service 'Numbers', which collects unordered configuration"),
        "{err}"
    );
}

#[test]
fn failing_contributions_are_reported() {
    let registry = registry(vec![
        target("Numbers"),
        ModuleDef::builder("flaky")
            .contribute_unordered::<u32, _>("Numbers", |_, _| Err("source unavailable".into()))
            .build(),
    ]);

    let err = registry.unordered_configuration::<u32>("Numbers").unwrap_err();
    assert_eq!(
        err.to_string(),
        "flaky (contribution #1 to 'Numbers') failed while contributing to service 'Numbers': source unavailable"
    );
}

#[test]
fn services_without_contributions_collect_nothing() {
    let registry = registry(vec![target("Numbers")]);

    assert!(registry.unordered_configuration::<u32>("Numbers").unwrap().is_empty());
    assert!(registry
        .mapped_configuration::<String, u32>("Numbers")
        .unwrap()
        .is_empty());
    assert!(registry
        .unordered_configuration::<u32>("Missing")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn mapped_keys_are_case_insensitive() {
    let registry = registry(vec![
        target("Codes"),
        ModuleDef::builder("codes")
            .contribute_mapped::<&'static str, u16, _>("Codes", |_, configuration| {
                configuration.add("Foo", 200);
                configuration.add("Bar", 404);
                Ok(())
            })
            .build(),
    ]);

    let codes = registry
        .mapped_configuration::<&'static str, u16>("Codes")
        .unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(codes.get_str("foo"), Some(&200));
    assert_eq!(codes.get_str("BAR"), Some(&404));
    assert_eq!(codes.get(&"FOO"), Some(&200));
    // Keys keep the spelling they were contributed with
    assert_eq!(codes.keys().copied().collect::<Vec<_>>(), vec!["Foo", "Bar"]);
}

#[test]
fn duplicate_mapped_keys_name_both_contributions() {
    let contribute = |name: &str, key: &'static str| {
        ModuleDef::builder(name)
            .contribute_mapped::<&'static str, u16, _>("Codes", move |_, configuration| {
                configuration.add(key, 1);
                Ok(())
            })
            .build()
    };
    let registry = registry(vec![target("Codes"), contribute("one", "Foo"), contribute("two", "foo")]);

    let err = configuration_error(
        registry
            .mapped_configuration::<&'static str, u16>("Codes")
            .unwrap_err(),
    );
    assert!(matches!(err, ConfigurationError::DuplicateKey { .. }));
    assert_eq!(
        err.to_string(),
        "Mapped configuration of service 'Codes' received key \"foo\" from both one (contribution #1 to 'Codes') and two (contribution #1 to 'Codes')"
    );
}

#[test]
fn mapped_overrides_replace_values() {
    let registry = registry(vec![
        target("Limits"),
        ModuleDef::builder("defaults")
            .contribute_mapped::<String, usize, _>("Limits", |_, configuration| {
                configuration.add("connections".to_string(), 10);
                configuration.add("retries".to_string(), 3);
                Ok(())
            })
            .build(),
        ModuleDef::builder("production")
            .contribute_mapped::<String, usize, _>("Limits", |_, configuration| {
                configuration.override_value("Connections".to_string(), 100);
                Ok(())
            })
            .build(),
    ]);

    let limits = registry
        .mapped_configuration::<String, usize>("Limits")
        .unwrap();
    assert_eq!(limits.get_str("connections"), Some(&100));
    assert_eq!(limits.get_str("retries"), Some(&3));

    let overridden: Vec<(String, usize)> = limits.into_iter().collect();
    assert_eq!(
        overridden,
        vec![("connections".to_string(), 100), ("retries".to_string(), 3)]
    );
}
