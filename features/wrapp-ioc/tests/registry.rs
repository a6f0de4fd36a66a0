use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use wrapp_ioc::{
    activity::ServiceStatus,
    lifecycle::{ObjectCreator, ServiceLifecycle},
    markers::{InjectionPoint, Local},
    service_def::{ServiceDefBuilder, SCOPE_PERTHREAD},
    shutdown::RegistryShutdownHub,
    types::ServiceInstance,
    Autobuild, Constructor, DynError, Marked, ModuleDef, Registry, RegistryError, RegistryState,
    ServiceDef, ServiceResources,
};

pub trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct Fixed(&'static str);
impl Greeter for Fixed {
    fn greet(&self) -> String {
        self.0.to_string()
    }
}

fn greeter(id: &str, greeting: &'static str) -> ServiceDefBuilder<dyn Greeter> {
    ServiceDef::builder::<dyn Greeter, _>(
        id,
        move |_: &ServiceResources<'_>| -> Result<Arc<dyn Greeter>, DynError> {
            Ok(Arc::new(Fixed(greeting)))
        },
    )
}

struct Primary;
struct Unused;

#[test]
fn duplicate_service_ids_name_both_modules() {
    let err = Registry::builder()
        .add_module(ModuleDef::builder("first").service(greeter("Greeter", "a")).build())
        .add_module(ModuleDef::builder("second").service(greeter("GREETER", "b")).build())
        .build()
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Service id 'GREETER' has already been defined by module 'first' and may not be redefined by module 'second'"
    );
}

#[test]
fn default_scope_services_are_built_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let module = ModuleDef::builder("app")
        .service(
            ServiceDef::builder::<dyn Greeter, _>(
                "Greeter",
                move |_: &ServiceResources<'_>| -> Result<Arc<dyn Greeter>, DynError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Fixed("hello")))
                },
            )
            .scope("default"),
        )
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let first = registry.service::<dyn Greeter>("Greeter").unwrap();
    let second = registry.service::<dyn Greeter>("greeter").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(registry.scoreboard().status("Greeter"), Some(ServiceStatus::Real));
}

#[test]
fn perthread_services_are_isolated_per_thread() {
    let module = ModuleDef::builder("app")
        .service(greeter("Greeter", "hello").scope(SCOPE_PERTHREAD))
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    let looked_up = Barrier::new(2);
    let cleaned_up = Barrier::new(2);
    let (first_thread, other_thread) = thread::scope(|scope| {
        let first = scope.spawn(|| {
            let before = registry.service::<dyn Greeter>("Greeter").unwrap();
            let again = registry.service::<dyn Greeter>("Greeter").unwrap();
            assert!(Arc::ptr_eq(&before, &again));
            looked_up.wait();

            registry.cleanup_thread();
            let after = registry.service::<dyn Greeter>("Greeter").unwrap();
            cleaned_up.wait();
            (before, after)
        });
        let other = scope.spawn(|| {
            let before = registry.service::<dyn Greeter>("Greeter").unwrap();
            looked_up.wait();
            cleaned_up.wait();
            let after = registry.service::<dyn Greeter>("Greeter").unwrap();
            (before, after)
        });
        (first.join().unwrap(), other.join().unwrap())
    });

    // Each thread built its own instance
    assert!(!Arc::ptr_eq(&first_thread.0, &other_thread.0));
    // Cleanup discarded the first thread's instance only
    assert!(!Arc::ptr_eq(&first_thread.0, &first_thread.1));
    assert!(Arc::ptr_eq(&other_thread.0, &other_thread.1));
}

#[test]
fn lookup_by_type_requires_a_single_match() {
    let module = ModuleDef::builder("app")
        .service(greeter("Beta", "b"))
        .service(greeter("alpha", "a"))
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    let err = registry.service_by_type::<dyn Greeter>().err().unwrap();
    assert!(matches!(
        &err,
        RegistryError::AmbiguousServiceType { service_ids, .. } if service_ids == &["alpha", "Beta"]
    ));
    assert!(err.to_string().contains("is matched by 2 services: alpha, Beta"), "{err}");

    assert!(matches!(
        registry.service_by_type::<String>(),
        Err(RegistryError::NoServiceForType { .. })
    ));
    assert!(registry.service_by_type::<RegistryShutdownHub>().is_ok());
}

#[test]
fn markers_disambiguate_object_lookups() {
    let module = ModuleDef::builder("app")
        .service(greeter("Plain", "plain"))
        .service(greeter("Marked", "marked").marker::<Primary>())
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    let primary = InjectionPoint::new().marked::<Primary>();
    let greeter = registry.object::<dyn Greeter>(&primary).unwrap();
    assert_eq!(greeter.greet(), "marked");

    // Markers no service carries are not recognized
    let unrecognized = InjectionPoint::new().marked::<Unused>();
    let err = registry.object::<dyn Greeter>(&unrecognized).err().unwrap();
    assert!(matches!(
        &err,
        RegistryError::AmbiguousServiceType { service_ids, .. } if service_ids == &["Marked", "Plain"]
    ));

    let err = registry.object::<String>(&primary).err().unwrap();
    assert!(matches!(err, RegistryError::NoServiceForMarkers { .. }));
}

struct Welcome {
    greeting: String,
}
impl Autobuild for Welcome {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(
            "new",
            |(greeter,): (Marked<Local, Arc<dyn Greeter>>,)| {
                Ok(Welcome {
                    greeting: greeter.greet(),
                })
            },
        )]
    }
}

#[test]
fn local_marker_restricts_to_the_requesting_module() {
    let ours = ModuleDef::builder("ours")
        .service(greeter("OurGreeter", "ours"))
        .service(ServiceDef::autobuilt::<Welcome, Welcome>("Welcome", |welcome| welcome))
        .build();
    let theirs = ModuleDef::builder("theirs")
        .service(greeter("TheirGreeter", "theirs"))
        .build();
    let registry = Registry::builder()
        .add_module(theirs)
        .add_module(ours)
        .build()
        .unwrap();

    let welcome = registry.service::<Welcome>("Welcome").unwrap();
    assert_eq!(welcome.greeting, "ours");

    // Outside of a module the marker has nothing to restrict to
    let err = registry.autobuild::<Welcome>().err().unwrap();
    assert!(err.to_string().contains("OurGreeter, TheirGreeter"), "{err}");
}

#[test]
fn object_providers_answer_unmarked_lookups() {
    let module = ModuleDef::builder("app")
        .service(greeter("One", "one"))
        .service(greeter("Two", "two"))
        .object_provider(
            "greeters",
            &[],
            |contract: wrapp_ioc::TypeInfo,
             _: &dyn wrapp_ioc::markers::AnnotationProvider,
             registry: &Registry|
             -> Result<Option<ServiceInstance>, DynError> {
                if !contract.is::<dyn Greeter>() {
                    return Ok(None);
                }
                let two = registry.service::<dyn Greeter>("Two")?;
                Ok(Some(ServiceInstance::new(two)))
            },
        )
        .build();
    let registry = Registry::builder()
        .add_module(module)
        .add_instance("Motto", Arc::new(String::from("motto")))
        .build()
        .unwrap();

    let greeter = registry.object::<dyn Greeter>(&InjectionPoint::new()).unwrap();
    assert_eq!(greeter.greet(), "two");

    // Providers returning nothing fall back to the lookup by type
    let motto = registry.object::<String>(&InjectionPoint::new()).unwrap();
    assert_eq!(*motto, "motto");
}

#[test]
fn startup_builds_eager_services_then_runs_hooks() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let built = Arc::clone(&events);
    let first = Arc::clone(&events);
    let second = Arc::clone(&events);

    let module = ModuleDef::builder("app")
        .service(
            ServiceDef::builder::<dyn Greeter, _>(
                "Eager",
                move |_: &ServiceResources<'_>| -> Result<Arc<dyn Greeter>, DynError> {
                    built.lock().push("built Eager".to_string());
                    Ok(Arc::new(Fixed("eager")))
                },
            )
            .eager_load(),
        )
        .startup("second", &["after:first"], move |_: &Registry| {
            second.lock().push("hook second".to_string());
            Ok(())
        })
        .startup("first", &[], move |registry: &Registry| {
            let greeting = registry.service::<dyn Greeter>("Eager")?.greet();
            first.lock().push(format!("hook first saw {greeting}"));
            Ok(())
        })
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();
    assert_eq!(registry.state(), RegistryState::Constructing);
    assert!(events.lock().is_empty());

    registry.perform_registry_startup().unwrap();
    assert_eq!(
        *events.lock(),
        vec!["built Eager", "hook first saw eager", "hook second"]
    );
    assert_eq!(registry.state(), RegistryState::Started);

    assert!(matches!(
        registry.perform_registry_startup(),
        Err(RegistryError::AlreadyStarted)
    ));
}

#[test]
fn failing_startup_hooks_are_reported() {
    let module = ModuleDef::builder("app")
        .startup("broken", &[], |_: &Registry| Err("no database".into()))
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    let err = registry.perform_registry_startup().unwrap_err();
    assert_eq!(err.to_string(), "Registry startup hook 'broken' failed: no database");
}

#[test]
fn startup_does_not_revive_a_registry_shut_down_by_a_hook() {
    let module = ModuleDef::builder("app")
        .service(greeter("Greeter", "hello"))
        .startup("stop", &[], |registry: &Registry| {
            registry.shutdown()?;
            Ok(())
        })
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    assert!(matches!(
        registry.perform_registry_startup(),
        Err(RegistryError::Locked(_))
    ));
    assert_eq!(registry.state(), RegistryState::ShutDown);
    assert!(registry.service::<dyn Greeter>("Greeter").is_err());
}

/// Counts how many of its instances have been dropped
struct DropCounter(Arc<AtomicUsize>);
impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn eager_perthread_services_are_released_by_cleanup_thread() {
    let built = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let (counter, drops) = (Arc::clone(&built), Arc::clone(&dropped));

    let module = ModuleDef::builder("app")
        .service(
            ServiceDef::builder::<DropCounter, _>(
                "Session",
                move |_: &ServiceResources<'_>| -> Result<Arc<DropCounter>, DynError> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(DropCounter(Arc::clone(&drops))))
                },
            )
            .scope(SCOPE_PERTHREAD)
            .eager_load(),
        )
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    // Startup ends with a cleanup of the starting thread
    registry.perform_registry_startup().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    let session = registry.service::<DropCounter>("Session").unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2);
    drop(session);
    registry.cleanup_thread();
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
}

#[test]
fn shutdown_notifies_listeners_once() {
    let registry = Registry::builder()
        .add_module(ModuleDef::builder("app").service(greeter("Greeter", "bye")).build())
        .build()
        .unwrap();
    registry.service::<dyn Greeter>("Greeter").unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let hub = registry
        .service::<RegistryShutdownHub>("RegistryShutdownHub")
        .unwrap();

    let late = Arc::clone(&events);
    registry
        .add_shutdown_listener(move || {
            late.lock().push("shutdown");
            Ok(())
        })
        .unwrap();
    registry
        .add_shutdown_listener(|| Err("listener failure is only logged".into()))
        .unwrap();

    let early = Arc::clone(&events);
    let lookup = registry.clone();
    hub.add_will_shutdown_listener(move || {
        let greeting = lookup.service::<dyn Greeter>("Greeter")?.greet();
        early.lock().push(if greeting == "bye" { "will shutdown" } else { "wrong" });
        Ok(())
    })
    .unwrap();

    registry.shutdown().unwrap();
    assert_eq!(*events.lock(), vec!["will shutdown", "shutdown"]);
    assert_eq!(registry.state(), RegistryState::ShutDown);
    assert_eq!(
        registry.scoreboard().status("Greeter"),
        Some(ServiceStatus::Shutdown)
    );
    assert_eq!(
        registry.scoreboard().status("RegistryShutdownHub"),
        Some(ServiceStatus::Builtin)
    );

    assert!(matches!(registry.shutdown(), Err(RegistryError::Locked(_))));
    assert!(registry.add_shutdown_listener(|| Ok(())).is_err());
}

/// Builds a new instance for every lookup
struct Prototype;
impl ServiceLifecycle for Prototype {
    fn create_service(
        &self,
        _resources: &ServiceResources<'_>,
        creator: &dyn ObjectCreator,
    ) -> Result<ServiceInstance, RegistryError> {
        creator.create_object()
    }
}

#[test]
fn custom_lifecycles_decide_instance_reuse() {
    let module = ModuleDef::builder("app")
        .service(greeter("Greeter", "fresh").scope("Prototype"))
        .build();
    let registry = Registry::builder()
        .add_lifecycle("prototype", Arc::new(Prototype))
        .unwrap()
        .add_module(module)
        .build()
        .unwrap();

    let first = registry.service::<dyn Greeter>("Greeter").unwrap();
    let second = registry.service::<dyn Greeter>("Greeter").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.greet(), "fresh");
}

#[test]
fn recursive_services_are_reported() {
    let module = ModuleDef::builder("app")
        .service(ServiceDef::builder::<dyn Greeter, _>(
            "Ouroboros",
            |resources: &ServiceResources<'_>| -> Result<Arc<dyn Greeter>, DynError> {
                Ok(resources.service::<dyn Greeter>("Ouroboros")?)
            },
        ))
        .build();
    let registry = Registry::builder().add_module(module).build().unwrap();

    let err = registry.service::<dyn Greeter>("Ouroboros").err().unwrap();
    assert!(
        err.to_string().contains("the service depends on itself"),
        "{err}"
    );
}

#[test]
fn service_activity_lists_every_service() {
    let registry = Registry::builder()
        .add_module(ModuleDef::builder("app").service(greeter("Greeter", "hi")).build())
        .build()
        .unwrap();

    let activity = registry.scoreboard().activity();
    let ids: Vec<&str> = activity.iter().map(|a| a.service_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "Greeter",
            "LoggerSource",
            "MasterObjectProvider",
            "OperationTracker",
            "PerthreadManager",
            "RegistryShutdownHub",
            "RegistryStartup",
            "ServiceActivityScoreboard",
        ]
    );
    assert_eq!(activity[0].status, ServiceStatus::Defined);
    assert_eq!(activity[0].scope, "singleton");
    assert_eq!(registry.service_ids(), ids);
}
