use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use wrapp_ioc::{
    decorator::DecoratorDef, service_proxy, DynError, ModuleDef, Registry, RegistryError,
    ServiceDef, ServiceResources,
};

pub trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

service_proxy! {
    pub struct GreeterProxy for dyn Greeter {
        fn greet(&self, name: &str) -> String;
    }
}

struct Salutations {
    salutations: Vec<String>,
}
impl Greeter for Salutations {
    fn greet(&self, name: &str) -> String {
        format!("{} {name}", self.salutations.join(", "))
    }
}

struct Shouting(Arc<dyn Greeter>);
impl Greeter for Shouting {
    fn greet(&self, name: &str) -> String {
        self.0.greet(name).to_uppercase()
    }
}

fn greetings() -> ModuleDef {
    ModuleDef::builder("greetings")
        .service(
            ServiceDef::builder::<dyn Greeter, _>(
                "Greeter",
                |resources: &ServiceResources<'_>| -> Result<Arc<dyn Greeter>, DynError> {
                    let salutations = resources.ordered_configuration::<String>()?;
                    Ok(Arc::new(Salutations { salutations }))
                },
            )
            .with_proxy(),
        )
        .contribute_ordered::<String, _>("Greeter", |_, configuration| {
            configuration.add("hello", "Hello".into(), &[]);
            configuration.add("welcome", "welcome".into(), &["after:hello"]);
            Ok(())
        })
        .build()
}

fn loud() -> ModuleDef {
    ModuleDef::builder("loud")
        .decorate(DecoratorDef::new::<dyn Greeter, _>(
            "Shout",
            "Greeter",
            &[],
            |_: &ServiceResources<'_>, greeter: Arc<dyn Greeter>| {
                let decorated: Arc<dyn Greeter> = Arc::new(Shouting(greeter));
                Ok(Some(decorated))
            },
        ))
        .startup("announce", &[], |registry: &Registry| {
            let greeter = registry.service::<dyn Greeter>("greeter")?;
            tracing::info!("{}", greeter.greet("registry"));
            Ok(())
        })
        .build()
}

fn main() -> Result<(), RegistryError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = Registry::builder()
        .add_module(greetings())
        .add_module(loud())
        .build()?;
    registry.perform_registry_startup()?;

    println!("{registry:?}");
    let greeter = registry.service_by_type::<dyn Greeter>()?;
    println!("{}", greeter.greet("world"));

    for activity in registry.scoreboard().activity() {
        println!(
            "{:<28} {:<10} {}",
            activity.service_id,
            activity.status.to_string(),
            activity.scope
        );
    }

    registry.shutdown()
}
