//! Construction of types the registry does not manage, resolving their dependencies.

use std::{any::type_name, fmt::Debug, panic::Location, sync::Arc};

use crate::{
    errors::RegistryError,
    registry::Registry,
    resolver::{Injector, ResolveAll},
    types::{DependencyInfo, DynError, Injectable},
};

type ConstructFn<C> = dyn Fn(&Injector<'_>) -> Result<C, DynError> + Send + Sync;

/// Types which can be built by [Registry::autobuild]
///
/// A constructor is picked by these rules:
/// 1. the constructor flagged with [Constructor::inject], if there is exactly one
/// 2. otherwise the widest constructor whose parameters can all be resolved
/// 3. otherwise the widest constructor, whose resolution failure is reported
///
/// After construction [Autobuild::inject_fields] runs with the same injector.
pub trait Autobuild: Injectable + Sized {
    fn constructors() -> Vec<Constructor<Self>>;

    /// Post construction injection
    fn inject_fields(&mut self, _injector: &Injector<'_>) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// One way of building `C` from a tuple of resolvable parameters
pub struct Constructor<C> {
    name: &'static str,
    location: &'static Location<'static>,
    inject: bool,
    parameters: Vec<DependencyInfo>,
    resolvable: fn(&Injector<'_>) -> bool,
    construct: Box<ConstructFn<C>>,
}
impl<C> Debug for Constructor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("location", &self.location())
            .field("inject", &self.inject)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

impl<C: 'static> Constructor<C> {
    /// `construct` receives the resolved parameters, `Args` is a tuple of
    /// [crate::resolver::Resolver]s
    #[track_caller]
    pub fn new<Args, F>(name: &'static str, construct: F) -> Self
    where
        Args: ResolveAll + 'static,
        F: Fn(Args) -> Result<C, DynError> + Send + Sync + 'static,
    {
        Constructor {
            name,
            location: Location::caller(),
            inject: false,
            parameters: Args::dependencies(),
            resolvable: Args::all_resolvable,
            construct: Box::new(move |injector: &Injector<'_>| -> Result<C, DynError> {
                let args = Args::resolve_all(injector)?;
                construct(args)
            }),
        }
    }
}

impl<C> Constructor<C> {
    /// Prefer this constructor over all others
    pub fn inject(mut self) -> Self {
        self.inject = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Where the constructor was declared, as `file:line`
    pub fn location(&self) -> String {
        format!("{}:{}", self.location.file(), self.location.line())
    }

    pub fn parameters(&self) -> &[DependencyInfo] {
        &self.parameters
    }

    fn describe(&self) -> String {
        format!("{}::{} ({})", type_name::<C>(), self.name, self.location())
    }
}

/// Index of the constructor to use
fn select<C>(constructors: &[Constructor<C>], injector: &Injector<'_>) -> Result<usize, RegistryError> {
    let type_name = type_name::<C>();
    if constructors.is_empty() {
        return Err(RegistryError::NoEligibleConstructor { type_name });
    }

    let injected: Vec<usize> = constructors
        .iter()
        .enumerate()
        .filter(|(_, constructor)| constructor.inject)
        .map(|(position, _)| position)
        .collect();
    match injected.as_slice() {
        [position] => return Ok(*position),
        [] => {}
        positions => {
            return Err(RegistryError::MultipleInjectConstructors {
                type_name,
                locations: positions
                    .iter()
                    .map(|position| constructors[*position].location())
                    .collect(),
            })
        }
    }

    Ok(widest(constructors, |constructor| (constructor.resolvable)(injector))
        .or_else(|| widest(constructors, |_| true))
        .unwrap_or_default())
}

/// On equal width the constructor declared first wins
fn widest<C>(
    constructors: &[Constructor<C>],
    eligible: impl Fn(&Constructor<C>) -> bool,
) -> Option<usize> {
    constructors
        .iter()
        .enumerate()
        .filter(|(_, constructor)| eligible(constructor))
        .fold(None, |best: Option<(usize, usize)>, (position, constructor)| {
            let width = constructor.parameters.len();
            match best {
                Some((_, best_width)) if best_width >= width => best,
                _ => Some((position, width)),
            }
        })
        .map(|(position, _)| position)
}

impl Registry {
    pub(crate) fn autobuild_in<C: Autobuild>(&self, module: Option<usize>) -> Result<C, RegistryError> {
        let type_name = type_name::<C>();
        self.tracker()
            .invoke(format!("Autobuilding instance of {type_name}"), || {
                let injector = Injector::new(self, module);
                let constructors = C::constructors();
                let constructor = &constructors[select(&constructors, &injector)?];
                tracing::debug!(constructor = %constructor.describe(), "Autobuilding {type_name}");

                let failed = |cause: DynError| RegistryError::AutobuildFailed {
                    type_name,
                    location: constructor.describe(),
                    cause: Arc::new(cause),
                };
                let mut instance = (constructor.construct)(&injector).map_err(failed)?;
                instance
                    .inject_fields(&injector)
                    .map_err(|cause| failed(cause.into()))?;
                Ok(instance)
            })
    }
}
