use std::sync::Arc;

use thiserror::Error;

use crate::{configuration::ConfigurationKind, orderer::OrdererError, types::DynError};

/// A [crate::lock::OneShotLock] was used after it had been locked
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} has been locked and may no longer be modified or used")]
pub struct LockedError(pub &'static str);

/// Errors of the service registry
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Two modules (or a module and the builtins) define the same service id
    #[error("Service id '{service_id}' has already been defined by {first} and may not be redefined by {second}")]
    DuplicateService {
        service_id: String,
        first: String,
        second: String,
    },
    /// A service uses a scope no lifecycle is registered for
    #[error("Service '{service_id}' uses scope '{scope}', which is not known (known scopes: {})", .known.join(", "))]
    UnknownScope {
        service_id: String,
        scope: String,
        known: Vec<String>,
    },
    /// Two lifecycles were registered for the same scope
    #[error("A lifecycle for scope '{scope}' has already been registered")]
    DuplicateScope { scope: String },
    /// A module contributes to a service which does not exist
    #[error("{location} contributes to service '{service_id}', which does not exist")]
    ContributionToUnknownService { service_id: String, location: String },

    /// The requested service id is not known
    #[error("Service id '{service_id}' is not defined by any module. Defined service ids: {}", .known.join(", "))]
    UnknownService {
        service_id: String,
        known: Vec<String>,
    },
    /// The service exists but implements another contract
    #[error("Service '{service_id}' implements '{actual}', not the requested '{requested}'")]
    ServiceTypeMismatch {
        service_id: String,
        requested: &'static str,
        actual: &'static str,
    },
    /// The builtin service exists but has another type
    #[error("Builtin service '{service_id}' is of type '{actual}', not the requested '{requested}'")]
    BuiltinTypeMismatch {
        service_id: String,
        requested: &'static str,
        actual: &'static str,
    },
    #[error("No service implements the interface '{contract}'")]
    NoServiceForType { contract: &'static str },
    #[error("Service interface '{contract}' is matched by {} services: {}. Automatic dependency resolution requires that exactly one service implement the interface", .service_ids.len(), .service_ids.join(", "))]
    AmbiguousServiceType {
        contract: &'static str,
        service_ids: Vec<String>,
    },
    #[error("No service implements the interface '{contract}' and has markers [{}]", .markers.join(", "))]
    NoServiceForMarkers {
        contract: &'static str,
        markers: Vec<&'static str>,
    },
    #[error("Interface '{contract}' with markers [{}] is matched by {} services: {}", .markers.join(", "), .service_ids.len(), .service_ids.join(", "))]
    AmbiguousMarkers {
        contract: &'static str,
        markers: Vec<&'static str>,
        service_ids: Vec<String>,
    },

    /// An object provider or custom resolver failed
    #[error("Could not provide '{dependency}': {cause}")]
    ResolveFailed {
        dependency: &'static str,
        cause: Arc<DynError>,
    },
    /// A custom resolver has nothing for the requested type
    #[error("'{dependency}' is not provided by {provider}")]
    NotProvided {
        dependency: &'static str,
        provider: String,
    },

    /// Building the service (or its proxy delegate) failed
    #[error("Error building service '{service_id}': {cause}")]
    ConstructionFailed {
        service_id: String,
        cause: Arc<DynError>,
    },
    /// A service depends on itself during its own construction
    #[error("Construction of service '{service_id}' has failed due to recursion: the service depends on itself ({})", .chain.join(" -> "))]
    RecursiveConstruction {
        service_id: String,
        chain: Vec<String>,
    },
    /// Proxies and lazy values hold the registry weakly
    #[error("'{0}' can not be built as its registry no longer exists")]
    RegistryDropped(String),

    #[error("Decorator '{decorator_id}' decorates '{decorator_type}', but service '{service_id}' implements '{contract}'")]
    DecoratorTypeMismatch {
        decorator_id: String,
        service_id: String,
        decorator_type: &'static str,
        contract: &'static str,
    },
    #[error("Decorator '{decorator_id}' failed to decorate service '{service_id}': {cause}")]
    DecoratorFailed {
        decorator_id: String,
        service_id: String,
        cause: Arc<DynError>,
    },
    #[error("Advisor '{advisor_id}' matches service '{service_id}', which does not support method advice")]
    NotAdvisable {
        advisor_id: String,
        service_id: String,
    },
    #[error("Advisor '{advisor_id}' failed to advise service '{service_id}': {cause}")]
    AdvisorFailed {
        advisor_id: String,
        service_id: String,
        cause: Arc<DynError>,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("'{type_name}' has no constructors eligible for autobuilding")]
    NoEligibleConstructor { type_name: &'static str },
    #[error("'{type_name}' flags more than one constructor for injection: {}", .locations.join(", "))]
    MultipleInjectConstructors {
        type_name: &'static str,
        locations: Vec<String>,
    },
    #[error("Error invoking constructor {location} of '{type_name}': {cause}")]
    AutobuildFailed {
        type_name: &'static str,
        location: String,
        cause: Arc<DynError>,
    },
    #[error("Could not resolve parameter #{index} ('{parameter}'): {cause}")]
    UnresolvedParameter {
        index: usize,
        parameter: &'static str,
        cause: Box<RegistryError>,
    },

    #[error("Registry startup hook '{hook_id}' failed: {cause}")]
    StartupFailed {
        hook_id: String,
        cause: Arc<DynError>,
    },
    #[error("Registry startup has already been performed")]
    AlreadyStarted,
    #[error(transparent)]
    Locked(#[from] LockedError),
}

impl RegistryError {
    /// Whether the error means "nothing matched" rather than "something broke"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownService { .. }
                | RegistryError::NoServiceForType { .. }
                | RegistryError::NoServiceForMarkers { .. }
                | RegistryError::NotProvided { .. }
        )
    }

    pub fn resolve_failed(dependency: &'static str, cause: impl Into<DynError>) -> Self {
        RegistryError::ResolveFailed {
            dependency,
            cause: Arc::new(cause.into()),
        }
    }

    pub(crate) fn construction(service_id: impl Into<String>, cause: DynError) -> Self {
        RegistryError::ConstructionFailed {
            service_id: service_id.into(),
            cause: Arc::new(cause),
        }
    }
}

/// Errors while collecting contributed configuration
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    /// A contributed value does not have the type the service collects
    #[error("{location} contributed a value of type '{actual}' to service '{service_id}', which collects values of type '{expected}'")]
    ValueTypeMismatch {
        service_id: String,
        location: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// A contributed key does not have the type the service collects
    #[error("{location} contributed a key of type '{actual}' to service '{service_id}', which collects keys of type '{expected}'")]
    KeyTypeMismatch {
        service_id: String,
        location: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// The contribution is of another flavour than the one the service collects
    #[error("{location} contributes {contributed} configuration to service '{service_id}', which collects {requested} configuration")]
    KindMismatch {
        service_id: String,
        location: String,
        contributed: ConfigurationKind,
        requested: ConfigurationKind,
    },
    #[error("Ordered configuration of service '{service_id}' received id '{id}' from both {first} and {second}")]
    DuplicateId {
        service_id: String,
        id: String,
        first: String,
        second: String,
    },
    #[error("Mapped configuration of service '{service_id}' received key {key} from both {first} and {second}")]
    DuplicateKey {
        service_id: String,
        key: String,
        first: String,
        second: String,
    },
    #[error("{location} overrides {id} in the configuration of service '{service_id}', but nothing was contributed under it")]
    UnknownOverride {
        service_id: String,
        id: String,
        location: String,
    },
    #[error("{id} in the configuration of service '{service_id}' is overridden by both {first} and {second}")]
    DuplicateOverride {
        service_id: String,
        id: String,
        first: String,
        second: String,
    },
    #[error("{location} failed while contributing to service '{service_id}': {cause}")]
    ContributionFailed {
        service_id: String,
        location: String,
        cause: Arc<DynError>,
    },
    #[error(transparent)]
    Ordering(#[from] OrdererError),
}

/// Misuse of a [crate::advice::Invocation] or [crate::advice::MethodAdviceReceiver]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdviceError {
    #[error("Method '{method}' has {count} parameters, there is no parameter #{index}")]
    ParameterIndex {
        method: &'static str,
        index: usize,
        count: usize,
    },
    #[error("Parameter #{index} of method '{method}' is of type '{expected}', not '{actual}'")]
    ParameterType {
        method: &'static str,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Method '{method}' returns '{expected}', not '{actual}'")]
    ResultType {
        method: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Method '{method}' does not declare a checked failure")]
    NoCheckedFailure { method: &'static str },
    #[error("Method '{method}' fails with '{expected}', not '{actual}'")]
    FailureType {
        method: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Service '{service_id}' has no method named '{method}'")]
    UnknownMethod { service_id: String, method: String },
}
