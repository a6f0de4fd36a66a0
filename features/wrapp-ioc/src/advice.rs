//! Method advice: interceptors around individual methods of a service contract.
//!
//! Contracts opt in by implementing [Advisable], usually through [crate::advisable_proxy]. The
//! generated struct captures each call's arguments into an [Invocation] and runs the advice
//! chain for the method, the first advice being the outermost. Advice may inspect and replace
//! parameters, proceed to the real method (zero, one or several times) and replace the returned
//! value or the checked failure.
//!
//! Methods returning `Result<T, E>` report `Err(E)` as a checked failure, every other return
//! type is a plain result. Panics are never intercepted.

use std::{any::Any, fmt::Debug, sync::Arc};

use crate::{
    errors::AdviceError,
    id_matcher::IdMatcher,
    resources::ServiceResources,
    types::{DynError, Injectable, TypeInfo},
};

/// Describes an advisable method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: &'static str,
    pub parameters: Vec<TypeInfo>,
    pub result: TypeInfo,
    /// Error type of methods returning a `Result`
    pub failure: Option<TypeInfo>,
}

#[doc(hidden)]
pub enum Outcome {
    Returned(Box<dyn Any + Send>),
    Failed(Box<dyn Any + Send>),
}

pub trait MethodAdvice: Send + Sync {
    fn advise(&self, invocation: &mut Invocation<'_>);
}
impl<F: Fn(&mut Invocation<'_>) + Send + Sync> MethodAdvice for F {
    fn advise(&self, invocation: &mut Invocation<'_>) {
        self(invocation)
    }
}

type Target<'a> = &'a (dyn Fn(&[Box<dyn Any + Send>]) -> Outcome + 'a);

/// A single call of an advised method
pub struct Invocation<'a> {
    method: &'a MethodInfo,
    parameters: Vec<Box<dyn Any + Send>>,
    outcome: Option<Outcome>,
    advice: &'a [Arc<dyn MethodAdvice>],
    next: usize,
    target: Target<'a>,
}
impl Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method.name)
            .field("proceeded", &self.outcome.is_some())
            .finish()
    }
}

impl<'a> Invocation<'a> {
    pub fn method(&self) -> &MethodInfo {
        self.method
    }

    pub fn method_name(&self) -> &'static str {
        self.method.name
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_type(&self, index: usize) -> Result<TypeInfo, AdviceError> {
        self.check_index(index)?;
        Ok(self.method.parameters[index])
    }

    pub fn parameter<T: 'static>(&self, index: usize) -> Result<&T, AdviceError> {
        let expected = self.parameter_type(index)?;
        self.parameters[index]
            .downcast_ref::<T>()
            .ok_or(AdviceError::ParameterType {
                method: self.method.name,
                index,
                expected: expected.type_name,
                actual: std::any::type_name::<T>(),
            })
    }

    /// Replaces a parameter before proceeding
    pub fn override_parameter<T: Send + 'static>(
        &mut self,
        index: usize,
        value: T,
    ) -> Result<(), AdviceError> {
        let expected = self.parameter_type(index)?;
        if !expected.is::<T>() {
            return Err(AdviceError::ParameterType {
                method: self.method.name,
                index,
                expected: expected.type_name,
                actual: std::any::type_name::<T>(),
            });
        }
        self.parameters[index] = Box::new(value);
        Ok(())
    }

    /// Runs the rest of the advice chain, and finally the real method
    pub fn proceed(&mut self) {
        let chain = self.advice;
        match chain.get(self.next) {
            Some(advice) => {
                self.next += 1;
                advice.advise(self);
                self.next -= 1;
            }
            None => {
                let target = self.target;
                self.outcome = Some(target(&self.parameters));
            }
        }
    }

    /// Whether the method (or an advice) produced a checked failure
    pub fn is_fail(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Failed(_)))
    }

    /// The returned value, `None` if the method has not returned (yet)
    pub fn result_as<T: 'static>(&self) -> Result<Option<&T>, AdviceError> {
        if !self.method.result.is::<T>() {
            return Err(self.result_type_error::<T>());
        }
        Ok(match &self.outcome {
            Some(Outcome::Returned(value)) => value.downcast_ref::<T>(),
            _ => None,
        })
    }

    /// The checked failure, `None` if the method did not fail
    pub fn failure_as<E: 'static>(&self) -> Result<Option<&E>, AdviceError> {
        self.check_failure_type::<E>()?;
        Ok(match &self.outcome {
            Some(Outcome::Failed(failure)) => failure.downcast_ref::<E>(),
            _ => None,
        })
    }

    pub fn override_result<T: Send + 'static>(&mut self, value: T) -> Result<(), AdviceError> {
        if !self.method.result.is::<T>() {
            return Err(self.result_type_error::<T>());
        }
        self.outcome = Some(Outcome::Returned(Box::new(value)));
        Ok(())
    }

    pub fn override_failure<E: Send + 'static>(&mut self, failure: E) -> Result<(), AdviceError> {
        self.check_failure_type::<E>()?;
        self.outcome = Some(Outcome::Failed(Box::new(failure)));
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), AdviceError> {
        match index < self.parameters.len() {
            true => Ok(()),
            false => Err(AdviceError::ParameterIndex {
                method: self.method.name,
                index,
                count: self.parameters.len(),
            }),
        }
    }

    fn result_type_error<T: 'static>(&self) -> AdviceError {
        AdviceError::ResultType {
            method: self.method.name,
            expected: self.method.result.type_name,
            actual: std::any::type_name::<T>(),
        }
    }

    fn check_failure_type<E: 'static>(&self) -> Result<(), AdviceError> {
        match self.method.failure {
            None => Err(AdviceError::NoCheckedFailure {
                method: self.method.name,
            }),
            Some(failure) if !failure.is::<E>() => Err(AdviceError::FailureType {
                method: self.method.name,
                expected: failure.type_name,
                actual: std::any::type_name::<E>(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn take_outcome(self) -> Outcome {
        match self.outcome {
            Some(outcome) => outcome,
            None => panic!(
                "No advice of method '{}' proceeded or provided a result",
                self.method.name
            ),
        }
    }

    /// Result of a method returning `Result<T, E>`
    #[doc(hidden)]
    pub fn finish<T: 'static, E: 'static>(self) -> Result<T, E> {
        let method = self.method.name;
        match self.take_outcome() {
            Outcome::Returned(value) => Ok(unbox(method, value)),
            Outcome::Failed(failure) => Err(unbox(method, failure)),
        }
    }

    /// Result of a method returning a plain `T`
    #[doc(hidden)]
    pub fn finish_returning<T: 'static>(self) -> T {
        let method = self.method.name;
        match self.take_outcome() {
            Outcome::Returned(value) => unbox(method, value),
            Outcome::Failed(_) => unreachable!("method '{method}' has no checked failure"),
        }
    }
}

// Overrides are type checked against the method descriptor, so this only fails if the
// descriptor does not match the method
fn unbox<T: 'static>(method: &str, value: Box<dyn Any + Send>) -> T {
    match value.downcast::<T>() {
        Ok(value) => *value,
        Err(_) => unreachable!(
            "method '{method}' produced a value which is not a '{}'",
            std::any::type_name::<T>()
        ),
    }
}

/// Takes the next captured parameter
#[doc(hidden)]
pub fn param<T: Clone + 'static>(parameters: &mut std::slice::Iter<'_, Box<dyn Any + Send>>) -> T {
    match parameters.next().and_then(|p| p.downcast_ref::<T>()) {
        Some(value) => value.clone(),
        None => unreachable!(
            "advised parameter is not a '{}'",
            std::any::type_name::<T>()
        ),
    }
}

/// An advisable method and its advice
pub struct AdvisedMethod {
    info: MethodInfo,
    advice: Vec<Arc<dyn MethodAdvice>>,
}
impl AdvisedMethod {
    #[doc(hidden)]
    pub fn invoke<'a>(
        &'a self,
        parameters: Vec<Box<dyn Any + Send>>,
        target: Target<'a>,
    ) -> Invocation<'a> {
        let mut invocation = Invocation {
            method: &self.info,
            parameters,
            outcome: None,
            advice: &self.advice,
            next: 0,
            target,
        };
        invocation.proceed();
        invocation
    }
}

/// Advice of every method of one service
#[derive(Default)]
pub struct AdviceTable {
    methods: Vec<AdvisedMethod>,
}
impl AdviceTable {
    /// The method, if it has any advice
    #[doc(hidden)]
    pub fn find(&self, name: &str) -> Option<&AdvisedMethod> {
        self.methods
            .iter()
            .find(|method| method.info.name == name && !method.advice.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.methods.iter().all(|method| method.advice.is_empty())
    }
}

/// Handed to advisors to attach advice to the methods of one service
pub struct MethodAdviceReceiver {
    service_id: String,
    table: AdviceTable,
}
impl MethodAdviceReceiver {
    pub(crate) fn new(service_id: &str, methods: Vec<MethodInfo>) -> Self {
        MethodAdviceReceiver {
            service_id: service_id.to_string(),
            table: AdviceTable {
                methods: methods
                    .into_iter()
                    .map(|info| AdvisedMethod {
                        info,
                        advice: Vec::new(),
                    })
                    .collect(),
            },
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.table.methods.iter().map(|method| &method.info)
    }

    /// Adds advice to a method, inside of any advice added before
    pub fn advise_method(
        &mut self,
        name: &str,
        advice: impl MethodAdvice + 'static,
    ) -> Result<(), AdviceError> {
        let method = self
            .table
            .methods
            .iter_mut()
            .find(|method| method.info.name == name)
            .ok_or_else(|| AdviceError::UnknownMethod {
                service_id: self.service_id.clone(),
                method: name.to_string(),
            })?;
        method.advice.push(Arc::new(advice));
        Ok(())
    }

    pub fn advise_all_methods(&mut self, advice: impl MethodAdvice + 'static) {
        let advice: Arc<dyn MethodAdvice> = Arc::new(advice);
        for method in &mut self.table.methods {
            method.advice.push(Arc::clone(&advice));
        }
    }

    pub(crate) fn into_table(self) -> AdviceTable {
        self.table
    }
}

/// Contracts whose methods can be advised, implemented for `dyn Trait` by
/// [crate::advisable_proxy]
pub trait Advisable: Injectable {
    fn advised_methods() -> Vec<MethodInfo>;

    fn create_advised(target: Arc<Self>, advice: Arc<AdviceTable>) -> Arc<Self>;
}

type AdviseFn =
    dyn Fn(&mut MethodAdviceReceiver, &ServiceResources<'_>) -> Result<(), DynError> + Send + Sync;

/// Module level definition of an advisor, applied to every advisable service it matches
#[derive(Clone)]
pub struct AdvisorDef {
    pub(crate) advisor_id: String,
    pub(crate) matcher: IdMatcher,
    pub(crate) constraints: Vec<String>,
    pub(crate) advise: Arc<AdviseFn>,
}
impl Debug for AdvisorDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorDef")
            .field("advisor_id", &self.advisor_id)
            .field("matcher", &self.matcher)
            .field("constraints", &self.constraints)
            .finish()
    }
}
impl AdvisorDef {
    pub fn new<F>(
        advisor_id: &str,
        matcher: impl Into<IdMatcher>,
        constraints: &[&str],
        advise: F,
    ) -> Self
    where
        F: Fn(&mut MethodAdviceReceiver, &ServiceResources<'_>) -> Result<(), DynError>
            + Send
            + Sync
            + 'static,
    {
        AdvisorDef {
            advisor_id: advisor_id.to_string(),
            matcher: matcher.into(),
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
            advise: Arc::new(advise),
        }
    }

    pub fn advisor_id(&self) -> &str {
        &self.advisor_id
    }
}

/// Creates an advisable wrapper struct for a contract trait and implements [Advisable] for it.
///
/// Arguments of listed methods must be `Clone + Send + 'static`, results `Send + 'static`.
/// Methods returning `Result<T, E>` must spell out the `Result` type.
///
/// ```
/// use wrapp_ioc::advisable_proxy;
///
/// #[derive(Debug)]
/// pub struct Rejected;
///
/// pub trait Lookup: Send + Sync {
///     fn find(&self, key: String) -> Result<u32, Rejected>;
///     fn size(&self) -> usize;
/// }
///
/// advisable_proxy! {
///     pub struct AdvisedLookup for dyn Lookup {
///         fn find(&self, key: String) -> Result<u32, Rejected>;
///         fn size(&self) -> usize;
///     }
/// }
/// ```
#[macro_export]
macro_rules! advisable_proxy {
    ($vis:vis struct $proxy:ident for dyn $contract:ident { $($body:tt)* }) => {
        $crate::advisable_proxy!(@munch [$vis] $proxy $contract [] $($body)*);
    };

    (@munch [$vis:vis] $proxy:ident $contract:ident [$($done:tt)*]
        fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)*) -> Result<$ok:ty, $err:ty>;
        $($rest:tt)*
    ) => {
        $crate::advisable_proxy!(@munch [$vis] $proxy $contract
            [$($done)* { checked $method [$($arg: $arg_ty),*] [$ok, $err] }]
            $($rest)*);
    };
    (@munch [$vis:vis] $proxy:ident $contract:ident [$($done:tt)*]
        fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)*) -> $ret:ty;
        $($rest:tt)*
    ) => {
        $crate::advisable_proxy!(@munch [$vis] $proxy $contract
            [$($done)* { plain $method [$($arg: $arg_ty),*] [$ret] }]
            $($rest)*);
    };
    (@munch [$vis:vis] $proxy:ident $contract:ident [$($done:tt)*]
        fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)*);
        $($rest:tt)*
    ) => {
        $crate::advisable_proxy!(@munch [$vis] $proxy $contract
            [$($done)* { plain $method [$($arg: $arg_ty),*] [()] }]
            $($rest)*);
    };

    (@munch [$vis:vis] $proxy:ident $contract:ident
        [$({ $kind:ident $method:ident [$($arg:ident: $arg_ty:ty),*] [$($ret:ty),+] })*]
    ) => {
        $vis struct $proxy {
            target: ::std::sync::Arc<dyn $contract>,
            advice: ::std::sync::Arc<$crate::advice::AdviceTable>,
        }

        impl $contract for $proxy {
            $(
                $crate::advisable_proxy!(@method $kind $method [$($arg: $arg_ty),*] [$($ret),+]);
            )*
        }

        impl $crate::advice::Advisable for dyn $contract {
            fn advised_methods() -> ::std::vec::Vec<$crate::advice::MethodInfo> {
                ::std::vec![
                    $( $crate::advisable_proxy!(@info $kind $method [$($arg_ty),*] [$($ret),+]) ),*
                ]
            }

            fn create_advised(
                target: ::std::sync::Arc<Self>,
                advice: ::std::sync::Arc<$crate::advice::AdviceTable>,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new($proxy { target, advice })
            }
        }
    };

    (@method checked $method:ident [$($arg:ident: $arg_ty:ty),*] [$ok:ty, $err:ty]) => {
        fn $method(&self $(, $arg: $arg_ty)*) -> ::std::result::Result<$ok, $err> {
            match self.advice.find(::std::stringify!($method)) {
                None => self.target.$method($($arg),*),
                Some(advised) => {
                    let parameters: ::std::vec::Vec<::std::boxed::Box<dyn ::std::any::Any + Send>> =
                        ::std::vec![$(::std::boxed::Box::new($arg) as ::std::boxed::Box<dyn ::std::any::Any + Send>),*];
                    let target = |parameters: &[::std::boxed::Box<dyn ::std::any::Any + Send>]| {
                        #[allow(unused_mut, unused_variables)]
                        let mut parameters = parameters.iter();
                        $( let $arg: $arg_ty = $crate::advice::param(&mut parameters); )*
                        match self.target.$method($($arg),*) {
                            Ok(value) => $crate::advice::Outcome::Returned(::std::boxed::Box::new(value)),
                            Err(failure) => $crate::advice::Outcome::Failed(::std::boxed::Box::new(failure)),
                        }
                    };
                    advised.invoke(parameters, &target).finish::<$ok, $err>()
                }
            }
        }
    };
    (@method plain $method:ident [$($arg:ident: $arg_ty:ty),*] [$ret:ty]) => {
        fn $method(&self $(, $arg: $arg_ty)*) -> $ret {
            match self.advice.find(::std::stringify!($method)) {
                None => self.target.$method($($arg),*),
                Some(advised) => {
                    let parameters: ::std::vec::Vec<::std::boxed::Box<dyn ::std::any::Any + Send>> =
                        ::std::vec![$(::std::boxed::Box::new($arg) as ::std::boxed::Box<dyn ::std::any::Any + Send>),*];
                    let target = |parameters: &[::std::boxed::Box<dyn ::std::any::Any + Send>]| {
                        #[allow(unused_mut, unused_variables)]
                        let mut parameters = parameters.iter();
                        $( let $arg: $arg_ty = $crate::advice::param(&mut parameters); )*
                        $crate::advice::Outcome::Returned(::std::boxed::Box::new(self.target.$method($($arg),*)))
                    };
                    advised.invoke(parameters, &target).finish_returning::<$ret>()
                }
            }
        }
    };

    (@info checked $method:ident [$($arg_ty:ty),*] [$ok:ty, $err:ty]) => {
        $crate::advice::MethodInfo {
            name: ::std::stringify!($method),
            parameters: ::std::vec![$($crate::types::TypeInfo::of::<$arg_ty>()),*],
            result: $crate::types::TypeInfo::of::<$ok>(),
            failure: ::std::option::Option::Some($crate::types::TypeInfo::of::<$err>()),
        }
    };
    (@info plain $method:ident [$($arg_ty:ty),*] [$ret:ty]) => {
        $crate::advice::MethodInfo {
            name: ::std::stringify!($method),
            parameters: ::std::vec![$($crate::types::TypeInfo::of::<$arg_ty>()),*],
            result: $crate::types::TypeInfo::of::<$ret>(),
            failure: ::std::option::Option::None,
        }
    };
}
