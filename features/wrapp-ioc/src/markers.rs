//! Marker types used to tell services of the same contract apart.
//!
//! Any `'static` type can be a marker, typically a unit struct. Services carry markers through
//! [crate::service_def::ServiceDefBuilder::marker], injection points request them through
//! [InjectionPoint::marked] or the [crate::resolver::Marked] resolver.

use crate::types::TypeInfo;

/// Carried by every builtin service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Builtin;

/// Restricts marker based lookups to services of the requesting module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Local;

/// Source of the markers present at an injection point
pub trait AnnotationProvider {
    fn markers(&self) -> &[TypeInfo];

    fn has_marker(&self, marker: &TypeInfo) -> bool {
        self.markers().contains(marker)
    }
}

/// Markers requested at a single injection point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionPoint {
    markers: Vec<TypeInfo>,
}
impl InjectionPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marked<M: 'static>(mut self) -> Self {
        self.add_marker(TypeInfo::of::<M>());
        self
    }

    pub(crate) fn add_marker(&mut self, marker: TypeInfo) {
        if !self.markers.contains(&marker) {
            self.markers.push(marker);
        }
    }
}
impl AnnotationProvider for InjectionPoint {
    fn markers(&self) -> &[TypeInfo] {
        &self.markers
    }
}
