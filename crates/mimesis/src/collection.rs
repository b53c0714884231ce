//! Collection deep-mapping: element-by-element mapping of sequence fields.

use crate::config::ElementPolicy;
use crate::mapper::{MapError, Mapper};
use crate::profile::CollectionMember;
use crate::shape::{ElementType, Mappable};
use crate::value::{Element, Value};

/// Maps collection-shaped members for one [`Mapper`].
pub(crate) struct CollectionMapper<'a> {
    mapper: &'a Mapper,
}

impl<'a> CollectionMapper<'a> {
    pub(crate) fn new(mapper: &'a Mapper) -> Self {
        Self { mapper }
    }

    /// Rebuild one collection member on `destination` from `source`.
    ///
    /// A null source collection leaves the destination untouched. Otherwise
    /// the destination receives a freshly allocated collection: null
    /// elements are dropped, simple elements are copied and complex elements
    /// are mapped into new instances. Source elements are only borrowed.
    pub(crate) fn map_member(
        &self,
        member: &CollectionMember,
        source: &dyn Mappable,
        destination: &mut dyn Mappable,
    ) -> Result<(), MapError> {
        let Some(items) = member.source.elements(source) else {
            return Ok(());
        };

        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Element::Null => continue,
                Element::Object(element) => {
                    mapped.push(self.map_element(element, member.destination_element)?)
                }
                Element::Simple(value) => mapped.push(value),
            }
        }

        if member.destination.write(destination, Value::List(mapped)) {
            Ok(())
        } else {
            Err(MapError::IncompatibleValue {
                type_name: destination.type_info().name(),
                property: member.destination.name(),
            })
        }
    }

    fn map_element(
        &self,
        element: &dyn Mappable,
        target: ElementType,
    ) -> Result<Value, MapError> {
        let Some(target_shape) = target.shape() else {
            return self.pass_through(element, target);
        };

        let registry = self.mapper.registry();
        let destination = target_shape.info();
        let config = registry
            .resolve_source_type(destination, element)
            .and_then(|source| registry.lookup(source, destination));
        let Some(config) = config else {
            return self.pass_through(element, target);
        };

        let mut fresh = target_shape
            .construct()
            .ok_or(MapError::NotConstructible(destination.name()))?;
        self.mapper.apply(&config, element, fresh.as_mut())?;
        Ok(Value::Object(fresh))
    }

    /// The one place a source element is cloned.
    fn pass_through(
        &self,
        element: &dyn Mappable,
        target: ElementType,
    ) -> Result<Value, MapError> {
        match self.mapper.config().element_policy {
            ElementPolicy::PassThrough => {
                tracing::trace!(
                    element = %element.type_info(),
                    target = %target.info(),
                    "no element mapping, passing element through"
                );
                Ok(Value::Object(element.clone_boxed()))
            }
            ElementPolicy::Strict => Err(MapError::UnmappedElement {
                source_type: element.type_info().name(),
                destination_type: target.info().name(),
            }),
        }
    }
}
