//! Declarative per-type cache metadata.
//!
//! A record type opts into caching by implementing [`Cached`]. Its
//! [`CollectionDescriptor`] names the collection provider and the indexes
//! to attach after bootstrap, and may inherit the index declarations of a
//! type it embeds.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use larder_collection::{
    builtin_factory, CollectionProvider, ConcurrentCollectionProvider, IndexFactory,
};
use larder_types::{Attribute, Record, RecordType};

/// A record type that can be cached.
pub trait Cached: Record {
    fn descriptor() -> CollectionDescriptor<Self>;
}

/// A malformed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("index declaration has an empty attribute name")]
    EmptyAttributeName,

    #[error("attribute `{attribute}` is declared with two different extractors")]
    ConflictingAttribute { attribute: String },

    #[error("{kind} index on `{attribute}` is declared more than once")]
    DuplicateDeclaration { attribute: String, kind: String },

    #[error("{kind} index on `{attribute}` uses a custom kind and cannot be inherited")]
    NotInheritable { attribute: String, kind: String },

    #[error("inherited descriptor of {parent} is invalid: {source}")]
    Parent {
        parent: RecordType,
        #[source]
        source: Box<DescriptorError>,
    },
}

/// One index to attach: an attribute and the factory for its kind.
pub struct IndexDeclaration<T: Record> {
    attribute: Attribute<T>,
    factory: Arc<dyn IndexFactory<T>>,
}

impl<T: Record> IndexDeclaration<T> {
    pub fn new(attribute: Attribute<T>, factory: Arc<dyn IndexFactory<T>>) -> Self {
        Self { attribute, factory }
    }

    pub fn attribute(&self) -> &Attribute<T> {
        &self.attribute
    }

    pub fn factory(&self) -> &dyn IndexFactory<T> {
        self.factory.as_ref()
    }

    pub fn kind(&self) -> &str {
        self.factory.kind()
    }

    /// `kind(attribute)`, as reported by collections.
    pub fn label(&self) -> String {
        format!("{}({})", self.kind(), self.attribute.name())
    }
}

impl<T: Record> Clone for IndexDeclaration<T> {
    fn clone(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: Record> fmt::Debug for IndexDeclaration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexDeclaration({})", self.label())
    }
}

/// Declarations inherited from an embedded type, already projected.
struct Parent<T: Record> {
    record_type: RecordType,
    declarations: Result<Vec<IndexDeclaration<T>>, DescriptorError>,
}

/// Caching metadata for one record type.
pub struct CollectionDescriptor<T: Record> {
    provider: Arc<dyn CollectionProvider<T>>,
    declarations: Vec<IndexDeclaration<T>>,
    parent: Option<Parent<T>>,
    inherit_indexes: bool,
}

impl<T: Record> CollectionDescriptor<T> {
    pub fn builder() -> DescriptorBuilder<T> {
        DescriptorBuilder {
            descriptor: CollectionDescriptor {
                provider: Arc::new(ConcurrentCollectionProvider::default()),
                declarations: Vec::new(),
                parent: None,
                inherit_indexes: false,
            },
        }
    }

    pub fn provider(&self) -> &dyn CollectionProvider<T> {
        self.provider.as_ref()
    }

    pub fn inherits_indexes(&self) -> bool {
        self.inherit_indexes
    }

    /// The type whose declarations this descriptor may inherit.
    pub fn parent(&self) -> Option<RecordType> {
        self.parent.as_ref().map(|p| p.record_type)
    }

    /// Index declarations declared directly on this type.
    pub fn declarations(&self) -> &[IndexDeclaration<T>] {
        &self.declarations
    }

    /// The effective index declarations, in attach order.
    ///
    /// Own declarations come first. Inherited ones follow when inheritance
    /// is enabled, except those on an attribute name the type declares
    /// itself. Own declarations that share an attribute name must share
    /// its extractor too.
    pub fn resolve(&self) -> Result<Vec<IndexDeclaration<T>>, DescriptorError> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        let mut attributes: HashMap<&str, &Attribute<T>> = HashMap::new();
        for decl in &self.declarations {
            let attribute = decl.attribute().name();
            if attribute.is_empty() {
                return Err(DescriptorError::EmptyAttributeName);
            }
            let first = *attributes.entry(attribute).or_insert(decl.attribute());
            if !first.shares_extractor(decl.attribute()) {
                return Err(DescriptorError::ConflictingAttribute {
                    attribute: attribute.to_string(),
                });
            }
            if !seen.insert((attribute, decl.kind())) {
                return Err(DescriptorError::DuplicateDeclaration {
                    attribute: attribute.to_string(),
                    kind: decl.kind().to_string(),
                });
            }
        }

        let mut resolved = self.declarations.clone();
        let Some(parent) = self.parent.as_ref().filter(|_| self.inherit_indexes) else {
            return Ok(resolved);
        };
        let inherited = parent
            .declarations
            .as_ref()
            .map_err(|e| DescriptorError::Parent {
                parent: parent.record_type,
                source: Box::new(e.clone()),
            })?;

        let own: HashSet<&str> = self
            .declarations
            .iter()
            .map(|d| d.attribute().name())
            .collect();
        resolved.extend(
            inherited
                .iter()
                .filter(|d| !own.contains(d.attribute().name()))
                .cloned(),
        );
        Ok(resolved)
    }
}

impl<T: Record> fmt::Debug for CollectionDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("provider", &self.provider.name())
            .field("declarations", &self.declarations)
            .field("parent", &self.parent())
            .field("inherit_indexes", &self.inherit_indexes)
            .finish()
    }
}

pub struct DescriptorBuilder<T: Record> {
    descriptor: CollectionDescriptor<T>,
}

impl<T: Record> DescriptorBuilder<T> {
    /// Use a non-default collection provider.
    pub fn provider(mut self, provider: impl CollectionProvider<T> + 'static) -> Self {
        self.descriptor.provider = Arc::new(provider);
        self
    }

    /// Declare an index on `attribute`.
    pub fn index(
        mut self,
        attribute: Attribute<T>,
        factory: impl IndexFactory<T> + 'static,
    ) -> Self {
        self.descriptor
            .declarations
            .push(IndexDeclaration::new(attribute, Arc::new(factory)));
        self
    }

    /// Record `P` as the type this one embeds, reachable through `projection`.
    ///
    /// `P`'s effective declarations are projected onto this type; they only
    /// take effect with [`inherit_indexes(true)`](Self::inherit_indexes).
    /// Inherited declarations must use a built-in index kind.
    pub fn extends<P: Cached>(mut self, projection: fn(&T) -> &P) -> Self {
        let declarations = P::descriptor().resolve().and_then(|decls| {
            decls
                .iter()
                .map(|d| {
                    builtin_factory::<T>(d.kind())
                        .map(|factory| {
                            IndexDeclaration::new(d.attribute().project(projection), factory)
                        })
                        .ok_or_else(|| DescriptorError::NotInheritable {
                            attribute: d.attribute().name().to_string(),
                            kind: d.kind().to_string(),
                        })
                })
                .collect()
        });
        self.descriptor.parent = Some(Parent {
            record_type: RecordType::of::<P>(),
            declarations,
        });
        self
    }

    pub fn inherit_indexes(mut self, inherit: bool) -> Self {
        self.descriptor.inherit_indexes = inherit;
        self
    }

    pub fn build(self) -> CollectionDescriptor<T> {
        self.descriptor
    }
}
