use tagnest_store::{Tag, TagId, TAG_OBJECT_TYPE};

/// Capability an application type implements to carry tags.
///
/// `KIND` scopes every association query, so two kinds never share edges even
/// when their ids collide. It must stay stable across releases; a
/// fully-qualified type name is the usual choice.
pub trait Taggable {
    const KIND: &'static str;

    fn object_id(&self) -> String;

    /// Namespace in which tag names given for this object are looked up.
    fn tag_namespace(&self) -> Option<&str> {
        None
    }
}

impl<T: Taggable + ?Sized> Taggable for &T {
    const KIND: &'static str = T::KIND;

    fn object_id(&self) -> String {
        (**self).object_id()
    }

    fn tag_namespace(&self) -> Option<&str> {
        (**self).tag_namespace()
    }
}

impl Taggable for Tag {
    const KIND: &'static str = TAG_OBJECT_TYPE;

    fn object_id(&self) -> String {
        self.id.to_string()
    }
}

/// A tag named either by record id or by name.
///
/// Names are looked up in the namespace of the operation that receives them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagRef {
    ById(TagId),
    ByName(String),
}

impl From<TagId> for TagRef {
    fn from(id: TagId) -> Self {
        Self::ById(id)
    }
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        Self::ById(tag.id)
    }
}

impl From<Tag> for TagRef {
    fn from(tag: Tag) -> Self {
        Self::ById(tag.id)
    }
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_string())
    }
}

impl From<String> for TagRef {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<&String> for TagRef {
    fn from(name: &String) -> Self {
        Self::ByName(name.clone())
    }
}
