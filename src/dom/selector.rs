//! Element matchers covering the selector forms the dashboards need.

use super::Element;
use std::fmt;

/// How an attribute value is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    Equals(String),
    StartsWith(String),
    EndsWith(String),
}

/// A structured CSS-like selector. `All` is a compound selector: every part
/// must match the same element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    Tag(String),
    Class(String),
    Attr { name: String, matcher: AttrMatch },
    All(Vec<Selector>),
}

impl Selector {
    pub fn id(id: &str) -> Self {
        Selector::Id(id.to_string())
    }

    pub fn tag(tag: &str) -> Self {
        Selector::Tag(tag.to_ascii_lowercase())
    }

    pub fn class(class: &str) -> Self {
        Selector::Class(class.to_string())
    }

    pub fn attr_equals(name: &str, value: &str) -> Self {
        Self::attr(name, AttrMatch::Equals(value.to_string()))
    }

    pub fn attr_prefix(name: &str, prefix: &str) -> Self {
        Self::attr(name, AttrMatch::StartsWith(prefix.to_string()))
    }

    pub fn attr_suffix(name: &str, suffix: &str) -> Self {
        Self::attr(name, AttrMatch::EndsWith(suffix.to_string()))
    }

    fn attr(name: &str, matcher: AttrMatch) -> Self {
        Selector::Attr {
            name: name.to_string(),
            matcher,
        }
    }

    /// Compound of `self` and `other`
    pub fn and(self, other: Selector) -> Self {
        match self {
            Selector::All(mut parts) => {
                parts.push(other);
                Selector::All(parts)
            }
            first => Selector::All(vec![first, other]),
        }
    }

    /// Whether `element` matches. Text nodes never match.
    pub fn matches(&self, element: &Element) -> bool {
        if !element.is_element() {
            return false;
        }
        match self {
            Selector::Id(id) => element.get_attribute("id").as_deref() == Some(id.as_str()),
            Selector::Tag(tag) => element.tag_name() == Some(tag.as_str()),
            Selector::Class(class) => element.has_class(class),
            Selector::Attr { name, matcher } => {
                let Some(value) = element.get_attribute(name) else {
                    return false;
                };
                match matcher {
                    AttrMatch::Equals(expected) => &value == expected,
                    AttrMatch::StartsWith(prefix) => value.starts_with(prefix.as_str()),
                    AttrMatch::EndsWith(suffix) => value.ends_with(suffix.as_str()),
                }
            }
            Selector::All(parts) => parts.iter().all(|part| part.matches(element)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "#{id}"),
            Selector::Tag(tag) => write!(f, "{tag}"),
            Selector::Class(class) => write!(f, ".{class}"),
            Selector::Attr { name, matcher } => match matcher {
                AttrMatch::Equals(v) => write!(f, "[{name}=\"{v}\"]"),
                AttrMatch::StartsWith(v) => write!(f, "[{name}^=\"{v}\"]"),
                AttrMatch::EndsWith(v) => write!(f, "[{name}$=\"{v}\"]"),
            },
            Selector::All(parts) => parts.iter().try_for_each(|part| write!(f, "{part}")),
        }
    }
}
