//! Builds the anchors injected next to field values.

use crate::config::SharedSettings;
use crate::constants::link::{REL, TARGET};
use crate::constants::marker::LINK_CLASS;
use crate::dashboard_url::{DashboardUrl, FieldFilterRequest};
use crate::dom::{Document, Element};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{trace, warn};

/// Creates filter links for the current page.
///
/// The parsed page URL is cached until the document location changes, so a
/// viewer with many rows decodes the hash once.
pub struct LinkBuilder {
    document: Document,
    settings: SharedSettings,
    cache: RefCell<Option<(String, Rc<DashboardUrl>)>>,
}

impl LinkBuilder {
    pub fn new(document: Document, settings: SharedSettings) -> Self {
        Self {
            document,
            settings,
            cache: RefCell::new(None),
        }
    }

    /// Parsed current location, or `None` when it is not a valid URL
    pub fn current_url(&self) -> Option<Rc<DashboardUrl>> {
        let href = self.document.location();
        if let Some((cached_href, url)) = self.cache.borrow().as_ref()
            && *cached_href == href
        {
            return Some(Rc::clone(url));
        }

        match DashboardUrl::parse_lenient(&href) {
            Ok(url) => {
                let url = Rc::new(url);
                *self.cache.borrow_mut() = Some((href, Rc::clone(&url)));
                Some(url)
            }
            Err(e) => {
                warn!(location = %href, error = %e, "Page location is not a valid URL, no links built");
                None
            }
        }
    }

    /// Target URL for filtering on one field value, using the settings as
    /// they are right now
    pub fn build_href(&self, field_name: &str, field_value: &str) -> Option<String> {
        let url = self.current_url()?;
        let request = FieldFilterRequest::from_settings(field_name, field_value, &self.settings.get());
        Some(url.build_filter_url(&request))
    }

    /// Anchor opening the filtered view in a new tab, labelled with the value
    pub fn create_link(&self, field_name: &str, field_value: &str) -> Option<Element> {
        let href = self.build_href(field_name, field_value)?;
        let link = self.document.create_element("a");
        link.set_attribute("href", &href);
        link.set_attribute("target", TARGET);
        link.set_attribute("rel", REL);
        link.add_class(LINK_CLASS);
        link.set_text_content(field_value);
        trace!(field = %field_name, "Created filter link");
        Some(link)
    }
}
