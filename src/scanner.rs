//! Field row discovery and link injection inside document viewers.
//!
//! Two row shapes are handled:
//! - flyout rows tagged `data-test-subj="tableDocViewRow-<field>-value"`, whose
//!   whole content is replaced by a link
//! - results-grid cells, where a `dl[data-test-subj="discoverCellDescriptionList"]`
//!   holds `dt` field names and `dd` values; the link goes inside the `dd`

use crate::constants::marker::{CONTAINER_ATTR, LINK_CLASS, ROW_CLASS};
use crate::constants::rows::{
    GRID_LABEL_TAG, GRID_LIST_TEST_SUBJ, GRID_VALUE_TAG, ROW_PREFIX, ROW_SUFFIX, TEST_SUBJ_ATTR,
};
use crate::constants::timing::{POLL_INTERVAL, POLL_MAX_WAIT};
use crate::dom::{Element, Selector};
use crate::error::{ScanError, SkipReason};
use std::time::Duration;
use tracing::{debug, info, trace};

/// A row with its extracted field name and displayed value
#[derive(Debug, Clone)]
pub struct FieldRow {
    /// Element whose content becomes the link
    pub element: Element,
    pub name: String,
    pub value: String,
}

/// Finds rows and replaces their content with links built by a factory.
///
/// The factory receives `(field_name, field_value)` and returns the anchor to
/// insert, or `None` when no link can be built.
#[derive(Debug, Clone, Copy)]
pub struct ViewerScanner {
    poll_interval: Duration,
    max_wait: Duration,
}

impl Default for ViewerScanner {
    fn default() -> Self {
        Self::new(POLL_INTERVAL, POLL_MAX_WAIT)
    }
}

impl ViewerScanner {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Selector for flyout rows
    pub fn row_selector() -> Selector {
        Selector::attr_prefix(TEST_SUBJ_ATTR, ROW_PREFIX)
            .and(Selector::attr_suffix(TEST_SUBJ_ATTR, ROW_SUFFIX))
    }

    /// Field name encoded in a flyout row's test subject
    pub fn field_name(row: &Element) -> Option<String> {
        let subject = row.get_attribute(TEST_SUBJ_ATTR)?;
        let name = subject.strip_prefix(ROW_PREFIX)?.strip_suffix(ROW_SUFFIX)?;
        (!name.is_empty()).then(|| name.to_string())
    }

    fn extract_row(row: &Element) -> Result<FieldRow, SkipReason> {
        if row.has_class(ROW_CLASS) || row.query_selector(&Selector::class(LINK_CLASS)).is_some() {
            return Err(SkipReason::AlreadyInjected);
        }
        let name = Self::field_name(row).ok_or(SkipReason::MissingFieldName)?;
        let value = row.text_content();
        if value.trim().is_empty() {
            return Err(SkipReason::EmptyValue);
        }
        Ok(FieldRow {
            element: row.clone(),
            name,
            value,
        })
    }

    /// Flyout rows below `container` that still need a link
    pub fn find_field_rows(&self, container: &Element) -> Vec<FieldRow> {
        container
            .query_selector_all(&Self::row_selector())
            .iter()
            .filter_map(|row| match Self::extract_row(row) {
                Ok(found) => Some(found),
                Err(reason) => {
                    trace!(row = %row.id(), reason = %reason, "Skipping row");
                    None
                }
            })
            .collect()
    }

    /// Replace each row's content with its link and mark the row.
    /// Returns the number of links inserted.
    pub fn inject_rows<F>(&self, rows: impl IntoIterator<Item = FieldRow>, link_factory: &F) -> usize
    where
        F: Fn(&str, &str) -> Option<Element>,
    {
        let mut injected = 0;
        for row in rows {
            match link_factory(&row.name, &row.value) {
                Some(link) => {
                    row.element.replace_children(vec![link]);
                    row.element.add_class(ROW_CLASS);
                    injected += 1;
                }
                None => {
                    trace!(field = %row.name, reason = %SkipReason::NoLink, "Skipping row");
                }
            }
        }
        injected
    }

    /// One scan pass over a container: find rows, inject links.
    /// Running it again changes nothing.
    pub fn inject_links_into<F>(&self, container: &Element, link_factory: &F) -> usize
    where
        F: Fn(&str, &str) -> Option<Element>,
    {
        self.inject_rows(self.find_field_rows(container), link_factory)
    }

    /// Results-grid value cells below `root` that still need a link
    pub fn find_grid_rows(&self, root: &Element) -> Vec<FieldRow> {
        let lists = root.query_selector_all(&Selector::tag("dl").and(Selector::attr_equals(
            TEST_SUBJ_ATTR,
            GRID_LIST_TEST_SUBJ,
        )));

        let mut rows = Vec::new();
        for list in lists {
            let mut label: Option<String> = None;
            for child in list.element_children() {
                match child.tag_name() {
                    Some(GRID_LABEL_TAG) => {
                        label = Some(child.text_content().trim().to_string());
                    }
                    Some(GRID_VALUE_TAG) => {
                        let Some(name) = label.take().filter(|n| !n.is_empty()) else {
                            trace!(cell = %child.id(), reason = %SkipReason::MissingFieldName, "Skipping cell");
                            continue;
                        };
                        if child.query_selector(&Selector::class(LINK_CLASS)).is_some() {
                            continue;
                        }
                        let value = child.text_content();
                        if value.trim().is_empty() {
                            trace!(field = %name, reason = %SkipReason::EmptyValue, "Skipping cell");
                            continue;
                        }
                        rows.push(FieldRow {
                            element: child.clone(),
                            name,
                            value,
                        });
                    }
                    _ => {}
                }
            }
        }
        rows
    }

    /// Put links inside grid value cells. Only the link is marked; the cell
    /// keeps its own attributes so the grid's styling is untouched.
    pub fn inject_grid_links<F>(&self, root: &Element, link_factory: &F) -> usize
    where
        F: Fn(&str, &str) -> Option<Element>,
    {
        let mut injected = 0;
        for row in self.find_grid_rows(root) {
            if let Some(link) = link_factory(&row.name, &row.value) {
                row.element.replace_children(vec![link]);
                injected += 1;
            }
        }
        if injected > 0 {
            debug!(injected, "Injected grid links");
        }
        injected
    }

    /// Wait for a freshly discovered viewer to render its rows, then inject.
    ///
    /// Checks immediately, then once per poll interval until rows appear or
    /// the wait budget runs out. The viewer counts as rendered once it holds
    /// any row, even if every row is skipped, and is then marked. A container
    /// that is already marked as processed ends the poll with `Ok(0)`.
    pub async fn poll_until_ready<F>(&self, container: &Element, link_factory: &F) -> Result<usize, ScanError>
    where
        F: Fn(&str, &str) -> Option<Element>,
    {
        let mut waited = Duration::ZERO;
        loop {
            if is_processed(container) {
                debug!(container = %container.id(), "Viewer already processed");
                return Ok(0);
            }

            if container.query_selector(&Self::row_selector()).is_some() {
                let injected = self.inject_links_into(container, link_factory);
                mark_processed(container);
                info!(container = %container.id(), injected, waited_ms = waited.as_millis() as u64, "Injected viewer links");
                return Ok(injected);
            }

            if waited >= self.max_wait {
                return Err(ScanError::ViewerPollTimeout { waited });
            }
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;
        }
    }
}

/// Mark a viewer container as processed
pub fn mark_processed(container: &Element) {
    container.set_attribute(CONTAINER_ATTR, "true");
}

pub fn is_processed(container: &Element) -> bool {
    container.has_attribute(CONTAINER_ATTR)
}
