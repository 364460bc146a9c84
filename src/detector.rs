//! Page lifecycle: identify the dashboard, then keep viewers linked.
//!
//! The detector starts `Unidentified`. Each throttled mutation notification
//! either checks for a supported dashboard's root marker or, once identified,
//! runs a scan pass. Viewer polls run as local tasks, so [`Detector::watch`]
//! and [`Detector::handle_mutations`] must be driven inside a `LocalSet`.

use crate::config::SharedSettings;
use crate::constants::timing::MUTATION_QUANTUM;
use crate::dom::{Document, Element, MutationRecord};
use crate::link::LinkBuilder;
use crate::registry::ViewerRegistry;
use crate::scanner::{self, ViewerScanner};
use crate::throttle::ThrottleDebounce;
use crate::variant::{self, DashboardVariant};
use std::rc::Rc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy)]
pub enum DetectorState {
    Unidentified,
    Identified(&'static dyn DashboardVariant),
}

impl DetectorState {
    pub fn variant(&self) -> Option<&'static dyn DashboardVariant> {
        match self {
            DetectorState::Unidentified => None,
            DetectorState::Identified(variant) => Some(*variant),
        }
    }
}

/// Links injected by one scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Newly registered viewers handed to a poll task
    pub new_viewers: usize,
    /// Links put directly into already registered viewers
    pub viewer_links: usize,
    /// Links put into rows outside any viewer (single-document page)
    pub page_links: usize,
    pub grid_links: usize,
}

pub struct Detector {
    document: Document,
    state: DetectorState,
    registry: ViewerRegistry,
    settings: SharedSettings,
    scanner: ViewerScanner,
    links: Rc<LinkBuilder>,
    polls: Vec<JoinHandle<()>>,
}

impl Detector {
    pub fn new(document: Document, settings: SharedSettings) -> Self {
        let links = Rc::new(LinkBuilder::new(document.clone(), settings.clone()));
        Self {
            document,
            state: DetectorState::Unidentified,
            registry: ViewerRegistry::new(),
            settings,
            scanner: ViewerScanner::default(),
            links,
            polls: Vec::new(),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn registry(&self) -> &ViewerRegistry {
        &self.registry
    }

    /// React to one (throttled) mutation notification
    pub fn handle_mutations(&mut self) -> Option<ScanSummary> {
        match self.state {
            DetectorState::Unidentified => {
                if let Some(found) = variant::identify(&self.document) {
                    info!(variant = found.name(), "Dashboard identified");
                    self.state = DetectorState::Identified(found);
                }
                None
            }
            DetectorState::Identified(found) => Some(self.scan(found)),
        }
    }

    fn link_factory(&self) -> impl Fn(&str, &str) -> Option<Element> + use<> {
        let links = Rc::clone(&self.links);
        move |name: &str, value: &str| links.create_link(name, value)
    }

    fn scan(&mut self, found: &'static dyn DashboardVariant) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let factory = self.link_factory();
        let selectors = found.viewer_selectors();

        for selector in &selectors {
            for container in self.document.query_selector_all(selector) {
                if self.registry.register(&container) {
                    debug!(container = %container.id(), selector = %selector, "Viewer detected");
                    self.spawn_poll(container);
                    summary.new_viewers += 1;
                } else {
                    let injected = self.scanner.inject_links_into(&container, &factory);
                    if injected > 0 {
                        scanner::mark_processed(&container);
                        summary.viewer_links += injected;
                    }
                }
            }
        }

        let root = self.document.document_element();
        let loose: Vec<_> = self
            .scanner
            .find_field_rows(&root)
            .into_iter()
            .filter(|row| selectors.iter().all(|s| row.element.closest(s).is_none()))
            .collect();
        summary.page_links = self.scanner.inject_rows(loose, &factory);

        if self.settings.get().inject_table_links {
            summary.grid_links = self.scanner.inject_grid_links(&root, &factory);
        }

        if summary != ScanSummary::default() {
            debug!(
                new_viewers = summary.new_viewers,
                viewer_links = summary.viewer_links,
                page_links = summary.page_links,
                grid_links = summary.grid_links,
                "Scan pass finished"
            );
        }
        summary
    }

    fn spawn_poll(&mut self, container: Element) {
        self.polls.retain(|handle| !handle.is_finished());
        let scanner = self.scanner;
        let factory = self.link_factory();
        self.polls.push(tokio::task::spawn_local(async move {
            if let Err(e) = scanner.poll_until_ready(&container, &factory).await {
                debug!(container = %container.id(), error = %e, "Giving up on viewer");
            }
        }));
    }

    /// Wait for every outstanding viewer poll to finish
    pub async fn settle(&mut self) {
        for handle in self.polls.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Viewer poll task failed");
            }
        }
    }

    /// Observe the document and react to changes until it stops delivering
    /// notifications.
    pub async fn watch(mut self) {
        let records = self.document.observe();
        let mut throttle = ThrottleDebounce::new(records, MUTATION_QUANTUM)
            .with_filter(MutationRecord::adds_elements);
        info!("Watching page for changes");

        while let Some(batch) = throttle.ready().await {
            trace!(records = batch, "Mutation notification");
            self.handle_mutations();
        }
        debug!("Mutation stream closed");
    }
}
