use bytes::Bytes;
use parking_lot::Mutex;
#[cfg(feature = "printer-cups")]
use printers::{
    common::base::job::PrinterJobOptions, common::base::printer::Printer as PrintersCratePrinter,
    get_printers,
};
use serde::Serialize;
#[cfg(feature = "printer-cups")]
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::content_types::ContentType;
use crate::errors::PrintError;
use crate::options::{Bounds, PrintJobOptions};
#[cfg(feature = "printer-cups")]
use crate::options::{Duplex, Orientation, PaperSize};
use crate::session::CompletionDelegate;

/// Terminal signal a print UI reports for the flow it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Job handed to the printing subsystem, or printer chosen in the picker.
    Completed { printer_id: Option<String> },
    Cancelled,
    /// Failure message as reported by the print subsystem.
    Failed(String),
}

impl Completion {
    pub fn label(&self) -> &'static str {
        match self {
            Completion::Completed { .. } => "completed",
            Completion::Cancelled => "cancelled",
            Completion::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputType {
    General,
    Photo,
    Grayscale,
    PhotoGrayscale,
}

#[derive(Debug, Clone)]
pub struct PrintJob {
    pub name: String,
    pub content: Bytes,
    pub content_type: ContentType,
    pub output: OutputType,
    pub copies: u32,
    pub options: PrintJobOptions,
}

impl PrintJob {
    pub fn new(content: Bytes, content_type: ContentType, options: PrintJobOptions) -> Self {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| format!("Print-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")));

        let photo = options.photo.unwrap_or_else(|| content_type.is_image());
        let output = match (photo, options.grayscale.unwrap_or(false)) {
            (false, false) => OutputType::General,
            (true, false) => OutputType::Photo,
            (false, true) => OutputType::Grayscale,
            (true, true) => OutputType::PhotoGrayscale,
        };

        Self {
            name,
            content,
            content_type,
            output,
            copies: options.copies.unwrap_or(1),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickRequest {
    pub printer_id: Option<String>,
    pub bounds: Option<Bounds>,
}

/// The platform's interactive print UI.
///
/// Methods are only ever called on the print UI context. They present and
/// return; the outcome is reported later through the delegate, from any thread.
pub trait PrintInteraction: Send + Sync {
    fn is_available(&self) -> bool;
    fn present_print(&self, job: PrintJob, delegate: CompletionDelegate) -> Result<(), PrintError>;
    fn present_picker(
        &self,
        request: PickRequest,
        delegate: CompletionDelegate,
    ) -> Result<(), PrintError>;
    fn type_name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Complete,
    Cancel,
    Fail(String),
    /// Keep the delegate until a test fires it.
    Hold,
    /// Signal completion twice, as a misbehaving platform might.
    CompleteTwice,
}

// Mock print UI for testing or when no real printer is available
pub struct MockPrintInteraction {
    behavior: Mutex<MockBehavior>,
    printer_id: Option<String>,
    available: bool,
    held: Mutex<Vec<CompletionDelegate>>,
    jobs: Mutex<Vec<PrintJob>>,
}

impl MockPrintInteraction {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            printer_id: Some("mock-printer".to_string()),
            available: true,
            held: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            printer_id: None,
            ..Self::new(MockBehavior::Cancel)
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Oldest delegate kept by [`MockBehavior::Hold`].
    pub fn take_held(&self) -> Option<CompletionDelegate> {
        let mut held = self.held.lock();
        (!held.is_empty()).then(|| held.remove(0))
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    pub fn printed_jobs(&self) -> Vec<PrintJob> {
        self.jobs.lock().clone()
    }

    fn respond(&self, delegate: CompletionDelegate, success: Completion) {
        let behavior = self.behavior.lock().clone();
        match behavior {
            MockBehavior::Complete => {
                delegate.finish(success);
            }
            MockBehavior::Cancel => {
                delegate.finish(Completion::Cancelled);
            }
            MockBehavior::Fail(message) => {
                delegate.finish(Completion::Failed(message));
            }
            MockBehavior::Hold => self.held.lock().push(delegate),
            MockBehavior::CompleteTwice => {
                delegate.finish(success.clone());
                delegate.finish(success);
            }
        }
    }
}

impl PrintInteraction for MockPrintInteraction {
    fn is_available(&self) -> bool {
        self.available
    }

    fn present_print(&self, job: PrintJob, delegate: CompletionDelegate) -> Result<(), PrintError> {
        info!(
            "Mock print UI presenting '{}' ({}, {} bytes)",
            job.name,
            job.content_type.mime,
            job.content.len()
        );
        let printer_id = job
            .options
            .printer_id
            .clone()
            .or_else(|| self.printer_id.clone());
        self.jobs.lock().push(job);
        self.respond(delegate, Completion::Completed { printer_id });
        Ok(())
    }

    fn present_picker(
        &self,
        request: PickRequest,
        delegate: CompletionDelegate,
    ) -> Result<(), PrintError> {
        let printer_id = request.printer_id.or_else(|| self.printer_id.clone());
        self.respond(delegate, Completion::Completed { printer_id });
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "Mock Print UI"
    }
}

// Headless CUPS print UI: the picker resolves to a configured printer, print submits directly
#[cfg(feature = "printer-cups")]
pub struct CupsPrintInteraction {
    preferred: Vec<String>,
    spool_path: PathBuf,
}

#[cfg(feature = "printer-cups")]
impl CupsPrintInteraction {
    pub fn new(config: &Config) -> Result<Self, PrintError> {
        let preferred: Vec<String> = std::iter::once(config.printer.name.clone())
            .chain(config.printer.fallback_names.iter().cloned())
            .filter(|name| !name.is_empty())
            .collect();

        let interaction = Self {
            preferred,
            spool_path: config.resources.spool_path.clone(),
        };

        let printers = get_printers();
        info!("Available printers:");
        for printer in &printers {
            info!(
                "  - Name: '{}', System Name: '{}', URI: '{}'",
                printer.name, printer.system_name, printer.uri
            );
        }

        match interaction.find_printer(&printers, None) {
            Some(printer) => {
                info!("Default print target: '{}'", printer.name);
                Ok(interaction)
            }
            None => Err(PrintError::PrintSubsystem(format!(
                "none of the configured printers {:?} were found in CUPS",
                interaction.preferred
            ))),
        }
    }

    fn find_printer(
        &self,
        printers: &[PrintersCratePrinter],
        requested: Option<&str>,
    ) -> Option<PrintersCratePrinter> {
        let names: Vec<(&str, &str)> = printers
            .iter()
            .map(|p| (p.name.as_str(), p.system_name.as_str()))
            .collect();
        choose_printer(&names, &self.preferred, requested).and_then(|i| printers.get(i).cloned())
    }
}

/// Index of the printer to use, matched on `(name, system_name)`.
///
/// An explicitly requested printer must exist. Otherwise the preferred names
/// are tried exactly, then as substrings; with no preferences the first
/// printer is taken.
#[cfg(feature = "printer-cups")]
fn choose_printer(
    names: &[(&str, &str)],
    preferred: &[String],
    requested: Option<&str>,
) -> Option<usize> {
    let exact = |wanted: &str| {
        names
            .iter()
            .position(|(name, system_name)| *name == wanted || *system_name == wanted)
    };

    if let Some(requested) = requested {
        return exact(requested);
    }
    if preferred.is_empty() {
        return (!names.is_empty()).then_some(0);
    }

    preferred
        .iter()
        .find_map(|wanted| exact(wanted.as_str()))
        .or_else(|| {
            preferred.iter().find_map(|wanted| {
                names
                    .iter()
                    .position(|(name, _)| name.contains(wanted.as_str()))
            })
        })
}

#[cfg(feature = "printer-cups")]
impl PrintInteraction for CupsPrintInteraction {
    fn is_available(&self) -> bool {
        !get_printers().is_empty()
    }

    fn present_print(&self, job: PrintJob, delegate: CompletionDelegate) -> Result<(), PrintError> {
        let requested = job.options.printer_id.clone();
        let printer = self.find_printer(&get_printers(), requested.as_deref());
        let spool_path = self.spool_path.clone();

        std::thread::Builder::new()
            .name("cups-submit".to_string())
            .spawn(move || {
                let completion = match (printer, requested) {
                    (Some(printer), _) => submit_to_cups(&printer, &spool_path, &job),
                    (None, Some(requested)) => {
                        warn!("Requested printer '{}' not found in CUPS", requested);
                        Completion::Failed(format!("printer {} not found", requested))
                    }
                    (None, None) => Completion::Failed("no printers reachable".to_string()),
                };
                delegate.finish(completion);
            })
            .map(|_| ())
            .map_err(|e| PrintError::PrintSubsystem(format!("failed to start print submission: {}", e)))
    }

    fn present_picker(
        &self,
        request: PickRequest,
        delegate: CompletionDelegate,
    ) -> Result<(), PrintError> {
        // The picker treats a preselection as a hint and falls back when it is unknown
        let printers = get_printers();
        let chosen = self
            .find_printer(&printers, request.printer_id.as_deref())
            .or_else(|| {
                request.printer_id.as_ref().and_then(|requested| {
                    warn!("Preselected printer '{}' not found in CUPS", requested);
                    self.find_printer(&printers, None)
                })
            });
        let completion = match chosen {
            Some(printer) => Completion::Completed {
                printer_id: Some(printer.name),
            },
            None => Completion::Cancelled,
        };
        delegate.finish(completion);
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "CUPS"
    }
}

#[cfg(feature = "printer-cups")]
fn submit_to_cups(printer: &PrintersCratePrinter, spool_path: &Path, job: &PrintJob) -> Completion {
    info!(
        "Starting print job '{}': {} copies on {}",
        job.name, job.copies, printer.name
    );

    if let Err(e) = std::fs::create_dir_all(spool_path) {
        return Completion::Failed(format!("cannot create spool directory: {}", e));
    }

    let extension = job
        .content_type
        .extensions
        .first()
        .map(String::as_str)
        .unwrap_or("bin");
    let spool_file = spool_path.join(format!("job-{}.{}", uuid::Uuid::new_v4(), extension));
    if let Err(e) = std::fs::write(&spool_file, &job.content) {
        return Completion::Failed(format!("cannot write spool file: {}", e));
    }

    let Some(spool_str) = spool_file.to_str() else {
        let _ = std::fs::remove_file(&spool_file);
        return Completion::Failed("spool path is not valid UTF-8".to_string());
    };

    let properties = cups_properties(job);
    let raw_props: Vec<(&str, &str)> = properties
        .iter()
        .map(|(k, v)| (*k, v.as_str()))
        .collect();
    let options = PrinterJobOptions {
        name: Some(&job.name),
        raw_properties: &raw_props,
    };

    // Success only means CUPS accepted the job, not that paper came out
    let completion = match printer.print_file(spool_str, options) {
        Ok(job_id) => {
            info!("Print job submitted successfully with ID: {}", job_id);
            Completion::Completed {
                printer_id: Some(printer.name.clone()),
            }
        }
        Err(e) => {
            warn!("Print job failed: {}", e);
            Completion::Failed(format!("CUPS print error: {}", e))
        }
    };

    let _ = std::fs::remove_file(&spool_file);
    completion
}

/// IPP job attributes for a print job.
#[cfg(feature = "printer-cups")]
fn cups_properties(job: &PrintJob) -> Vec<(&'static str, String)> {
    let options = &job.options;
    let mut properties = vec![("copies", job.copies.to_string())];

    if let Some(duplex) = options.duplex {
        let sides = match duplex {
            Duplex::None => "one-sided",
            Duplex::LongEdge => "two-sided-long-edge",
            Duplex::ShortEdge => "two-sided-short-edge",
        };
        properties.push(("sides", sides.to_string()));
    }

    if let Some(orientation) = options.orientation {
        let value = match orientation {
            Orientation::Portrait => "3",
            Orientation::Landscape => "4",
        };
        properties.push(("orientation-requested", value.to_string()));
    }

    if let Some(paper) = options.paper_size {
        let media = match paper {
            PaperSize::A3 => "A3".to_string(),
            PaperSize::A4 => "A4".to_string(),
            PaperSize::A5 => "A5".to_string(),
            PaperSize::A6 => "A6".to_string(),
            PaperSize::Letter => "Letter".to_string(),
            PaperSize::Legal => "Legal".to_string(),
            PaperSize::Tabloid => "Tabloid".to_string(),
            PaperSize::Custom {
                width_pt,
                height_pt,
            } => format!("Custom.{:.0}x{:.0}", width_pt, height_pt),
        };
        properties.push(("media", media));
    }

    if matches!(job.output, OutputType::Grayscale | OutputType::PhotoGrayscale) {
        properties.push(("print-color-mode", "monochrome".to_string()));
    }
    if matches!(job.output, OutputType::Photo | OutputType::PhotoGrayscale) {
        properties.push(("print-quality", "5".to_string()));
    }
    if options.borderless() {
        properties.push(("print-scaling", "fill".to_string()));
    }

    properties
}

// Factory function to create the appropriate print UI
#[cfg(feature = "printer-cups")]
pub fn new_print_interaction(config: &Config) -> Arc<dyn PrintInteraction> {
    if config.printer.use_mock {
        info!("Using mock print UI (USE_MOCK_PRINTER)");
        return Arc::new(MockPrintInteraction::new(MockBehavior::Complete));
    }

    match CupsPrintInteraction::new(config) {
        Ok(interaction) => {
            info!("CUPS print UI initialized");
            Arc::new(interaction)
        }
        Err(e) => {
            warn!("Failed to connect to CUPS: {}", e);
            warn!("No physical printer found, using mock print UI");
            Arc::new(MockPrintInteraction::new(MockBehavior::Complete))
        }
    }
}

#[cfg(not(feature = "printer-cups"))]
pub fn new_print_interaction(_config: &Config) -> Arc<dyn PrintInteraction> {
    // Without CUPS support the mock print UI is the only option
    Arc::new(MockPrintInteraction::new(MockBehavior::Complete))
}
