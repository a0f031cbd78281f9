use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::PrintError;
use crate::options::PrintJobOptions;
use crate::printers::{Completion, PickRequest, PrintInteraction, PrintJob};
use crate::resolver::{ContentResolver, LoadedContent};
use crate::session::{CompletionDelegate, SessionInfo, SessionKind, SessionSlot, SessionState};
use crate::ui::UiContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintResponse {
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickResponse {
    pub printer_id: Option<String>,
}

/// Drives check, types, pick and print against one print UI.
pub struct PrintCoordinator {
    resolver: Arc<ContentResolver>,
    backend: Arc<dyn PrintInteraction>,
    ui: UiContext,
    sessions: Arc<SessionSlot>,
}

impl PrintCoordinator {
    pub fn new(
        resolver: ContentResolver,
        backend: Arc<dyn PrintInteraction>,
    ) -> std::io::Result<Self> {
        info!("Print coordinator using {}", backend.type_name());
        Ok(Self {
            resolver: Arc::new(resolver),
            backend,
            ui: UiContext::spawn()?,
            sessions: SessionSlot::new(),
        })
    }

    /// Advisory printability check. Never opens UI and never fails.
    pub async fn check(&self, descriptor: &str) -> bool {
        let resolver = Arc::clone(&self.resolver);
        let owned = descriptor.to_string();
        let result = tokio::task::spawn_blocking(move || {
            resolver
                .url_for(&owned)
                .map(|location| resolver.can_render(&location))
        })
        .await;

        match result {
            Ok(Ok(renderable)) => renderable,
            Ok(Err(e)) => {
                debug!("check: {} is not printable: {}", descriptor, e);
                false
            }
            Err(e) => {
                warn!("check: classification task failed: {}", e);
                false
            }
        }
    }

    pub fn types(&self) -> Vec<String> {
        self.resolver.types().supported_identifiers()
    }

    /// Whether the print subsystem can be used at all.
    pub async fn available(&self) -> bool {
        let backend = Arc::clone(&self.backend);
        self.ui
            .run(move || backend.is_available())
            .await
            .unwrap_or(false)
    }

    pub async fn pick(
        &self,
        options: PrintJobOptions,
        callback_id: &str,
    ) -> Result<PickResponse, PrintError> {
        let request = PickRequest {
            printer_id: options.printer_id.clone(),
            bounds: options.bounds,
        };
        let (delegate, ticket) = self.sessions.open(SessionKind::Pick, callback_id, options)?;

        self.present(delegate, move |backend, delegate| {
            backend.present_picker(request, delegate)
        })
        .await;

        match ticket.outcome().await? {
            Completion::Completed { printer_id } => {
                info!("Printer picker closed with selection {:?}", printer_id);
                Ok(PickResponse { printer_id })
            }
            Completion::Cancelled => {
                info!("Printer picker dismissed without a selection");
                Ok(PickResponse { printer_id: None })
            }
            Completion::Failed(message) => Err(PrintError::PrintSubsystem(message)),
        }
    }

    pub async fn print(
        &self,
        descriptor: &str,
        options: PrintJobOptions,
        callback_id: &str,
    ) -> Result<PrintResponse, PrintError> {
        let (delegate, ticket) =
            self.sessions
                .open(SessionKind::Print, callback_id, options.clone())?;
        let session_id = ticket.id();

        // File and network reads stay off the UI context.
        let resolver = Arc::clone(&self.resolver);
        let owned = descriptor.to_string();
        let loaded = tokio::task::spawn_blocking(move || resolver.resolve(&owned))
            .await
            .unwrap_or_else(|e| {
                Err(PrintError::UnreadableContent(format!(
                    "content loading task failed: {}",
                    e
                )))
            });

        match loaded {
            Ok(LoadedContent {
                location,
                bytes,
                content_type,
            }) => {
                info!(
                    "Resolved content for {} as {} ({} bytes)",
                    callback_id,
                    content_type.mime,
                    bytes.len()
                );
                let job = PrintJob::new(bytes, content_type, options);
                if self.sessions.mark_presenting(session_id, Some(location)) {
                    self.present(delegate, move |backend, delegate| {
                        backend.present_print(job, delegate)
                    })
                    .await;
                }
            }
            Err(e) => {
                warn!("Print request {} failed before presentation: {}", callback_id, e);
                self.sessions.close(session_id, Err(e));
            }
        }

        match ticket.outcome().await? {
            Completion::Completed { .. } => Ok(PrintResponse { completed: true }),
            Completion::Cancelled => Ok(PrintResponse { completed: false }),
            Completion::Failed(message) => Err(PrintError::PrintSubsystem(message)),
        }
    }

    async fn present<F>(&self, delegate: CompletionDelegate, present: F)
    where
        F: FnOnce(&dyn PrintInteraction, CompletionDelegate) -> Result<(), PrintError>
            + Send
            + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let session_id = delegate.session_id();
        let presented = self
            .ui
            .run(move || present(backend.as_ref(), delegate))
            .await
            .and_then(|result| result);

        if let Err(e) = presented {
            error!("Presenting print UI for session {} failed: {}", session_id, e);
            self.sessions.close(session_id, Err(e));
        }
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn active_session(&self) -> Option<SessionInfo> {
        self.sessions.snapshot()
    }

    /// Host teardown. Any open session answers as cancelled; the platform owns its UI.
    pub fn shutdown(&self) {
        if let Some(id) = self.sessions.release() {
            info!("Released print session {} on shutdown", id);
        }
        self.ui.shutdown();
    }
}
