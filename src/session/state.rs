use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Local;
use image::RgbImage;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::catalog::TemplateCatalog;
use crate::config::ENTRY_HISTORY_LIMIT;
use crate::errors::PoetryError;
use crate::imaging::{analyze_image, encode_data_uri, ImageProfile, ProfileSettings, SharedImage};
use crate::llm::{GenerationError, GenerationGateway, SamplingParams};
use crate::prompt::{build_messages, check_inputs, style_preview, ChatMessage};
use crate::session::render::{render_gallery, AnalysisPills};
use crate::utils::timing::log_llm_timing;

pub const DEFAULT_USER_RECORD: &str = "（未额外输入提示，使用默认风格创作）";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user_text: String,
    pub assistant_text: String,
}

/// Snapshot of one completed generation, shown in the recent gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationEntry {
    pub format_id: String,
    pub format_title: String,
    pub style_id: String,
    pub style_title: String,
    pub prompt_text: String,
    pub history: Vec<Turn>,
    pub image_data_uri: String,
    pub timestamp: String,
}

/// Newest-first list of creations, never longer than its capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentGallery {
    entries: VecDeque<CreationEntry>,
    capacity: usize,
}

impl RecentGallery {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RecentGallery {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: CreationEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &CreationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub max_recent_entries: usize,
    pub image_quality: u8,
    pub sampling: SamplingParams,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            max_recent_entries: 6,
            image_quality: 85,
            sampling: SamplingParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingGeneration,
    IdleWithHistory,
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub image: Option<SharedImage>,
    pub format_id: String,
    pub style_id: String,
    pub instruction: String,
}

/// Everything the gateway call needs, captured when a submit is accepted.
#[derive(Debug)]
pub struct PendingGeneration {
    epoch: u64,
    messages: Vec<ChatMessage>,
    image: SharedImage,
    params: SamplingParams,
    format_id: String,
    format_title: String,
    style_id: String,
    style_title: String,
    user_record: String,
    image_data_uri: String,
}

impl PendingGeneration {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub poem: String,
    pub history: Vec<Turn>,
    pub instruction: String,
    pub show_suggestions: bool,
    pub gallery_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    pub history: Vec<Turn>,
    pub instruction: String,
    pub poem: String,
    pub show_suggestions: bool,
    pub gallery_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAnalysis {
    pub profile: Option<ImageProfile>,
    pub recommended_style: String,
    pub style_preview: String,
    pub pills: AnalysisPills,
}

/// Conversation state for one connection.
#[derive(Debug)]
pub struct Session {
    history: Vec<Turn>,
    gallery: RecentGallery,
    sampling: SamplingParams,
    image_quality: u8,
    phase: SessionPhase,
    show_suggestions: bool,
    epoch: u64,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Session {
            history: Vec::new(),
            gallery: RecentGallery::new(settings.max_recent_entries),
            sampling: settings.sampling,
            image_quality: settings.image_quality,
            phase: SessionPhase::Idle,
            show_suggestions: false,
            epoch: 0,
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn gallery(&self) -> &RecentGallery {
        &self.gallery
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn sampling(&self) -> SamplingParams {
        self.sampling
    }

    pub fn set_sampling(&mut self, sampling: SamplingParams) {
        self.sampling = sampling;
    }

    pub fn show_suggestions(&self) -> bool {
        self.show_suggestions
    }

    pub fn is_busy(&self) -> bool {
        self.phase == SessionPhase::AwaitingGeneration
    }

    fn settled_phase(&self) -> SessionPhase {
        if self.history.is_empty() {
            SessionPhase::Idle
        } else {
            SessionPhase::IdleWithHistory
        }
    }

    /// Validates the request and moves to `AwaitingGeneration`; no state changes on error.
    pub fn begin_submit(
        &mut self,
        request: &SubmitRequest,
        catalog: &TemplateCatalog,
    ) -> Result<PendingGeneration, PoetryError> {
        if self.is_busy() {
            return Err(PoetryError::SessionBusy);
        }
        let image = request.image.clone().ok_or(PoetryError::MissingImage)?;
        check_inputs(catalog, &request.format_id, &request.style_id)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(PoetryError::InvalidImage("image has no pixels".to_string()));
        }

        let messages = build_messages(
            catalog,
            &image,
            &request.format_id,
            &request.style_id,
            &request.instruction,
            &self.history,
        )?;
        let image_data_uri = encode_data_uri(&image, self.image_quality)?;

        let trimmed = request.instruction.trim();
        let user_record = if trimmed.is_empty() {
            DEFAULT_USER_RECORD.to_string()
        } else {
            trimmed.to_string()
        };

        // check_inputs guarantees both lookups succeed
        let format_title = catalog
            .format(&request.format_id)
            .map(|spec| spec.title.clone())
            .unwrap_or_else(|| request.format_id.clone());
        let style_title = catalog
            .style(&request.style_id)
            .map(|spec| spec.title.clone())
            .unwrap_or_else(|| request.style_id.clone());

        self.phase = SessionPhase::AwaitingGeneration;
        Ok(PendingGeneration {
            epoch: self.epoch,
            messages,
            image,
            params: self.sampling,
            format_id: request.format_id.clone(),
            format_title,
            style_id: request.style_id.clone(),
            style_title,
            user_record,
            image_data_uri,
        })
    }

    /// Applies the gateway result. Failures leave history and gallery untouched.
    pub fn complete_submit(
        &mut self,
        pending: PendingGeneration,
        result: Result<String, GenerationError>,
    ) -> Result<SubmitOutcome, PoetryError> {
        if pending.epoch != self.epoch {
            info!("Discarding generation that finished after the session was cleared");
            return Err(PoetryError::Discarded);
        }

        let poem = match result {
            Ok(text) => text,
            Err(err) => {
                warn!("Generation failed: {}", err);
                self.phase = self.settled_phase();
                return Err(err.into());
            }
        };

        self.history.push(Turn {
            user_text: pending.user_record.clone(),
            assistant_text: poem.clone(),
        });
        let snapshot_start = self.history.len().saturating_sub(ENTRY_HISTORY_LIMIT);
        self.gallery.push(CreationEntry {
            format_id: pending.format_id,
            format_title: pending.format_title,
            style_id: pending.style_id,
            style_title: pending.style_title,
            prompt_text: pending.user_record,
            history: self.history[snapshot_start..].to_vec(),
            image_data_uri: pending.image_data_uri,
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        });
        self.show_suggestions = true;
        self.phase = SessionPhase::IdleWithHistory;

        Ok(SubmitOutcome {
            poem,
            history: self.history.clone(),
            instruction: String::new(),
            show_suggestions: true,
            gallery_html: render_gallery(&self.gallery),
        })
    }

    /// Empties the displayed history; the gallery survives.
    pub fn clear(&mut self) -> ClearOutcome {
        self.history = Vec::new();
        self.show_suggestions = false;
        self.phase = SessionPhase::Idle;
        self.epoch += 1;
        ClearOutcome {
            history: Vec::new(),
            instruction: String::new(),
            poem: String::new(),
            show_suggestions: false,
            gallery_html: render_gallery(&self.gallery),
        }
    }

    /// Profiles a newly selected image. History and gallery are not touched.
    pub fn image_changed(
        &self,
        image: Option<&RgbImage>,
        settings: &ProfileSettings,
        catalog: &TemplateCatalog,
        default_style: &str,
    ) -> Result<ImageAnalysis, PoetryError> {
        let Some(image) = image else {
            let style = catalog.clamp_style(default_style, default_style).to_string();
            let title = catalog
                .style(&style)
                .map(|spec| spec.title.clone())
                .unwrap_or_else(|| style.clone());
            return Ok(ImageAnalysis {
                profile: None,
                style_preview: style_preview(catalog, &style),
                pills: AnalysisPills::placeholder(&title),
                recommended_style: style,
            });
        };

        let profile = analyze_image(image, settings)?;
        let style = catalog
            .clamp_style(profile.style.id(), default_style)
            .to_string();
        Ok(ImageAnalysis {
            profile: Some(profile),
            style_preview: style_preview(catalog, &style),
            pills: AnalysisPills::from_profile(&profile),
            recommended_style: style,
        })
    }
}

async fn run_generation<G>(
    gateway: &G,
    pending: &PendingGeneration,
    turn: usize,
) -> Result<String, GenerationError>
where
    G: GenerationGateway + ?Sized,
{
    log_llm_timing(
        gateway.provider(),
        gateway.model(),
        "poem",
        Some(json!({
            "turn": turn + 1,
            "messages": pending.messages().len(),
            "max_new_tokens": pending.params().max_new_tokens,
            "prompt_chars": pending
                .messages()
                .iter()
                .map(|message| message.text_content().chars().count())
                .sum::<usize>(),
            "images": pending
                .messages()
                .iter()
                .map(ChatMessage::image_count)
                .sum::<usize>(),
        })),
        || gateway.generate(pending.messages(), pending.image(), pending.params()),
    )
    .await
}

/// Settles the phase again if a submit future is dropped before its generation finishes.
struct InFlight<'a> {
    session: &'a Mutex<Session>,
    epoch: u64,
    armed: bool,
}

impl InFlight<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock();
        if session.epoch == self.epoch && session.is_busy() {
            warn!("Submit abandoned before the generation finished");
            session.phase = session.settled_phase();
        }
    }
}

/// Shared handle that serialises submits; a second submit while one is in flight is rejected.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        SessionHandle {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn submit(
        &self,
        gateway: &dyn GenerationGateway,
        catalog: &TemplateCatalog,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, PoetryError> {
        let (pending, turn) = {
            let mut session = self.inner.lock();
            let pending = session.begin_submit(request, catalog)?;
            (pending, session.history.len())
        };
        let in_flight = InFlight {
            session: &self.inner,
            epoch: pending.epoch,
            armed: true,
        };
        let result = run_generation(gateway, &pending, turn).await;
        let outcome = self.inner.lock().complete_submit(pending, result);
        in_flight.disarm();
        outcome
    }

    pub fn clear(&self) -> ClearOutcome {
        self.inner.lock().clear()
    }

    pub fn set_sampling(&self, sampling: SamplingParams) {
        self.inner.lock().set_sampling(sampling);
    }

    pub fn image_changed(
        &self,
        image: Option<&RgbImage>,
        settings: &ProfileSettings,
        catalog: &TemplateCatalog,
        default_style: &str,
    ) -> Result<ImageAnalysis, PoetryError> {
        self.inner
            .lock()
            .image_changed(image, settings, catalog, default_style)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.inner.lock())
    }
}
