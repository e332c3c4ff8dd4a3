//! The session controller.
//!
//! A [`Session`] owns the form drafts, the committed payload and the render
//! state for one user. Edits only touch the draft; an explicit
//! [`Session::generate`] passes the generation gate and commits it. Rendering
//! is asynchronous and driven by the caller:
//!
//! ```no_run
//! # use coldlink::session::Session;
//! # async fn demo(session: &mut Session) -> Result<(), coldlink::error::SessionError> {
//! let job = session.generate()?;
//! let outcome = job.run().await;
//! session.apply_render(outcome)?;
//! # Ok(())
//! # }
//! ```
//!
//! Every job carries a [`RenderToken`]; outcomes of superseded jobs are
//! dropped by [`Session::apply_render`], so only the latest request can update
//! the preview.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::capability::{Clipboard, FileSink, Geolocator};
use crate::clock::Clock;
use crate::content::{ContentType, FormState};
use crate::error::{RenderError, SessionError};
use crate::export::{ExportFormat, ExportedAsset, Exporter, RenderOptions, Resolution};
use crate::quota::QuotaTracker;
use crate::render::Color;
use crate::schedule::{Debouncer, RenderToken, RequestCounter};

/// Default settle time for color input.
pub const COLOR_DEBOUNCE_MS: i64 = 200;

/// What the preview currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Nothing committed.
    #[default]
    Idle,
    Pending,
    Ready(ExportedAsset),
    /// Carries a user-facing message.
    Failed(String),
}

/// A render request for the committed payload. Run it anywhere, then hand the
/// outcome back to [`Session::apply_render`].
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub token: RenderToken,
    pub payload: String,
    pub options: RenderOptions,
    exporter: Exporter,
}

impl RenderJob {
    pub async fn run(self) -> RenderOutcome {
        let result = self.exporter.render(self.payload, self.options).await;
        RenderOutcome {
            token: self.token,
            result,
        }
    }
}

#[derive(Debug)]
pub struct RenderOutcome {
    pub token: RenderToken,
    pub result: Result<ExportedAsset, RenderError>,
}

/// Effect of [`Session::apply_render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderApplied {
    /// A newer request superseded this one.
    Stale,
    Rendered,
    Failed(String),
    /// Rendered and completed a deferred download.
    Saved(PathBuf),
}

#[derive(Debug)]
pub enum DownloadStep {
    Saved(PathBuf),
    /// The asset has to be re-rendered in the requested format first; the
    /// save happens when this job's outcome is applied.
    AwaitingRender(RenderJob),
}

pub struct Session {
    forms: FormState,
    active: ContentType,
    committed: Option<String>,
    options: RenderOptions,
    defaults: RenderOptions,
    render: RenderState,
    pending_download: Option<ExportFormat>,
    foreground: Debouncer<Color>,
    background: Debouncer<Color>,
    requests: RequestCounter,
    quota: QuotaTracker,
    exporter: Exporter,
    sink: Box<dyn FileSink>,
    clock: Arc<dyn Clock>,
}

impl Session {
    pub fn new(
        quota: QuotaTracker,
        exporter: Exporter,
        sink: Box<dyn FileSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let debounce = Duration::milliseconds(COLOR_DEBOUNCE_MS);
        Self {
            forms: FormState::default(),
            active: ContentType::default(),
            committed: None,
            options: RenderOptions::default(),
            defaults: RenderOptions::default(),
            render: RenderState::Idle,
            pending_download: None,
            foreground: Debouncer::new(debounce),
            background: Debouncer::new(debounce),
            requests: RequestCounter::new(),
            quota,
            exporter,
            sink,
            clock,
        }
    }

    /// Starting render options, also restored by [`Session::reset_colors`].
    pub fn with_render_defaults(mut self, defaults: RenderOptions) -> Self {
        self.defaults = defaults;
        self.options = defaults;
        self
    }

    pub fn with_color_debounce(mut self, delay: Duration) -> Self {
        self.foreground = Debouncer::new(delay);
        self.background = Debouncer::new(delay);
        self
    }

    pub fn active(&self) -> ContentType {
        self.active
    }

    /// Switches the active content type. Anything committed or rendered for
    /// the previous type is discarded and in-flight renders become stale.
    /// Render options, including colors still settling, carry over.
    pub fn select(&mut self, content_type: ContentType) {
        if content_type == self.active {
            return;
        }
        debug!(from = %self.active, to = %content_type, "content type changed");
        self.active = content_type;
        self.committed = None;
        self.render = RenderState::Idle;
        self.pending_download = None;
        self.requests.invalidate();
    }

    pub fn forms(&self) -> &FormState {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut FormState {
        &mut self.forms
    }

    /// Sets a field of the active form by name.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), SessionError> {
        self.forms.set_field(self.active, field, value)?;
        Ok(())
    }

    pub fn draft(&self) -> String {
        self.forms.draft(self.active)
    }

    pub fn can_generate(&self) -> bool {
        !self.draft().is_empty()
    }

    pub fn committed(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn asset(&self) -> Option<&ExportedAsset> {
        match &self.render {
            RenderState::Ready(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Colors typed but not yet applied.
    pub fn pending_colors(&self) -> (Option<Color>, Option<Color>) {
        (
            self.foreground.peek().copied(),
            self.background.peek().copied(),
        )
    }

    pub fn generations_remaining(&self) -> u32 {
        self.quota.generations_remaining(self.clock.now())
    }

    /// Downloads left for the committed payload.
    pub fn downloads_remaining(&self) -> Option<u32> {
        self.committed
            .as_deref()
            .map(|payload| self.quota.downloads_remaining(payload))
    }

    /// Commits the current draft if the generation gate allows it.
    pub fn generate(&mut self) -> Result<RenderJob, SessionError> {
        let draft = self.draft();
        if draft.is_empty() {
            return Err(SessionError::EmptyPayload);
        }
        if let Err(error) = self.quota.try_generate(self.clock.now()) {
            warn!(%error, "generation rejected");
            return Err(error.into());
        }
        info!(content_type = %self.active, "generated QR payload");
        self.committed = Some(draft.clone());
        self.pending_download = None;
        Ok(self.issue_job(draft))
    }

    /// Applies a finished render unless a newer request superseded it.
    pub fn apply_render(&mut self, outcome: RenderOutcome) -> Result<RenderApplied, SessionError> {
        if !self.requests.is_current(outcome.token) {
            debug!(token = outcome.token.id(), "dropping stale render");
            return Ok(RenderApplied::Stale);
        }
        let asset = match outcome.result {
            Ok(asset) => asset,
            Err(error) => {
                warn!(%error, "render failed");
                let message = error.user_message();
                self.render = RenderState::Failed(message.clone());
                self.pending_download = None;
                return Ok(RenderApplied::Failed(message));
            }
        };
        debug!(format = %asset.format, resolution = %asset.resolution, "render ready");
        self.render = RenderState::Ready(asset);

        match self.pending_download.take() {
            Some(format) if self.asset().is_some_and(|asset| asset.format == format) => {
                Ok(RenderApplied::Saved(self.save_current()?))
            }
            _ => Ok(RenderApplied::Rendered),
        }
    }

    /// Changes the output size. Returns a job when something is committed.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Option<RenderJob> {
        self.options.resolution = resolution;
        self.rerender()
    }

    pub fn set_format(&mut self, format: ExportFormat) -> Option<RenderJob> {
        self.options.format = format;
        self.rerender()
    }

    /// Queues a foreground color; see [`Session::poll_colors`].
    pub fn set_foreground(&mut self, color: Color) {
        self.foreground.push(color, self.clock.now());
    }

    pub fn set_background(&mut self, color: Color) {
        self.background.push(color, self.clock.now());
    }

    /// Applies colors that have settled and re-renders if any changed.
    pub fn poll_colors(&mut self) -> Option<RenderJob> {
        let now = self.clock.now();
        let mut changed = false;
        if let Some(color) = self.foreground.poll(now) {
            changed |= self.options.foreground != color;
            self.options.foreground = color;
        }
        if let Some(color) = self.background.poll(now) {
            changed |= self.options.background != color;
            self.options.background = color;
        }
        if changed {
            self.rerender()
        } else {
            None
        }
    }

    /// Restores the default colors immediately.
    pub fn reset_colors(&mut self) -> Option<RenderJob> {
        self.foreground.clear();
        self.background.clear();
        self.options.foreground = self.defaults.foreground;
        self.options.background = self.defaults.background;
        self.rerender()
    }

    /// Saves the committed QR code in `format`, re-rendering first when the
    /// current asset has another format.
    pub fn download(&mut self, format: ExportFormat) -> Result<DownloadStep, SessionError> {
        let payload = self.committed.clone().ok_or(SessionError::NothingCommitted)?;
        if let Err(error) = self.quota.check_download(&payload) {
            warn!(%error, "download rejected");
            return Err(error.into());
        }

        if self.asset().is_some_and(|asset| asset.format == format) {
            return Ok(DownloadStep::Saved(self.save_current()?));
        }

        debug!(%format, "download waits for re-render");
        self.options.format = format;
        self.pending_download = Some(format);
        Ok(DownloadStep::AwaitingRender(self.issue_job(payload)))
    }

    /// Copies the rendered image as a data URL. A clipboard failure yields
    /// `Ok(false)` and does not count against the download quota.
    pub async fn copy(&mut self, clipboard: &dyn Clipboard) -> Result<bool, SessionError> {
        let payload = self.committed.clone().ok_or(SessionError::NothingCommitted)?;
        let data_url = self
            .asset()
            .map(|asset| asset.data_url.clone())
            .ok_or(SessionError::NotRendered)?;
        if let Err(error) = self.quota.check_download(&payload) {
            warn!(%error, "copy rejected");
            return Err(error.into());
        }

        match clipboard.write_text(&data_url).await {
            Ok(()) => {
                self.quota.record_download(&payload, self.clock.now());
                info!("copied QR code to clipboard");
                Ok(true)
            }
            Err(error) => {
                warn!(error = %error, "clipboard write failed");
                Ok(false)
            }
        }
    }

    /// Fills the location form from the device position. Returns whether the
    /// fields were updated.
    pub async fn use_current_location(&mut self, geolocator: &dyn Geolocator) -> bool {
        match geolocator.current_position().await {
            Ok(position) => {
                self.forms.location.latitude = format!("{:.6}", position.latitude);
                self.forms.location.longitude = format!("{:.6}", position.longitude);
                debug!("location filled from device position");
                true
            }
            Err(error) => {
                warn!(error = %error, "geolocation unavailable");
                false
            }
        }
    }

    /// Renders the committed payload with the current options and applies
    /// the outcome. `None` when nothing is committed.
    pub async fn refresh(&mut self) -> Result<Option<RenderApplied>, SessionError> {
        let Some(job) = self.rerender() else {
            return Ok(None);
        };
        let outcome = job.run().await;
        self.apply_render(outcome).map(Some)
    }

    fn rerender(&mut self) -> Option<RenderJob> {
        let payload = self.committed.clone()?;
        Some(self.issue_job(payload))
    }

    fn issue_job(&mut self, payload: String) -> RenderJob {
        self.render = RenderState::Pending;
        RenderJob {
            token: self.requests.issue(),
            payload,
            options: self.options,
            exporter: self.exporter.clone(),
        }
    }

    fn save_current(&mut self) -> Result<PathBuf, SessionError> {
        let (Some(payload), RenderState::Ready(asset)) = (self.committed.as_deref(), &self.render)
        else {
            return Err(SessionError::NotRendered);
        };
        let path = self.sink.save(asset).map_err(SessionError::Save)?;
        self.quota.record_download(payload, self.clock.now());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::capability::Position;
    use crate::clock::ManualClock;
    use crate::error::QuotaError;
    use crate::quota::{DownloadGate, GenerationGate};
    use crate::store::MemoryStore;

    #[derive(Clone, Default)]
    struct RecordingSink {
        saved: Arc<Mutex<Vec<(String, ExportFormat)>>>,
    }

    impl FileSink for RecordingSink {
        fn save(&self, asset: &ExportedAsset) -> anyhow::Result<PathBuf> {
            self.saved
                .lock()
                .unwrap()
                .push((asset.file_name.clone(), asset.format));
            Ok(PathBuf::from(&asset.file_name))
        }
    }

    struct FixedClipboard {
        fail: bool,
        written: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Clipboard for FixedClipboard {
        async fn write_text(&self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("permission denied");
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct FixedLocation(Option<Position>);

    #[async_trait::async_trait]
    impl Geolocator for FixedLocation {
        async fn current_position(&self) -> anyhow::Result<Position> {
            self.0.ok_or_else(|| anyhow::anyhow!("denied"))
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn session() -> (Session, ManualClock, RecordingSink) {
        let clock = ManualClock::new(start());
        let sink = RecordingSink::default();
        let quota = QuotaTracker::new(
            Box::new(MemoryStore::new()),
            GenerationGate::new(Duration::hours(1), 10),
            DownloadGate::new(4, 256),
        );
        let session = Session::new(
            quota,
            Exporter::default(),
            Box::new(sink.clone()),
            Arc::new(clock.clone()),
        )
        .with_render_defaults(RenderOptions {
            resolution: Resolution::try_from(256).unwrap(),
            ..RenderOptions::default()
        });
        (session, clock, sink)
    }

    async fn generated(session: &mut Session, url: &str) {
        session.set_field("url", url).unwrap();
        let job = session.generate().unwrap();
        let applied = session.apply_render(job.run().await).unwrap();
        assert_eq!(applied, RenderApplied::Rendered);
    }

    #[test]
    fn empty_draft_cannot_generate() {
        let (mut session, _, _) = session();
        assert!(!session.can_generate());
        assert!(matches!(session.generate(), Err(SessionError::EmptyPayload)));
        assert_eq!(session.generations_remaining(), 10);

        session.set_field("url", "  example.com ").unwrap();
        assert!(session.can_generate());
        assert_eq!(session.draft(), "example.com");
        assert!(session.committed().is_none());
    }

    #[test]
    fn unknown_field_is_reported() {
        let (mut session, _, _) = session();
        assert!(matches!(
            session.set_field("ssid", "x"),
            Err(SessionError::Field(_))
        ));
    }

    #[tokio::test]
    async fn switching_type_clears_committed_state() {
        let (mut session, _, _) = session();
        generated(&mut session, "https://example.com").await;
        assert!(session.asset().is_some());

        session.select(ContentType::Url);
        assert_eq!(session.committed(), Some("https://example.com"));

        let job = session.set_resolution(Resolution::try_from(512).unwrap()).unwrap();
        session.select(ContentType::Wifi);
        assert_eq!(session.committed(), None);
        assert_eq!(session.render_state(), &RenderState::Idle);
        assert_eq!(session.apply_render(job.run().await).unwrap(), RenderApplied::Stale);
        assert_eq!(session.render_state(), &RenderState::Idle);

        // Drafts of other types survive the switch
        assert_eq!(session.forms().url.url, "https://example.com");
    }

    #[tokio::test]
    async fn only_latest_render_is_applied() {
        let (mut session, _, _) = session();
        session.set_field("url", "https://example.com").unwrap();
        let first = session.generate().unwrap();
        let second = session
            .set_resolution(Resolution::try_from(1024).unwrap())
            .unwrap();

        let late = second.run().await;
        let early = first.run().await;
        assert_eq!(session.apply_render(late).unwrap(), RenderApplied::Rendered);
        assert_eq!(session.apply_render(early).unwrap(), RenderApplied::Stale);
        assert_eq!(session.asset().unwrap().resolution.pixels(), 1024);
    }

    #[tokio::test]
    async fn eleventh_generation_in_an_hour_is_rejected() {
        let (mut session, clock, _) = session();
        session.set_field("url", "https://example.com").unwrap();
        for _ in 0..10 {
            session.generate().unwrap();
            clock.advance(Duration::minutes(1));
        }
        match session.generate() {
            Err(SessionError::Quota(QuotaError::GenerationLimit {
                retry_after_minutes,
                ..
            })) => assert_eq!(retry_after_minutes, 50),
            other => panic!("expected generation limit, got {other:?}"),
        }

        clock.advance(Duration::minutes(50));
        assert!(session.generate().is_ok());
    }

    #[tokio::test]
    async fn fifth_download_of_a_payload_is_rejected() {
        let (mut session, _, sink) = session();
        generated(&mut session, "https://example.com").await;

        for _ in 0..4 {
            assert!(matches!(
                session.download(ExportFormat::Png).unwrap(),
                DownloadStep::Saved(_)
            ));
        }
        assert_eq!(session.downloads_remaining(), Some(0));
        assert!(matches!(
            session.download(ExportFormat::Png),
            Err(SessionError::Quota(QuotaError::DownloadLimit { limit: 4 }))
        ));
        assert_eq!(sink.saved.lock().unwrap().len(), 4);

        // A different payload has its own budget
        generated(&mut session, "https://example.org").await;
        assert_eq!(session.downloads_remaining(), Some(4));
    }

    #[tokio::test]
    async fn download_in_another_format_waits_for_render() {
        let (mut session, _, sink) = session();
        generated(&mut session, "https://example.com").await;

        let DownloadStep::AwaitingRender(job) = session.download(ExportFormat::Svg).unwrap() else {
            panic!("svg download should need a render");
        };
        assert_eq!(job.options.format, ExportFormat::Svg);
        assert!(sink.saved.lock().unwrap().is_empty());
        assert_eq!(session.downloads_remaining(), Some(4));

        let applied = session.apply_render(job.run().await).unwrap();
        assert_eq!(
            applied,
            RenderApplied::Saved(PathBuf::from("qrcode-https-example-com.svg"))
        );
        assert_eq!(
            *sink.saved.lock().unwrap(),
            vec![("qrcode-https-example-com.svg".to_string(), ExportFormat::Svg)]
        );
        assert_eq!(session.downloads_remaining(), Some(3));
    }

    #[tokio::test]
    async fn download_requires_a_commit() {
        let (mut session, _, _) = session();
        assert!(matches!(
            session.download(ExportFormat::Png),
            Err(SessionError::NothingCommitted)
        ));
    }

    #[tokio::test]
    async fn failed_render_drops_previous_asset() {
        let (mut session, _, _) = session();
        generated(&mut session, "https://example.com").await;

        session.select(ContentType::Text);
        session.set_field("text", &"x".repeat(3000)).unwrap();
        let job = session.generate().unwrap();
        let applied = session.apply_render(job.run().await).unwrap();
        assert!(matches!(applied, RenderApplied::Failed(_)));
        assert!(session.asset().is_none());
        assert!(matches!(session.render_state(), RenderState::Failed(_)));
    }

    #[tokio::test]
    async fn colors_apply_after_debounce() {
        let (mut session, clock, _) = session();
        generated(&mut session, "https://example.com").await;

        let red: Color = "#FF0000".parse().unwrap();
        session.set_foreground("#00FF00".parse().unwrap());
        clock.advance(Duration::milliseconds(100));
        session.set_foreground(red);
        assert!(session.poll_colors().is_none());
        assert_eq!(session.pending_colors().0, Some(red));

        clock.advance(Duration::milliseconds(200));
        let job = session.poll_colors().unwrap();
        assert_eq!(job.options.foreground, red);
        assert_eq!(session.apply_render(job.run().await).unwrap(), RenderApplied::Rendered);

        let job = session.reset_colors().unwrap();
        assert_eq!(job.options.foreground, Color::BLACK);
        assert_eq!(job.options.background, Color::WHITE);
    }

    #[test]
    fn pending_colors_survive_a_type_switch() {
        let (mut session, clock, _) = session();
        let navy: Color = "#000080".parse().unwrap();
        session.set_background(navy);
        clock.advance(Duration::milliseconds(50));

        session.select(ContentType::Wifi);
        assert_eq!(session.pending_colors().1, Some(navy));

        clock.advance(Duration::milliseconds(200));
        assert!(session.poll_colors().is_none(), "nothing committed yet");
        assert_eq!(session.options().background, navy);

        session.set_field("ssid", "Cafe").unwrap();
        session.set_field("security", "nopass").unwrap();
        let job = session.generate().unwrap();
        assert_eq!(job.options.background, navy);
    }

    #[tokio::test]
    async fn clipboard_failure_is_silent_and_free() {
        let (mut session, _, _) = session();
        generated(&mut session, "https://example.com").await;

        let broken = FixedClipboard {
            fail: true,
            written: Mutex::new(Vec::new()),
        };
        assert!(!session.copy(&broken).await.unwrap());
        assert_eq!(session.downloads_remaining(), Some(4));

        let working = FixedClipboard {
            fail: false,
            written: Mutex::new(Vec::new()),
        };
        assert!(session.copy(&working).await.unwrap());
        assert_eq!(session.downloads_remaining(), Some(3));
        assert!(working.written.lock().unwrap()[0].starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn location_is_filled_with_six_decimals() {
        let (mut session, _, _) = session();
        session.select(ContentType::Location);
        session.set_field("latitude", "1").unwrap();

        assert!(!session.use_current_location(&FixedLocation(None)).await);
        assert_eq!(session.forms().location.latitude, "1");

        let fix = FixedLocation(Some(Position {
            latitude: 37.5,
            longitude: -122.25,
        }));
        assert!(session.use_current_location(&fix).await);
        assert_eq!(session.draft(), "geo:37.500000,-122.250000");
    }

    #[tokio::test]
    async fn refresh_renders_committed_payload() {
        let (mut session, _, _) = session();
        assert_eq!(session.refresh().await.unwrap(), None);

        session.set_field("url", "https://example.com").unwrap();
        session.generate().unwrap();
        assert_eq!(session.refresh().await.unwrap(), Some(RenderApplied::Rendered));
        assert_eq!(session.asset().unwrap().format, ExportFormat::Png);
    }
}
