//! Shared fixtures: an in-memory transport that records every request and a
//! host with counters for the dashboard hooks.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tally_agent::Host;
use tally_core::{
    ActionSelection, NotificationPayload, ScreenshotPayload, SessionDetails, SessionState,
    TallyConfig, TransmissionError, Transport, UpdateReply,
};

pub struct RecordingTransport {
    pub opened: AtomicUsize,
    pub updates: Mutex<Vec<SessionDetails>>,
    pub states: Mutex<Vec<SessionState>>,
    pub notifications: Mutex<Vec<(String, String, u8)>>,
    pub screenshots: Mutex<Vec<String>>,
    pub fail_updates: AtomicBool,
    reply: Mutex<UpdateReply>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            opened: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            states: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
            screenshots: Mutex::new(Vec::new()),
            fail_updates: AtomicBool::new(false),
            reply: Mutex::new(UpdateReply {
                state: SessionState::Running,
                screenshot: false,
                action: None,
            }),
        }
    }
}

impl RecordingTransport {
    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }

    pub fn reply_with_state(&self, state: SessionState) {
        self.reply.lock().state = state;
    }

    pub fn reply_with_action(&self, name: &str, option: &str) {
        self.reply.lock().action = Some(ActionSelection {
            name: name.to_string(),
            action: option.to_string(),
        });
    }

    pub fn reply_with_screenshot(&self, requested: bool) {
        self.reply.lock().screenshot = requested;
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn open_session(&self, _details: &SessionDetails) -> Result<u64, TransmissionError> {
        Ok(self.opened.fetch_add(1, Ordering::SeqCst) as u64 + 100)
    }

    async fn push_update(
        &self,
        details: &SessionDetails,
    ) -> Result<UpdateReply, TransmissionError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(TransmissionError::Api {
                code: 503,
                message: "unavailable".to_string(),
            });
        }
        self.updates.lock().push(details.clone());
        let mut reply = self.reply.lock();
        let current = reply.clone();
        // Selections are delivered once.
        reply.action = None;
        Ok(current)
    }

    async fn push_state(&self, details: &SessionDetails) -> Result<(), TransmissionError> {
        self.states.lock().push(details.state);
        Ok(())
    }

    async fn notify(&self, payload: &NotificationPayload<'_>) -> Result<(), TransmissionError> {
        self.notifications.lock().push((
            payload.title.to_string(),
            payload.message.to_string(),
            payload.severity.opcode(),
        ));
        Ok(())
    }

    async fn upload_screenshot(
        &self,
        payload: &ScreenshotPayload<'_>,
    ) -> Result<(), TransmissionError> {
        self.screenshots.lock().push(payload.screenshot.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Default)]
pub struct TestHost {
    pub remote_pauses: AtomicUsize,
    pub remote_stops: AtomicUsize,
    pub screen: Option<Vec<u8>>,
}

impl Host for TestHost {
    fn account_alias(&self) -> String {
        "test-alias".to_string()
    }

    fn status(&self) -> String {
        "Testing".to_string()
    }

    fn capture_screen(&self) -> Option<Vec<u8>> {
        self.screen.clone()
    }

    fn on_remote_pause(&self) {
        self.remote_pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn on_remote_stop(&self, _reason: &str) {
        self.remote_stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Config whose background loop never ticks on its own, so tests drive
/// ticks by hand.
pub fn manual_tick_config() -> TallyConfig {
    let mut config = TallyConfig::for_endpoint("http://127.0.0.1:9/unused");
    config.reporting.interval_ms = 3_600_000;
    config.stop.retry_interval_ms = 10;
    config
}

/// Blank PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    out.into_inner()
}

/// Poll `check` for up to two seconds.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for: {}", what);
}
