//! Screenshot relay. Capture is the host's business; this shrinks oversized
//! captures to fit 1280x720, then encodes and uploads them.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::{ImageError, ImageFormat};
use std::io::Cursor;
use tally_core::{ScreenshotPayload, SessionState};
use tokio::task::JoinHandle;

use crate::session::SessionSync;

const MAX_WIDTH: u32 = 1280;
const MAX_HEIGHT: u32 = 720;

/// Capture and upload one screenshot. Returns `None` if one is already in
/// progress.
pub(crate) fn spawn_capture(session: SessionSync) -> Option<JoinHandle<()>> {
    if !session.claim_screenshot() {
        tracing::debug!("Screenshot already in progress");
        return None;
    }

    Some(tokio::spawn(async move {
        upload(&session).await;
        session.release_screenshot();
    }))
}

async fn upload(session: &SessionSync) {
    let host = session.host();
    let captured = tokio::task::spawn_blocking(move || {
        host.capture_screen().map(fit_to_bounds).transpose()
    })
    .await;

    let png = match captured {
        Ok(Ok(Some(png))) => png,
        Ok(Ok(None)) => {
            tracing::debug!("Host has no screen to capture");
            return;
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Screen capture is not a usable PNG");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Screen capture panicked");
            return;
        }
    };

    let state = session.state().unwrap_or(SessionState::Running);
    let details = session.details(state, session.last_snapshot());
    let payload = ScreenshotPayload {
        details: &details,
        screenshot: BASE64_STANDARD.encode(&png),
    };

    match session.transport().upload_screenshot(&payload).await {
        Ok(()) => tracing::debug!(bytes = png.len(), "Screenshot uploaded"),
        Err(e) => tracing::warn!(error = %e, "Screenshot upload failed"),
    }
}

/// Largest size inside `max_width` x `max_height` with the aspect ratio of
/// `width` x `height`. Sizes already inside the bounds come back unchanged.
pub(crate) fn scaled_dimension(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    let (ow, oh) = (u64::from(width), u64::from(height));
    let (mut nw, mut nh) = (ow, oh);

    if ow > u64::from(max_width) {
        nw = u64::from(max_width);
        nh = nw * oh / ow;
    }
    if nh > u64::from(max_height) {
        nh = u64::from(max_height);
        nw = nh * ow / oh;
    }

    // Both values are bounded by the u32 inputs.
    let clamp = |v: u64| u32::try_from(v).unwrap_or(u32::MAX).max(1);
    (clamp(nw), clamp(nh))
}

/// Re-encode `png` at `scaled_dimension` size if it exceeds the upload
/// bounds. PNGs already within bounds are passed through untouched.
pub(crate) fn fit_to_bounds(png: Vec<u8>) -> Result<Vec<u8>, ImageError> {
    let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
    let (width, height) = (image.width(), image.height());
    if width <= MAX_WIDTH && height <= MAX_HEIGHT {
        return Ok(png);
    }

    let (nw, nh) = scaled_dimension(width, height, MAX_WIDTH, MAX_HEIGHT);
    tracing::debug!(width, height, scaled_width = nw, scaled_height = nh, "Downscaling screenshot");

    let resized = image.resize_exact(nw, nh, FilterType::Triangle);
    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
