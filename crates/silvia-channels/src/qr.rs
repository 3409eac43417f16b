//! QR rendering for WhatsApp pairing codes.
//!
//! The bridge hands over the raw pairing string; operators scan it either
//! from the terminal log or from the PNG served by the API.

use qrcode::{Color, EcLevel, QrCode};
use silvia_core::error::SilviaError;

const MODULE_PX: u32 = 10;
const QUIET_ZONE: u32 = 2;

fn encode(qr_data: &str) -> Result<QrCode, SilviaError> {
    QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| SilviaError::Channel(format!("QR generation failed: {e}")))
}

/// Render a pairing code for the terminal using Unicode half blocks.
///
/// Two module rows share one text line (`▀`, `▄`, `█`, space), so the code
/// is about half as tall as a one-row-per-line rendering.
pub fn render_terminal(qr_data: &str) -> Result<String, SilviaError> {
    let code = encode(qr_data)?;
    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2) * 3);
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render a pairing code as PNG bytes with a white quiet zone.
pub fn render_png(qr_data: &str) -> Result<Vec<u8>, SilviaError> {
    use image::{ImageBuffer, Luma};

    let code = encode(qr_data)?;
    let modules = code.width() as u32;
    let side = (modules + QUIET_ZONE * 2) * MODULE_PX;

    let img = ImageBuffer::from_fn(side, side, |x, y| {
        let (cx, cy) = (x / MODULE_PX, y / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&cx)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&cy);
        if inside
            && code[((cx - QUIET_ZONE) as usize, (cy - QUIET_ZONE) as usize)] == Color::Dark
        {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| SilviaError::Channel(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}
