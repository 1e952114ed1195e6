//! Backend-specific pixel readback behind one capability.

use std::io::Cursor;

use base64::Engine as _;
use serde::Deserialize;

use crate::{
    error::{GateError, Result},
    page::{PageDriver, eval_as, scripts},
    types::BackendKind,
};

/// Tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Row 0 is the bottom of the image (GL convention).
    pub bottom_up: bool,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GateError::Readback(format!("empty {width}x{height} readback")));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(GateError::Readback(format!(
                "{width}x{height} buffer needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            bottom_up: false,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn rgba(&self, index: usize) -> [u8; 4] {
        let i = index * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Encode as PNG, top row first.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| GateError::Readback("pixel buffer size mismatch".into()))?;
        let img = if self.bottom_up {
            image::imageops::flip_vertical(&img)
        } else {
            img
        };
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| GateError::Readback(format!("png encode: {e}")))?;
        Ok(out.into_inner())
    }
}

#[derive(Debug, Deserialize)]
struct RawTexture {
    #[serde(rename = "ref")]
    reference: String,
    id: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    data: Option<String>,
    error: Option<String>,
}

/// Reads textures out of the live page for one backend.
///
/// All refs in one call are read in the same page task, i.e. on the same frame.
pub trait SurfaceReader {
    fn kind(&self) -> BackendKind;

    fn read_textures(&self, page: &dyn PageDriver, refs: &[String]) -> Result<Vec<PixelBuffer>> {
        let raws: Vec<RawTexture> = eval_as(page, &scripts::read_textures(self.kind(), refs))?;
        if raws.len() != refs.len() {
            return Err(GateError::Readback(format!(
                "asked for {} textures, page returned {}",
                refs.len(),
                raws.len()
            )));
        }
        raws.into_iter()
            .map(|raw| decode(raw, self.kind()))
            .collect()
    }

    /// `readSurface(id)`: the surface's current read texture.
    fn read_surface(&self, page: &dyn PageDriver, surface: &str) -> Result<PixelBuffer> {
        let mut bufs = self.read_textures(page, &[scripts::surface_ref(surface)])?;
        bufs.pop()
            .ok_or_else(|| GateError::Readback(format!("no pixels for surface {surface}")))
    }
}

/// Framebuffer-bound `readPixels`, float when the context can.
pub struct RasterReader;

/// Async whole-texture `readPixels` on the compute-capable backend.
pub struct ComputeReader;

impl SurfaceReader for RasterReader {
    fn kind(&self) -> BackendKind {
        BackendKind::Raster
    }
}

impl SurfaceReader for ComputeReader {
    fn kind(&self) -> BackendKind {
        BackendKind::Compute
    }
}

pub fn reader_for(kind: BackendKind) -> &'static dyn SurfaceReader {
    match kind {
        BackendKind::Raster => &RasterReader,
        BackendKind::Compute => &ComputeReader,
    }
}

fn decode(raw: RawTexture, kind: BackendKind) -> Result<PixelBuffer> {
    let label = raw.id.as_deref().unwrap_or(&raw.reference).to_string();
    if let Some(err) = raw.error {
        return Err(GateError::Readback(err));
    }
    let (Some(width), Some(height), Some(data)) = (raw.width, raw.height, raw.data) else {
        return Err(GateError::Readback(format!("incomplete texture record for {label}")));
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| GateError::Readback(format!("{label}: bad pixel payload: {e}")))?;
    let mut buf = PixelBuffer::new(width, height, bytes)
        .map_err(|e| GateError::Readback(format!("{label}: {e}")))?;
    buf.bottom_up = kind == BackendKind::Raster;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    struct Fixed(Value);

    impl PageDriver for Fixed {
        fn evaluate(&self, _script: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn decodes_surface_pixels() {
        let page = Fixed(json!([{
            "ref": "surface:o0", "id": "global_o0_read",
            "width": 1, "height": 2, "data": b64(&[1, 2, 3, 4, 5, 6, 7, 8]),
        }]));
        let buf = RasterReader.read_surface(&page, "o0").unwrap();
        assert_eq!((buf.width, buf.height), (1, 2));
        assert_eq!(buf.rgba(1), [5, 6, 7, 8]);
        assert!(buf.bottom_up);
    }

    #[test]
    fn page_error_is_a_readback_error() {
        let page = Fixed(json!([{ "ref": "node_1_out", "id": "node_1_out", "error": "texture node_1_out not tracked" }]));
        let err = ComputeReader
            .read_textures(&page, &["node_1_out".to_string()])
            .unwrap_err();
        assert!(matches!(err, GateError::Readback(m) if m.contains("not tracked")));
    }

    #[test]
    fn short_payload_is_rejected() {
        let page = Fixed(json!([{ "ref": "x", "id": "x", "width": 2, "height": 2, "data": b64(&[0; 4]) }]));
        assert!(ComputeReader.read_surface(&page, "o0").is_err());
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert!(matches!(
            PixelBuffer::new(0, 0, vec![]),
            Err(GateError::Readback(m)) if m.contains("empty 0x0")
        ));
        let page = Fixed(json!([{ "ref": "surface:o0", "id": "global_o0_read", "width": 4, "height": 0, "data": "" }]));
        assert!(matches!(
            RasterReader.read_surface(&page, "o0"),
            Err(GateError::Readback(m)) if m.contains("global_o0_read")
        ));
    }

    #[test]
    fn png_roundtrips_through_image() {
        let buf = PixelBuffer::new(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255]).unwrap();
        let png = buf.to_png().unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }
}
