#![cfg(feature = "ocr-tesseract")]

use std::ffi::CString;

use anyhow::{anyhow, Context, Result};
use leptess::tesseract::TessApi;

use crate::detect::backend::TextRecognizer;
use crate::frame::Frame;

const PLATE_CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Tesseract page segmentation mode 7: a single text line.
const SINGLE_LINE_PSM: &str = "7";

/// Tesseract OCR over grayscale plate crops.
pub struct TesseractRecognizer {
    api: TessApi,
}

impl TesseractRecognizer {
    pub fn new(data_path: Option<&str>, language: &str) -> Result<Self> {
        let mut api = TessApi::new(data_path, language)
            .map_err(|e| anyhow!("failed to initialize tesseract ({}): {:?}", language, e))?;
        set_variable(&mut api, "tessedit_char_whitelist", PLATE_CHAR_WHITELIST)?;
        set_variable(&mut api, "tessedit_pageseg_mode", SINGLE_LINE_PSM)?;
        Ok(Self { api })
    }
}

fn set_variable(api: &mut TessApi, name: &str, value: &str) -> Result<()> {
    let name_c = CString::new(name)?;
    let value_c = CString::new(value)?;
    api.raw
        .set_variable(&name_c, &value_c)
        .map_err(|e| anyhow!("failed to set tesseract variable {}: {:?}", name, e))
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn read(&mut self, crop: &Frame) -> Result<String> {
        let grey = crop.to_luma();
        let cols = i32::try_from(crop.width()).context("plate crop too wide")?;
        let rows = i32::try_from(crop.height()).context("plate crop too tall")?;
        self.api
            .raw
            .set_image(&grey, cols, rows, 1, cols)
            .map_err(|e| anyhow!("tesseract rejected plate crop: {:?}", e))?;
        let text = self
            .api
            .get_utf8_text()
            .context("tesseract returned non-UTF-8 text")?;
        Ok(text.trim().to_string())
    }
}
