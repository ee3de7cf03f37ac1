//! CSS minification with lightningcss.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use super::Asset;
use crate::error::{BuildError, Result};

const STEP: &str = "minify_css";

pub(crate) fn minify(mut asset: Asset) -> Result<Asset> {
    let code = {
        let source = asset.text(STEP)?;
        let options = ParserOptions {
            filename: asset.path.display().to_string(),
            ..ParserOptions::default()
        };
        let mut stylesheet = StyleSheet::parse(source, options)
            .map_err(|e| BuildError::transform(STEP, &asset.path, e))?;
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| BuildError::transform(STEP, &asset.path, e))?;
        stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| BuildError::transform(STEP, &asset.path, e))?
            .code
    };
    asset.contents = code.into_bytes();
    Ok(asset)
}
