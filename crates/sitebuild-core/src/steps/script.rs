//! Script transpiling and minification with oxc.
//!
//! Sources are parsed as classic scripts, not modules: the bundle is loaded
//! with a plain `<script>` tag, so top-level names stay global and are never
//! mangled.

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use serde::{Deserialize, Serialize};

use super::Asset;
use crate::error::{BuildError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspileOptions {
    /// Lowest language level the output must run on, e.g. `es2015`.
    pub target: String,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            target: "es2015".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Shorten local identifiers.
    pub mangle: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self { mangle: true }
    }
}

fn script_source_type() -> SourceType {
    SourceType::script()
}

pub(crate) fn transpile(mut asset: Asset, options: &TranspileOptions) -> Result<Asset> {
    const STEP: &str = "transpile";

    let code = {
        let source = asset.text(STEP)?;
        let fail = |message: String| BuildError::transform(STEP, &asset.path, message);

        let transform_options = TransformOptions::from_target(&options.target)
            .map_err(|e| fail(format!("unsupported target {}: {:?}", options.target, e)))?;

        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, script_source_type()).parse();
        if let Some(err) = ret.errors.first() {
            return Err(fail(err.to_string()));
        }
        let mut program = ret.program;

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let ret = Transformer::new(&allocator, &asset.path, &transform_options)
            .build_with_scoping(scoping, &mut program);
        if let Some(err) = ret.errors.first() {
            return Err(fail(err.to_string()));
        }

        Codegen::new().build(&program).code
    };

    asset.contents = code.into_bytes();
    Ok(asset)
}

pub(crate) fn minify(mut asset: Asset, options: &ScriptOptions) -> Result<Asset> {
    const STEP: &str = "minify_script";

    let code = {
        let source = asset.text(STEP)?;
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, script_source_type()).parse();
        if let Some(err) = ret.errors.first() {
            return Err(BuildError::transform(STEP, &asset.path, err.to_string()));
        }
        let mut program = ret.program;

        let minifier_options = MinifierOptions {
            mangle: options.mangle.then(|| MangleOptions {
                top_level: Some(false),
                ..MangleOptions::default()
            }),
            compress: Some(CompressOptions::smallest()),
        };
        let ret = Minifier::new(minifier_options).minify(&allocator, &mut program);

        Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program)
            .code
    };

    asset.contents = code.into_bytes();
    Ok(asset)
}
