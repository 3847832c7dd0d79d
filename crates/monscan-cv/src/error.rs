//! Errors raised by the matching primitives

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("template '{template}' is empty")]
    EmptyTemplate { template: String },

    #[error(
        "template '{template}' ({template_width}x{template_height}) does not fit in the frame ({frame_width}x{frame_height})"
    )]
    TemplateTooLarge {
        template: String,
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("score map of {width}x{height} could not be built")]
    ScoreMap { width: u32, height: u32 },
}
