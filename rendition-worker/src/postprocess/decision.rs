//! Post-processing necessity decision.
//!
//! Pure functions over declared instructions and probed metadata. The checks run
//! in a fixed order and the first one that asks for a normalization pass wins.

use media_types::{MediaFormat, same_format, select_intermediate};
use tracing::debug;

use crate::domain::Rendition;
use crate::domain::value_objects::RenditionInstructions;
use crate::metadata::IntermediateMetadata;
use crate::{Error, Result};

/// Allowed difference between requested and estimated JPEG quality.
pub const QUALITY_TOLERANCE: u8 = 1;

/// Why a normalization pass is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessReason {
    AlwaysInstruction(&'static str),
    FormatMismatch,
    DimensionMismatch,
    QualityMismatch,
    Orientation,
}

/// Decide whether the generated file needs post-processing.
///
/// Fails with `SourceCorrupt` when the file type could not be determined, and
/// with `RenditionFormatUnsupported` when the file cannot be read by
/// post-processing or post-processing would have to produce a format it cannot
/// write.
pub fn needs_post_process(
    instructions: &RenditionInstructions,
    metadata: &IntermediateMetadata,
) -> Result<bool> {
    Ok(post_process_reason(instructions, metadata)?.is_some())
}

/// Like [`needs_post_process`], reporting which check triggered.
pub fn post_process_reason(
    instructions: &RenditionInstructions,
    metadata: &IntermediateMetadata,
) -> Result<Option<PostProcessReason>> {
    let Some(file_type) = metadata.file_type.as_deref() else {
        return Err(Error::SourceCorrupt(
            "file type of the generated rendition could not be determined".to_string(),
        ));
    };
    let probed = MediaFormat::from_token(file_type)
        .filter(|f| f.is_post_process_readable())
        .ok_or_else(|| {
            Error::RenditionFormatUnsupported(format!(
                "worker produced an intermediate post-processing cannot read: {}",
                file_type
            ))
        })?;

    let reason = first_reason(instructions, metadata, probed);

    if reason.is_some() {
        let output = match instructions.fmt.as_deref() {
            Some(fmt) => MediaFormat::from_token(fmt),
            None => Some(probed),
        };
        if !output.is_some_and(MediaFormat::is_post_process_writable) {
            return Err(Error::RenditionFormatUnsupported(format!(
                "post-processing cannot produce {}",
                instructions.fmt.as_deref().unwrap_or(file_type)
            )));
        }
    }

    Ok(reason)
}

fn first_reason(
    instructions: &RenditionInstructions,
    metadata: &IntermediateMetadata,
    probed: MediaFormat,
) -> Option<PostProcessReason> {
    if let Some(name) = always_instruction(instructions) {
        return Some(PostProcessReason::AlwaysInstruction(name));
    }

    if let Some(fmt) = instructions.fmt.as_deref()
        && !same_format(fmt, probed.extension())
    {
        return Some(PostProcessReason::FormatMismatch);
    }

    if instructions.width.is_some() || instructions.height.is_some() {
        // Unknown dimensions are trusted.
        let satisfied = metadata
            .resolution()
            .is_none_or(|r| r.satisfies(instructions.width, instructions.height));
        if !satisfied {
            return Some(PostProcessReason::DimensionMismatch);
        }
    }

    if let Some(quality) = instructions.quality
        && probed == MediaFormat::Jpeg
    {
        let matches = metadata
            .quality
            .is_some_and(|estimated| estimated.abs_diff(quality) <= QUALITY_TOLERANCE);
        if !matches {
            return Some(PostProcessReason::QualityMismatch);
        }
    }

    if metadata.orientation().needs_transform() {
        return Some(PostProcessReason::Orientation);
    }

    None
}

/// The first instruction that always requires post-processing, if any.
fn always_instruction(instructions: &RenditionInstructions) -> Option<&'static str> {
    [
        ("crop", instructions.crop.is_some()),
        ("jpegSize", instructions.jpeg_size.is_some()),
        ("interlace", instructions.interlace == Some(true)),
        ("dpi", instructions.dpi.is_some()),
        ("convertToDpi", instructions.convert_to_dpi.is_some()),
        ("watermark", instructions.watermark.is_some()),
        ("pdfbgcolor", instructions.pdfbgcolor.is_some()),
    ]
    .into_iter()
    .find_map(|(name, present)| present.then_some(name))
}

/// Redirect a rendition to an intermediate format when the worker cannot emit
/// the requested one.
///
/// Returns `true` when an intermediate was forced. Fails with
/// `RenditionFormatUnsupported` when neither the worker nor post-processing can
/// produce the requested format, or the worker emits no intermediate format.
pub fn adjust_for_worker_capability<S: AsRef<str>>(
    rendition: &mut Rendition,
    supported: &[S],
) -> Result<bool> {
    let Some(fmt) = rendition.fmt().map(str::to_string) else {
        return Ok(false);
    };
    if supported.iter().any(|s| same_format(s.as_ref(), &fmt)) {
        return Ok(false);
    }

    let writable = MediaFormat::from_token(&fmt).is_some_and(MediaFormat::is_post_process_writable);
    if !writable {
        return Err(Error::RenditionFormatUnsupported(format!(
            "neither the worker nor post-processing can produce {}",
            fmt
        )));
    }

    let Some(intermediate) = select_intermediate(supported) else {
        return Err(Error::RenditionFormatUnsupported(format!(
            "worker supports no intermediate format to produce {}",
            fmt
        )));
    };

    debug!(
        rendition = %rendition.name(),
        requested = %fmt,
        intermediate = %intermediate,
        "Worker cannot produce requested format, forcing intermediate"
    );
    rendition.force_intermediate(intermediate);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Crop;
    use crate::error::ErrorReason;

    fn probed(file_type: &str, width: u32, height: u32) -> IntermediateMetadata {
        IntermediateMetadata {
            file_type: Some(file_type.to_string()),
            image_width: Some(width),
            image_height: Some(height),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_png_needs_nothing() {
        let instructions = RenditionInstructions::for_format("png");
        assert!(!needs_post_process(&instructions, &probed("PNG", 100, 100)).unwrap());
    }

    #[test]
    fn test_width_mismatch_needs_post_process() {
        let instructions = RenditionInstructions {
            width: Some(50),
            ..RenditionInstructions::for_format("png")
        };
        assert!(needs_post_process(&instructions, &probed("PNG", 100, 100)).unwrap());
    }

    #[test]
    fn test_one_sided_dimension_check_trusts_other_axis() {
        let instructions = RenditionInstructions {
            width: Some(100),
            ..RenditionInstructions::for_format("png")
        };
        assert!(!needs_post_process(&instructions, &probed("PNG", 100, 37)).unwrap());
    }

    #[test]
    fn test_always_instructions() {
        let crop = RenditionInstructions {
            crop: Some(Crop { x: 0, y: 0, w: 1, h: 1 }),
            ..RenditionInstructions::for_format("png")
        };
        assert_eq!(
            post_process_reason(&crop, &probed("PNG", 10, 10)).unwrap(),
            Some(PostProcessReason::AlwaysInstruction("crop"))
        );

        let bg = RenditionInstructions {
            pdfbgcolor: Some("white".into()),
            ..RenditionInstructions::for_format("png")
        };
        assert!(needs_post_process(&bg, &probed("PNG", 10, 10)).unwrap());

        let no_interlace = RenditionInstructions {
            interlace: Some(false),
            ..RenditionInstructions::for_format("png")
        };
        assert!(!needs_post_process(&no_interlace, &probed("PNG", 10, 10)).unwrap());
    }

    #[test]
    fn test_format_aliases_match() {
        let instructions = RenditionInstructions::for_format("jpeg");
        assert!(!needs_post_process(&instructions, &probed("JPEG", 10, 10)).unwrap());

        let instructions = RenditionInstructions::for_format("tif");
        assert_eq!(
            post_process_reason(&instructions, &probed("PNG", 10, 10)).unwrap(),
            Some(PostProcessReason::FormatMismatch)
        );
    }

    #[test]
    fn test_jpeg_quality() {
        let instructions = RenditionInstructions {
            quality: Some(80),
            ..RenditionInstructions::for_format("jpg")
        };
        let mut metadata = probed("JPEG", 10, 10);
        metadata.quality = Some(81);
        assert!(!needs_post_process(&instructions, &metadata).unwrap());

        metadata.quality = Some(60);
        assert!(needs_post_process(&instructions, &metadata).unwrap());

        metadata.quality = None;
        assert!(needs_post_process(&instructions, &metadata).unwrap());

        let png = RenditionInstructions {
            quality: Some(10),
            ..RenditionInstructions::for_format("png")
        };
        assert!(!needs_post_process(&png, &probed("PNG", 10, 10)).unwrap());
    }

    #[test]
    fn test_orientation() {
        let mut metadata = probed("PNG", 10, 10);
        metadata.orientation = Some(1);
        assert!(!needs_post_process(&RenditionInstructions::for_format("png"), &metadata).unwrap());
        for value in 2..=8 {
            metadata.orientation = Some(value);
            assert!(needs_post_process(&RenditionInstructions::for_format("png"), &metadata).unwrap());
        }
    }

    #[test]
    fn test_undetermined_type_is_corrupt() {
        let err = needs_post_process(
            &RenditionInstructions::for_format("png"),
            &IntermediateMetadata::default(),
        )
        .unwrap_err();
        assert_eq!(err.reason(), ErrorReason::SourceCorrupt);
    }

    #[test]
    fn test_unreadable_or_unwritable_format() {
        let err = needs_post_process(&RenditionInstructions::for_format("pdf"), &probed("PDF", 1, 1)).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionFormatUnsupported);

        let err = needs_post_process(&RenditionInstructions::for_format("svg"), &probed("PNG", 1, 1)).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionFormatUnsupported);

        // An svg the worker already produced correctly needs nothing.
        assert!(!needs_post_process(&RenditionInstructions::for_format("svg"), &probed("SVG", 1, 1)).unwrap());
    }

    #[test]
    fn test_sized_svg_request() {
        let instructions = RenditionInstructions {
            width: Some(100),
            ..RenditionInstructions::for_format("svg")
        };
        assert!(!needs_post_process(&instructions, &probed("SVG", 100, 50)).unwrap());

        let r#unsized = IntermediateMetadata {
            file_type: Some("SVG".to_string()),
            ..Default::default()
        };
        assert!(!needs_post_process(&instructions, &r#unsized).unwrap());

        let err = needs_post_process(&instructions, &probed("SVG", 200, 100)).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionFormatUnsupported);
    }

    #[test]
    fn test_adjust_for_worker_capability() {
        let mut supported_directly = Rendition::new(RenditionInstructions::for_format("jpeg"), "/out", 0);
        assert!(!adjust_for_worker_capability(&mut supported_directly, &["png", "jpg"]).unwrap());
        assert!(!supported_directly.is_forced_post_process());

        let mut webp = Rendition::new(RenditionInstructions::for_format("webp"), "/out", 1);
        assert!(adjust_for_worker_capability(&mut webp, &["gif", "png", "jpg"]).unwrap());
        assert_eq!(webp.work_format().as_deref(), Some("png"));

        let mut no_intermediate = Rendition::new(RenditionInstructions::for_format("webp"), "/out", 2);
        let err = adjust_for_worker_capability(&mut no_intermediate, &["pdf"]).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionFormatUnsupported);

        let mut unwritable = Rendition::new(RenditionInstructions::for_format("pdf"), "/out", 3);
        let err = adjust_for_worker_capability(&mut unwritable, &["png"]).unwrap_err();
        assert_eq!(err.reason(), ErrorReason::RenditionFormatUnsupported);

        let mut any = Rendition::new(RenditionInstructions::default(), "/out", 4);
        assert!(!adjust_for_worker_capability(&mut any, &["png"]).unwrap());
    }
}
