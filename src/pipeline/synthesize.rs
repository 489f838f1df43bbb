//! Structured analysis → natural-language image-generation prompt.
//!
//! The instruction is assembled from five sections in a fixed order:
//!
//! 1. Composition: aspect ratio and framing
//! 2. Subject: brand placement, scene and key objects
//! 3. Colour and lighting
//! 4. Style boosters
//! 5. Technical footer: resolution and render quality
//!
//! Nothing here is random, so identical records always produce identical
//! prompts.

use crate::config::{AspectProfile, BrandPlacement};
use crate::output::{AnalysisRecord, PosterPrompt};
use crate::pipeline::palette::describe_color;

/// Used when the record lists no key objects.
pub const FALLBACK_OBJECTS: &str = "modern design elements";

const BASE_EXCLUSIONS: &[&str] = &[
    "blurry",
    "low quality",
    "low resolution",
    "watermark",
    "signature",
    "jpeg artifacts",
    "cluttered composition",
    "distorted proportions",
    "unwanted text",
];

/// Lettering is allowed, but only the brand name and only legibly.
const HERO_EXCLUSIONS: &[&str] = &[
    "garbled text",
    "misspelled letters",
    "extra words",
    "non-Latin characters",
];

/// No lettering of any kind; the brand is placed on the poster later.
const TEXT_FREE_EXCLUSIONS: &[&str] = &[
    "text",
    "letters",
    "words",
    "typography",
    "logos",
    "captions",
];

const STYLE_BOOSTERS: &str = "Style: premium commercial advertising poster, octane render, \
cinematic composition, soft volumetric lighting, depth of field, award-winning art direction.";

/// Expand an analysis record into the instruction and exclusions for the
/// image model. Missing fields are replaced by their documented defaults;
/// this function never fails.
pub fn synthesize(
    record: &AnalysisRecord,
    aspect: AspectProfile,
    placement: BrandPlacement,
) -> PosterPrompt {
    let params = aspect.generation_params();

    let sections = [
        composition_section(aspect),
        subject_section(record, placement),
        color_section(record),
        STYLE_BOOSTERS.to_string(),
        format!(
            "Technical: {}x{} resolution, 8K detail, sharp focus, clean edges, professional color grading.",
            params.width, params.height
        ),
    ];

    PosterPrompt {
        instruction: sections.join("\n"),
        exclusions: exclusions(placement),
        generation_params: params,
    }
}

fn composition_section(aspect: AspectProfile) -> String {
    let framing = match aspect {
        AspectProfile::Square => "square poster, centred symmetrical composition",
        AspectProfile::Vertical => "tall vertical poster, layered foreground to background",
    };
    format!(
        "Composition: {} aspect ratio, {framing}.",
        aspect.ratio_label()
    )
}

fn subject_section(record: &AnalysisRecord, placement: BrandPlacement) -> String {
    let objects = objects_phrase(record);
    let scene = record.scene_description();
    match placement {
        BrandPlacement::HeroTypography => format!(
            "Subject: the word \"{}\" as large bold 3D hero typography in the centre, \
             surrounded by {scene}, featuring {objects}. Mood: {}.",
            record.brand_name(),
            record.mood()
        ),
        BrandPlacement::TextFree => format!(
            "Subject: {scene}, featuring {objects}. Leave calm negative space in the \
             upper third. Mood: {}.",
            record.mood()
        ),
    }
}

fn objects_phrase(record: &AnalysisRecord) -> String {
    if record.key_objects.is_empty() {
        FALLBACK_OBJECTS.to_string()
    } else {
        record.key_objects.join(", ")
    }
}

fn color_section(record: &AnalysisRecord) -> String {
    let primary = describe_color(record.primary_color());
    let secondary = &record.color_palette.secondary;
    if secondary.len() >= 2 {
        let all: Vec<String> = std::iter::once(primary)
            .chain(secondary.iter().map(|c| describe_color(c)))
            .collect();
        format!(
            "Colors and lighting: a palette of {} with glowing accent highlights and studio rim light.",
            all.join(", ")
        )
    } else {
        format!(
            "Colors and lighting: dominant {primary} color scheme with soft gradients and studio rim light."
        )
    }
}

fn exclusions(placement: BrandPlacement) -> String {
    let extra = match placement {
        BrandPlacement::HeroTypography => HERO_EXCLUSIONS,
        BrandPlacement::TextFree => TEXT_FREE_EXCLUSIONS,
    };
    BASE_EXCLUSIONS
        .iter()
        .chain(extra)
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ColorPalette;

    fn musinsa() -> AnalysisRecord {
        AnalysisRecord {
            brand_name: Some("MUSINSA".into()),
            color_palette: ColorPalette {
                primary: Some("#000000".into()),
                secondary: vec![],
            },
            key_objects: vec!["hoodie".into(), "sneaker".into()],
            ..Default::default()
        }
    }

    fn hero(record: &AnalysisRecord) -> PosterPrompt {
        synthesize(record, AspectProfile::Vertical, BrandPlacement::HeroTypography)
    }

    #[test]
    fn empty_record_uses_defaults() {
        let p = hero(&AnalysisRecord::default());
        assert!(p.instruction.contains("\"BRAND\""));
        assert!(p.instruction.contains(FALLBACK_OBJECTS));
        assert!(p.instruction.contains("deep black"));
    }

    #[test]
    fn brand_and_objects_in_order() {
        let p = hero(&musinsa());
        let brand = p.instruction.find("MUSINSA").unwrap();
        let hoodie = p.instruction.find("hoodie").unwrap();
        let sneaker = p.instruction.find("sneaker").unwrap();
        assert!(brand < hoodie && hoodie < sneaker);
    }

    #[test]
    fn sections_in_fixed_order() {
        let p = hero(&musinsa());
        let heads: Vec<&str> = p
            .instruction
            .lines()
            .map(|l| l.split(':').next().unwrap_or(""))
            .collect();
        assert_eq!(
            heads,
            ["Composition", "Subject", "Colors and lighting", "Style", "Technical"]
        );
    }

    #[test]
    fn single_secondary_keeps_dominant_phrase() {
        let mut r = musinsa();
        r.color_palette.secondary = vec!["#FFFFFF".into()];
        let p = hero(&r);
        assert!(p.instruction.contains("dominant deep black color scheme"));
        assert!(!p.instruction.contains("clean white"));
    }

    #[test]
    fn two_secondaries_list_every_color_in_order() {
        let mut r = musinsa();
        r.color_palette.secondary = vec!["#FFFFFF".into(), "#E50914".into()];
        let p = hero(&r);
        assert!(p
            .instruction
            .contains("a palette of deep black, clean white, cinematic Netflix red"));
    }

    #[test]
    fn params_follow_aspect_not_record() {
        let sq = synthesize(&musinsa(), AspectProfile::Square, BrandPlacement::HeroTypography);
        assert_eq!(sq.generation_params, AspectProfile::Square.generation_params());
        assert!(sq.instruction.contains("1024x1024"));
        let tall = hero(&musinsa());
        assert!(tall.instruction.contains("768x1344"));
        assert!(tall.instruction.contains("9:16"));
    }

    #[test]
    fn hero_exclusions_permit_legible_text() {
        let p = hero(&musinsa());
        assert!(p.exclusions.contains("garbled text"));
        assert!(p.exclusions.contains("watermark"));
        assert!(!p.exclusions.contains("typography"));
    }

    #[test]
    fn text_free_excludes_all_text_and_omits_brand() {
        let p = synthesize(&musinsa(), AspectProfile::Vertical, BrandPlacement::TextFree);
        assert!(p.exclusions.contains("typography"));
        assert!(!p.instruction.contains("MUSINSA"));
        assert!(p.instruction.contains("hoodie, sneaker"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(hero(&musinsa()), hero(&musinsa()));
    }
}
