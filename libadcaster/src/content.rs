//! Ad content assembly
//!
//! Builds platform-shaped ad copy, hashtags, and imagery for a product. The
//! assembler degrades instead of failing: when the generator is missing or
//! errors, deterministic template content is used so a publish can always
//! proceed.

use std::sync::Arc;
use tracing::warn;

use crate::generator::ContentGenerator;
use crate::types::{AdContent, AdFormat, Product};

const PLACEHOLDER_WIDTH: usize = 800;
const PLACEHOLDER_HEIGHT: usize = 600;

pub struct ContentAssembler {
    generator: Option<Arc<dyn ContentGenerator>>,
    image_size: String,
}

impl ContentAssembler {
    pub fn new(generator: Option<Arc<dyn ContentGenerator>>, image_size: String) -> Self {
        Self {
            generator,
            image_size,
        }
    }

    /// Build complete ad content for one product/platform pair
    pub async fn assemble(
        &self,
        product: &Product,
        platform: &str,
        format: AdFormat,
    ) -> AdContent {
        let tone = if platform == "linkedin" {
            "professional"
        } else {
            "conversational"
        };

        let copy = self.build_copy(product, platform, tone, "medium").await;

        let hashtags = if uses_hashtags(platform) {
            self.build_hashtags(product, platform).await
        } else {
            Vec::new()
        };

        let image = if format == AdFormat::Image {
            let style = if platform == "linkedin" {
                "clean, professional"
            } else {
                "vibrant, eye-catching"
            };
            let prompt = self.build_image_prompt(product, platform, style).await;
            self.build_image(&prompt).await
        } else {
            None
        };

        AdContent {
            product_id: product.id.clone(),
            platform: platform.to_string(),
            copy,
            hashtags,
            image,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Ad copy for the platform; falls back to a template on generator failure
    pub async fn build_copy(
        &self,
        product: &Product,
        platform: &str,
        tone: &str,
        length: &str,
    ) -> String {
        let length_guide = match length {
            "short" => "2-3 sentences",
            "long" => "6-8 sentences",
            _ => "4-5 sentences",
        };

        let prompt = format!(
            "Create an engaging {} ad for the following product:\n\n\
             Product Name: {}\n\
             Description: {}\n\
             Key Features: {}\n\
             Target Audience: {}\n\n\
             Platform Guidelines: {}\n\
             Length: {}\n\
             Tone: {}\n\n\
             Include a compelling call-to-action.",
            platform,
            product.name,
            product.description,
            product.features.join(", "),
            product.target_audience,
            platform_guideline(platform),
            length_guide,
            tone,
        );

        match self
            .generate_text(
                "You are an expert marketing copywriter specializing in social media ads.",
                &prompt,
                500,
                0.7,
            )
            .await
        {
            Some(copy) => copy,
            None => fallback_copy(product),
        }
    }

    /// 5-7 hashtags, each normalized to start with '#'
    pub async fn build_hashtags(&self, product: &Product, platform: &str) -> Vec<String> {
        let prompt = format!(
            "Generate 5-7 relevant and trending hashtags for this product on {}:\n\n\
             Product: {}\n\
             Category: {}\n\
             Target Audience: {}\n\n\
             Include a mix of popular and niche hashtags for maximum reach.\n\
             Return only the hashtags without any explanation, separated by commas.",
            platform,
            product.name,
            product.category.as_deref().unwrap_or("General"),
            product.target_audience,
        );

        match self
            .generate_text(
                "You are a social media marketing expert specializing in hashtag optimization.",
                &prompt,
                100,
                0.7,
            )
            .await
        {
            Some(raw) => normalize_hashtags(&raw),
            None => fallback_hashtags(product),
        }
    }

    /// Image-generation prompt for the product, with a deterministic fallback
    pub async fn build_image_prompt(
        &self,
        product: &Product,
        platform: &str,
        style: &str,
    ) -> String {
        let prompt = format!(
            "Create a detailed image generation prompt for a product ad.\n\n\
             Product: {}\n\
             Description: {}\n\
             Target Platform: {}\n\
             Style Preference: {}\n\
             Target Audience: {}\n\n\
             The image should be engaging and highlight the product's key features.",
            product.name, product.description, platform, style, product.target_audience,
        );

        match self
            .generate_text(
                "You are an expert in creating detailed image generation prompts for marketing.",
                &prompt,
                100,
                0.7,
            )
            .await
        {
            Some(generated) => generated,
            None => format!(
                "Professional photo of {} in {} style, appealing to {}",
                product.name, style, product.target_audience
            ),
        }
    }

    /// Image bytes for the ad. Generator failure yields a locally drawn
    /// placeholder; an empty payload means "no image" to callers.
    pub async fn build_image(&self, prompt: &str) -> Option<Vec<u8>> {
        let bytes = match &self.generator {
            Some(generator) => match generator.generate_image(prompt, &self.image_size).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("image generation failed, using placeholder: {}", e);
                    placeholder_image()
                }
            },
            None => placeholder_image(),
        };

        if bytes.is_empty() {
            None
        } else {
            Some(bytes)
        }
    }

    async fn generate_text(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator
            .generate_text(system, user, max_tokens, temperature)
            .await
        {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("text generation failed, using fallback: {}", e);
                None
            }
        }
    }
}

/// Whether hashtags belong in this platform's caption
pub fn uses_hashtags(platform: &str) -> bool {
    matches!(platform, "instagram" | "twitter" | "tiktok")
}

fn platform_guideline(platform: &str) -> &'static str {
    match platform {
        "facebook" => "Up to 125 characters for headline, 30-90 words for body text.",
        "twitter" => "280 character limit. Concise and engaging.",
        "instagram" => "Caption up to 2200 characters, first 125 visible without tapping more.",
        "linkedin" => "Professional tone, up to 700 characters for best visibility.",
        "tiktok" => "Short, catchy caption that drives engagement.",
        "pinterest" => "Clear description with relevant keywords.",
        "snapchat" => "Brief and casual, call-to-action focused.",
        _ => "",
    }
}

fn fallback_copy(product: &Product) -> String {
    let highlights = product
        .features
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Check out our amazing {}! {}. Learn more now!",
        product.name, highlights
    )
}

fn fallback_hashtags(product: &Product) -> Vec<String> {
    vec![
        format!("#{}", product.name.replace(' ', "")),
        "#newproduct".to_string(),
        "#musthave".to_string(),
    ]
}

fn normalize_hashtags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| {
            if tag.starts_with('#') {
                tag.to_string()
            } else {
                format!("#{}", tag)
            }
        })
        .collect()
}

/// Merge copy and hashtags into the final platform caption.
///
/// Twitter keeps the result within 280 characters by appending only the whole
/// tags that fit; Instagram and TikTok append unconditionally; other
/// platforms ignore hashtags.
pub fn finalize_for_platform(copy: &str, hashtags: &[String], platform: &str) -> String {
    if hashtags.is_empty() {
        return copy.to_string();
    }
    let joined = hashtags.join(" ");

    match platform {
        "twitter" => {
            let copy_len = copy.chars().count();
            if copy_len + joined.chars().count() + 1 <= 280 {
                return format!("{}\n{}", copy, joined);
            }

            // Greedily keep whole tags that still fit
            let available = 280usize.saturating_sub(copy_len + 1);
            let mut kept: Vec<&str> = Vec::new();
            let mut used = 0usize;
            for tag in hashtags {
                let tag_len = tag.chars().count();
                if used + tag_len + 1 <= available {
                    kept.push(tag);
                    used += tag_len + 1;
                } else {
                    break;
                }
            }

            if kept.is_empty() {
                copy.to_string()
            } else {
                format!("{}\n{}", copy, kept.join(" "))
            }
        }
        "instagram" => format!("{}\n\n{}", copy, joined),
        "tiktok" => format!("{} {}", copy, joined),
        _ => copy.to_string(),
    }
}

/// Draw the stand-in ad image: solid background, nested rectangles, and a
/// diagonal line pattern, encoded as a 24-bit BMP.
pub fn placeholder_image() -> Vec<u8> {
    let (w, h) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let mut pixels = vec![0u8; w * h * 3];

    fill_rect(&mut pixels, w, 0, 0, w, h, (73, 109, 137));
    fill_rect(&mut pixels, w, 100, 100, w - 100, h - 100, (50, 80, 100));
    fill_rect(&mut pixels, w, 150, 150, w - 150, h - 150, (60, 90, 120));
    fill_rect(&mut pixels, w, 250, 250, w - 250, h - 250, (80, 120, 160));

    // Diagonal pattern every 20 pixels
    for start in (0..w).step_by(20) {
        draw_line(&mut pixels, w, h, start, 0, start + 100, h, (200, 200, 240));
    }

    encode_bmp(&pixels, w, h)
}

fn fill_rect(
    pixels: &mut [u8],
    stride: usize,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    color: (u8, u8, u8),
) {
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = (y * stride + x) * 3;
            pixels[idx] = color.0;
            pixels[idx + 1] = color.1;
            pixels[idx + 2] = color.2;
        }
    }
}

fn draw_line(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    color: (u8, u8, u8),
) {
    let steps = (x1.saturating_sub(x0)).max(y1.saturating_sub(y0)).max(1);
    for step in 0..=steps {
        let x = x0 + (x1 - x0) * step / steps;
        let y = y0 + (y1 - y0) * step / steps;
        if x < width && y < height {
            let idx = (y * width + x) * 3;
            pixels[idx] = color.0;
            pixels[idx + 1] = color.1;
            pixels[idx + 2] = color.2;
        }
    }
}

fn encode_bmp(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let row_bytes = width * 3;
    let padding = (4 - row_bytes % 4) % 4;
    let data_size = (row_bytes + padding) * height;
    let file_size = 54 + data_size;

    let mut out = Vec::with_capacity(file_size);

    // File header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&54u32.to_le_bytes());

    // BITMAPINFOHEADER
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(data_size as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    // Pixel rows, bottom-up, BGR
    for y in (0..height).rev() {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            out.push(pixels[idx + 2]);
            out.push(pixels[idx + 1]);
            out.push(pixels[idx]);
        }
        for _ in 0..padding {
            out.push(0);
        }
    }

    out
}
