//! Product-image resolution.
//!
//! An ordered cascade of [`CandidateStrategy`] values is tried against a
//! [`PageContext`] snapshot; the first non-empty candidate wins. Earlier
//! strategies are more authoritative (explicit variant data), later ones
//! are generic scraping of whatever images the page exposes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::types::{GalleryContainer, ImageRef, PageContext};

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StrategyError(pub String);

pub trait CandidateStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn candidate(&self, ctx: &PageContext) -> Result<Option<String>, StrategyError>;
}

/// Closure-backed strategy.
pub struct FnStrategy<F> {
    name: String,
    func: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&PageContext) -> Result<Option<String>, StrategyError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> CandidateStrategy for FnStrategy<F>
where
    F: Fn(&PageContext) -> Result<Option<String>, StrategyError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn candidate(&self, ctx: &PageContext) -> Result<Option<String>, StrategyError> {
        (self.func)(ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ResolverConfig {
    /// Hosts that serve product media, matched as a suffix of the URL host.
    pub cdn_hosts: Vec<String>,
    /// Matched case-insensitively against image alt text.
    pub category_keywords: Vec<String>,
    /// Matched case-insensitively against the image file name.
    pub narrow_keywords: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cdn_hosts: vec!["cdn.shopify.com".to_string()],
            category_keywords: vec![
                "shirt".to_string(),
                "tee".to_string(),
                "hoodie".to_string(),
                "sweatshirt".to_string(),
            ],
            narrow_keywords: vec!["t-shirt".to_string(), "tshirt".to_string()],
        }
    }
}

/// Which strategy produced a URL, and at what rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub rank: usize,
    pub strategy: String,
    pub url: String,
}

pub struct Resolver {
    strategies: Vec<Box<dyn CandidateStrategy>>,
}

impl Resolver {
    pub fn new(strategies: Vec<Box<dyn CandidateStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard eight-step cascade.
    pub fn standard(config: &ResolverConfig) -> Self {
        let cdn = config.cdn_hosts.clone();
        let cdn_last = config.cdn_hosts.clone();
        let categories = lowercase_all(&config.category_keywords);
        let narrow = lowercase_all(&config.narrow_keywords);

        let strategies: Vec<Box<dyn CandidateStrategy>> = vec![
            Box::new(FnStrategy::new("selected-variant", |ctx: &PageContext| {
                Ok(ctx
                    .selected_variant()
                    .and_then(|v| v.featured_image.as_ref())
                    .and_then(image_ref_src))
            })),
            Box::new(FnStrategy::new("visible-gallery", move |ctx: &PageContext| {
                Ok(ctx
                    .gallery
                    .iter()
                    .filter(|img| img.container == GalleryContainer::Primary && img.visible)
                    .find(|img| matches_cdn_host(&img.src, &cdn))
                    .map(|img| img.src.clone()))
            })),
            Box::new(FnStrategy::new("secondary-gallery", |ctx: &PageContext| {
                Ok(ctx
                    .gallery
                    .iter()
                    .find(|img| {
                        img.container == GalleryContainer::Secondary && !img.src.trim().is_empty()
                    })
                    .map(|img| img.src.clone()))
            })),
            Box::new(FnStrategy::new("product-featured", |ctx: &PageContext| {
                Ok(ctx
                    .product
                    .as_ref()
                    .and_then(|p| p.featured_image.as_ref())
                    .and_then(image_ref_src))
            })),
            Box::new(FnStrategy::new("product-images", |ctx: &PageContext| {
                Ok(ctx
                    .product
                    .as_ref()
                    .and_then(|p| p.images.first())
                    .and_then(image_ref_src))
            })),
            Box::new(FnStrategy::new("category-alt", move |ctx: &PageContext| {
                Ok(all_images(ctx)
                    .find(|(_, alt)| contains_any(alt, &categories))
                    .map(|(src, _)| src.to_string()))
            })),
            Box::new(FnStrategy::new("narrow-keyword", move |ctx: &PageContext| {
                Ok(all_images(ctx)
                    .find(|(src, _)| contains_any(file_name(src), &narrow))
                    .map(|(src, _)| src.to_string()))
            })),
            Box::new(FnStrategy::new("any-cdn-image", move |ctx: &PageContext| {
                Ok(all_images(ctx)
                    .find(|(src, _)| matches_cdn_host(src, &cdn_last))
                    .map(|(src, _)| src.to_string()))
            })),
        ];

        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, ctx: &PageContext) -> Option<String> {
        self.resolve_candidate(ctx).map(|resolution| resolution.url)
    }

    /// A strategy that errors is treated as having no candidate.
    pub fn resolve_candidate(&self, ctx: &PageContext) -> Option<Resolution> {
        for (rank, strategy) in self.strategies.iter().enumerate() {
            match strategy.candidate(ctx) {
                Ok(Some(url)) if !url.trim().is_empty() => {
                    let url = absolutize(&normalize_image_url(&url), ctx.page_url.as_deref());
                    tracing::debug!(rank, strategy = strategy.name(), %url, "resolved product image");
                    return Some(Resolution {
                        rank,
                        strategy: strategy.name().to_string(),
                        url,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(rank, strategy = strategy.name(), error = %err, "strategy failed");
                }
            }
        }
        tracing::debug!("no product image candidate found");
        None
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::standard(&ResolverConfig::default())
    }
}

/// `//host/path` becomes `https://host/path`; everything else is trimmed
/// and returned unchanged.
pub fn normalize_image_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Join a relative source onto the page URL. Absolute sources, and
/// relative ones on a page without a usable URL, are returned as-is.
fn absolutize(url: &str, page_url: Option<&str>) -> String {
    match Url::parse(url) {
        Err(url::ParseError::RelativeUrlWithoutBase) => page_url
            .and_then(|base| Url::parse(base).ok())
            .and_then(|base| base.join(url).ok())
            .map(String::from)
            .unwrap_or_else(|| url.to_string()),
        _ => url.to_string(),
    }
}

fn image_ref_src(image: &ImageRef) -> Option<String> {
    image
        .src()
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

fn all_images(ctx: &PageContext) -> impl Iterator<Item = (&str, &str)> {
    ctx.gallery
        .iter()
        .map(|img| (img.src.as_str(), img.alt.as_str()))
        .chain(
            ctx.page_images
                .iter()
                .map(|img| (img.src.as_str(), img.alt.as_str())),
        )
        .filter(|(src, _)| !src.trim().is_empty())
}

fn matches_cdn_host(src: &str, hosts: &[String]) -> bool {
    let normalized = normalize_image_url(src);
    match Url::parse(&normalized) {
        Ok(url) => url.host_str().is_some_and(|host| {
            hosts
                .iter()
                .any(|pattern| host == pattern || host.ends_with(&format!(".{pattern}")))
        }),
        Err(_) => false,
    }
}

fn file_name(src: &str) -> &str {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.rsplit('/').next().unwrap_or(path)
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}
