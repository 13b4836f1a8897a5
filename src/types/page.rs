//! Host-supplied snapshot of the product page.
//!
//! The host serializes what it can see of the page (selected variant,
//! product data, gallery images) into a [`PageContext`]; the resolver
//! only ever reads this snapshot and never queries the page itself.

use serde::{Deserialize, Serialize};

/// An image reference as product data carries it: either a bare URL
/// string or an object with a `src` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Object {
        #[serde(default)]
        src: Option<String>,
    },
}

impl ImageRef {
    pub fn src(&self) -> Option<&str> {
        match self {
            ImageRef::Url(url) => Some(url.as_str()),
            ImageRef::Object { src } => src.as_deref(),
        }
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        ImageRef::Url(value.to_string())
    }
}

/// A purchasable configuration of the product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Variant {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ImageRef>,
}

/// Product-level data embedded in the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProductData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
}

/// Which gallery container an image was found in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GalleryContainer {
    /// The main product media gallery
    Primary,
    /// A thumbnail strip or secondary media container
    Secondary,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub container: GalleryContainer,
}

/// Any other image on the page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Value of the hidden variant id input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<GalleryImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_images: Vec<PageImage>,
    /// Document URL; relative image sources resolve against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

impl PageContext {
    pub fn selected_variant(&self) -> Option<&Variant> {
        let id = self.selected_variant_id.as_deref()?;
        self.product
            .as_ref()?
            .variants
            .iter()
            .find(|variant| variant.id == id)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

fn default_visible() -> bool {
    true
}

/// Variant ids arrive as numbers or strings depending on the theme.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_variant_ids_and_mixed_image_refs() {
        let raw = r#"{
            "selectedVariantId": "42",
            "product": {
                "featured_image": "//cdn.shopify.com/p.png",
                "variants": [
                    { "id": 41, "featured_image": null },
                    { "id": 42, "featured_image": { "src": "//cdn.shopify.com/v42.png" } }
                ]
            }
        }"#;
        let ctx = PageContext::from_json(raw).expect("parse page context");

        let variant = ctx.selected_variant().expect("selected variant");
        assert_eq!(variant.id, "42");
        assert_eq!(
            variant.featured_image.as_ref().and_then(ImageRef::src),
            Some("//cdn.shopify.com/v42.png")
        );
    }

    #[test]
    fn gallery_images_default_to_visible() {
        let raw = r#"{ "gallery": [ { "src": "a.png" } ] }"#;
        let ctx = PageContext::from_json(raw).expect("parse gallery");
        assert!(ctx.gallery[0].visible);
        assert_eq!(ctx.gallery[0].container, GalleryContainer::Other);
    }

    #[test]
    fn selected_variant_is_none_without_product() {
        let ctx = PageContext {
            selected_variant_id: Some("1".into()),
            ..Default::default()
        };
        assert!(ctx.selected_variant().is_none());
    }
}
